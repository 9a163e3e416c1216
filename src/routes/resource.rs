//! Resource routes. Entity and id come from the wildcard path and are resolved against the
//! current catalog snapshot by the handlers.

use crate::handlers::resource::{create, delete, read, schema, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/*path", get(read).post(create).patch(update).delete(delete))
        .route("/schema/:entity", get(schema))
        .with_state(state)
}
