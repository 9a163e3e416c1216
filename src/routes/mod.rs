//! Router assembly: common endpoints plus the generic resource surface.

mod common;
mod resource;
pub use common::common_routes;
pub use resource::resource_routes;

use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Request bodies above this size are rejected before reaching a handler.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The full application: health/ready/version, `/v1/*path` resources and `/schema/:entity`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(resource_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
}
