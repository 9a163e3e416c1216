//! Resource handlers: list, get, create, update, delete over `/v1/*path`, plus published schemas.

use crate::config::{is_control_table, Catalog, Operation};
use crate::error::{ApiError, AppError};
use crate::handlers::path::{authorize, parse_read_path, parse_write_path};
use crate::response::{success_many, success_one, success_one_ok, success_one_with_meta};
use crate::service::ResourceService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// GET `/v1/<entity>`, `/v1/<entity>?ids=a,b` or `/v1/<entity>/<id>`.
pub async fn read(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let catalog = state.catalog.snapshot();
    read_inner(&state, &catalog, &path, &params)
        .await
        .map_err(|e| state.settings.status_map.render(e))
}

async fn read_inner(
    state: &AppState,
    catalog: &Catalog,
    path: &str,
    params: &HashMap<String, String>,
) -> Result<Response, AppError> {
    let target = parse_read_path(path, catalog)?;
    authorize(catalog, &target, Operation::Read)?;
    match (&target.id, params.get("ids")) {
        (Some(id), _) => {
            let row = ResourceService::get_one(&state.pool, catalog, &target.entity, id).await?;
            Ok(success_one_ok(row).into_response())
        }
        (None, Some(ids)) => {
            let ids: Vec<&str> = ids.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            let rows = ResourceService::list_subset(&state.pool, catalog, &target.entity, &ids).await?;
            Ok(success_many(rows).into_response())
        }
        (None, None) => {
            let rows = ResourceService::list_all(&state.pool, catalog, &target.entity).await?;
            Ok(success_many(rows).into_response())
        }
    }
}

/// POST `/v1/<entity>`.
pub async fn create(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let catalog = state.catalog.snapshot();
    let result = async {
        let target = parse_write_path(&path, &catalog, false)?;
        authorize(&catalog, &target, Operation::Create)?;
        let row = ResourceService::create(&state.pool, &catalog, &target.entity, &body).await?;
        refresh_after_write(&state, &target.entity).await;
        Ok::<_, AppError>(success_one(row).into_response())
    }
    .await;
    result.map_err(|e| state.settings.status_map.render(e))
}

/// PATCH `/v1/<entity>/<id>`.
pub async fn update(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let catalog = state.catalog.snapshot();
    let result = async {
        let target = parse_write_path(&path, &catalog, true)?;
        authorize(&catalog, &target, Operation::Update)?;
        let id = target.id.as_deref().unwrap_or_default();
        let row = ResourceService::update(&state.pool, &catalog, &target.entity, id, &body).await?;
        refresh_after_write(&state, &target.entity).await;
        Ok::<_, AppError>(success_one_ok(row).into_response())
    }
    .await;
    result.map_err(|e| state.settings.status_map.render(e))
}

/// DELETE `/v1/<entity>/<id>`. Responds with the removed resource.
pub async fn delete(State(state): State<AppState>, Path(path): Path<String>) -> Result<Response, ApiError> {
    let catalog = state.catalog.snapshot();
    let result = async {
        let target = parse_write_path(&path, &catalog, true)?;
        authorize(&catalog, &target, Operation::Delete)?;
        let id = target.id.as_deref().unwrap_or_default();
        let row = ResourceService::delete(&state.pool, &catalog, &target.entity, id).await?;
        refresh_after_write(&state, &target.entity).await;
        Ok::<_, AppError>(success_one_ok(row).into_response())
    }
    .await;
    result.map_err(|e| state.settings.status_map.render(e))
}

/// GET `/schema/<entity>`: the published JSON Schema for the entity's payloads, with its permissions.
pub async fn schema(State(state): State<AppState>, Path(entity): Path<String>) -> Result<Response, ApiError> {
    let catalog: Arc<Catalog> = state.catalog.snapshot();
    let entity = entity.replace('-', "_");
    let model = catalog
        .documented_model(&entity)
        .map_err(|e| state.settings.status_map.render(e))?;
    let operations = ResourceService::operations(&catalog, &entity);
    let meta = serde_json::json!({ "operations": operations });
    Ok(success_one_with_meta(model.json_schema(), meta).into_response())
}

/// Writes to a control table change the catalog itself; rebuild it so later requests see them.
async fn refresh_after_write(state: &AppState, entity: &str) {
    if !is_control_table(entity) {
        return;
    }
    if let Err(e) = state.refresh_catalog().await {
        tracing::warn!(error = %e, entity = %entity, "catalog refresh failed, keeping previous snapshot");
    }
}
