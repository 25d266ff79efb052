//! Generation and traversal handlers.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use orrery_shared::{Error, Planet, Run, SpatialEntity, SpatialId};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::pipeline::CreateRunRequest;

/// `POST /admin/runs`
pub async fn create_run(
    State(state): State<AppState>,
    body: Result<Json<CreateRunRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Run>)> {
    let Json(request) = body?;
    let cancel = state.shutdown.child_token();
    let run = state.pipeline.create_run(&request, &cancel).await?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// `GET /spatial/{id}/children`
pub async fn children(
    State(state): State<AppState>,
    id: Result<Path<SpatialId>, PathRejection>,
) -> ApiResult<Json<Vec<SpatialEntity>>> {
    let Path(id) = id?;
    let mut conn = state.pipeline.store().acquire().await?;
    Ok(Json(conn.get_children(id).await?))
}

/// `GET /spatial/{id}/ancestors`
pub async fn ancestors(
    State(state): State<AppState>,
    id: Result<Path<SpatialId>, PathRejection>,
) -> ApiResult<Json<Vec<SpatialEntity>>> {
    let Path(id) = id?;
    let mut conn = state.pipeline.store().acquire().await?;
    Ok(Json(conn.get_ancestors(id).await?))
}

/// `GET /systems/{id}/planets`
pub async fn planets(
    State(state): State<AppState>,
    id: Result<Path<SpatialId>, PathRejection>,
) -> ApiResult<Json<Vec<Planet>>> {
    let Path(id) = id?;
    let mut conn = state.pipeline.store().acquire().await?;
    Ok(Json(conn.get_planets(id).await?))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// Unknown path.
pub async fn not_found() -> ApiError {
    ApiError(Error::not_found("no such route"))
}

/// Known path, wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError(Error::method_not_allowed("method not allowed on this route"))
}
