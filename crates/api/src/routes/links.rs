//! Survey link pool endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::pool::{LinkPoolCounts, ListPoolQuery, PoolKind};
use domain::models::survey_link::{NewSurveyLink, SurveyLink};
use domain::models::upload::{LinkUploadRequest, UploadResult};
use shared::pagination::Paginated;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;
use crate::middleware::metrics::record_upload_rows;

/// Add a single survey link.
///
/// POST /api/v1/links
pub async fn add_link(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<NewSurveyLink>,
) -> Result<(StatusCode, Json<SurveyLink>), ApiError> {
    let link = state.ingestion.add_link(request, acted_by.as_str()).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Bulk upload: one URL per line. Row failures are reported, not fatal.
///
/// POST /api/v1/links/upload
pub async fn upload_links(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<LinkUploadRequest>,
) -> Result<Json<UploadResult>, ApiError> {
    let result = state
        .ingestion
        .upload_links(request, acted_by.as_str())
        .await?;
    record_upload_rows(PoolKind::Link, &result);
    Ok(Json(result))
}

/// GET /api/v1/links?status=AVAILABLE&search=batch-1
pub async fn list_links(
    State(state): State<AppState>,
    Query(query): Query<ListPoolQuery>,
) -> Result<Json<Paginated<SurveyLink>>, ApiError> {
    let (links, total) = state.store.list_links(&query).await?;
    Ok(Json(Paginated::new(links, &query.page_params(), total)))
}

/// GET /api/v1/links/status
pub async fn pool_status(State(state): State<AppState>) -> Result<Json<LinkPoolCounts>, ApiError> {
    Ok(Json(state.store.link_counts().await?))
}

/// Delete a link that is not ASSIGNED.
///
/// DELETE /api/v1/links/:id
pub async fn delete_link(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(link_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.cascade.delete_link(link_id).await?;
    info!(link_id = %link_id, acted_by = %acted_by.as_str(), "Survey link removed from pool");
    Ok(StatusCode::NO_CONTENT)
}
