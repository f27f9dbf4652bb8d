//! Unsent gift card audit log.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::unsent_audit::{ListUnsentAuditQuery, UnsentAuditRecord};
use shared::pagination::Paginated;

use crate::app::AppState;
use crate::error::ApiError;

/// Audit records, newest first.
///
/// GET /api/v1/audit/unsent?assignment_id=...&page=1&per_page=50
pub async fn list_unsent(
    State(state): State<AppState>,
    Query(query): Query<ListUnsentAuditQuery>,
) -> Result<Json<Paginated<UnsentAuditRecord>>, ApiError> {
    let (records, total) = state.reversal.list_audit(&query).await?;
    Ok(Json(Paginated::new(records, &query.page_params(), total)))
}
