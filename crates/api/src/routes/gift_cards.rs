//! Gift card pool endpoint handlers, including batch send.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::allocation::{BatchSendRequest, BatchSendResult};
use domain::models::gift_card::{GiftCard, NewGiftCard, UpdateGiftCardCodeRequest};
use domain::models::participant::{EligibleParticipant, ListParticipantsQuery};
use domain::models::pool::{GiftCardPoolCounts, ListPoolQuery, PoolKind};
use domain::models::upload::{GiftCardUploadRequest, UploadResult};
use shared::pagination::Paginated;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;
use crate::middleware::metrics::{record_pool_claim, record_upload_rows, ClaimMetricOutcome};

/// Add a single gift card.
///
/// POST /api/v1/gift-cards
pub async fn add_gift_card(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<NewGiftCard>,
) -> Result<(StatusCode, Json<GiftCard>), ApiError> {
    let card = state
        .ingestion
        .add_gift_card(request, acted_by.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// Bulk upload: first CSV column holds the code; shared metadata applies to
/// every row.
///
/// POST /api/v1/gift-cards/upload
pub async fn upload_gift_cards(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<GiftCardUploadRequest>,
) -> Result<Json<UploadResult>, ApiError> {
    let result = state
        .ingestion
        .upload_gift_cards(request, acted_by.as_str())
        .await?;
    record_upload_rows(PoolKind::GiftCard, &result);
    Ok(Json(result))
}

/// GET /api/v1/gift-cards?status=AVAILABLE&search=AMZN
pub async fn list_gift_cards(
    State(state): State<AppState>,
    Query(query): Query<ListPoolQuery>,
) -> Result<Json<Paginated<GiftCard>>, ApiError> {
    let (cards, total) = state.store.list_gift_cards(&query).await?;
    Ok(Json(Paginated::new(cards, &query.page_params(), total)))
}

/// Participants who completed the survey and hold no active gift card,
/// oldest completion first.
///
/// GET /api/v1/gift-cards/eligible?page=1&search=555
pub async fn list_eligible(
    State(state): State<AppState>,
    Query(query): Query<ListParticipantsQuery>,
) -> Result<Json<Paginated<EligibleParticipant>>, ApiError> {
    let (participants, total) = state.store.list_eligible_participants(&query).await?;
    Ok(Json(Paginated::new(participants, &query.page_params(), total)))
}

/// GET /api/v1/gift-cards/status
pub async fn pool_status(
    State(state): State<AppState>,
) -> Result<Json<GiftCardPoolCounts>, ApiError> {
    Ok(Json(state.store.gift_card_counts().await?))
}

/// Change the code of an AVAILABLE card.
///
/// PUT /api/v1/gift-cards/:id
pub async fn update_code(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(card_id): Path<Uuid>,
    Json(request): Json<UpdateGiftCardCodeRequest>,
) -> Result<Json<GiftCard>, ApiError> {
    request.validate()?;

    let card = state
        .ingestion
        .update_gift_card_code(card_id, &request.card_code)
        .await?;
    info!(gift_card_id = %card_id, acted_by = %acted_by.as_str(), "Gift card code updated");
    Ok(Json(card))
}

/// POST /api/v1/gift-cards/:id/expire
pub async fn expire(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(card_id): Path<Uuid>,
) -> Result<Json<GiftCard>, ApiError> {
    let card = state.ingestion.expire_gift_card(card_id).await?;
    info!(gift_card_id = %card_id, acted_by = %acted_by.as_str(), "Gift card marked expired");
    Ok(Json(card))
}

/// POST /api/v1/gift-cards/:id/invalidate
pub async fn invalidate(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(card_id): Path<Uuid>,
) -> Result<Json<GiftCard>, ApiError> {
    let card = state.ingestion.invalidate_gift_card(card_id).await?;
    info!(gift_card_id = %card_id, acted_by = %acted_by.as_str(), "Gift card marked invalid");
    Ok(Json(card))
}

/// Delete a card that is not ASSIGNED.
///
/// DELETE /api/v1/gift-cards/:id
pub async fn delete_gift_card(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.cascade.delete_gift_card(card_id).await?;
    info!(gift_card_id = %card_id, acted_by = %acted_by.as_str(), "Gift card removed from pool");
    Ok(StatusCode::NO_CONTENT)
}

/// Send gift cards to several participants. Each participant succeeds or
/// fails on its own; the response lists both.
///
/// POST /api/v1/gift-cards/batch-send
pub async fn batch_send(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<BatchSendRequest>,
) -> Result<Json<BatchSendResult>, ApiError> {
    request.validate()?;

    let result = state
        .allocation
        .claim_many(
            &request.participant_ids,
            request.delivery_method,
            request.notes,
            acted_by.as_str(),
        )
        .await?;

    for _ in 0..result.successful {
        record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Claimed);
    }
    for _ in 0..result.failed {
        record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Failed);
    }
    Ok(Json(result))
}
