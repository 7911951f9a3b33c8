use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{parse_id, HandlerResult};
use crate::engine::BlockRequest;
use crate::http::dto::{BlockedDateBody, BlockedDateDto, MessageResponse};
use crate::http::error::AppError;
use crate::http::extract::{AdminCaller, ValidJson};
use crate::http::state::AppState;

impl From<BlockedDateBody> for BlockRequest {
    fn from(b: BlockedDateBody) -> Self {
        BlockRequest {
            room_id: b.room_id,
            start_date: b.start_date,
            end_date: b.end_date,
            reason: b.reason,
        }
    }
}

/// GET /api/blocked-dates
pub async fn list_blocked_dates(State(state): State<AppState>) -> HandlerResult<Vec<BlockedDateDto>> {
    let views = state.engine.list_blocked_dates().await;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// GET /api/blocked-dates/room/{id}
///
/// Only blocks attached to the room; house-wide ones are listed at the top level.
pub async fn blocked_dates_for_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<BlockedDateDto>> {
    let id = parse_id(&id, "room")?;
    let blocks = state.engine.blocked_dates_for_room(&id).await;
    Ok(Json(blocks.into_iter().map(Into::into).collect()))
}

/// POST /api/blocked-dates
pub async fn create_blocked_date(
    State(state): State<AppState>,
    _admin: AdminCaller,
    ValidJson(body): ValidJson<BlockedDateBody>,
) -> Result<(StatusCode, Json<BlockedDateDto>), AppError> {
    let block = state.engine.add_blocked_date(body.into()).await?;
    Ok((StatusCode::CREATED, Json(block.into())))
}

/// PUT /api/blocked-dates/{id}
pub async fn update_blocked_date(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<BlockedDateBody>,
) -> HandlerResult<BlockedDateDto> {
    let id = parse_id(&id, "blocked date")?;
    Ok(Json(state.engine.update_blocked_date(id, body.into()).await?.into()))
}

/// DELETE /api/blocked-dates/{id}
pub async fn delete_blocked_date(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "blocked date")?;
    state.engine.remove_blocked_date(id).await?;
    Ok(Json(MessageResponse::new("Blocked date removed successfully")))
}
