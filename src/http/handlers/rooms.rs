use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::{parse_id, HandlerResult};
use crate::engine::RoomRequest;
use crate::http::dto::{CalendarDto, CalendarQuery, MessageResponse, RoomBody, RoomDto};
use crate::http::error::AppError;
use crate::http::extract::{AdminCaller, ValidJson};
use crate::http::state::AppState;

impl From<RoomBody> for RoomRequest {
    fn from(b: RoomBody) -> Self {
        RoomRequest {
            name: b.name,
            capacity: b.capacity,
            price_per_night: b.price_per_night,
            description: b.description,
        }
    }
}

/// GET /api/rooms
pub async fn list_rooms(State(state): State<AppState>) -> HandlerResult<Vec<RoomDto>> {
    let rooms = state.engine.list_rooms().await;
    Ok(Json(rooms.into_iter().map(Into::into).collect()))
}

/// GET /api/rooms/{id}
pub async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<RoomDto> {
    let id = parse_id(&id, "room")?;
    Ok(Json(state.engine.get_room(&id).await?.into()))
}

/// GET /api/rooms/{id}/availability?from=&to=
///
/// Busy and free day ranges for a calendar view.
pub async fn room_calendar(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<CalendarQuery>,
) -> HandlerResult<CalendarDto> {
    let id = parse_id(&id, "room")?;
    Ok(Json(state.engine.room_calendar(&id, q.from, q.to).await?.into()))
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    ValidJson(body): ValidJson<RoomBody>,
) -> Result<(StatusCode, Json<RoomDto>), AppError> {
    let room = state.engine.create_room(body.into()).await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// PUT /api/rooms/{id}
pub async fn update_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<RoomBody>,
) -> HandlerResult<RoomDto> {
    let id = parse_id(&id, "room")?;
    Ok(Json(state.engine.update_room(id, body.into()).await?.into()))
}

/// DELETE /api/rooms/{id}
pub async fn delete_room(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "room")?;
    state.engine.delete_room(id).await?;
    Ok(Json(MessageResponse::new("Room deleted successfully")))
}
