use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::{parse_id, HandlerResult};
use crate::engine::NewBooking;
use crate::http::dto::{
    AvailabilityBody, AvailabilityDto, BookingBody, BookingDto, BookingUpdateBody, CancelResponse,
};
use crate::http::error::AppError;
use crate::http::extract::{AdminCaller, Caller, ValidJson};
use crate::http::state::AppState;

/// GET /api/bookings
///
/// Administrators see every booking; customers see their own.
pub async fn list_bookings(State(state): State<AppState>, caller: Caller) -> HandlerResult<Vec<BookingDto>> {
    let views = state.engine.list_bookings(&caller.identity).await;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<BookingDto> {
    let id = parse_id(&id, "booking")?;
    Ok(Json(state.engine.get_booking(&caller.identity, &id).await?.into()))
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(body): ValidJson<BookingBody>,
) -> Result<(StatusCode, Json<BookingDto>), AppError> {
    let booking = state
        .engine
        .create_booking(
            &caller.identity,
            NewBooking {
                room_id: body.room_id,
                check_in: body.check_in,
                check_out: body.check_out,
                notes: body.notes,
                on_behalf_of: body.customer_id,
            },
        )
        .await?;
    tracing::info!(
        booking_id = %booking.id,
        room_id = %booking.room_id,
        check_in = %booking.check_in,
        check_out = %booking.check_out,
        "booking created"
    );
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// POST /api/bookings/check-availability
pub async fn check_availability(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<AvailabilityBody>,
) -> HandlerResult<AvailabilityDto> {
    let available = state
        .engine
        .check_availability(&body.room_id, body.check_in, body.check_out)
        .await?;
    Ok(Json(AvailabilityDto { available }))
}

/// PUT /api/bookings/{id}
pub async fn update_booking(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<BookingUpdateBody>,
) -> HandlerResult<BookingDto> {
    let id = parse_id(&id, "booking")?;
    let booking = state.engine.update_booking(id, body.status, body.notes).await?;
    Ok(Json(booking.into()))
}

/// DELETE /api/bookings/{id}
///
/// Cancels rather than deletes; the row stays for history.
pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> HandlerResult<CancelResponse> {
    let id = parse_id(&id, "booking")?;
    let booking = state.engine.cancel_booking(&caller.identity, id).await?;
    Ok(Json(CancelResponse {
        message: "Booking cancelled successfully".into(),
        booking: booking.into(),
    }))
}
