//! Administrator views of customer accounts.

use axum::extract::{Path, State};
use axum::Json;

use super::{parse_id, HandlerResult};
use crate::engine::CustomerUpdate;
use crate::http::dto::{BookingDto, CustomerBody, MessageResponse, UserDto};
use crate::http::extract::{AdminCaller, ValidJson};
use crate::http::state::AppState;

/// GET /api/customers
pub async fn list_customers(State(state): State<AppState>, _admin: AdminCaller) -> HandlerResult<Vec<UserDto>> {
    let users = state.engine.list_customers().await;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<UserDto> {
    let id = parse_id(&id, "customer")?;
    Ok(Json(state.engine.get_customer(&id).await?.into()))
}

/// GET /api/customers/{id}/bookings
pub async fn customer_bookings(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<Vec<BookingDto>> {
    let id = parse_id(&id, "customer")?;
    state.engine.get_customer(&id).await?;
    let views = state.engine.bookings_for_customer(&id).await;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// PUT /api/customers/{id}
pub async fn update_customer(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<CustomerBody>,
) -> HandlerResult<UserDto> {
    let id = parse_id(&id, "customer")?;
    let user = state
        .engine
        .update_customer(
            id,
            CustomerUpdate {
                email: body.email,
                first_name: body.first_name,
                last_name: body.last_name,
            },
        )
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /api/customers/{id}
pub async fn delete_customer(
    State(state): State<AppState>,
    _admin: AdminCaller,
    Path(id): Path<String>,
) -> HandlerResult<MessageResponse> {
    let id = parse_id(&id, "customer")?;
    state.engine.delete_customer(id).await?;
    Ok(Json(MessageResponse::new("Customer deleted successfully")))
}
