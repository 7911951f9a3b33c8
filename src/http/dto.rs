//! Request and response bodies. Field names are camelCase on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::RoomCalendar;
use crate::model::*;

// ── Auth ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"), length(max = 254))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "must be between 6 and 128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// An email address, or the administrator's user name.
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 6, max = 128, message = "must be between 6 and 128 characters"))]
    pub password: String,
}

/// A user as the client sees it. The administrator has no id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Option<UserId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserDto {
    pub fn admin(email: &str) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            first_name: "Admin".into(),
            last_name: "User".into(),
            role: Role::Admin,
            created_at: None,
        }
    }
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: Some(u.id),
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            created_at: Some(u.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Handed to the mail sender. Present even when no account matched.
    pub reset_url: String,
}

// ── Rooms ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoomBody {
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 50, message = "must be between 1 and 50"))]
    pub capacity: u32,
    pub price_per_night: Decimal,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    pub description: Option<String>,
}

impl From<Room> for RoomDto {
    fn from(r: Room) -> Self {
        Self {
            id: r.id,
            name: r.name,
            capacity: r.capacity,
            price_per_night: r.price_per_night,
            description: r.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RangeDto {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<DateRange> for RangeDto {
    fn from(r: DateRange) -> Self {
        Self { start: r.start, end: r.end }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDto {
    pub room_id: RoomId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub busy: Vec<RangeDto>,
    pub free: Vec<RangeDto>,
}

impl From<RoomCalendar> for CalendarDto {
    fn from(c: RoomCalendar) -> Self {
        Self {
            room_id: c.room_id,
            from: c.window.start,
            to: c.window.end,
            busy: c.busy.into_iter().map(Into::into).collect(),
            free: c.free.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingBody {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Administrator only: book on behalf of this customer.
    pub customer_id: Option<UserId>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityBody {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityDto {
    pub available: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookingUpdateBody {
    pub status: BookingStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub id: BookingId,
    pub user_id: Option<UserId>,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            room_id: b.room_id,
            check_in: b.check_in,
            check_out: b.check_out,
            status: b.status,
            notes: b.notes,
            created_at: b.created_at,
            customer_email: None,
            first_name: None,
            last_name: None,
            room_name: None,
        }
    }
}

impl From<BookingView> for BookingDto {
    fn from(v: BookingView) -> Self {
        Self {
            customer_email: v.customer_email,
            first_name: v.first_name,
            last_name: v.last_name,
            room_name: Some(v.room_name),
            ..BookingDto::from(v.booking)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub booking: BookingDto,
}

// ── Blocked dates ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BlockedDateBody {
    /// Omitted or null: every room.
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedDateDto {
    pub id: BlockId,
    pub room_id: Option<RoomId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
}

impl From<BlockedDate> for BlockedDateDto {
    fn from(b: BlockedDate) -> Self {
        Self {
            id: b.id,
            room_id: b.room_id,
            start_date: b.start_date,
            end_date: b.end_date,
            reason: b.reason,
            room_name: None,
        }
    }
}

impl From<BlockedDateView> for BlockedDateDto {
    fn from(v: BlockedDateView) -> Self {
        Self {
            room_name: v.room_name,
            ..BlockedDateDto::from(v.block)
        }
    }
}

// ── Customers ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerBody {
    #[validate(email(message = "must be a valid email address"), length(max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 200, message = "is required"))]
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
