//! Hard bounds on user-supplied input.

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4_000;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_EMAIL_LEN: usize = 254;

/// Longest stay accepted in a single booking.
pub const MAX_STAY_NIGHTS: i64 = 365;
/// Widest window accepted by the busy-range calendar query.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 2 * 366;

pub const MAX_ROOM_CAPACITY: u32 = 50;
pub const MAX_INTERVALS_PER_ROOM: usize = 100_000;

/// Bearer tokens expire this many days after issuance.
pub const TOKEN_TTL_DAYS: i64 = 7;
/// Password reset tokens expire this many minutes after issuance.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;
/// Random bytes in a password reset token (hex-encoded on the wire).
pub const RESET_TOKEN_BYTES: usize = 32;
