use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type RoomId = Ulid;
pub type BookingId = Ulid;
pub type BlockId = Ulid;
pub type UserId = Ulid;

/// Closed date interval `[start, end]`. Both ends are occupied days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// A requested stay conflicts with an existing range when its check-in or
    /// check-out falls inside the existing range, or the existing range starts
    /// inside the stay. Boundaries are inclusive, so a check-out on day N
    /// collides with a check-in on day N.
    pub fn conflicts(&self, existing: &DateRange) -> bool {
        existing.contains(self.start)
            || existing.contains(self.end)
            || self.contains(existing.start)
    }

    /// Intersection with `window`, if any.
    pub fn clamp_to(&self, window: &DateRange) -> Option<DateRange> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start <= end).then(|| DateRange::new(start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    /// Number of dogs the room takes.
    pub capacity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_night: Decimal,
    pub description: Option<String>,
}

/// A persisted account. The administrator is never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// SHA-256 (hex) of the outstanding reset token.
    pub reset_token_hash: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// `None` for stays booked by the administrator for the house itself.
    pub user_id: Option<UserId>,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDate {
    pub id: BlockId,
    /// `None` blocks every room.
    pub room_id: Option<RoomId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl BlockedDate {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// What an interval on a room represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalKind {
    Booking {
        user_id: Option<UserId>,
        status: BookingStatus,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    },
    Blocked {
        reason: Option<String>,
    },
}

/// Bookings and blocked ranges are both just intervals on a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: Ulid,
    pub range: DateRange,
    pub kind: IntervalKind,
}

impl Interval {
    pub fn from_booking(b: &Booking) -> Self {
        Self {
            id: b.id,
            range: b.range(),
            kind: IntervalKind::Booking {
                user_id: b.user_id,
                status: b.status,
                notes: b.notes.clone(),
                created_at: b.created_at,
            },
        }
    }

    pub fn from_block(b: &BlockedDate) -> Self {
        Self {
            id: b.id,
            range: b.range(),
            kind: IntervalKind::Blocked {
                reason: b.reason.clone(),
            },
        }
    }

    /// Whether this interval takes part in conflict checks.
    pub fn is_blocking(&self) -> bool {
        match &self.kind {
            IntervalKind::Booking { status, .. } => *status != BookingStatus::Cancelled,
            IntervalKind::Blocked { .. } => true,
        }
    }

    pub fn to_booking(&self, room_id: RoomId) -> Option<Booking> {
        match &self.kind {
            IntervalKind::Booking {
                user_id,
                status,
                notes,
                created_at,
            } => Some(Booking {
                id: self.id,
                user_id: *user_id,
                room_id,
                check_in: self.range.start,
                check_out: self.range.end,
                status: *status,
                notes: notes.clone(),
                created_at: *created_at,
            }),
            IntervalKind::Blocked { .. } => None,
        }
    }

    pub fn to_block(&self, room_id: Option<RoomId>) -> Option<BlockedDate> {
        match &self.kind {
            IntervalKind::Blocked { reason } => Some(BlockedDate {
                id: self.id,
                room_id,
                start_date: self.range.start,
                end_date: self.range.end,
                reason: reason.clone(),
            }),
            IntervalKind::Booking { .. } => None,
        }
    }
}

/// Intervals kept sorted by `range.start`.
#[derive(Debug, Clone, Default)]
pub struct IntervalSet {
    pub intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Insert interval maintaining sort order by range.start.
    pub fn insert(&mut self, interval: Interval) {
        let pos = self
            .intervals
            .partition_point(|i| i.range.start <= interval.range.start);
        self.intervals.insert(pos, interval);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        Some(self.intervals.remove(pos))
    }

    pub fn get(&self, id: Ulid) -> Option<&Interval> {
        self.intervals.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut Interval> {
        self.intervals.iter_mut().find(|i| i.id == id)
    }

    /// Intervals sharing at least one day with `query`.
    /// Binary search skips everything starting after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Interval> {
        let right_bound = self
            .intervals
            .partition_point(|i| i.range.start <= query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.range.end >= query.start)
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Set once the room is deleted; writers that raced the delete see it
    /// after acquiring the lock.
    pub deleted: bool,
    /// Bookings of every status plus room-specific blocked ranges.
    pub intervals: IntervalSet,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            deleted: false,
            intervals: IntervalSet::new(),
        }
    }

    pub fn bookings(&self) -> impl Iterator<Item = Booking> + '_ {
        let room_id = self.room.id;
        self.intervals
            .intervals
            .iter()
            .filter_map(move |i| i.to_booking(room_id))
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockedDate> + '_ {
        let room_id = self.room.id;
        self.intervals
            .intervals
            .iter()
            .filter_map(move |i| i.to_block(Some(room_id)))
    }

    pub fn has_confirmed_bookings(&self) -> bool {
        self.intervals.intervals.iter().any(|i| {
            matches!(
                i.kind,
                IntervalKind::Booking {
                    status: BookingStatus::Confirmed,
                    ..
                }
            )
        })
    }
}

/// The event types: flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        id: RoomId,
    },
    BlockAdded {
        block: BlockedDate,
    },
    BlockUpdated {
        previous_room: Option<RoomId>,
        block: BlockedDate,
    },
    BlockRemoved {
        id: BlockId,
        room_id: Option<RoomId>,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingCancelled {
        id: BookingId,
        room_id: RoomId,
    },
    BookingUpdated {
        id: BookingId,
        room_id: RoomId,
        status: BookingStatus,
        notes: Option<String>,
    },
    UserRegistered {
        user: User,
    },
    UserUpdated {
        id: UserId,
        email: String,
        first_name: String,
        last_name: String,
    },
    UserDeleted {
        id: UserId,
    },
    /// Also consumes any outstanding reset token.
    PasswordChanged {
        id: UserId,
        password_hash: String,
    },
    ResetTokenIssued {
        id: UserId,
        token_hash: String,
        expires_at: DateTime<Utc>,
    },
}

// ── Query result types ───────────────────────────────────────────

/// A booking joined with the customer and room display fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingView {
    pub booking: Booking,
    pub customer_email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub room_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedDateView {
    pub block: BlockedDate,
    pub room_name: Option<String>,
}

/// Why a requested stay is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Booking(BookingId),
    Blocked(BlockId),
}
