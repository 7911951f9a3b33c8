use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::limits::*;
use crate::model::*;

use super::availability::find_conflicts;
use super::EngineError;

/// Guard run under the room's write lock right before a booking is committed.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    house: &IntervalSet,
    stay: &DateRange,
) -> Result<(), EngineError> {
    let conflicts = find_conflicts(&rs.intervals, house, stay);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Conflict(conflicts))
    }
}

/// A stay must leave on a later day than it arrives.
pub(crate) fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<DateRange, EngineError> {
    if check_in >= check_out {
        return Err(EngineError::Invalid("check-out must be after check-in"));
    }
    let stay = DateRange::new(check_in, check_out);
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(stay)
}

/// Blocked ranges may cover a single day.
pub(crate) fn validate_block_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
    if start > end {
        return Err(EngineError::Invalid("end date must not be before start date"));
    }
    Ok(DateRange::new(start, end))
}

pub(crate) fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
    let window = validate_block_range(start, end)?;
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(window)
}

pub(crate) fn validate_room(room: &Room) -> Result<(), EngineError> {
    if room.name.trim().is_empty() {
        return Err(EngineError::Invalid("room name is required"));
    }
    if room.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    if room.capacity == 0 {
        return Err(EngineError::Invalid("capacity must be at least 1"));
    }
    if room.capacity > MAX_ROOM_CAPACITY {
        return Err(EngineError::LimitExceeded("capacity too large"));
    }
    if room.price_per_night < Decimal::ZERO {
        return Err(EngineError::Invalid("price must not be negative"));
    }
    if let Some(ref d) = room.description
        && d.len() > MAX_DESCRIPTION_LEN {
            return Err(EngineError::LimitExceeded("description too long"));
        }
    Ok(())
}

pub(crate) fn validate_notes(notes: &Option<String>) -> Result<(), EngineError> {
    if let Some(n) = notes
        && n.len() > MAX_NOTES_LEN {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
    Ok(())
}

pub(crate) fn validate_reason(reason: &Option<String>) -> Result<(), EngineError> {
    if let Some(r) = reason
        && r.len() > MAX_REASON_LEN {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
    Ok(())
}

/// Trimmed, lower-cased form used for storage and lookup.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
