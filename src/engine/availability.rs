use chrono::Days;

use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// Every blocking interval that conflicts with `stay`, looking at the room's
/// own list (bookings that are not cancelled, room-specific blocks) and at the
/// house-wide blocks.
pub fn find_conflicts(room: &IntervalSet, house: &IntervalSet, stay: &DateRange) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for interval in room.overlapping(stay) {
        if interval.is_blocking() && stay.conflicts(&interval.range) {
            conflicts.push(match interval.kind {
                IntervalKind::Booking { .. } => Conflict::Booking(interval.id),
                IntervalKind::Blocked { .. } => Conflict::Blocked(interval.id),
            });
        }
    }
    for interval in house.overlapping(stay) {
        if stay.conflicts(&interval.range) {
            conflicts.push(Conflict::Blocked(interval.id));
        }
    }
    conflicts
}

/// Occupied days of a room inside `window`, merged into disjoint ranges.
pub fn busy_ranges(room: &IntervalSet, house: &IntervalSet, window: &DateRange) -> Vec<DateRange> {
    let mut busy: Vec<DateRange> = room
        .overlapping(window)
        .filter(|i| i.is_blocking())
        .chain(house.overlapping(window))
        .filter_map(|i| i.range.clamp_to(window))
        .collect();
    busy.sort_by_key(|r| r.start);
    merge_ranges(&busy)
}

/// Merge sorted overlapping or day-adjacent ranges into disjoint ranges.
pub fn merge_ranges(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && last.end.checked_add_days(Days::new(1)).is_none_or(|next| range.start <= next) {
                last.end = last.end.max(range.end);
                continue;
            }
        merged.push(range);
    }
    merged
}

/// Days of `window` not covered by `busy` (sorted, disjoint).
pub fn free_ranges(window: &DateRange, busy: &[DateRange]) -> Vec<DateRange> {
    let mut result = Vec::new();
    let mut cursor = Some(window.start);

    for b in busy {
        let Some(start) = cursor else { break };
        if b.end < start {
            continue;
        }
        if b.start > start
            && let Some(before) = b.start.pred_opt() {
                result.push(DateRange::new(start, before.min(window.end)));
            }
        cursor = b.end.succ_opt();
    }

    if let Some(start) = cursor
        && start <= window.end {
            result.push(DateRange::new(start, window.end));
        }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(d(a), d(b))
    }

    fn booking(a: &str, b: &str, status: BookingStatus) -> Interval {
        Interval {
            id: Ulid::new(),
            range: range(a, b),
            kind: IntervalKind::Booking {
                user_id: None,
                status,
                notes: None,
                created_at: Utc::now(),
            },
        }
    }

    fn block(a: &str, b: &str) -> Interval {
        Interval {
            id: Ulid::new(),
            range: range(a, b),
            kind: IntervalKind::Blocked { reason: None },
        }
    }

    fn set(intervals: Vec<Interval>) -> IntervalSet {
        let mut s = IntervalSet::new();
        for i in intervals {
            s.insert(i);
        }
        s
    }

    #[test]
    fn empty_room_has_no_conflicts() {
        let stay = range("2025-01-01", "2025-01-05");
        assert!(find_conflicts(&IntervalSet::new(), &IntervalSet::new(), &stay).is_empty());
    }

    #[test]
    fn back_to_back_is_a_conflict() {
        let existing = booking("2025-01-01", "2025-01-05", BookingStatus::Confirmed);
        let id = existing.id;
        let room = set(vec![existing]);
        let conflicts = find_conflicts(&room, &IntervalSet::new(), &range("2025-01-05", "2025-01-10"));
        assert_eq!(conflicts, vec![Conflict::Booking(id)]);
    }

    #[test]
    fn cancelled_bookings_are_ignored() {
        let room = set(vec![booking("2025-01-01", "2025-01-05", BookingStatus::Cancelled)]);
        let conflicts = find_conflicts(&room, &IntervalSet::new(), &range("2025-01-02", "2025-01-03"));
        assert!(conflicts.is_empty());
    }

    #[test]
    fn room_and_house_blocks_both_count() {
        let room_block = block("2025-02-01", "2025-02-02");
        let house_block = block("2025-02-02", "2025-02-03");
        let (rb, hb) = (room_block.id, house_block.id);
        let conflicts = find_conflicts(
            &set(vec![room_block]),
            &set(vec![house_block]),
            &range("2025-01-30", "2025-02-05"),
        );
        assert_eq!(conflicts, vec![Conflict::Blocked(rb), Conflict::Blocked(hb)]);
    }

    #[test]
    fn busy_ranges_merge_adjacent_days() {
        let room = set(vec![
            booking("2025-01-01", "2025-01-03", BookingStatus::Confirmed),
            booking("2025-01-04", "2025-01-06", BookingStatus::Confirmed),
            booking("2025-01-10", "2025-01-12", BookingStatus::Cancelled),
        ]);
        let house = set(vec![block("2025-01-20", "2025-02-10")]);
        let busy = busy_ranges(&room, &house, &range("2025-01-01", "2025-01-31"));
        assert_eq!(
            busy,
            vec![range("2025-01-01", "2025-01-06"), range("2025-01-20", "2025-01-31")]
        );
    }

    #[test]
    fn free_ranges_complement_busy() {
        let window = range("2025-01-01", "2025-01-31");
        let busy = vec![range("2025-01-05", "2025-01-07"), range("2025-01-20", "2025-01-31")];
        assert_eq!(
            free_ranges(&window, &busy),
            vec![range("2025-01-01", "2025-01-04"), range("2025-01-08", "2025-01-19")]
        );
    }

    #[test]
    fn free_ranges_fully_free_and_fully_busy() {
        let window = range("2025-01-01", "2025-01-10");
        assert_eq!(free_ranges(&window, &[]), vec![window]);
        assert!(free_ranges(&window, &[window]).is_empty());
    }

    #[test]
    fn merge_overlapping_ranges() {
        let merged = merge_ranges(&[
            range("2025-01-01", "2025-01-10"),
            range("2025-01-05", "2025-01-07"),
            range("2025-01-12", "2025-01-13"),
        ]);
        assert_eq!(merged, vec![range("2025-01-01", "2025-01-10"), range("2025-01-12", "2025-01-13")]);
    }
}
