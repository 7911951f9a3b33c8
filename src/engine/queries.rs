use std::collections::HashMap;

use chrono::NaiveDate;

use crate::access::{Identity, Scope};
use crate::model::*;

use super::accounts::AccountBook;
use super::availability::{busy_ranges, find_conflicts, free_ranges};
use super::conflict::{validate_stay, validate_window};
use super::{Engine, EngineError};

/// Occupied and open days of one room inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCalendar {
    pub room_id: RoomId,
    pub window: DateRange,
    pub busy: Vec<DateRange>,
    pub free: Vec<DateRange>,
}

fn booking_view(booking: Booking, room_name: &str, accounts: &AccountBook) -> BookingView {
    let customer = booking.user_id.and_then(|id| accounts.get(&id));
    BookingView {
        customer_email: customer.map(|u| u.email.clone()),
        first_name: customer.map(|u| u.first_name.clone()),
        last_name: customer.map(|u| u.last_name.clone()),
        room_name: room_name.to_string(),
        booking,
    }
}

fn newest_stay_first(views: &mut [BookingView]) {
    views.sort_by(|a, b| {
        b.booking
            .check_in
            .cmp(&a.booking.check_in)
            .then(b.booking.id.cmp(&a.booking.id))
    });
}

impl Engine {
    // ── Rooms ────────────────────────────────────────────

    /// Rooms ordered by name.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut rooms = Vec::with_capacity(states.len());
        for rs in states {
            let guard = rs.read().await;
            if !guard.deleted {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rooms
    }

    pub async fn get_room(&self, id: &RoomId) -> Result<Room, EngineError> {
        let rs = self.get_room_state(id).ok_or(EngineError::NotFound("room"))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound("room"));
        }
        Ok(guard.room.clone())
    }

    // ── Availability ─────────────────────────────────────

    /// Everything blocking `stay` in the room: confirmed bookings, the
    /// room's blocks and house-wide blocks.
    pub async fn conflicts(&self, room_id: &RoomId, stay: &DateRange) -> Result<Vec<Conflict>, EngineError> {
        let rs = self.get_room_state(room_id).ok_or(EngineError::NotFound("room"))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound("room"));
        }
        let house = self.house_blocks.read().await;
        Ok(find_conflicts(&guard.intervals, &house, stay))
    }

    /// Whether `stay` is free. Advisory: the answer can change before a
    /// booking is attempted.
    pub async fn is_available(&self, room_id: &RoomId, stay: &DateRange) -> Result<bool, EngineError> {
        Ok(self.conflicts(room_id, stay).await?.is_empty())
    }

    /// Validates the stay, then answers [`Engine::is_available`].
    pub async fn check_availability(
        &self,
        room_id: &RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<bool, EngineError> {
        let stay = validate_stay(check_in, check_out)?;
        self.is_available(room_id, &stay).await
    }

    pub async fn room_calendar(
        &self,
        room_id: &RoomId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RoomCalendar, EngineError> {
        let window = validate_window(from, to)?;
        let rs = self.get_room_state(room_id).ok_or(EngineError::NotFound("room"))?;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(EngineError::NotFound("room"));
        }
        let house = self.house_blocks.read().await;
        let busy = busy_ranges(&guard.intervals, &house, &window);
        let free = free_ranges(&window, &busy);
        Ok(RoomCalendar {
            room_id: *room_id,
            window,
            busy,
            free,
        })
    }

    // ── Bookings ─────────────────────────────────────────

    /// Bookings visible to the caller, latest check-in first. Customers
    /// only ever read their own rows.
    pub async fn list_bookings(&self, identity: &Identity) -> Vec<BookingView> {
        match identity.scope() {
            Scope::All => self.all_bookings().await,
            Scope::Owner(uid) => self.bookings_owned_by(&uid).await,
        }
    }

    async fn all_bookings(&self) -> Vec<BookingView> {
        let accounts = self.accounts.read().await;
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut views = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            views.extend(
                guard
                    .bookings()
                    .map(|b| booking_view(b, &guard.room.name, &accounts)),
            );
        }
        newest_stay_first(&mut views);
        views
    }

    async fn bookings_owned_by(&self, uid: &UserId) -> Vec<BookingView> {
        let accounts = self.accounts.read().await;
        let ids = self
            .index
            .user_bookings
            .get(uid)
            .map(|v| v.clone())
            .unwrap_or_default();

        let mut by_room: HashMap<RoomId, Vec<BookingId>> = HashMap::new();
        for id in ids {
            if let Some(room_id) = self.room_for_entity(&id) {
                by_room.entry(room_id).or_default().push(id);
            }
        }

        let mut views = Vec::new();
        for (room_id, ids) in by_room {
            let Some(rs) = self.get_room_state(&room_id) else { continue };
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            for id in ids {
                if let Some(b) = guard.intervals.get(id).and_then(|i| i.to_booking(room_id))
                    && b.user_id == Some(*uid)
                {
                    views.push(booking_view(b, &guard.room.name, &accounts));
                }
            }
        }
        newest_stay_first(&mut views);
        views
    }

    /// One booking, if it exists and is inside the caller's scope.
    pub async fn get_booking(&self, identity: &Identity, id: &BookingId) -> Result<BookingView, EngineError> {
        let not_found = || EngineError::NotFound("booking");
        let room_id = self.room_for_booking(identity, id).ok_or_else(not_found)?;
        let rs = self.get_room_state(&room_id).ok_or_else(not_found)?;
        let accounts = self.accounts.read().await;
        let guard = rs.read().await;
        if guard.deleted {
            return Err(not_found());
        }
        let booking = guard
            .intervals
            .get(*id)
            .and_then(|i| i.to_booking(room_id))
            .filter(|b| identity.scope().permits(b.user_id))
            .ok_or_else(not_found)?;
        Ok(booking_view(booking, &guard.room.name, &accounts))
    }

    /// Administrator view of one customer's bookings.
    pub async fn bookings_for_customer(&self, customer_id: &UserId) -> Vec<BookingView> {
        self.bookings_owned_by(customer_id).await
    }

    // ── Blocked dates ────────────────────────────────────

    /// Every blocked range, earliest first, with the room name when the
    /// block belongs to one room.
    pub async fn list_blocked_dates(&self) -> Vec<BlockedDateView> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut views = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            views.extend(guard.blocks().map(|block| BlockedDateView {
                block,
                room_name: Some(guard.room.name.clone()),
            }));
        }
        let house = self.house_blocks.read().await;
        views.extend(
            house
                .intervals
                .iter()
                .filter_map(|i| i.to_block(None))
                .map(|block| BlockedDateView {
                    block,
                    room_name: None,
                }),
        );
        views.sort_by(|a, b| {
            a.block
                .start_date
                .cmp(&b.block.start_date)
                .then(a.block.id.cmp(&b.block.id))
        });
        views
    }

    /// Blocks attached to one room. House-wide blocks are not included.
    pub async fn blocked_dates_for_room(&self, room_id: &RoomId) -> Vec<BlockedDate> {
        let Some(rs) = self.get_room_state(room_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        if guard.deleted {
            return Vec::new();
        }
        guard.blocks().collect()
    }
}
