use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::access::Identity;
use crate::limits::*;
use crate::model::*;

use super::conflict::{
    check_no_conflict, validate_block_range, validate_notes, validate_reason, validate_room, validate_stay,
};
use super::{move_block, Engine, EngineError, WalCommand};

/// Fields an administrator supplies when creating or replacing a room.
#[derive(Debug, Clone)]
pub struct RoomRequest {
    pub name: String,
    pub capacity: u32,
    pub price_per_night: Decimal,
    pub description: Option<String>,
}

/// A blocked range. `room_id: None` closes every room.
#[derive(Debug, Clone)]
pub struct BlockRequest {
    pub room_id: Option<RoomId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub notes: Option<String>,
    /// Administrator only: the customer the stay is booked for. Ignored for
    /// customers, who always book for themselves.
    pub on_behalf_of: Option<UserId>,
}

fn booking_from(rs: &RoomState, id: BookingId) -> Option<Booking> {
    rs.intervals.get(id).and_then(|i| i.to_booking(rs.room.id))
}

impl Engine {
    // ── Rooms ────────────────────────────────────────────

    pub async fn create_room(&self, req: RoomRequest) -> Result<Room, EngineError> {
        let room = Room {
            id: Ulid::new(),
            name: req.name.trim().to_string(),
            capacity: req.capacity,
            price_per_night: req.price_per_night,
            description: req.description,
        };
        validate_room(&room)?;

        let _gate = self.commit_gate.read().await;
        let event = Event::RoomCreated { room: room.clone() };
        self.wal_append(&event).await?;
        self.rooms
            .insert(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        tracing::info!(room_id = %room.id, name = %room.name, "room created");
        Ok(room)
    }

    pub async fn update_room(&self, id: RoomId, req: RoomRequest) -> Result<Room, EngineError> {
        let room = Room {
            id,
            name: req.name.trim().to_string(),
            capacity: req.capacity,
            price_per_night: req.price_per_night,
            description: req.description,
        };
        validate_room(&room)?;

        let _gate = self.commit_gate.read().await;
        let mut guard = self.room_write(id).await?;
        let event = Event::RoomUpdated { room: room.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(room)
    }

    /// Refused while the room still has confirmed bookings. Cancelled
    /// history and room-specific blocks go with the room.
    pub async fn delete_room(&self, id: RoomId) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self.room_write(id).await?;
        if guard.has_confirmed_bookings() {
            return Err(EngineError::InUse("room"));
        }
        let event = Event::RoomDeleted { id };
        self.persist_and_apply(&mut guard, &event).await?;
        self.rooms.remove(&id);
        tracing::info!(room_id = %id, "room deleted");
        Ok(())
    }

    // ── Blocked dates ────────────────────────────────────

    pub async fn add_blocked_date(&self, req: BlockRequest) -> Result<BlockedDate, EngineError> {
        validate_block_range(req.start_date, req.end_date)?;
        validate_reason(&req.reason)?;
        let block = BlockedDate {
            id: Ulid::new(),
            room_id: req.room_id,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason,
        };
        let event = Event::BlockAdded { block: block.clone() };

        let _gate = self.commit_gate.read().await;
        let _blocks = self.block_writes.lock().await;
        match block.room_id {
            Some(room_id) => {
                let mut guard = self.room_write(room_id).await?;
                if guard.intervals.len() >= MAX_INTERVALS_PER_ROOM {
                    return Err(EngineError::LimitExceeded("too many intervals on room"));
                }
                self.persist_and_apply(&mut guard, &event).await?;
            }
            None => {
                let mut house = self.house_blocks.write().await;
                if house.len() >= MAX_INTERVALS_PER_ROOM {
                    return Err(EngineError::LimitExceeded("too many house-wide blocks"));
                }
                self.persist_and_apply_house(&mut house, &event).await?;
            }
        }
        Ok(block)
    }

    /// Replace a blocked range. The block may move to another room, or
    /// between a room and the whole house.
    pub async fn update_blocked_date(&self, id: BlockId, req: BlockRequest) -> Result<BlockedDate, EngineError> {
        validate_block_range(req.start_date, req.end_date)?;
        validate_reason(&req.reason)?;

        let _gate = self.commit_gate.read().await;
        let _blocks = self.block_writes.lock().await;
        let previous_room = self.room_for_entity(&id);
        let block = BlockedDate {
            id,
            room_id: req.room_id,
            start_date: req.start_date,
            end_date: req.end_date,
            reason: req.reason,
        };
        let event = Event::BlockUpdated {
            previous_room,
            block: block.clone(),
        };
        let missing = || EngineError::NotFound("blocked date");

        // Rooms in id order, then the house.
        match (previous_room, block.room_id) {
            (Some(from), Some(to)) if from == to => {
                let mut guard = self.room_write(from).await.map_err(|_| missing())?;
                if guard.intervals.get(id).is_none() {
                    return Err(missing());
                }
                self.wal_append(&event).await?;
                move_block(&mut guard.intervals, None, &block, &self.index);
            }
            (Some(from), Some(to)) => {
                let (mut src, mut dst) = if from < to {
                    let src = self.room_write(from).await.map_err(|_| missing())?;
                    (src, self.room_write(to).await?)
                } else {
                    let dst = self.room_write(to).await?;
                    (self.room_write(from).await.map_err(|_| missing())?, dst)
                };
                if src.intervals.get(id).is_none() {
                    return Err(missing());
                }
                self.wal_append(&event).await?;
                move_block(&mut src.intervals, Some(&mut dst.intervals), &block, &self.index);
            }
            (Some(from), None) => {
                let mut src = self.room_write(from).await.map_err(|_| missing())?;
                let mut house = self.house_blocks.write().await;
                if src.intervals.get(id).is_none() {
                    return Err(missing());
                }
                self.wal_append(&event).await?;
                move_block(&mut src.intervals, Some(&mut *house), &block, &self.index);
            }
            (None, Some(to)) => {
                let mut dst = self.room_write(to).await?;
                let mut house = self.house_blocks.write().await;
                if house.get(id).is_none() {
                    return Err(missing());
                }
                self.wal_append(&event).await?;
                move_block(&mut house, Some(&mut dst.intervals), &block, &self.index);
            }
            (None, None) => {
                let mut house = self.house_blocks.write().await;
                if house.get(id).is_none() {
                    return Err(missing());
                }
                self.wal_append(&event).await?;
                move_block(&mut house, None, &block, &self.index);
            }
        }
        Ok(block)
    }

    pub async fn remove_blocked_date(&self, id: BlockId) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let _blocks = self.block_writes.lock().await;
        match self.room_for_entity(&id) {
            Some(room_id) => {
                let mut guard = self.resolve_entity_write(&id, "blocked date").await?;
                if !matches!(
                    guard.intervals.get(id).map(|i| &i.kind),
                    Some(IntervalKind::Blocked { .. })
                ) {
                    return Err(EngineError::NotFound("blocked date"));
                }
                let event = Event::BlockRemoved {
                    id,
                    room_id: Some(room_id),
                };
                self.persist_and_apply(&mut guard, &event).await
            }
            None => {
                let mut house = self.house_blocks.write().await;
                if house.get(id).is_none() {
                    return Err(EngineError::NotFound("blocked date"));
                }
                let event = Event::BlockRemoved { id, room_id: None };
                self.persist_and_apply_house(&mut house, &event).await
            }
        }
    }

    // ── Bookings ─────────────────────────────────────────

    /// Check-then-insert under the room's write lock: two overlapping
    /// requests for one room can never both succeed.
    pub async fn create_booking(&self, identity: &Identity, req: NewBooking) -> Result<Booking, EngineError> {
        let stay = validate_stay(req.check_in, req.check_out)?;
        validate_notes(&req.notes)?;

        let _gate = self.commit_gate.read().await;
        let accounts = self.accounts.read().await;
        let owner = match identity {
            Identity::Customer(uid) => Some(*uid),
            Identity::Admin => req.on_behalf_of,
        };
        if let Some(uid) = owner
            && accounts.customer(&uid).is_none()
        {
            return Err(EngineError::NotFound("customer"));
        }

        let mut guard = self.room_write(req.room_id).await?;
        if guard.intervals.len() >= MAX_INTERVALS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many intervals on room"));
        }
        let house = self.house_blocks.read().await;
        if let Err(e) = check_no_conflict(&guard, &house, &stay) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            tracing::debug!(room_id = %req.room_id, check_in = %req.check_in, check_out = %req.check_out, "stay unavailable");
            return Err(e);
        }

        let booking = Booking {
            id: Ulid::new(),
            user_id: owner,
            room_id: req.room_id,
            check_in: req.check_in,
            check_out: req.check_out,
            status: BookingStatus::Confirmed,
            notes: req.notes,
            created_at: Utc::now(),
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(house);
        drop(accounts);

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(booking_id = %booking.id, room_id = %booking.room_id, nights = stay.nights(), "booking created");
        Ok(booking)
    }

    /// Cancel a booking inside the caller's scope. Cancelling twice is a
    /// no-op that returns the booking unchanged.
    pub async fn cancel_booking(&self, identity: &Identity, id: BookingId) -> Result<Booking, EngineError> {
        let _gate = self.commit_gate.read().await;
        let room_id = self
            .room_for_booking(identity, &id)
            .ok_or(EngineError::NotFound("booking"))?;
        let mut guard = self
            .room_write(room_id)
            .await
            .map_err(|_| EngineError::NotFound("booking"))?;
        let booking = booking_from(&guard, id)
            .filter(|b| identity.scope().permits(b.user_id))
            .ok_or(EngineError::NotFound("booking"))?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let event = Event::BookingCancelled {
            id,
            room_id: booking.room_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        tracing::info!(booking_id = %id, "booking cancelled");
        Ok(Booking {
            status: BookingStatus::Cancelled,
            ..booking
        })
    }

    /// Administrator edit of status and notes. A cancelled booking cannot
    /// be confirmed again; its notes can still change.
    pub async fn update_booking(
        &self,
        id: BookingId,
        status: BookingStatus,
        notes: Option<String>,
    ) -> Result<Booking, EngineError> {
        validate_notes(&notes)?;
        let _gate = self.commit_gate.read().await;
        let mut guard = self.resolve_entity_write(&id, "booking").await?;
        let booking = booking_from(&guard, id).ok_or(EngineError::NotFound("booking"))?;
        if booking.status.is_terminal() && status != booking.status {
            return Err(EngineError::Terminal);
        }

        let event = Event::BookingUpdated {
            id,
            room_id: booking.room_id,
            status,
            notes: notes.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        if status == BookingStatus::Cancelled && booking.status != BookingStatus::Cancelled {
            metrics::counter!(crate::observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        }
        Ok(Booking {
            status,
            notes,
            ..booking
        })
    }

    // ── Compaction ───────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let mut events = Vec::new();

        {
            let accounts = self.accounts.read().await;
            events.extend(
                accounts
                    .users()
                    .map(|user| Event::UserRegistered { user: user.clone() }),
            );
        }

        let rooms: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs in rooms {
            let guard = rs.read().await;
            if guard.deleted {
                continue;
            }
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            for booking in guard.bookings() {
                events.push(Event::BookingCreated { booking });
            }
            for block in guard.blocks() {
                events.push(Event::BlockAdded { block });
            }
        }

        {
            let house = self.house_blocks.read().await;
            events.extend(
                house
                    .intervals
                    .iter()
                    .filter_map(|i| i.to_block(None))
                    .map(|block| Event::BlockAdded { block }),
            );
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
