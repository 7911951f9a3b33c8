mod accounts;
mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use accounts::{AccountBook, CustomerUpdate, NewAccount};
pub use availability::{busy_ranges, find_conflicts, free_ranges, merge_ranges};
pub use error::EngineError;
pub use mutations::{BlockRequest, NewBooking, RoomRequest};
pub use queries::RoomCalendar;

pub(crate) use conflict::normalize_email;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::access::{Identity, Scope};
use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut pending = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Commands after the batch must observe it on disk.
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(cmd) = pending {
                    handle_non_append(&mut wal, cmd);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(ref e) = result {
        tracing::error!(error = %e, batch = batch.len(), "WAL flush failed");
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after a failed append so buffered bytes never leak into the
    // next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Reverse lookups kept alongside the room states.
#[derive(Debug, Default)]
pub(super) struct Indexes {
    /// Booking or room-specific block id → room id. House-wide blocks are
    /// not listed here.
    pub(super) entity_to_room: DashMap<Ulid, RoomId>,
    /// Customer → booking ids, every status. Survives customer deletion so
    /// cancelled history stays reachable.
    pub(super) user_bookings: DashMap<UserId, Vec<BookingId>>,
}

pub struct Engine {
    pub(super) rooms: DashMap<RoomId, SharedRoomState>,
    /// Blocked ranges with no room: they close every room.
    pub(super) house_blocks: RwLock<IntervalSet>,
    pub(super) accounts: RwLock<AccountBook>,
    pub(super) index: Indexes,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Every mutation holds this for reading from its first lock until its
    /// event is applied; compaction takes it for writing so the snapshot and
    /// the log can never disagree.
    pub(super) commit_gate: RwLock<()>,
    /// Serializes blocked-date writes, which may move a block between rooms.
    pub(super) block_writes: tokio::sync::Mutex<()>,
}

/// Apply an event to a room's state (caller holds the room's write lock).
fn apply_to_room(rs: &mut RoomState, event: &Event, index: &Indexes) {
    let room_id = rs.room.id;
    match event {
        Event::RoomUpdated { room } => {
            rs.room = room.clone();
        }
        Event::BlockAdded { block } => {
            rs.intervals.insert(Interval::from_block(block));
            index.entity_to_room.insert(block.id, room_id);
        }
        Event::BlockRemoved { id, .. } => {
            rs.intervals.remove(*id);
            index.entity_to_room.remove(id);
        }
        Event::BookingCreated { booking } => {
            rs.intervals.insert(Interval::from_booking(booking));
            index.entity_to_room.insert(booking.id, room_id);
            if let Some(uid) = booking.user_id {
                index.user_bookings.entry(uid).or_default().push(booking.id);
            }
        }
        Event::BookingCancelled { id, .. } => {
            if let Some(interval) = rs.intervals.get_mut(*id)
                && let IntervalKind::Booking { status, .. } = &mut interval.kind
            {
                *status = BookingStatus::Cancelled;
            }
        }
        Event::BookingUpdated {
            id,
            status: new_status,
            notes: new_notes,
            ..
        } => {
            if let Some(interval) = rs.intervals.get_mut(*id)
                && let IntervalKind::Booking { status, notes, .. } = &mut interval.kind
            {
                *status = *new_status;
                *notes = new_notes.clone();
            }
        }
        Event::RoomDeleted { .. } => {
            rs.deleted = true;
            for interval in &rs.intervals.intervals {
                index.entity_to_room.remove(&interval.id);
                if let IntervalKind::Booking {
                    user_id: Some(uid), ..
                } = interval.kind
                    && let Some(mut ids) = index.user_bookings.get_mut(&uid)
                {
                    ids.retain(|b| *b != interval.id);
                }
            }
        }
        // Created at the map level; block moves and account events go elsewhere.
        Event::RoomCreated { .. }
        | Event::BlockUpdated { .. }
        | Event::UserRegistered { .. }
        | Event::UserUpdated { .. }
        | Event::UserDeleted { .. }
        | Event::PasswordChanged { .. }
        | Event::ResetTokenIssued { .. } => {}
    }
}

/// Apply a house-wide block event.
fn apply_to_house(house: &mut IntervalSet, event: &Event) {
    match event {
        Event::BlockAdded { block } => house.insert(Interval::from_block(block)),
        Event::BlockRemoved { id, .. } => {
            house.remove(*id);
        }
        _ => {}
    }
}

/// Move a block out of `from` and into `to` (or back into `from` when the
/// block stays in the same place), keeping the entity index in step.
fn move_block(from: &mut IntervalSet, to: Option<&mut IntervalSet>, block: &BlockedDate, index: &Indexes) {
    from.remove(block.id);
    let interval = Interval::from_block(block);
    match to {
        Some(target) => target.insert(interval),
        None => from.insert(interval),
    }
    match block.room_id {
        Some(room_id) => {
            index.entity_to_room.insert(block.id, room_id);
        }
        None => {
            index.entity_to_room.remove(&block.id);
        }
    }
}

/// Rebuild state from the log before any lock exists.
fn replay(
    events: &[Event],
    rooms: &mut HashMap<RoomId, RoomState>,
    house: &mut IntervalSet,
    accounts: &mut AccountBook,
    index: &Indexes,
) {
    for event in events {
        match event {
            Event::RoomCreated { room } => {
                rooms.insert(room.id, RoomState::new(room.clone()));
            }
            Event::RoomDeleted { id } => {
                if let Some(mut rs) = rooms.remove(id) {
                    apply_to_room(&mut rs, event, index);
                }
            }
            Event::BlockAdded { .. } | Event::BlockRemoved { .. } if event_room_id(event).is_none() => {
                apply_to_house(house, event);
            }
            Event::BlockUpdated { previous_room, block } => {
                let taken = match previous_room {
                    Some(rid) => rooms.get_mut(rid).and_then(|rs| rs.intervals.remove(block.id)),
                    None => house.remove(block.id),
                };
                if taken.is_none() {
                    continue;
                }
                let interval = Interval::from_block(block);
                match block.room_id {
                    Some(rid) => {
                        if let Some(rs) = rooms.get_mut(&rid) {
                            rs.intervals.insert(interval);
                            index.entity_to_room.insert(block.id, rid);
                        }
                    }
                    None => {
                        house.insert(interval);
                        index.entity_to_room.remove(&block.id);
                    }
                }
            }
            Event::UserRegistered { .. }
            | Event::UserUpdated { .. }
            | Event::UserDeleted { .. }
            | Event::PasswordChanged { .. }
            | Event::ResetTokenIssued { .. } => accounts.apply(event),
            other => {
                if let Some(rid) = event_room_id(other)
                    && let Some(rs) = rooms.get_mut(&rid)
                {
                    apply_to_room(rs, other, index);
                }
            }
        }
    }
}

/// The room an event is scoped to, if any.
fn event_room_id(event: &Event) -> Option<RoomId> {
    match event {
        Event::RoomCreated { room } | Event::RoomUpdated { room } => Some(room.id),
        Event::RoomDeleted { id } => Some(*id),
        Event::BlockAdded { block } | Event::BlockUpdated { block, .. } => block.room_id,
        Event::BlockRemoved { room_id, .. } => *room_id,
        Event::BookingCreated { booking } => Some(booking.room_id),
        Event::BookingCancelled { room_id, .. } | Event::BookingUpdated { room_id, .. } => Some(*room_id),
        Event::UserRegistered { .. }
        | Event::UserUpdated { .. }
        | Event::UserDeleted { .. }
        | Event::PasswordChanged { .. }
        | Event::ResetTokenIssued { .. } => None,
    }
}

impl Engine {
    /// Replay the log at `wal_path` and start the group-commit writer.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let index = Indexes::default();
        let mut rooms = HashMap::new();
        let mut house = IntervalSet::new();
        let mut accounts = AccountBook::default();
        replay(&events, &mut rooms, &mut house, &mut accounts, &index);

        tracing::info!(
            events = events.len(),
            rooms = rooms.len(),
            users = accounts.len(),
            path = %wal_path.display(),
            "state replayed"
        );

        Ok(Self {
            rooms: rooms
                .into_iter()
                .map(|(id, rs)| (id, Arc::new(RwLock::new(rs))))
                .collect(),
            house_blocks: RwLock::new(house),
            accounts: RwLock::new(accounts),
            index,
            wal_tx,
            commit_gate: RwLock::new(()),
            block_writes: tokio::sync::Mutex::new(()),
        })
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) fn get_room_state(&self, id: &RoomId) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub(super) fn room_for_entity(&self, entity_id: &Ulid) -> Option<RoomId> {
        self.index.entity_to_room.get(entity_id).map(|e| *e.value())
    }

    /// Booking → room lookup restricted to the caller's scope. A customer
    /// resolves only ids in their own booking index, so a foreign id never
    /// reaches a room lock.
    pub(super) fn room_for_booking(&self, identity: &Identity, id: &BookingId) -> Option<RoomId> {
        if let Scope::Owner(uid) = identity.scope() {
            let owned = self
                .index
                .user_bookings
                .get(&uid)
                .is_some_and(|ids| ids.contains(id));
            if !owned {
                return None;
            }
        }
        self.room_for_entity(id)
    }

    /// Acquire a live room's write lock. A room deleted while we waited is
    /// reported as missing.
    pub(super) async fn room_write(&self, id: RoomId) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self.get_room_state(&id).ok_or(EngineError::NotFound("room"))?;
        let guard = rs.write_owned().await;
        if guard.deleted {
            return Err(EngineError::NotFound("room"));
        }
        Ok(guard)
    }

    /// WAL-append, then apply to the locked room.
    pub(super) async fn persist_and_apply(&self, rs: &mut RoomState, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.index);
        Ok(())
    }

    pub(super) async fn persist_and_apply_house(&self, house: &mut IntervalSet, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_house(house, event);
        Ok(())
    }

    pub(super) async fn persist_and_apply_account(&self, book: &mut AccountBook, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        book.apply(event);
        Ok(())
    }

    /// Entity → room lookup followed by the room's write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
        what: &'static str,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self.room_for_entity(entity_id).ok_or(EngineError::NotFound(what))?;
        self.room_write(room_id).await.map_err(|_| EngineError::NotFound(what))
    }
}
