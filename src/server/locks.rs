use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::protocol::RoomId;

/// Per-room serialization.
///
/// Every engine and membership entrypoint for a room runs under that room's
/// mutex, including timer callbacks. This is the single-owner-per-room
/// guarantee: within one room, events are processed in a total order.
pub struct RoomLocks {
    locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for a room, creating it on first use.
    pub async fn acquire(&self, room_id: RoomId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a deleted room. Outstanding guards stay valid;
    /// the entry is simply recreated if the id is ever reused.
    pub fn forget(&self, room_id: &RoomId) {
        self.locks.remove(room_id);
    }
}

impl Default for RoomLocks {
    fn default() -> Self {
        Self::new()
    }
}
