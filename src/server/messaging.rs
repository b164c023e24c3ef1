use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::{RoomId, ServerEvent, Uid};

/// Room-addressable broadcast plus per-connection send.
///
/// Events are reference-counted so a broadcast serializes once no matter how
/// many members a room has. Delivery is best-effort: a saturated or closed
/// connection channel drops the event for that member only.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Send to one connected user. A miss (user offline) is not an error.
    async fn send_to_user(&self, uid: &str, event: Arc<ServerEvent>) -> Result<()>;

    /// Broadcast to every member of a room.
    async fn broadcast_to_room(&self, room_id: &RoomId, event: Arc<ServerEvent>) -> Result<()>;

    /// Broadcast to every member of a room except one uid.
    async fn broadcast_to_room_except(
        &self,
        room_id: &RoomId,
        except_uid: &str,
        event: Arc<ServerEvent>,
    ) -> Result<()>;

    /// Attach a connection's outbound channel for a uid.
    async fn register_connection(
        &self,
        uid: Uid,
        sender: mpsc::Sender<Arc<ServerEvent>>,
    ) -> Result<()>;

    /// Drop a connection's outbound channel and all room memberships.
    async fn unregister_connection(&self, uid: &str) -> Result<()>;

    /// Subscribe a uid to a room's broadcast channel.
    async fn join_room_channel(&self, uid: &str, room_id: RoomId) -> Result<()>;

    /// Unsubscribe a uid from a room's broadcast channel.
    async fn leave_room_channel(&self, uid: &str, room_id: &RoomId) -> Result<()>;

    /// Drop a room's broadcast channel entirely.
    async fn drop_room_channel(&self, room_id: &RoomId) -> Result<()>;

    /// Rooms a uid is currently subscribed to.
    async fn rooms_of(&self, uid: &str) -> Vec<RoomId>;

    /// Whether the uid currently has a live connection channel.
    async fn is_connected(&self, uid: &str) -> bool;
}

/// In-memory dispatcher over per-connection mpsc senders.
pub struct InMemoryEventDispatcher {
    senders: RwLock<HashMap<Uid, mpsc::Sender<Arc<ServerEvent>>>>,
    room_members: RwLock<HashMap<RoomId, HashSet<Uid>>>,
}

impl InMemoryEventDispatcher {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            room_members: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventDispatcher for InMemoryEventDispatcher {
    async fn send_to_user(&self, uid: &str, event: Arc<ServerEvent>) -> Result<()> {
        let senders = self.senders.read().await;
        if let Some(sender) = senders.get(uid) {
            if sender.try_send(Arc::clone(&event)).is_err() {
                tracing::warn!(%uid, "Failed to deliver event to user; channel full or closed");
            }
        }
        Ok(())
    }

    async fn broadcast_to_room(&self, room_id: &RoomId, event: Arc<ServerEvent>) -> Result<()> {
        let members = self.room_members.read().await;
        let senders = self.senders.read().await;

        if let Some(uids) = members.get(room_id) {
            for uid in uids {
                if let Some(sender) = senders.get(uid) {
                    if sender.try_send(Arc::clone(&event)).is_err() {
                        tracing::warn!(%uid, %room_id, "Failed to deliver broadcast to room member");
                    }
                }
            }
        }
        Ok(())
    }

    async fn broadcast_to_room_except(
        &self,
        room_id: &RoomId,
        except_uid: &str,
        event: Arc<ServerEvent>,
    ) -> Result<()> {
        let members = self.room_members.read().await;
        let senders = self.senders.read().await;

        if let Some(uids) = members.get(room_id) {
            for uid in uids {
                if uid == except_uid {
                    continue;
                }
                if let Some(sender) = senders.get(uid) {
                    if sender.try_send(Arc::clone(&event)).is_err() {
                        tracing::warn!(%uid, %room_id, "Failed to deliver broadcast to room member");
                    }
                }
            }
        }
        Ok(())
    }

    async fn register_connection(
        &self,
        uid: Uid,
        sender: mpsc::Sender<Arc<ServerEvent>>,
    ) -> Result<()> {
        let mut senders = self.senders.write().await;
        senders.insert(uid, sender);
        Ok(())
    }

    async fn unregister_connection(&self, uid: &str) -> Result<()> {
        let mut senders = self.senders.write().await;
        senders.remove(uid);
        drop(senders);

        let mut members = self.room_members.write().await;
        members.retain(|_, uids| {
            uids.remove(uid);
            !uids.is_empty()
        });
        Ok(())
    }

    async fn join_room_channel(&self, uid: &str, room_id: RoomId) -> Result<()> {
        let mut members = self.room_members.write().await;
        members.entry(room_id).or_default().insert(uid.to_string());
        Ok(())
    }

    async fn leave_room_channel(&self, uid: &str, room_id: &RoomId) -> Result<()> {
        let mut members = self.room_members.write().await;
        if let Some(uids) = members.get_mut(room_id) {
            uids.remove(uid);
            if uids.is_empty() {
                members.remove(room_id);
            }
        }
        Ok(())
    }

    async fn drop_room_channel(&self, room_id: &RoomId) -> Result<()> {
        let mut members = self.room_members.write().await;
        members.remove(room_id);
        Ok(())
    }

    async fn rooms_of(&self, uid: &str) -> Vec<RoomId> {
        let members = self.room_members.read().await;
        members
            .iter()
            .filter(|(_, uids)| uids.contains(uid))
            .map(|(room_id, _)| *room_id)
            .collect()
    }

    async fn is_connected(&self, uid: &str) -> bool {
        let senders = self.senders.read().await;
        senders.contains_key(uid)
    }
}
