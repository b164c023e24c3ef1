use std::sync::Arc;

use super::TriviaServer;
use crate::protocol::{
    validation, ErrorCode, Player, Role, Room, RoomId, RoomState, ServerEvent, SettingsPatch, Uid,
    MAX_PLAYERS_PER_ROOM, MAX_SPECTATORS_PER_ROOM,
};

/// Outcome of a leave, mirrored into the `RoomLeft` ack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LeaveOutcome {
    pub host_changed: bool,
    pub new_host_uid: Option<Uid>,
    pub room_deleted: bool,
}

impl TriviaServer {
    /// Join a room by code. Capacity and role rules run under the room lock
    /// so concurrent joins cannot overshoot the limits.
    pub async fn handle_join_room(&self, uid: &str, room_code: &str, player_name: Option<&str>) {
        let room_id = match self.lookup_by_code(room_code).await {
            Ok(Some(room_id)) => room_id,
            Ok(None) => {
                self.reply_error(uid, "No room with that code", ErrorCode::RoomNotFound)
                    .await;
                return;
            }
            Err(err) => {
                tracing::error!(%uid, error = %err, "Room lookup failed");
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };

        let _guard = self.lock_room(room_id).await;

        let room = match self.store().get_room(&room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.reply_error(uid, "No room with that code", ErrorCode::RoomNotFound)
                    .await;
                return;
            }
            Err(err) => {
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };

        if room.state == RoomState::Ended {
            self.reply_error(
                uid,
                "The game in this room has ended",
                ErrorCode::RoomEnded,
            )
            .await;
            return;
        }

        let display_name =
            validation::sanitize_player_name(player_name, &self.display_name_of(uid));

        let joined = match self.join_room_locked(&room, uid, &display_name).await {
            Ok(player) => player,
            Err((message, code)) => {
                self.reply_error(uid, message, code).await;
                return;
            }
        };

        if let Err(err) = self.dispatcher().join_room_channel(uid, room.id).await {
            tracing::warn!(%uid, room_id = %room.id, error = %err, "Failed to subscribe to room channel");
        }

        tracing::info!(
            %uid,
            room_id = %room.id,
            room_code = %room.code,
            role = ?joined.role,
            "Player joined room"
        );

        self.reply(
            uid,
            ServerEvent::RoomJoined {
                room_id: room.id,
                room_code: room.code.clone(),
                role: joined.role,
                room_state: room.state,
            },
        )
        .await;

        if room.state == RoomState::Active && joined.role == Role::Spectator {
            self.reply(uid, ServerEvent::SpectatingActiveGame { room_id: room.id })
                .await;
        }

        if let Err(err) = self
            .dispatcher()
            .broadcast_to_room_except(
                &room.id,
                uid,
                Arc::new(ServerEvent::PlayerJoined {
                    player: joined.clone(),
                }),
            )
            .await
        {
            tracing::warn!(room_id = %room.id, error = %err, "Failed to announce join");
        }

        if let Err(err) = self.push_player_list(&room).await {
            tracing::warn!(room_id = %room.id, error = %err, "Failed to push player list");
        }
    }

    /// Membership mutation for a join. Caller holds the room lock.
    async fn join_room_locked(
        &self,
        room: &Room,
        uid: &str,
        display_name: &str,
    ) -> Result<Player, (String, ErrorCode)> {
        let store_failure = |err: anyhow::Error| {
            tracing::error!(room_id = %room.id, error = %err, "Store failure during join");
            (self.internal_error_message(&err), ErrorCode::StorageError)
        };

        // Returning member: flip online, keep role where possible.
        if let Some(mut existing) = self
            .store()
            .get_player(&room.id, uid)
            .await
            .map_err(store_failure)?
        {
            existing.online = true;
            existing.name = display_name.to_string();
            if room.state == RoomState::Active && existing.role != Role::Player {
                existing.role = Role::Spectator;
            }
            self.store()
                .upsert_player(&room.id, &existing)
                .await
                .map_err(store_failure)?;
            return Ok(existing);
        }

        let players = self
            .store()
            .list_players(&room.id)
            .await
            .map_err(store_failure)?;
        let player_count = players.iter().filter(|p| p.role == Role::Player).count();
        let spectator_count = players
            .iter()
            .filter(|p| p.role == Role::Spectator)
            .count();

        // New joiners play while the room is waiting, watch once it is live.
        let mut role = if room.state == RoomState::Waiting {
            Role::Player
        } else {
            Role::Spectator
        };

        if role == Role::Player && player_count >= MAX_PLAYERS_PER_ROOM {
            if room.state == RoomState::Waiting && spectator_count < MAX_SPECTATORS_PER_ROOM {
                role = Role::Spectator;
            } else {
                return Err(("The room is full".to_string(), ErrorCode::RoomFull));
            }
        }

        if role == Role::Spectator && spectator_count >= MAX_SPECTATORS_PER_ROOM {
            return Err((
                "No spectator slots left in this room".to_string(),
                ErrorCode::SpectatorsFull,
            ));
        }

        // Highest issued joinOrder + 1 stays unique even after departures.
        let max_join_order = players.iter().map(|p| p.join_order).max().unwrap_or(0);
        let player = Player {
            uid: uid.to_string(),
            name: display_name.to_string(),
            avatar_url: None,
            join_order: max_join_order + 1,
            score: 0,
            online: true,
            role,
            joined_at: chrono::Utc::now(),
        };
        self.store()
            .upsert_player(&room.id, &player)
            .await
            .map_err(store_failure)?;
        Ok(player)
    }

    /// Leave a room for good: the player document is deleted, the rotation
    /// slot is forfeited, and the room itself is deleted when it empties.
    pub async fn handle_leave_room(self: &Arc<Self>, uid: &str, room_id: RoomId) {
        let guard = self.lock_room(room_id).await;

        let outcome = match self.leave_room_locked(uid, room_id).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                drop(guard);
                self.reply_error(
                    uid,
                    "You are not a participant in this room",
                    ErrorCode::NotInRoom,
                )
                .await;
                return;
            }
            Err(err) => {
                drop(guard);
                tracing::error!(%uid, %room_id, error = %err, "Leave failed");
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };
        drop(guard);

        self.reply(
            uid,
            ServerEvent::RoomLeft {
                room_id,
                host_changed: outcome.host_changed,
                new_host_uid: outcome.new_host_uid,
                room_deleted: outcome.room_deleted,
            },
        )
        .await;
    }

    /// Core leave mutation, shared by the leave handler and the disconnect
    /// path for non-active rooms. Caller holds the room lock. Returns `None`
    /// when the uid had no player document.
    pub(crate) async fn leave_room_locked(
        self: &Arc<Self>,
        uid: &str,
        room_id: RoomId,
    ) -> anyhow::Result<Option<LeaveOutcome>> {
        let Some(mut room) = self.store().get_room(&room_id).await? else {
            return Ok(None);
        };

        let Some(_removed) = self.store().remove_player(&room_id, uid).await? else {
            return Ok(None);
        };

        self.play_again_forget_vote(uid, &room_id).await;

        if let Err(err) = self.dispatcher().leave_room_channel(uid, &room_id).await {
            tracing::warn!(%uid, %room_id, error = %err, "Failed to unsubscribe from room channel");
        }

        let remaining = self.store().list_players(&room_id).await?;

        if remaining.is_empty() {
            self.timers().cancel_all(&room_id);
            self.play_again_clear(&room_id);
            self.store().delete_room(&room_id).await?;
            let _ = self.dispatcher().drop_room_channel(&room_id).await;
            self.forget_room_lock(&room_id);
            tracing::info!(%room_id, %uid, "Last participant left; room deleted");
            return Ok(Some(LeaveOutcome {
                room_deleted: true,
                ..Default::default()
            }));
        }

        // Voluntary leave forfeits the rotation slot.
        let was_in_order = room.order_index_of(uid).is_some();
        if was_in_order {
            let removed_index = room.order_index_of(uid).unwrap_or(0) as i32;
            room.turn_order.retain(|entry| entry != uid);
            if removed_index < room.turn_cursor {
                room.turn_cursor -= 1;
            }
        }

        let mut outcome = LeaveOutcome::default();
        if room.host_uid == uid {
            if let Some(new_host) = pick_new_host(&remaining) {
                outcome.host_changed = true;
                outcome.new_host_uid = Some(new_host.uid.clone());
                room.host_uid = new_host.uid.clone();
                if new_host.role == Role::Spectator {
                    let mut promoted = new_host.clone();
                    promoted.role = Role::Player;
                    self.store().upsert_player(&room_id, &promoted).await?;
                }
                tracing::info!(%room_id, old_host = %uid, new_host = %room.host_uid, "Host migrated");
            }
        }

        self.store().update_room(&room).await?;

        self.broadcast(
            &room_id,
            ServerEvent::PlayerLeft {
                uid: uid.to_string(),
                new_host_uid: outcome.new_host_uid.clone(),
            },
        )
        .await;
        if let Err(err) = self.push_player_list(&room).await {
            tracing::warn!(%room_id, error = %err, "Failed to push player list after leave");
        }

        // A mid-game leave may strand the turn or invalidate the rotation.
        if room.state == RoomState::Active {
            self.reconcile_after_departure(&mut room, uid).await;
        }

        Ok(Some(outcome))
    }

    /// Host-only settings update while the room is waiting. Any out-of-range
    /// field fails the entire call; nothing is persisted.
    pub async fn handle_update_settings(&self, uid: &str, room_id: RoomId, patch: SettingsPatch) {
        let _guard = self.lock_room(room_id).await;

        let mut room = match self.store().get_room(&room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.reply_error(uid, "Room not found", ErrorCode::RoomNotFound)
                    .await;
                return;
            }
            Err(err) => {
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };

        if room.host_uid != uid {
            self.reply_error(
                uid,
                "Only the host may change settings",
                ErrorCode::NotHost,
            )
            .await;
            return;
        }

        if room.state != RoomState::Waiting {
            self.reply_error(
                uid,
                "Settings can only change before the game starts",
                ErrorCode::InvalidRoomState,
            )
            .await;
            return;
        }

        let merged = match validation::validate_settings_patch(&room.settings, &patch) {
            Ok(merged) => merged,
            Err(err) => {
                self.reply_error(uid, err.to_string(), ErrorCode::InvalidSettings)
                    .await;
                return;
            }
        };

        room.settings = merged.clone();
        if let Err(err) = self.store().update_room(&room).await {
            let message = self.internal_error_message(&err);
            self.reply_error(uid, message, ErrorCode::StorageError).await;
            return;
        }

        tracing::info!(%room_id, host = %uid, "Settings updated");
        self.reply(
            uid,
            ServerEvent::SettingsUpdated {
                room_id,
                settings: merged,
            },
        )
        .await;
        if let Err(err) = self.push_player_list(&room).await {
            tracing::warn!(%room_id, error = %err, "Failed to push player list after settings update");
        }
    }

    /// Players of a room ordered by joinOrder ascending.
    pub async fn list_players_sorted(&self, room_id: &RoomId) -> anyhow::Result<Vec<Player>> {
        self.store().list_players(room_id).await
    }

    pub(crate) fn forget_room_lock(&self, room_id: &RoomId) {
        self.room_locks_ref().forget(room_id);
    }
}

/// Host migration order: first online player, then any player (offline),
/// then the first online spectator, then whoever is left. Spectator picks
/// get promoted to the player role by the caller. `players` is sorted by
/// joinOrder.
fn pick_new_host(players: &[Player]) -> Option<&Player> {
    players
        .iter()
        .find(|p| p.role == Role::Player && p.online)
        .or_else(|| players.iter().find(|p| p.role == Role::Player))
        .or_else(|| players.iter().find(|p| p.role == Role::Spectator && p.online))
        .or_else(|| players.first())
}
