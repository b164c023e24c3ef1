use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ConnectionHandle, TimerPhase, TriviaServer};
use crate::auth::VerifiedIdentity;
use crate::protocol::{
    PublicQuestion, RejoinSnapshot, Role, RoomId, RoomState, ServerEvent, Uid,
};

impl TriviaServer {
    // ------------------------------------------------------------------
    // Connect / disconnect
    // ------------------------------------------------------------------

    /// Attach an authenticated connection: record the uid mapping, upsert
    /// the user profile, and greet the client.
    pub async fn handle_connect(
        &self,
        identity: &VerifiedIdentity,
        sender: mpsc::Sender<Arc<ServerEvent>>,
    ) {
        let display_name = identity.display_name();

        if let Err(err) = self
            .dispatcher()
            .register_connection(identity.uid.clone(), sender)
            .await
        {
            tracing::warn!(uid = %identity.uid, error = %err, "Failed to register connection channel");
        }

        let handle = ConnectionHandle {
            connection_id: Uuid::new_v4(),
            display_name: display_name.clone(),
            connected_at: chrono::Utc::now(),
        };
        tracing::debug!(
            uid = %identity.uid,
            connection_id = %handle.connection_id,
            "Connection registered"
        );
        self.connections_ref().insert(identity.uid.clone(), handle);

        if let Err(err) = self
            .store()
            .upsert_user_profile(&identity.uid, &display_name, identity.picture.as_deref())
            .await
        {
            tracing::warn!(uid = %identity.uid, error = %err, "Failed to upsert user profile");
        }

        tracing::info!(uid = %identity.uid, instance_id = %self.instance_id(), "Client connected");

        self.reply(
            &identity.uid,
            ServerEvent::Welcome {
                uid: identity.uid.clone(),
                name: display_name,
            },
        )
        .await;
    }

    /// Tear down a dropped connection. Active rooms keep the player document
    /// and mark it offline (rejoin can recover it); waiting and ended rooms
    /// get a full leave with host migration as needed.
    pub async fn handle_disconnect(self: &Arc<Self>, uid: &str) {
        let rooms = self.dispatcher().rooms_of(uid).await;
        for room_id in rooms {
            self.disconnect_from_room(uid, room_id).await;
        }

        let session_secs = self
            .connections_ref()
            .remove(uid)
            .map(|(_, handle)| (chrono::Utc::now() - handle.connected_at).num_seconds());
        if let Err(err) = self.dispatcher().unregister_connection(uid).await {
            tracing::warn!(%uid, error = %err, "Failed to unregister connection");
        }

        tracing::info!(
            %uid,
            instance_id = %self.instance_id(),
            session_secs = session_secs.unwrap_or(0),
            "Client disconnected"
        );
    }

    async fn disconnect_from_room(self: &Arc<Self>, uid: &str, room_id: RoomId) {
        let _guard = self.lock_room(room_id).await;

        let room = match self.store().get_room(&room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(%uid, %room_id, error = %err, "Failed to read room on disconnect");
                return;
            }
        };

        if room.state != RoomState::Active {
            // Not mid-game: the departure is final.
            self.play_again_drop_voter(uid, &room_id).await;
            if let Err(err) = self.leave_room_locked(uid, room_id).await {
                tracing::error!(%uid, %room_id, error = %err, "Disconnect leave failed");
            }
            return;
        }

        let player = match self.store().get_player(&room_id, uid).await {
            Ok(Some(player)) => player,
            Ok(None) => return,
            Err(err) => {
                tracing::error!(%uid, %room_id, error = %err, "Failed to read player on disconnect");
                return;
            }
        };

        if !player.online {
            return;
        }

        let mut offline = player;
        offline.online = false;
        if let Err(err) = self.store().upsert_player(&room_id, &offline).await {
            tracing::error!(%uid, %room_id, error = %err, "Failed to mark player offline");
            return;
        }

        tracing::info!(%uid, %room_id, "Player went offline mid-game");

        self.broadcast(
            &room_id,
            ServerEvent::PlayerOffline {
                uid: uid.to_string(),
            },
        )
        .await;
        if let Err(err) = self.push_player_list(&room).await {
            tracing::warn!(%room_id, error = %err, "Failed to push player list after offline");
        }

        // A dropped turn-taker or stealer must not stall the room: resolve
        // their phase immediately through the same timeout path the timer
        // would have taken.
        let question_id = match self
            .store()
            .get_question(&room_id, room.current_question_index)
            .await
        {
            Ok(Some(question)) => question.id,
            _ => return,
        };

        if room
            .steal_attempt
            .as_ref()
            .is_some_and(|steal| steal.stealer_uid == uid)
        {
            self.timers().cancel(&room_id, TimerPhase::Steal);
            self.submit_steal_locked(room_id, uid, &question_id, -1, true)
                .await;
        } else if room.current_turn_uid.as_deref() == Some(uid) {
            self.timers().cancel(&room_id, TimerPhase::Turn);
            self.submit_answer_locked(room_id, uid, &question_id, -1, true)
                .await;
        }
    }

    // ------------------------------------------------------------------
    // Rejoin
    // ------------------------------------------------------------------

    /// `game:rejoin`: re-attach a previously-seen uid to a room and return
    /// the full game snapshot it needs to resume rendering.
    pub async fn handle_rejoin(self: &Arc<Self>, uid: &str, room_id: RoomId) {
        let _guard = self.lock_room(room_id).await;

        let room = match self.store().get_room(&room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                self.reply(
                    uid,
                    ServerEvent::RejoinError {
                        message: "That room no longer exists".to_string(),
                    },
                )
                .await;
                return;
            }
            Err(err) => {
                tracing::error!(%uid, %room_id, error = %err, "Failed to read room on rejoin");
                self.reply(
                    uid,
                    ServerEvent::RejoinError {
                        message: self.internal_error_message(&err),
                    },
                )
                .await;
                return;
            }
        };

        let Ok(player) = self.store().get_player(&room_id, uid).await else {
            self.reply(
                uid,
                ServerEvent::RejoinError {
                    message: "Could not load your player record".to_string(),
                },
            )
            .await;
            return;
        };
        let Some(mut player) = player else {
            self.reply(
                uid,
                ServerEvent::RejoinError {
                    message: "You are not a member of this room; join with its code".to_string(),
                },
            )
            .await;
            return;
        };

        player.online = true;
        player.role = self.rejoin_role(&room, uid);
        if let Err(err) = self.store().upsert_player(&room_id, &player).await {
            tracing::error!(%uid, %room_id, error = %err, "Failed to persist rejoin");
            self.reply(
                uid,
                ServerEvent::RejoinError {
                    message: self.internal_error_message(&err),
                },
            )
            .await;
            return;
        }

        if let Err(err) = self.dispatcher().join_room_channel(uid, room_id).await {
            tracing::warn!(%uid, %room_id, error = %err, "Failed to resubscribe to room channel");
        }

        tracing::info!(%uid, %room_id, role = ?player.role, "Player rejoined");

        self.broadcast(
            &room_id,
            ServerEvent::PlayerRejoined {
                uid: uid.to_string(),
                role: player.role,
            },
        )
        .await;
        if let Err(err) = self.push_player_list(&room).await {
            tracing::warn!(%room_id, error = %err, "Failed to push player list after rejoin");
        }

        match self.rejoin_snapshot(&room, player.role).await {
            Ok(snapshot) => {
                if room.state == RoomState::Active && player.role == Role::Spectator {
                    self.reply(uid, ServerEvent::SpectatingActiveGame { room_id })
                        .await;
                }
                self.reply(uid, ServerEvent::RejoinState(Box::new(snapshot)))
                    .await;
            }
            Err(err) => {
                tracing::error!(%uid, %room_id, error = %err, "Failed to build rejoin snapshot");
                self.reply(
                    uid,
                    ServerEvent::RejoinError {
                        message: self.internal_error_message(&err),
                    },
                )
                .await;
            }
        }
    }

    /// Role a rejoiner gets. Outside an active game everyone comes back as a
    /// player. Mid-game, late entrants and players whose rotation slot has
    /// already passed in this cycle spectate for the rest of the instance.
    fn rejoin_role(&self, room: &crate::protocol::Room, uid: &str) -> Role {
        if room.state != RoomState::Active {
            return Role::Player;
        }

        let Some(index) = room.order_index_of(uid) else {
            return Role::Spectator;
        };

        let index = index as i32;
        let slot_passed = index < room.turn_cursor
            || (index == room.turn_cursor && room.current_turn_uid.as_deref() != Some(uid));
        if slot_passed {
            Role::Spectator
        } else {
            Role::Player
        }
    }

    async fn rejoin_snapshot(
        &self,
        room: &crate::protocol::Room,
        role: Role,
    ) -> anyhow::Result<RejoinSnapshot> {
        let players = self.store().list_players(&room.id).await?;
        let scores = super::collect_scores(&players);

        let (question, phase_remaining_sec) = if room.state == RoomState::Active {
            let question = self
                .store()
                .get_question(&room.id, room.current_question_index)
                .await?
                .map(|q| PublicQuestion::from(&q));
            let remaining = if room.steal_attempt.is_some() {
                self.timers().remaining_secs(&room.id, TimerPhase::Steal)
            } else {
                self.timers().remaining_secs(&room.id, TimerPhase::Turn)
            };
            (question, remaining)
        } else {
            (None, None)
        };

        Ok(RejoinSnapshot {
            room_id: room.id,
            role,
            room_state: room.state,
            question,
            turn_uid: room.current_turn_uid.clone(),
            scores,
            players,
            total_questions: room.question_count,
            current_question_num: if room.state == RoomState::Active {
                room.current_question_index + 1
            } else {
                0
            },
            settings: room.settings.clone(),
            host_uid: room.host_uid.clone(),
            steal_attempt: room.steal_attempt.clone(),
            phase_remaining_sec,
        })
    }

    /// Whether the uid has a live connection on this instance.
    pub fn is_connected(&self, uid: &Uid) -> bool {
        self.connections_ref().contains_key(uid)
    }
}
