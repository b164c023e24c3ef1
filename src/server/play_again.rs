use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::TriviaServer;
use crate::protocol::{ErrorCode, RoomId, RoomState, ServerEvent, Uid};

/// Vote state for one ended room.
#[derive(Default)]
pub(crate) struct PlayAgainEntry {
    votes: HashSet<Uid>,
    window: Option<tokio::task::AbortHandle>,
}

/// Per-room play-again tally with a single inactivity timer each.
pub(crate) struct PlayAgainTable {
    entries: DashMap<RoomId, PlayAgainEntry>,
}

impl PlayAgainTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    fn clear(&self, room_id: &RoomId) {
        if let Some((_, entry)) = self.entries.remove(room_id) {
            if let Some(window) = entry.window {
                window.abort();
            }
        }
    }
}

impl TriviaServer {
    /// `playAgainRequest`: vote to restart an ended game with its previous
    /// settings. Quorum is reached when the votes and the online headcount
    /// both meet the requirement.
    pub async fn handle_play_again(self: &Arc<Self>, uid: &str, room_id: RoomId) {
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

        if room.state != RoomState::Ended {
            self.reply_error(
                uid,
                "Play-again votes only apply to ended games",
                ErrorCode::InvalidRoomState,
            )
            .await;
            return;
        }

        let players = match self.store().list_players(&room_id).await {
            Ok(players) => players,
            Err(err) => {
                let message = self.internal_error_message(&err);
                self.reply_error(uid, message, ErrorCode::StorageError).await;
                return;
            }
        };

        if !players.iter().any(|p| p.uid == uid) {
            self.reply_error(
                uid,
                "You are not a participant in this room",
                ErrorCode::NotInRoom,
            )
            .await;
            return;
        }

        let total_online = players.iter().filter(|p| p.online).count();
        let required = self.config().play_again_required_votes;

        let (votes, first_vote) = {
            let mut entry = self.play_again_ref().entries.entry(room_id).or_default();
            let first_vote = entry.votes.is_empty();
            entry.votes.insert(uid.to_string());
            (entry.votes.len(), first_vote)
        };

        // The window only starts once restarting is actually possible.
        if first_vote && total_online >= required {
            self.arm_play_again_window(room_id);
        }

        tracing::info!(%room_id, %uid, votes, total_online, required, "Play-again vote");

        self.broadcast(
            &room_id,
            ServerEvent::PlayAgainStatus {
                votes,
                total_online,
                required,
            },
        )
        .await;

        if votes >= required && total_online >= required {
            self.play_again_ref().clear(&room_id);

            // Rewind the lifecycle so the engine sees a startable room, then
            // reuse the regular start path with the retained settings.
            room.state = RoomState::Waiting;
            if let Err(err) = self.store().update_room(&room).await {
                tracing::error!(%room_id, error = %err, "Failed to rewind room for restart");
                return;
            }

            match self.start_game_locked(&mut room, None).await {
                Ok(snapshot) => {
                    tracing::info!(%room_id, "Play-again quorum reached; game restarted");
                    self.broadcast(&room_id, ServerEvent::GameStarted(Box::new(snapshot)))
                        .await;
                }
                Err(err) => {
                    tracing::warn!(%room_id, error = %err, "Play-again restart failed");
                    // Leave the room in waiting: the lobby can regroup and
                    // the host can start manually.
                    self.broadcast(
                        &room_id,
                        ServerEvent::Notice {
                            message: format!("Could not restart the game: {err}"),
                        },
                    )
                    .await;
                }
            }
        }
    }

    fn arm_play_again_window(self: &Arc<Self>, room_id: RoomId) {
        let server = Arc::clone(self);
        let window = self.config().play_again_window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            server.play_again_window_expired(room_id).await;
        });

        if let Some(mut entry) = self.play_again_ref().entries.get_mut(&room_id) {
            if let Some(previous) = entry.window.replace(handle.abort_handle()) {
                previous.abort();
            }
        } else {
            handle.abort();
        }
    }

    async fn play_again_window_expired(self: &Arc<Self>, room_id: RoomId) {
        let _guard = self.lock_room(room_id).await;

        // Quorum may have been reached (entry cleared) while this task was
        // queued; only an entry that is still pending fails.
        let pending = self.play_again_ref().entries.remove(&room_id).is_some();
        if !pending {
            return;
        }

        tracing::info!(%room_id, "Play-again window expired without quorum");
        self.broadcast(&room_id, ServerEvent::PlayAgainFailed).await;
    }

    /// Remove a disconnecting voter's vote, clearing the tally when nobody
    /// is left and re-broadcasting the status otherwise.
    pub(crate) async fn play_again_drop_voter(&self, uid: &str, room_id: &RoomId) {
        let status = {
            let Some(mut entry) = self.play_again_ref().entries.get_mut(room_id) else {
                return;
            };
            if !entry.votes.remove(uid) {
                return;
            }
            if entry.votes.is_empty() {
                None
            } else {
                Some(entry.votes.len())
            }
        };

        match status {
            None => {
                self.play_again_ref().clear(room_id);
            }
            Some(votes) => {
                let (total_online, required) = match self.store().list_players(room_id).await {
                    Ok(players) => (
                        players.iter().filter(|p| p.online && p.uid != uid).count(),
                        self.config().play_again_required_votes,
                    ),
                    Err(_) => (0, self.config().play_again_required_votes),
                };
                self.broadcast(
                    room_id,
                    ServerEvent::PlayAgainStatus {
                        votes,
                        total_online,
                        required,
                    },
                )
                .await;
            }
        }
    }

    /// Voluntary leave: silently forget the vote (the leave broadcast
    /// already tells the room who left).
    pub(crate) async fn play_again_forget_vote(&self, uid: &str, room_id: &RoomId) {
        let emptied = {
            let Some(mut entry) = self.play_again_ref().entries.get_mut(room_id) else {
                return;
            };
            entry.votes.remove(uid);
            entry.votes.is_empty()
        };
        if emptied {
            self.play_again_ref().clear(room_id);
        }
    }

    /// Drop all play-again state for a deleted room.
    pub(crate) fn play_again_clear(&self, room_id: &RoomId) {
        self.play_again_ref().clear(room_id);
    }
}
