use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::protocol::{
    ErrorCode, Player, Room, RoomId, ScoreBoard, ServerEvent, Uid, PLAY_AGAIN_REQUIRED_VOTES,
};
use crate::store::GameStore;
use crate::trivia::QuestionSource;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Duration;
use uuid::Uuid;

mod connectivity;
#[cfg(test)]
mod connectivity_tests;
mod game_engine;
mod locks;
mod message_router;
mod messaging;
mod play_again;
mod registry;
mod room_service;
#[cfg(test)]
mod room_service_tests;
mod timers;

pub use messaging::{EventDispatcher, InMemoryEventDispatcher};
pub use timers::{TimerContext, TimerPhase, TimerScheduler};

use locks::RoomLocks;
use play_again::PlayAgainTable;

/// Tracks one authenticated connection.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionHandle {
    pub connection_id: Uuid,
    pub display_name: String,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

/// Runtime knobs derived from [`Config`] at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Attempts at generating a unique room code before failing the create.
    pub room_code_attempts: u32,
    /// How long the play-again vote window stays open.
    pub play_again_window: Duration,
    /// Votes (and online users) required to restart an ended game.
    pub play_again_required_votes: usize,
    /// Whether internal error detail may appear in client replies.
    pub expose_internal_errors: bool,
    /// Outbound per-connection channel capacity.
    pub event_queue_capacity: usize,
    /// Maximum accepted inbound frame size in bytes.
    pub max_message_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            room_code_attempts: 8,
            play_again_window: Duration::from_secs(30),
            play_again_required_votes: PLAY_AGAIN_REQUIRED_VOTES,
            expose_internal_errors: true,
            event_queue_capacity: 64,
            max_message_size: 16 * 1024,
        }
    }
}

impl RuntimeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            room_code_attempts: config.server.room_code_attempts,
            play_again_window: Duration::from_secs(config.server.play_again_window_secs),
            play_again_required_votes: PLAY_AGAIN_REQUIRED_VOTES,
            expose_internal_errors: !config.security.is_production(),
            event_queue_capacity: config.server.event_queue_capacity,
            max_message_size: config.server.max_message_size,
        }
    }
}

/// Server-authoritative trivia game server.
///
/// Composition root holding the collaborator seams (store, question source,
/// dispatcher, token verifier) and the process-local services (connection
/// registry, per-room locks, timer table, play-again table). All of these
/// are sharded by room id; a room lives entirely on one instance.
pub struct TriviaServer {
    /// Persistence collaborator
    store: Arc<dyn GameStore>,
    /// Trivia provider collaborator
    question_source: Arc<dyn QuestionSource>,
    /// Broadcast / per-connection send collaborator
    dispatcher: Arc<dyn EventDispatcher>,
    /// Identity verification collaborator
    token_verifier: Arc<dyn TokenVerifier>,
    /// uid -> live connection
    connections: DashMap<Uid, ConnectionHandle>,
    /// Per-room serialization
    room_locks: RoomLocks,
    /// Per-room, per-phase one-shot timers
    timers: TimerScheduler,
    /// Per-room play-again vote state
    play_again: PlayAgainTable,
    config: RuntimeConfig,
    instance_id: Uuid,
}

impl TriviaServer {
    pub fn new(
        config: RuntimeConfig,
        store: Arc<dyn GameStore>,
        question_source: Arc<dyn QuestionSource>,
        dispatcher: Arc<dyn EventDispatcher>,
        token_verifier: Arc<dyn TokenVerifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            question_source,
            dispatcher,
            token_verifier,
            connections: DashMap::new(),
            room_locks: RoomLocks::new(),
            timers: TimerScheduler::new(),
            play_again: PlayAgainTable::new(),
            config,
            instance_id: Uuid::new_v4(),
        })
    }

    pub fn store(&self) -> &dyn GameStore {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &dyn EventDispatcher {
        self.dispatcher.as_ref()
    }

    pub fn question_source(&self) -> &dyn QuestionSource {
        self.question_source.as_ref()
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    pub fn token_verifier(&self) -> &dyn TokenVerifier {
        self.token_verifier.as_ref()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// Serialize all further work on this room.
    pub(crate) async fn lock_room(&self, room_id: RoomId) -> tokio::sync::OwnedMutexGuard<()> {
        self.room_locks.acquire(room_id).await
    }

    pub(crate) fn room_locks_ref(&self) -> &RoomLocks {
        &self.room_locks
    }

    pub(crate) fn connections_ref(&self) -> &DashMap<Uid, ConnectionHandle> {
        &self.connections
    }

    pub(crate) fn play_again_ref(&self) -> &PlayAgainTable {
        &self.play_again
    }

    // ------------------------------------------------------------------
    // Reply helpers
    // ------------------------------------------------------------------

    pub(crate) async fn reply(&self, uid: &str, event: ServerEvent) {
        if let Err(err) = self.dispatcher.send_to_user(uid, Arc::new(event)).await {
            tracing::warn!(%uid, error = %err, "Failed to send reply");
        }
    }

    pub(crate) async fn reply_error(&self, uid: &str, message: impl Into<String>, code: ErrorCode) {
        self.reply(
            uid,
            ServerEvent::ActionFailed {
                message: message.into(),
                error_code: Some(code),
            },
        )
        .await;
    }

    /// Stale-event acknowledgement: nothing was mutated.
    pub(crate) async fn reply_no_action(&self, uid: &str, reason: Option<String>) {
        self.reply(
            uid,
            ServerEvent::NoAction {
                no_action_taken: true,
                reason,
            },
        )
        .await;
    }

    /// Message surfaced for an internal failure. Production deployments get
    /// a generic string; development sees the underlying error.
    pub(crate) fn internal_error_message(&self, err: &anyhow::Error) -> String {
        if self.config.expose_internal_errors {
            format!("Internal error: {err}")
        } else {
            "Internal server error".to_string()
        }
    }

    pub(crate) async fn broadcast(&self, room_id: &RoomId, event: ServerEvent) {
        if let Err(err) = self
            .dispatcher
            .broadcast_to_room(room_id, Arc::new(event))
            .await
        {
            tracing::warn!(%room_id, error = %err, "Failed to broadcast to room");
        }
    }

    // ------------------------------------------------------------------
    // Shared room helpers
    // ------------------------------------------------------------------

    /// Broadcast the authoritative member list for a room.
    pub(crate) async fn push_player_list(&self, room: &Room) -> Result<()> {
        let players = self.store.list_players(&room.id).await?;
        self.broadcast(
            &room.id,
            ServerEvent::UpdatePlayerList {
                players,
                host_uid: room.host_uid.clone(),
                room_state: room.state,
                settings: Some(room.settings.clone()),
            },
        )
        .await;
        Ok(())
    }

    /// Current scores for a room keyed by uid.
    pub(crate) async fn score_board(&self, room_id: &RoomId) -> Result<ScoreBoard> {
        let players = self.store.list_players(room_id).await?;
        Ok(collect_scores(&players))
    }

    /// Count of online player-role members restricted to the rotation
    /// snapshot; the engine ends the game when this drops below two.
    pub(crate) fn online_players_in_order(room: &Room, players: &[Player]) -> usize {
        players
            .iter()
            .filter(|player| {
                player.is_active_player() && room.turn_order.iter().any(|uid| uid == &player.uid)
            })
            .count()
    }

    pub(crate) fn display_name_of(&self, uid: &str) -> String {
        self.connections
            .get(uid)
            .map(|handle| handle.display_name.clone())
            .unwrap_or_else(|| uid.to_string())
    }
}

/// Fold player documents into a score board.
pub(crate) fn collect_scores(players: &[Player]) -> ScoreBoard {
    players
        .iter()
        .map(|player| (player.uid.clone(), player.score))
        .collect()
}
