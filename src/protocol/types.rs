use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable user identifier issued by the token verifier.
/// Client-supplied uids are never trusted; this always comes from the
/// authenticated connection.
pub type Uid = String;
/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Maximum participants with the `player` role per room.
pub const MAX_PLAYERS_PER_ROOM: usize = 8;
/// Maximum participants with the `spectator` role per room.
pub const MAX_SPECTATORS_PER_ROOM: usize = 5;
/// Maximum participants overall (players + spectators).
pub const MAX_PARTICIPANTS_PER_ROOM: usize = MAX_PLAYERS_PER_ROOM + MAX_SPECTATORS_PER_ROOM;
/// Room codes are always this many characters.
pub const ROOM_CODE_LENGTH: usize = 6;
/// Upper bound on lobby chat message length.
pub const MAX_LOBBY_MESSAGE_LENGTH: usize = 500;
/// Votes required for the play-again quorum.
pub const PLAY_AGAIN_REQUIRED_VOTES: usize = 2;

/// Room lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    #[default]
    Waiting,
    Active,
    Ended,
}

/// Participant role within a room
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Player,
    Spectator,
}

/// Mutable per-room game settings with bounded numeric fields.
///
/// Bounds are enforced by [`crate::protocol::validation::validate_settings_patch`];
/// a `GameSettings` value in a persisted room is always within bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettings {
    pub questions_per_player: u32,
    pub turn_timeout_sec: u32,
    pub steal_timeout_sec: u32,
    pub allow_steal: bool,
    pub bonus_for_steal: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            questions_per_player: 5,
            turn_timeout_sec: 30,
            steal_timeout_sec: 15,
            allow_steal: true,
            bonus_for_steal: 1,
        }
    }
}

/// A pending steal: the next online player gets one attempt at the question
/// the turn-taker just missed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StealAttempt {
    pub stealer_uid: Uid,
    pub question_index: u32,
}

/// Room document. Owns its players and questions; deleting a room cascades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub host_uid: Uid,
    pub state: RoomState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Total questions for the current game instance.
    pub question_count: u32,
    /// 0-based index of the question currently in play.
    pub current_question_index: u32,
    /// The turn-taker. Remains the original turn-taker while a steal is in
    /// progress; the steal belongs to that question, not a new turn.
    pub current_turn_uid: Option<Uid>,
    /// Rotation snapshot taken at game start. Trimmed on voluntary leave,
    /// never on disconnect (disconnect is recoverable by rejoin).
    pub turn_order: Vec<Uid>,
    /// Index of the turn-taker within `turn_order`; -1 when no turn is held.
    pub turn_cursor: i32,
    pub steal_attempt: Option<StealAttempt>,
    pub settings: GameSettings,
}

impl Room {
    pub fn new(code: String, host_uid: Uid) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            host_uid,
            state: RoomState::Waiting,
            created_at: chrono::Utc::now(),
            started_at: None,
            question_count: 0,
            current_question_index: 0,
            current_turn_uid: None,
            turn_order: Vec::new(),
            turn_cursor: -1,
            steal_attempt: None,
            settings: GameSettings::default(),
        }
    }

    /// Index of a uid within the rotation snapshot.
    pub fn order_index_of(&self, uid: &str) -> Option<usize> {
        self.turn_order.iter().position(|entry| entry == uid)
    }
}

/// Player document, scoped to one room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub uid: Uid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Monotonic per-room join counter, unique within a room.
    pub join_order: u32,
    pub score: u32,
    pub online: bool,
    pub role: Role,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

impl Player {
    pub fn is_active_player(&self) -> bool {
        self.online && self.role == Role::Player
    }
}

/// Question document, scoped to one room. `id` is the stringified 0-based
/// index of the question within the game instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// Four pre-shuffled answer options.
    pub options: Vec<String>,
    /// Post-shuffle index of the correct answer.
    pub correct_index: u8,
    pub category: String,
    pub difficulty: String,
}

/// Client-facing view of a question: never carries the correct index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: String,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty.clone(),
        }
    }
}

/// Current scores keyed by uid. BTreeMap keeps broadcast payloads in a
/// deterministic order.
pub type ScoreBoard = BTreeMap<Uid, u32>;
