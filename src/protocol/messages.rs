use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{
    GameSettings, PublicQuestion, Role, RoomId, RoomState, ScoreBoard, StealAttempt, Uid,
};
use super::validation::SettingsPatch;

/// Events sent from client to server.
///
/// The connection identity (uid) is stapled at the WebSocket handshake; none
/// of these payloads carry a trusted uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    /// Create a room; the caller becomes host and first player.
    CreateRoom {
        #[serde(skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
    /// Join an existing room by its 6-character code.
    JoinRoom {
        room_code: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_name: Option<String>,
    },
    /// Leave the room for good. The player document is deleted and the
    /// rotation slot is forfeited.
    LeaveRoom { room_id: RoomId },
    /// Host-only settings update while the room is waiting.
    UpdateSettings {
        room_id: RoomId,
        settings: SettingsPatch,
    },
    /// Host-only game start, with optional settings overrides.
    StartGame {
        room_id: RoomId,
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<SettingsPatch>,
    },
    /// Turn-taker answer for the current question.
    SubmitAnswer {
        room_id: RoomId,
        question_id: String,
        answer_index: i32,
    },
    /// Stealer answer for the question the turn-taker missed.
    SubmitSteal {
        room_id: RoomId,
        question_id: String,
        answer_index: i32,
    },
    /// Vote to restart an ended game with the previous settings.
    PlayAgain { room_id: RoomId },
    /// Re-attach to a room after a disconnect.
    Rejoin { room_id: RoomId },
    /// Room-wide chat message (capped at 500 chars).
    LobbyMessage { room_id: RoomId, message: String },
    /// Point-to-point message to another participant.
    PrivateMessage {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        to_uid: Uid,
        message: String,
    },
}

/// Initial game snapshot sent on start and broadcast as `GameStarted`.
/// Boxed in ServerEvent to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room_id: RoomId,
    pub question: PublicQuestion,
    pub turn_uid: Uid,
    pub turn_timeout_sec: u32,
    pub scores: ScoreBoard,
    pub players: Vec<super::types::Player>,
    pub total_questions: u32,
    pub current_question_num: u32,
    pub settings: GameSettings,
    pub host_uid: Uid,
    /// Full (answer-free) question list for client-side progress UI.
    pub questions: Vec<PublicQuestion>,
}

/// Snapshot returned to a rejoining client. Boxed in ServerEvent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejoinSnapshot {
    pub room_id: RoomId,
    pub role: Role,
    pub room_state: RoomState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<PublicQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_uid: Option<Uid>,
    pub scores: ScoreBoard,
    pub players: Vec<super::types::Player>,
    pub total_questions: u32,
    pub current_question_num: u32,
    pub settings: GameSettings,
    pub host_uid: Uid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steal_attempt: Option<StealAttempt>,
    /// Seconds left on the current turn or steal timer, if one is armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_remaining_sec: Option<u32>,
}

/// Events sent from server to client. Point-to-point replies and room
/// broadcasts share this enum; the dispatcher decides the audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Sent once after the connection authenticates.
    Welcome {
        uid: Uid,
        name: String,
    },
    /// Reply: room created, caller is host.
    RoomCreated {
        room_id: RoomId,
        room_code: String,
    },
    /// Reply: joined (or re-joined) a room.
    RoomJoined {
        room_id: RoomId,
        room_code: String,
        role: Role,
        room_state: RoomState,
    },
    /// Reply: left a room.
    RoomLeft {
        room_id: RoomId,
        host_changed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_host_uid: Option<Uid>,
        room_deleted: bool,
    },
    /// Reply: settings accepted and persisted.
    SettingsUpdated {
        room_id: RoomId,
        settings: GameSettings,
    },
    /// A request failed. `message` is safe to surface to the user.
    ActionFailed {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
    /// A submission or vote referred to state that has already moved on.
    /// Nothing was mutated.
    NoAction {
        no_action_taken: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Broadcast: a participant joined the room.
    PlayerJoined {
        player: super::types::Player,
    },
    /// Broadcast: a participant left for good (possibly with host migration).
    PlayerLeft {
        uid: Uid,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_host_uid: Option<Uid>,
    },
    /// Broadcast: a participant lost their connection mid-room.
    PlayerOffline {
        uid: Uid,
    },
    /// Broadcast: a disconnected participant re-attached.
    PlayerRejoined {
        uid: Uid,
        role: Role,
    },
    /// Broadcast: authoritative member list after any membership change.
    UpdatePlayerList {
        players: Vec<super::types::Player>,
        host_uid: Uid,
        room_state: RoomState,
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<GameSettings>,
    },
    /// Broadcast (and start-game reply): the game began.
    GameStarted(Box<GameSnapshot>),
    /// Reply to a rejoin request.
    RejoinState(Box<RejoinSnapshot>),
    /// Broadcast: a new question is live and the turn timer is running.
    NextTurn {
        question: PublicQuestion,
        turn_uid: Uid,
        timeout_sec: u32,
        current_question_num: u32,
        total_questions: u32,
    },
    /// Broadcast: outcome of a turn-taker submission.
    AnswerResult {
        uid: Uid,
        question_id: String,
        correct: bool,
        correct_index: u8,
        was_timeout: bool,
    },
    /// Broadcast: the missed question is up for a steal.
    StealOpportunity {
        question_id: String,
        stealer_uid: Uid,
        steal_timeout_sec: u32,
    },
    /// Broadcast: outcome of a steal submission.
    StealResult {
        uid: Uid,
        question_id: String,
        correct: bool,
        correct_index: u8,
        was_timeout: bool,
    },
    /// Broadcast: scores changed.
    ScoreUpdate {
        scores: ScoreBoard,
    },
    /// Broadcast: game over with final scores.
    GameEnded {
        final_scores: ScoreBoard,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Broadcast: the game had to end because of an integrity fault.
    GameError {
        message: String,
    },
    /// Broadcast: play-again tally changed.
    PlayAgainStatus {
        votes: usize,
        total_online: usize,
        required: usize,
    },
    /// Broadcast: the play-again window closed without quorum.
    PlayAgainFailed,
    /// Broadcast: lobby chat.
    LobbyMessage {
        from_uid: Uid,
        from_name: String,
        message: String,
    },
    /// Point-to-point chat relay.
    PrivateMessage {
        from_uid: Uid,
        message: String,
    },
    /// Point-to-point: the caller attached to a game already in progress.
    SpectatingActiveGame {
        room_id: RoomId,
    },
    /// Point-to-point server notice.
    Notice {
        message: String,
    },
    /// Point-to-point: a rejoin request could not be honored.
    RejoinError {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_wire_format_uses_type_and_data() {
        let event = ClientEvent::JoinRoom {
            room_code: "ABCDEF".to_string(),
            player_name: Some("Alice".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JoinRoom");
        assert_eq!(json["data"]["room_code"], "ABCDEF");
    }

    #[test]
    fn submit_answer_round_trips() {
        let raw = serde_json::json!({
            "type": "SubmitAnswer",
            "data": {
                "room_id": "6e4ef9a2-3a70-4cbd-a1d8-1f8e9a2b3c4d",
                "question_id": "3",
                "answer_index": 2
            }
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        match event {
            ClientEvent::SubmitAnswer {
                question_id,
                answer_index,
                ..
            } => {
                assert_eq!(question_id, "3");
                assert_eq!(answer_index, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn no_action_reply_serializes_flag() {
        let event = ServerEvent::NoAction {
            no_action_taken: true,
            reason: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "NoAction");
        assert_eq!(json["data"]["no_action_taken"], true);
        assert!(json["data"].get("reason").is_none());
    }
}
