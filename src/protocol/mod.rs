// Protocol module: event types, validation, and room domain model

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod types;
pub mod validation;

pub use error_codes::ErrorCode;

pub use types::{
    GameSettings, Player, PublicQuestion, Question, Role, Room, RoomId, RoomState, ScoreBoard,
    StealAttempt, Uid, MAX_LOBBY_MESSAGE_LENGTH, MAX_PARTICIPANTS_PER_ROOM, MAX_PLAYERS_PER_ROOM,
    MAX_SPECTATORS_PER_ROOM, PLAY_AGAIN_REQUIRED_VOTES, ROOM_CODE_LENGTH,
};

pub use messages::{ClientEvent, GameSnapshot, RejoinSnapshot, ServerEvent};

pub use validation::{SettingsError, SettingsPatch};
