use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling in ack replies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors
    Unauthorized,
    InvalidToken,

    // Validation errors
    InvalidInput,
    InvalidSettings,
    MessageTooLarge,

    // Room errors
    RoomNotFound,
    RoomEnded,
    RoomFull,
    SpectatorsFull,
    NotInRoom,
    NotHost,
    RoomCreationFailed,
    InvalidRoomState,

    // Game errors
    NotYourTurn,
    NotYourSteal,
    GameNotActive,
    NotEnoughPlayers,
    NotEnoughQuestions,
    StaleSubmission,

    // Server errors
    InternalError,
    StorageError,
}

impl ErrorCode {
    /// Human-readable description, safe to surface to clients.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Access denied. Authentication credentials are missing or invalid.",
            Self::InvalidToken => "The identity token is invalid, malformed, or expired.",
            Self::InvalidInput => "The provided input is invalid or malformed.",
            Self::InvalidSettings => "One or more game settings are outside their allowed range.",
            Self::MessageTooLarge => "The message exceeds the maximum allowed length.",
            Self::RoomNotFound => "No room exists with that code or id.",
            Self::RoomEnded => "The game in this room has already ended.",
            Self::RoomFull => "The room has reached its maximum player capacity.",
            Self::SpectatorsFull => "The room has reached its maximum spectator capacity.",
            Self::NotInRoom => "You are not a participant in this room.",
            Self::NotHost => "Only the room host may perform this action.",
            Self::RoomCreationFailed => "Failed to create the room. Please try again.",
            Self::InvalidRoomState => "The room is in the wrong state for this action.",
            Self::NotYourTurn => "It is not your turn to answer.",
            Self::NotYourSteal => "You are not the designated stealer for this question.",
            Self::GameNotActive => "There is no active game in this room.",
            Self::NotEnoughPlayers => "At least two online players are required to start.",
            Self::NotEnoughQuestions => "The question source returned too few questions.",
            Self::StaleSubmission => "The submission refers to a question that has already passed.",
            Self::InternalError => "An internal server error occurred. Please try again.",
            Self::StorageError => "A storage error occurred while processing your request.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
