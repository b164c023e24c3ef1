//! Server behavior configuration types.

use super::defaults::{
    default_event_queue_capacity, default_max_message_size, default_play_again_window_secs,
    default_room_code_attempts,
};
use serde::{Deserialize, Serialize};

/// Server configuration for room and game management.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSection {
    /// Attempts at generating a unique room code before failing the create.
    #[serde(default = "default_room_code_attempts")]
    pub room_code_attempts: u32,
    /// Seconds the play-again vote window stays open.
    #[serde(default = "default_play_again_window_secs")]
    pub play_again_window_secs: u64,
    /// Outbound per-connection channel capacity.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// Maximum accepted inbound frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            room_code_attempts: default_room_code_attempts(),
            play_again_window_secs: default_play_again_window_secs(),
            event_queue_capacity: default_event_queue_capacity(),
            max_message_size: default_max_message_size(),
        }
    }
}
