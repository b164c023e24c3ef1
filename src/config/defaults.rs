//! Default value functions for configuration fields.
//!
//! All defaults used by serde's `#[serde(default = ...)]` attributes live
//! here so the compiled-in configuration is visible in one place.

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    4080
}

// =============================================================================
// Server Defaults
// =============================================================================

/// Attempts at generating a unique room code before giving up.
pub const fn default_room_code_attempts() -> u32 {
    8
}

/// Seconds the play-again vote window stays open.
pub const fn default_play_again_window_secs() -> u64 {
    30
}

/// Outbound per-connection channel capacity.
pub const fn default_event_queue_capacity() -> usize {
    64
}

/// Maximum accepted inbound frame size in bytes.
pub const fn default_max_message_size() -> usize {
    16 * 1024
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_dev_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}
