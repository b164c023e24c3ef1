//! Root configuration types.

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::security::SecurityConfig;
use super::server::ServerSection;
use serde::{Deserialize, Serialize};

/// Root configuration struct for Quiz Rally.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// TCP port the HTTP/WebSocket listener binds (also via `PORT`)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Room and game behavior knobs
    #[serde(default)]
    pub server: ServerSection,
    /// Log output, level and rotation
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Origins, environment and identity credentials
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerSection::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}
