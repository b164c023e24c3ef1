//! Configuration module for Quiz Rally.
//!
//! Provides configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides (nested `QUIZ_RALLY__*` and the
//!   deployment shorthands `PORT`, `CLIENT_ORIGIN`, `APP_ENV`)
//! - Sensible compiled-in defaults
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`server`]: Server behavior (room codes, play-again window, queues)
//! - [`security`]: Environment, origins and identity-token credentials
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Startup validation
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig, RotationPolicy};

pub use security::{Environment, SecurityConfig};

pub use server::ServerSection;

pub use types::Config;

pub use validation::validate_startup;
