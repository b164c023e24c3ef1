//! Configuration validation functions.

use super::Config;

/// Validate startup requirements.
///
/// Missing identity credentials fail hard: the server cannot authenticate
/// anyone without them, so a non-zero exit at startup beats a dead socket
/// endpoint.
pub fn validate_startup(config: &Config) -> anyhow::Result<()> {
    let mut problems: Vec<String> = Vec::new();

    if let Err(err) = config.security.resolve_auth_secret() {
        problems.push(err.to_string());
    }

    if config.security.is_production() && config.security.client_origin.is_none() {
        problems.push(
            "CLIENT_ORIGIN is not set; production deployments should pin the browser origin"
                .to_string(),
        );
    }

    if config.server.room_code_attempts == 0 {
        problems.push("server.room_code_attempts must be at least 1".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(problems.join("\n")))
    }
}
