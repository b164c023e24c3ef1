//! Security and authentication configuration types.

use super::defaults::default_dev_origins;
use serde::{Deserialize, Serialize};

/// Deployment environment. Controls error-message exposure: production
/// replies never leak internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Security configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Deployment environment (also settable via `APP_ENV`).
    #[serde(default)]
    pub environment: Environment,
    /// Additional allowed browser origin (from `CLIENT_ORIGIN`).
    #[serde(default)]
    pub client_origin: Option<String>,
    /// Built-in development origins, always allowed alongside `client_origin`.
    #[serde(default = "default_dev_origins")]
    pub dev_origins: Vec<String>,
    /// Inline identity-token secret (production injection).
    #[serde(default, skip_serializing)]
    pub auth_secret: Option<String>,
    /// Path to a file holding the identity-token secret (development).
    #[serde(default)]
    pub auth_secret_path: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            client_origin: None,
            dev_origins: default_dev_origins(),
            auth_secret: None,
            auth_secret_path: None,
        }
    }
}

impl SecurityConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Every origin the CORS layer should allow.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = self.dev_origins.clone();
        if let Some(origin) = &self.client_origin {
            let trimmed = origin.trim();
            if !trimmed.is_empty() && !origins.iter().any(|o| o == trimmed) {
                origins.push(trimmed.to_string());
            }
        }
        origins
    }

    /// Resolve the identity-token secret: inline value wins, then the
    /// secret file. Missing credentials are a startup error.
    pub fn resolve_auth_secret(&self) -> anyhow::Result<Vec<u8>> {
        if let Some(secret) = &self.auth_secret {
            let trimmed = secret.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.as_bytes().to_vec());
            }
        }

        if let Some(path) = &self.auth_secret_path {
            let contents = std::fs::read_to_string(path).map_err(|err| {
                anyhow::anyhow!("failed to read auth secret file {path}: {err}")
            })?;
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                return Err(anyhow::anyhow!("auth secret file {path} is empty"));
            }
            return Ok(trimmed.as_bytes().to_vec());
        }

        Err(anyhow::anyhow!(
            "no identity-token secret configured; set QUIZ_RALLY_AUTH_SECRET or QUIZ_RALLY_AUTH_SECRET_PATH"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_origin_appended_once() {
        let mut config = SecurityConfig {
            client_origin: Some("https://play.example.com".to_string()),
            ..Default::default()
        };
        let origins = config.allowed_origins();
        assert!(origins.contains(&"https://play.example.com".to_string()));
        assert!(origins.len() > 1, "dev origins preserved");

        config.client_origin = Some(config.dev_origins[0].clone());
        let origins = config.allowed_origins();
        assert_eq!(origins.len(), config.dev_origins.len());
    }

    #[test]
    fn inline_secret_wins_over_path() {
        let config = SecurityConfig {
            auth_secret: Some("inline-secret".to_string()),
            auth_secret_path: Some("/nonexistent/path".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_auth_secret().unwrap(), b"inline-secret");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let config = SecurityConfig::default();
        assert!(config.resolve_auth_secret().is_err());
    }
}
