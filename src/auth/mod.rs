//! Identity verification for incoming connections.
//!
//! Every WebSocket connection must present a bearer token during the
//! handshake. The verifier resolves it to a stable uid plus optional
//! profile fields; that identity is stapled to the connection and every
//! inbound event uses it. Client-supplied uids are ignored.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

mod hmac_verifier;

pub use hmac_verifier::{HmacTokenVerifier, TokenClaims};

/// Stable identity returned by the token verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl VerifiedIdentity {
    /// Display name with a uid-derived fallback for tokens without one.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("player-{}", &self.uid[..self.uid.len().min(6)]),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Token-verifier collaborator.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token and return the identity it carries.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}
