use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{AuthError, TokenVerifier, VerifiedIdentity};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Unix expiry timestamp. Tokens without one never expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// HMAC-SHA256 token verifier.
///
/// Token format: `base64url(claims_json) . base64url(hmac(claims_b64))`.
/// The shared secret comes from the environment at startup; development
/// deployments point at a file, production injects the secret inline.
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
}

impl HmacTokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a token for the given claims. Used by development tooling and
    /// tests; production tokens come from the real identity provider.
    pub fn mint(&self, claims: &TokenClaims) -> String {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
        // SAFETY: HMAC-SHA256 accepts keys of any length.
        #[allow(clippy::expect_used)]
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{payload}.{signature}")
    }
}

#[async_trait]
impl TokenVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let (payload_b64, signature_b64) = token.split_once('.').ok_or(AuthError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::BadSignature)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::Malformed)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;

        if let Some(exp) = claims.exp {
            if exp < chrono::Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }

        if claims.uid.trim().is_empty() {
            return Err(AuthError::Malformed);
        }

        Ok(VerifiedIdentity {
            uid: claims.uid,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> HmacTokenVerifier {
        HmacTokenVerifier::new(b"test-secret".to_vec())
    }

    fn claims(uid: &str) -> TokenClaims {
        TokenClaims {
            uid: uid.to_string(),
            name: Some("Alice".to_string()),
            picture: None,
            exp: None,
        }
    }

    #[tokio::test]
    async fn minted_token_verifies() {
        let verifier = verifier();
        let token = verifier.mint(&claims("user-1"));
        let identity = verifier.verify(&token).await.unwrap();
        assert_eq!(identity.uid, "user-1");
        assert_eq!(identity.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let token = verifier().mint(&claims("user-1"));
        let other = HmacTokenVerifier::new(b"other-secret".to_vec());
        assert!(matches!(
            other.verify(&token).await,
            Err(AuthError::BadSignature)
        ));
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let verifier = verifier();
        let token = verifier.mint(&claims("user-1"));
        let (_, signature) = token.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims("user-2")).unwrap(),
        );
        let forged = format!("{forged_payload}.{signature}");
        assert!(matches!(
            verifier.verify(&forged).await,
            Err(AuthError::BadSignature)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = verifier();
        let mut expired = claims("user-1");
        expired.exp = Some(chrono::Utc::now().timestamp() - 60);
        let token = verifier.mint(&expired);
        assert!(matches!(verifier.verify(&token).await, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn garbage_is_malformed_not_a_panic() {
        let verifier = verifier();
        for garbage in ["", "abc", "a.b.c", "!!!.???"] {
            assert!(verifier.verify(garbage).await.is_err(), "{garbage:?}");
        }
    }
}
