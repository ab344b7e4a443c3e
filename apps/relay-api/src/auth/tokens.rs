//! Access-token issuance and verification (HS256 JWTs).

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{CredentialVerifier, Identity};
use crate::error::RelayError;

/// Claims embedded in an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: i64,
    /// Username at issue time, echoed into the identity.
    pub username: String,
    /// Issued-at (unix timestamp).
    pub iat: u64,
    /// Expiration (unix timestamp).
    pub exp: u64,
}

/// Symmetric signing/verification keys derived from the configured secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenKeys {
    pub fn from_secret(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Mint a signed access token for a user.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, RelayError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |e| {
                tracing::error!(?e, "failed to sign access token");
                RelayError::internal("Token signing failed")
            },
        )
    }

    /// Decode and validate an access token.
    pub fn decode(&self, token: &str) -> Result<Claims, RelayError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(?e, "token validation failed");
                RelayError::unauthorized("Invalid or expired token")
            })?;
        Ok(data.claims)
    }
}

#[async_trait]
impl CredentialVerifier for TokenKeys {
    async fn verify(&self, token: &str) -> Result<Identity, RelayError> {
        let claims = self.decode(token)?;
        Ok(Identity {
            user_id: claims.sub,
            username: claims.username,
        })
    }
}
