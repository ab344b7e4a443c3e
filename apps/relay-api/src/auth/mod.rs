pub mod middleware;
pub mod password;
pub mod tokens;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::RelayError;

/// A verified identity: who a credential belongs to.
///
/// Established once per connection at handshake time and never updated from
/// client-supplied display data afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Credential verification seam consumed by the gateway.
///
/// The gateway never inspects tokens itself; it hands the opaque credential
/// to this trait and gets back an [`Identity`] or `Unauthorized`.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, RelayError>;
}
