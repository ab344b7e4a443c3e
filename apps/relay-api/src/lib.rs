pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use auth::tokens::TokenKeys;
use auth::CredentialVerifier;
use config::Config;
use gateway::channel::ChannelResolver;
use gateway::fanout::FanoutRouter;
use gateway::membership::MembershipSynchronizer;
use gateway::presence::PresenceRegistry;
use gateway::registry::SessionRegistry;
use store::ChatStore;

/// Shared application state available to all route handlers and gateway
/// sessions.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub tokens: Arc<TokenKeys>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub registry: Arc<SessionRegistry>,
    pub presence: Arc<PresenceRegistry>,
    pub channels: Arc<ChannelResolver>,
    pub fanout: Arc<FanoutRouter>,
    pub membership: Arc<MembershipSynchronizer>,
}

impl AppState {
    /// Wire the relay core around a store and token keys.
    pub fn new(config: Config, store: Arc<dyn ChatStore>) -> Self {
        let tokens = Arc::new(TokenKeys::from_secret(
            &config.jwt_secret,
            config.token_ttl_secs,
        ));
        let registry = Arc::new(SessionRegistry::new());
        let presence = Arc::new(PresenceRegistry::new());
        let channels = Arc::new(ChannelResolver::new(store.clone(), &config));
        let fanout = Arc::new(FanoutRouter::new(registry.clone(), store.clone()));
        let membership = Arc::new(MembershipSynchronizer::new(
            registry.clone(),
            channels.clone(),
            store.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            verifier: tokens.clone(),
            tokens,
            registry,
            presence,
            channels,
            fanout,
            membership,
        }
    }
}
