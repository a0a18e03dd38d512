//! Auth configuration and the shared state handed to handlers.

use std::{sync::Arc, time::Duration};

use super::{
    clock::Clock,
    password::{DEFAULT_COST, PasswordHasher},
    repo::{TokenRepo, UserRepo},
    service::Authenticator,
    store::{DEFAULT_STORE_TIMEOUT, TokenStore, UserStore},
    token::TokenTtlPolicy,
};

const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:4000";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    store_timeout: Duration,
    ttl_policy: TokenTtlPolicy,
    bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            ttl_policy: TokenTtlPolicy::default(),
            bcrypt_cost: DEFAULT_COST,
        }
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_token_ttl(
        mut self,
        base_seconds: i64,
        min_extension_minutes: i64,
        max_extension_minutes: i64,
    ) -> Self {
        self.ttl_policy =
            TokenTtlPolicy::from_seconds(base_seconds, min_extension_minutes, max_extension_minutes);
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    #[must_use]
    pub fn ttl_policy(&self) -> TokenTtlPolicy {
        self.ttl_policy
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

pub struct AuthState {
    config: AuthConfig,
    authenticator: Authenticator,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepo>,
        tokens: Arc<dyn TokenRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let authenticator = Authenticator::new(
            UserStore::new(users, config.store_timeout()),
            TokenStore::new(tokens, clock.clone(), config.store_timeout()),
            PasswordHasher::new(config.bcrypt_cost()),
            config.ttl_policy(),
            clock,
        );
        Self {
            config,
            authenticator,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}
