//! Timeout-bounded adapters over the repositories.
//!
//! Each repository call gets the configured deadline; a stalled backend turns
//! into `StoreUnavailable` instead of a hung request. Nothing here retries.

use std::{future::Future, sync::Arc, time::Duration};

use super::{
    clock::Clock,
    error::{AuthError, StoreError},
    models::{NewUser, User, UserChanges, WriteOutcome},
    repo::{TokenRepo, UserRepo},
    token::{Token, TokenDigest},
};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AuthError::from),
        Err(_) => Err(StoreError::Timeout(limit).into()),
    }
}

#[derive(Clone)]
pub struct TokenStore {
    repo: Arc<dyn TokenRepo>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl TokenStore {
    #[must_use]
    pub fn new(repo: Arc<dyn TokenRepo>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            repo,
            clock,
            timeout,
        }
    }

    /// Persist `token` as the only token of its user.
    ///
    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn insert(&self, token: &Token) -> Result<(), AuthError> {
        bounded(self.timeout, self.repo.replace_for_user(token)).await
    }

    /// Resolve a plaintext token to its owner and record.
    ///
    /// An expired row is deleted before `TokenExpired` is returned.
    ///
    /// # Errors
    /// `TokenNotFound`, `TokenExpired` or `StoreUnavailable`.
    pub async fn resolve(&self, plaintext: &str) -> Result<(User, Token), AuthError> {
        let digest = TokenDigest::from_plaintext(plaintext);
        let (user, token) = bounded(self.timeout, self.repo.find_by_digest(&digest))
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if token.is_expired_at(self.clock.now()) {
            tracing::debug!(user_id = user.id, "removing expired token");
            bounded(self.timeout, self.repo.delete_by_digest(&digest)).await?;
            return Err(AuthError::TokenExpired);
        }

        Ok((user, token))
    }

    /// Drop every token of `user_id`.
    ///
    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64, AuthError> {
        bounded(self.timeout, self.repo.delete_for_user(user_id)).await
    }
}

#[derive(Clone)]
pub struct UserStore {
    repo: Arc<dyn UserRepo>,
    timeout: Duration,
}

impl UserStore {
    #[must_use]
    pub fn new(repo: Arc<dyn UserRepo>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        bounded(self.timeout, self.repo.find_by_email(email)).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        bounded(self.timeout, self.repo.find_by_id(id)).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn list(&self) -> Result<Vec<User>, AuthError> {
        bounded(self.timeout, self.repo.list()).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn insert(&self, user: &NewUser) -> Result<WriteOutcome, AuthError> {
        bounded(self.timeout, self.repo.insert(user)).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn update(&self, id: i64, changes: &UserChanges) -> Result<WriteOutcome, AuthError> {
        bounded(self.timeout, self.repo.update(id, changes)).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn delete(&self, id: i64) -> Result<bool, AuthError> {
        bounded(self.timeout, self.repo.delete(id)).await
    }

    /// # Errors
    /// `StoreUnavailable` on timeout or database failure.
    pub async fn ping(&self) -> Result<(), AuthError> {
        bounded(self.timeout, self.repo.ping()).await
    }
}
