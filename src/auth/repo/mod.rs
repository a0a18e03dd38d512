//! Storage seams for users and tokens.
//!
//! The auth core only talks to these traits; `postgres` holds the production
//! implementations and the unit tests run against an in-memory double.

use async_trait::async_trait;

use super::{
    error::StoreError,
    models::{NewUser, User, UserChanges, WriteOutcome},
    token::{Token, TokenDigest},
};

pub mod postgres;

pub use postgres::{PgTokenRepo, PgUserRepo};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Look a user up by an already normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// All users ordered by last then first name.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn insert(&self, user: &NewUser) -> Result<WriteOutcome, StoreError>;

    /// Apply `changes`; when they revoke tokens the user's tokens are deleted
    /// in the same transaction.
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<WriteOutcome, StoreError>;

    /// Delete a user and, through the foreign key, its tokens.
    /// Returns `false` when no such user exists.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Atomically drop every token of `token.user_id` and insert `token`.
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError>;

    /// Find a token by digest together with its owner.
    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<(User, Token)>, StoreError>;

    async fn delete_by_digest(&self, digest: &TokenDigest) -> Result<(), StoreError>;

    /// Returns the number of rows removed.
    async fn delete_for_user(&self, user_id: i64) -> Result<u64, StoreError>;
}
