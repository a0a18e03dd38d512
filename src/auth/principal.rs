//! The caller a request was authenticated as.
//!
//! Only the gate can build one; handlers receive it as an extractor and never
//! see a request that skipped the token and scope checks.

use super::{models::User, scope::Scope, token::Token};

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    user: User,
    token: Token,
}

impl AuthenticatedUser {
    pub(crate) fn new(user: User, token: Token) -> Self {
        Self { user, token }
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Scope granted to the presented token, not to the user.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.token.scope
    }
}
