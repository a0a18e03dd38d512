//! Token issuance, authorization and revocation.
//!
//! Flow Overview:
//! 1) Issue: validate the request, check credentials, check the requested
//!    scope against the user's, then generate and persist a token.
//! 2) Authorize: parse the `Authorization` header, resolve the token, then
//!    check the route's required scope.
//! 3) Revoke: drop every token of a user.
//! 4) Bootstrap: create the first administrator at startup when asked to.
//!
//! Header shape and token length are checked before any store call.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    clock::Clock,
    error::AuthError,
    models::{NewUser, User, WriteOutcome, normalize_email, valid_email},
    password::PasswordHasher,
    principal::AuthenticatedUser,
    scope::{Scope, can_request_scope, has_scope},
    store::{TokenStore, UserStore},
    token::{IssuedToken, TOKEN_LENGTH, TokenTtlPolicy, generate},
};

/// What a caller sends to obtain a token.
#[derive(Debug)]
pub struct IssueRequest {
    pub email: String,
    pub password: SecretString,
    pub scope: Vec<String>,
    /// Minutes added to (or removed from) the base lifetime.
    pub expiry_minutes: i64,
}

/// Extract the token from `Bearer <token>`.
///
/// # Errors
/// `MissingAuthHeader` when absent or empty, `MalformedAuthHeader` for any
/// other shape or a token of the wrong length.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = match header {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::MissingAuthHeader),
    };

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if token.len() == TOKEN_LENGTH => Ok(token),
        _ => Err(AuthError::MalformedAuthHeader),
    }
}

pub struct Authenticator {
    users: UserStore,
    tokens: TokenStore,
    hasher: PasswordHasher,
    ttl: TokenTtlPolicy,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        users: UserStore,
        tokens: TokenStore,
        hasher: PasswordHasher,
        ttl: TokenTtlPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            ttl,
            clock,
        }
    }

    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Authenticate credentials and issue a token, replacing any previous one.
    ///
    /// # Errors
    /// `InvalidRequest`/`ExpiryOutOfRange` for bad input, `InvalidCredentials`,
    /// `ScopeNotGranted`, or an internal error.
    pub async fn issue(&self, request: IssueRequest) -> Result<(User, IssuedToken), AuthError> {
        let email = normalize_email(&request.email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidRequest("invalid email address".to_string()));
        }
        if request.password.expose_secret().is_empty() {
            return Err(AuthError::InvalidRequest("password is required".to_string()));
        }
        let requested = Scope::parse_list(&request.scope)
            .map_err(|err| AuthError::InvalidRequest(err.to_string()))?;
        let ttl = self.ttl.ttl_for(request.expiry_minutes)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.verify_dummy(&request.password).await;
            debug!("authentication failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .hasher
            .verify(&user.password_hash, &request.password)
            .await?
        {
            debug!(user_id = user.id, "authentication failed: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        can_request_scope(&user.scope, &requested)?;

        let issued = generate(user.id, ttl, requested, self.clock.now())?;
        self.tokens.insert(issued.token()).await?;

        info!(
            user_id = user.id,
            scope = %issued.token().scope,
            expiry = %issued.token().expiry,
            "token issued"
        );
        Ok((user, issued))
    }

    /// Resolve an `Authorization` header value and check it against `required`.
    ///
    /// # Errors
    /// Header, lookup and scope failures as `AuthError`.
    pub async fn authorize(
        &self,
        header: Option<&str>,
        required: &Scope,
    ) -> Result<AuthenticatedUser, AuthError> {
        let plaintext = parse_bearer(header)?;
        let (user, token) = self.tokens.resolve(plaintext).await?;
        has_scope(&token.scope, required)?;
        Ok(AuthenticatedUser::new(user, token))
    }

    /// Remove every token held by `user_id`.
    ///
    /// # Errors
    /// `StoreUnavailable` on store failure.
    pub async fn revoke(&self, user_id: i64) -> Result<u64, AuthError> {
        let removed = self.tokens.delete_for_user(user_id).await?;
        info!(user_id, removed, "tokens revoked");
        Ok(removed)
    }

    /// Create an account holding every capability unless `email` already exists.
    /// Returns `true` when a user was created.
    ///
    /// # Errors
    /// `InvalidRequest` for a malformed email or empty password, or a store error.
    pub async fn ensure_admin(&self, email: &str, password: &SecretString) -> Result<bool, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidRequest("invalid admin email".to_string()));
        }
        if password.expose_secret().is_empty() {
            return Err(AuthError::InvalidRequest("admin password is required".to_string()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            debug!("bootstrap admin already present");
            return Ok(false);
        }

        let new_user = NewUser {
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
            email,
            password_hash: self.hasher.hash(password).await?,
            scope: Scope::all(),
        };
        match self.users.insert(&new_user).await? {
            WriteOutcome::Written(user) => {
                info!(user_id = user.id, "bootstrap admin created");
                Ok(true)
            }
            // Lost a race with another instance creating the same account.
            WriteOutcome::Conflict | WriteOutcome::NotFound => Ok(false),
        }
    }
}
