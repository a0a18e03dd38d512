use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::{FromRow, Row, postgres::PgRow};
use std::fmt;

use super::scope::Scope;

/// A user account as stored in `users`.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let scope: String = row.try_get("scope")?;
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password")?,
            scope: decode_scope(&scope)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Parse the persisted delimited scope into a typed set.
pub(crate) fn decode_scope(value: &str) -> Result<Scope, sqlx::Error> {
    Scope::from_delimited(value).map_err(|err| {
        sqlx::Error::Decode(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid scope value: {err}"),
        )))
    })
}

/// Fields required to create a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub scope: Scope,
}

/// Replacement values for an existing user; `None` leaves a field untouched.
#[derive(Clone, Debug)]
pub struct UserChanges {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub scope: Option<Scope>,
}

impl UserChanges {
    /// A new password or scope invalidates the tokens issued under the old ones.
    #[must_use]
    pub fn revokes_tokens(&self) -> bool {
        self.password_hash.is_some() || self.scope.is_some()
    }
}

/// Outcome of inserting or updating a user.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(User),
    NotFound,
    /// The email is already taken by another account.
    Conflict,
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic shape check for an already normalized email.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}
