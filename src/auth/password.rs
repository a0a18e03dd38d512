//! bcrypt password hashing and verification.
//!
//! Both operations are CPU bound and run on the blocking pool. The cost factor
//! only applies when hashing; verification reads it from the stored hash.

use secrecy::{ExposeSecret, SecretString};

use super::error::AuthError;

pub const DEFAULT_COST: u32 = 12;

// Well-formed cost 12 hash, compared against when the email is unknown.
const DUMMY_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with a fresh salt.
    ///
    /// # Errors
    /// Returns an error if the cost is out of bcrypt's range or the task fails.
    pub async fn hash(&self, password: &SecretString) -> Result<String, AuthError> {
        let cost = self.cost;
        let password = password.expose_secret().to_string();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    /// Compare a candidate password with a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch; the comparison itself is constant time.
    ///
    /// # Errors
    /// `PasswordHash` when the stored hash is malformed.
    pub async fn verify(
        &self,
        stored_hash: &str,
        candidate: &SecretString,
    ) -> Result<bool, AuthError> {
        let stored_hash = stored_hash.to_string();
        let candidate = candidate.expose_secret().to_string();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &stored_hash)).await??;
        Ok(matches)
    }

    /// Spend one comparison so unknown emails cost as much as wrong passwords.
    pub async fn verify_dummy(&self, candidate: &SecretString) {
        let _ = self.verify(DUMMY_HASH, candidate).await;
    }
}
