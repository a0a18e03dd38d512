//! Opaque bearer token generation and digests.
//!
//! Flow Overview: draw 16 bytes from the OS random source, encode them as
//! unpadded base-32 (26 characters), and keep only the SHA-256 digest of that
//! text for storage and lookup. The plaintext leaves the process once, in the
//! issuance response.

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use data_encoding::BASE32_NOPAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::fmt;

use super::{error::AuthError, scope::Scope};

/// Random bytes drawn per token.
pub const TOKEN_BYTES: usize = 16;
/// Length of the encoded plaintext for `TOKEN_BYTES` of input.
pub const TOKEN_LENGTH: usize = 26;

const DEFAULT_BASE_TTL_SECONDS: i64 = 2 * 60 * 60;
const DEFAULT_MIN_EXTENSION_MINUTES: i64 = -55;
const DEFAULT_MAX_EXTENSION_MINUTES: i64 = 23 * 60;

/// Longest configurable base lifetime: one year.
pub const MAX_BASE_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
/// Largest configurable extension in either direction: 30 days.
pub const MAX_EXTENSION_MINUTES: i64 = 30 * 24 * 60;

/// SHA-256 digest of a token plaintext.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    #[must_use]
    pub fn from_plaintext(plaintext: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Rebuild a digest read back from storage.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0[..4].iter().map(|byte| format!("{byte:02x}")).collect();
        write!(f, "TokenDigest({prefix}..)")
    }
}

/// The persisted view of an authentication grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub user_id: i64,
    pub digest: TokenDigest,
    pub scope: Scope,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// Validity ends at `expiry`: the instant itself is already expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}

/// A freshly generated token together with its plaintext.
#[derive(Clone)]
pub struct IssuedToken {
    plaintext: String,
    token: Token,
}

impl IssuedToken {
    #[must_use]
    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }

    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"[REDACTED]")
            .field("token", &self.token)
            .finish()
    }
}

/// Generate a token for `user_id` that expires `ttl` after `issued_at`.
///
/// # Errors
/// `RandomSourceExhausted` when the OS random source fails, `LifetimeOverflow`
/// when the expiry cannot be represented.
pub fn generate(
    user_id: i64,
    ttl: TimeDelta,
    scope: Scope,
    issued_at: DateTime<Utc>,
) -> Result<IssuedToken, AuthError> {
    let expiry = issued_at
        .checked_add_signed(ttl)
        .ok_or(AuthError::LifetimeOverflow(ttl))?;

    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(AuthError::RandomSourceExhausted)?;

    let plaintext = BASE32_NOPAD.encode(&bytes);
    let digest = TokenDigest::from_plaintext(&plaintext);

    Ok(IssuedToken {
        plaintext,
        token: Token {
            user_id,
            digest,
            scope,
            // Postgres keeps microseconds; match it so stored and issued expiries agree.
            expiry: expiry.trunc_subsecs(6),
        },
    })
}

/// Token lifetime: a fixed base plus a bounded caller-requested extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtlPolicy {
    base: TimeDelta,
    min_extension_minutes: i64,
    max_extension_minutes: i64,
}

impl Default for TokenTtlPolicy {
    fn default() -> Self {
        Self {
            base: TimeDelta::seconds(DEFAULT_BASE_TTL_SECONDS),
            min_extension_minutes: DEFAULT_MIN_EXTENSION_MINUTES,
            max_extension_minutes: DEFAULT_MAX_EXTENSION_MINUTES,
        }
    }
}

impl TokenTtlPolicy {
    /// Out-of-range settings are clamped: the base to `1s..=MAX_BASE_TTL_SECONDS`,
    /// each extension bound to `±MAX_EXTENSION_MINUTES`.
    #[must_use]
    pub fn new(base: TimeDelta, min_extension_minutes: i64, max_extension_minutes: i64) -> Self {
        let bound = |minutes: i64| minutes.clamp(-MAX_EXTENSION_MINUTES, MAX_EXTENSION_MINUTES);
        Self {
            base: base.clamp(
                TimeDelta::seconds(1),
                TimeDelta::seconds(MAX_BASE_TTL_SECONDS),
            ),
            min_extension_minutes: bound(min_extension_minutes),
            max_extension_minutes: bound(max_extension_minutes),
        }
    }

    /// Like [`TokenTtlPolicy::new`] with the base given in seconds.
    #[must_use]
    pub fn from_seconds(
        base_seconds: i64,
        min_extension_minutes: i64,
        max_extension_minutes: i64,
    ) -> Self {
        let base = TimeDelta::try_seconds(base_seconds.clamp(1, MAX_BASE_TTL_SECONDS))
            .unwrap_or(TimeDelta::seconds(DEFAULT_BASE_TTL_SECONDS));
        Self::new(base, min_extension_minutes, max_extension_minutes)
    }

    #[must_use]
    pub fn base(&self) -> TimeDelta {
        self.base
    }

    /// Resolve the TTL for a requested extension.
    ///
    /// # Errors
    /// `ExpiryOutOfRange` when the extension is outside the configured bounds
    /// or would leave no lifetime at all.
    pub fn ttl_for(&self, extension_minutes: i64) -> Result<TimeDelta, AuthError> {
        let out_of_range = AuthError::ExpiryOutOfRange {
            requested: extension_minutes,
            min: self.min_extension_minutes,
            max: self.max_extension_minutes,
        };
        if !(self.min_extension_minutes..=self.max_extension_minutes).contains(&extension_minutes)
        {
            return Err(out_of_range);
        }
        TimeDelta::try_minutes(extension_minutes)
            .and_then(|extension| self.base.checked_add(&extension))
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or(out_of_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scope::Capability;
    use std::collections::HashSet;

    fn issue() -> Result<IssuedToken, AuthError> {
        generate(7, TimeDelta::hours(2), Scope::from([Capability::ReadA]), Utc::now())
    }

    #[test]
    fn plaintext_is_26_unpadded_base32_chars() -> Result<(), AuthError> {
        for _ in 0..64 {
            let issued = issue()?;
            assert_eq!(issued.plaintext().len(), TOKEN_LENGTH);
            assert!(!issued.plaintext().contains('='));
            let decoded = BASE32_NOPAD.decode(issued.plaintext().as_bytes());
            assert_eq!(decoded.map(|bytes| bytes.len()).ok(), Some(TOKEN_BYTES));
        }
        Ok(())
    }

    #[test]
    fn digest_matches_recomputation() -> Result<(), AuthError> {
        let issued = issue()?;
        assert_eq!(
            issued.token().digest,
            TokenDigest::from_plaintext(issued.plaintext())
        );
        assert_ne!(issued.token().digest, TokenDigest::from_plaintext("other"));
        Ok(())
    }

    #[test]
    fn issuances_do_not_collide() -> Result<(), AuthError> {
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let issued = issue()?;
            assert!(seen.insert(issued.token().digest));
        }
        Ok(())
    }

    #[test]
    fn expiry_is_issuance_plus_ttl() -> Result<(), AuthError> {
        let issued_at = Utc::now().trunc_subsecs(6);
        let issued = generate(1, TimeDelta::minutes(90), Scope::empty(), issued_at)?;
        assert_eq!(issued.token().expiry, issued_at + TimeDelta::minutes(90));
        assert_eq!(issued.token().user_id, 1);
        Ok(())
    }

    #[test]
    fn expiry_instant_is_exclusive() -> Result<(), AuthError> {
        let issued_at = Utc::now().trunc_subsecs(6);
        let issued = generate(1, TimeDelta::seconds(10), Scope::empty(), issued_at)?;
        let expiry = issued.token().expiry;
        assert!(!issued.token().is_expired_at(expiry - TimeDelta::seconds(1)));
        assert!(issued.token().is_expired_at(expiry));
        assert!(issued.token().is_expired_at(expiry + TimeDelta::seconds(1)));
        Ok(())
    }

    #[test]
    fn debug_output_redacts_plaintext() -> Result<(), AuthError> {
        let issued = issue()?;
        let rendered = format!("{issued:?}");
        assert!(!rendered.contains(issued.plaintext()));
        assert!(rendered.contains("[REDACTED]"));
        Ok(())
    }

    #[test]
    fn digest_round_trips_through_bytes() {
        let digest = TokenDigest::from_plaintext("ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(TokenDigest::from_slice(digest.as_bytes()), Some(digest));
        assert_eq!(TokenDigest::from_slice(&[0u8; 5]), None);
    }

    #[test]
    fn ttl_policy_bounds() {
        let policy = TokenTtlPolicy::default();
        assert_eq!(policy.ttl_for(0).ok(), Some(TimeDelta::hours(2)));
        assert_eq!(policy.ttl_for(-55).ok(), Some(TimeDelta::minutes(65)));
        assert_eq!(policy.ttl_for(1380).ok(), Some(TimeDelta::hours(25)));
        assert!(matches!(
            policy.ttl_for(-56),
            Err(AuthError::ExpiryOutOfRange { requested: -56, min: -55, max: 1380 })
        ));
        assert!(policy.ttl_for(1381).is_err());
    }

    #[test]
    fn ttl_policy_clamps_extreme_settings() {
        let policy = TokenTtlPolicy::new(TimeDelta::hours(2), -55, 1_000_000_000_000);
        assert!(matches!(
            policy.ttl_for(1_000_000_000_000),
            Err(AuthError::ExpiryOutOfRange { max: MAX_EXTENSION_MINUTES, .. })
        ));
        let longest = policy.ttl_for(MAX_EXTENSION_MINUTES);
        assert_eq!(
            longest.ok(),
            Some(TimeDelta::hours(2) + TimeDelta::days(30))
        );

        let policy = TokenTtlPolicy::from_seconds(i64::MAX, i64::MIN, i64::MAX);
        assert_eq!(policy.base(), TimeDelta::seconds(MAX_BASE_TTL_SECONDS));
        assert!(policy.ttl_for(i64::MAX).is_err());
        assert!(policy.ttl_for(i64::MIN).is_err());
        assert!(policy.ttl_for(MAX_EXTENSION_MINUTES).is_ok());
    }

    #[test]
    fn extension_cannot_leave_a_non_positive_lifetime() {
        let policy = TokenTtlPolicy::from_seconds(60, -10, 10);
        assert!(matches!(
            policy.ttl_for(-1),
            Err(AuthError::ExpiryOutOfRange { requested: -1, .. })
        ));
        assert_eq!(policy.ttl_for(1).ok(), Some(TimeDelta::minutes(2)));
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let result = generate(1, TimeDelta::MAX, Scope::empty(), Utc::now());
        assert!(matches!(result, Err(AuthError::LifetimeOverflow(_))));
    }
}
