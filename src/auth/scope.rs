//! Capability vocabulary and scope containment checks.
//!
//! Scopes are sets: order and duplicates never matter. A route's required
//! scope must be wholly contained in a token's scope, and a token's scope must
//! be contained in its user's scope at issuance time.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;

use super::error::AuthError;

const DELIMITER: &str = ",";

/// A single permission from the closed vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "read:a")]
    ReadA,
    #[serde(rename = "write:a")]
    WriteA,
    #[serde(rename = "read:b")]
    ReadB,
    #[serde(rename = "write:b")]
    WriteB,
}

impl Capability {
    pub const ALL: [Self; 4] = [Self::ReadA, Self::WriteA, Self::ReadB, Self::WriteB];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReadA => "read:a",
            Self::WriteA => "write:a",
            Self::ReadB => "read:b",
            Self::WriteB => "write:b",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid scope '{0}'")]
pub struct ScopeParseError(pub String);

impl FromStr for Capability {
    type Err = ScopeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.as_str() == value)
            .ok_or_else(|| ScopeParseError(value.to_string()))
    }
}

/// An unordered set of capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(BTreeSet<Capability>);

impl Scope {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every capability in the vocabulary.
    #[must_use]
    pub fn all() -> Self {
        Self::from(Capability::ALL)
    }

    /// Parse a list of capability names, e.g. a request body's `scope` array.
    ///
    /// # Errors
    /// Returns the first name that is not part of the vocabulary.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Self, ScopeParseError> {
        names
            .iter()
            .map(|name| name.as_ref().trim().parse::<Capability>())
            .collect()
    }

    /// Parse the comma-delimited form used by the database.
    ///
    /// # Errors
    /// Returns the first segment that is not part of the vocabulary.
    pub fn from_delimited(value: &str) -> Result<Self, ScopeParseError> {
        value
            .split(DELIMITER)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::parse::<Capability>)
            .collect()
    }

    #[must_use]
    pub fn to_delimited(&self) -> String {
        self.0
            .iter()
            .map(|capability| capability.as_str())
            .collect::<Vec<_>>()
            .join(DELIMITER)
    }

    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// First capability of `other` this scope lacks, if any.
    fn first_missing(&self, other: &Self) -> Option<Capability> {
        other.iter().find(|capability| !self.contains(*capability))
    }
}

impl FromIterator<Capability> for Scope {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Capability; N]> for Scope {
    fn from(capabilities: [Capability; N]) -> Self {
        capabilities.into_iter().collect()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_delimited())
    }
}

/// Check that a token's scope covers a route's required scope.
///
/// An empty requirement always passes.
///
/// # Errors
/// `InsufficientScope` naming the first missing capability.
pub fn has_scope(token_scope: &Scope, required: &Scope) -> Result<(), AuthError> {
    match token_scope.first_missing(required) {
        Some(capability) => Err(AuthError::InsufficientScope(capability)),
        None => Ok(()),
    }
}

/// Check that a user may ask for `requested` when a token is issued.
///
/// # Errors
/// `ScopeNotGranted` naming the first capability the user does not hold.
pub fn can_request_scope(user_scope: &Scope, requested: &Scope) -> Result<(), AuthError> {
    match user_scope.first_missing(requested) {
        Some(capability) => Err(AuthError::ScopeNotGranted(capability)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::{ReadA, ReadB, WriteA, WriteB};

    #[test]
    fn has_scope_accepts_subset() {
        assert!(has_scope(&Scope::from([ReadA, WriteA]), &Scope::from([ReadA])).is_ok());
    }

    #[test]
    fn has_scope_names_missing_capability() {
        let result = has_scope(&Scope::from([ReadA]), &Scope::from([WriteA]));
        assert!(matches!(result, Err(AuthError::InsufficientScope(WriteA))));
    }

    #[test]
    fn has_scope_empty_requirement_always_passes() {
        assert!(has_scope(&Scope::empty(), &Scope::empty()).is_ok());
        assert!(has_scope(&Scope::all(), &Scope::empty()).is_ok());
    }

    #[test]
    fn has_scope_reports_first_missing_in_vocabulary_order() {
        let result = has_scope(&Scope::from([ReadA]), &Scope::from([WriteB, WriteA]));
        assert!(matches!(result, Err(AuthError::InsufficientScope(WriteA))));
    }

    #[test]
    fn can_request_scope_rejects_escalation() {
        let user = Scope::from([ReadA, WriteA]);
        assert!(can_request_scope(&user, &Scope::from([ReadA])).is_ok());
        assert!(can_request_scope(&user, &Scope::empty()).is_ok());
        assert!(matches!(
            can_request_scope(&user, &Scope::from([ReadA, ReadB])),
            Err(AuthError::ScopeNotGranted(ReadB))
        ));
    }

    #[test]
    fn duplicates_and_order_are_irrelevant() -> Result<(), ScopeParseError> {
        let left = Scope::parse_list(&["write:a", "read:a", "write:a"])?;
        let right = Scope::parse_list(&["read:a", "write:a"])?;
        assert_eq!(left, right);
        assert_eq!(left.len(), 2);
        Ok(())
    }

    #[test]
    fn parse_list_rejects_unknown_capability() {
        let result = Scope::parse_list(&["read:a", "delete:everything"]);
        assert_eq!(result, Err(ScopeParseError("delete:everything".to_string())));
    }

    #[test]
    fn delimited_form_skips_blank_segments() -> Result<(), ScopeParseError> {
        assert_eq!(Scope::from_delimited("")?, Scope::empty());
        assert_eq!(
            Scope::from_delimited("read:a, write:b,,")?,
            Scope::from([ReadA, WriteB])
        );
        assert_eq!(Scope::all().to_delimited(), "read:a,write:a,read:b,write:b");
        Ok(())
    }

    #[test]
    fn serializes_as_string_array() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(Scope::from([WriteA, ReadA]))?;
        assert_eq!(value, serde_json::json!(["read:a", "write:a"]));
        Ok(())
    }
}
