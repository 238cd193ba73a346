//! Graduated access decisions

use std::fmt;

use serde::Serialize;

/// How much access was granted. The set is open: callers add their own
/// levels with [`AccessLevel::Named`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessLevel {
    /// Visible to anyone.
    Public,
    /// Granted to this actor specifically.
    Private,
    /// The actor owns the object.
    Owner,
    Named(&'static str),
}

impl AccessLevel {
    pub fn name(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
            AccessLevel::Owner => "owner",
            AccessLevel::Named(n) => n,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a permission check. Returned to callers as-is, never
/// collapsed to a boolean, so they can branch on the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessDecision {
    Granted(AccessLevel),
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn is_denied(&self) -> bool {
        !self.is_granted()
    }

    pub fn level(&self) -> Option<AccessLevel> {
        match self {
            AccessDecision::Granted(level) => Some(*level),
            AccessDecision::Denied => None,
        }
    }
}

impl From<Option<AccessLevel>> for AccessDecision {
    fn from(level: Option<AccessLevel>) -> Self {
        level.map_or(AccessDecision::Denied, AccessDecision::Granted)
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Granted(level) => write!(f, "granted({level})"),
            AccessDecision::Denied => f.write_str("denied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_distinct_values() {
        let d = AccessDecision::Granted(AccessLevel::Owner);
        assert!(d.is_granted());
        assert_eq!(d.level(), Some(AccessLevel::Owner));
        assert_ne!(d, AccessDecision::Granted(AccessLevel::Public));
        assert_eq!(AccessDecision::from(None), AccessDecision::Denied);
        assert_eq!(AccessLevel::Named("moderator").to_string(), "moderator");
    }
}
