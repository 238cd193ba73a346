//! Type-qualified fingerprints: `"{type}/{id}"`
//!
//! A fingerprint collapses a polymorphic `(type, id)` reference into one
//! string so grant rows can be indexed and joined on a single key. It is
//! derived on demand from the entity, never cached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PermitError, Result};

/// Separator between the type qualifier and the identifier.
pub const SEPARATOR: char = '/';

/// Maximum encoded length in bytes.
///
/// A grant row key holds two length-prefixed fingerprints and an 8-byte row
/// id, and must fit LMDB's default 511-byte key limit.
pub const MAX_FINGERPRINT_LEN: usize = 250;

/// Anything that can be named in a grant row.
pub trait Fingerprintable {
    /// Stable type name, e.g. `"User"` or `"Comment"`.
    fn type_qualifier(&self) -> &str;

    /// Stable identifier; `None` when the entity has none yet (e.g. unsaved).
    fn identifier(&self) -> Option<String>;
}

/// Compute the fingerprint of an entity.
pub fn fingerprint<T: Fingerprintable + ?Sized>(entity: &T) -> Result<Fingerprint> {
    let id = entity.identifier().ok_or_else(|| {
        PermitError::NotFingerprintable(format!(
            "{} instance has no identifier",
            entity.type_qualifier()
        ))
    })?;
    Fingerprint::new(entity.type_qualifier(), &id)
}

/// Derived lookup key for an actor or target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(type_qualifier: &str, id: &str) -> Result<Self> {
        if type_qualifier.is_empty() {
            return Err(PermitError::NotFingerprintable("empty type qualifier".into()));
        }
        if type_qualifier.contains(SEPARATOR) {
            return Err(PermitError::NotFingerprintable(format!(
                "type qualifier '{type_qualifier}' contains '{SEPARATOR}'"
            )));
        }
        if id.is_empty() {
            return Err(PermitError::NotFingerprintable(format!(
                "{type_qualifier} identifier is empty"
            )));
        }
        let s = format!("{type_qualifier}{SEPARATOR}{id}");
        if s.len() > MAX_FINGERPRINT_LEN {
            return Err(PermitError::NotFingerprintable(format!(
                "fingerprint too long: {} bytes (max {MAX_FINGERPRINT_LEN})",
                s.len()
            )));
        }
        Ok(Self(s))
    }

    /// Parse from the `type/id` form. The identifier may itself contain `/`.
    pub fn parse(s: &str) -> Result<Self> {
        let (t, id) = s.split_once(SEPARATOR).ok_or_else(|| {
            PermitError::NotFingerprintable(format!("'{s}' is not in 'type/id' form"))
        })?;
        Self::new(t, id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn type_qualifier(&self) -> &str {
        self.split().0
    }

    pub fn id(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // validated on construction
        self.0.split_once(SEPARATOR).unwrap_or((&self.0, ""))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = PermitError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> String {
        f.0
    }
}

impl Fingerprintable for Fingerprint {
    fn type_qualifier(&self) -> &str {
        Fingerprint::type_qualifier(self)
    }

    fn identifier(&self) -> Option<String> {
        Some(self.id().to_string())
    }
}
