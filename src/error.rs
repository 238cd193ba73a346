//! Error types for permitbit
//!
//! Configuration mistakes (duplicate or unknown permissions, bad class
//! declarations) are errors. Access outcomes never are: a denied request is
//! an [`AccessDecision::Denied`](crate::AccessDecision::Denied) value.

/// The main error type for permitbit operations
#[derive(Debug, thiserror::Error)]
pub enum PermitError {
    /// A permission name was registered twice.
    #[error("permission '{0}' is already registered")]
    DuplicatePermission(String),

    /// A permission name was looked up but never registered.
    #[error("permission '{0}' is not registered")]
    UnknownPermission(String),

    /// Every one of the 64 mask bits is already taken.
    #[error("no free bit left for permission '{0}'")]
    PermissionSpaceExhausted(String),

    /// A composite permission resolved to an empty mask.
    #[error("composite permission '{0}' names no bits")]
    EmptyComposite(String),

    /// A grant resolved to an empty mask; nothing was written.
    #[error("grant of {target} to {actor} carries no permission bits")]
    EmptyGrant { target: String, actor: String },

    /// An entity cannot produce a fingerprint: it has no identifier, an
    /// empty or `/`-bearing type qualifier, or an encoded `type/id` longer
    /// than [`MAX_FINGERPRINT_LEN`](crate::MAX_FINGERPRINT_LEN) bytes.
    #[error("not fingerprintable: {0}")]
    NotFingerprintable(String),

    /// Declaring this parent would make a class its own ancestor.
    #[error("class {class} cannot extend {parent}: ancestry cycle")]
    ClassCycle { class: String, parent: String },

    /// A class was declared again with a different parent.
    #[error("class {0} is already declared with another parent")]
    ClassRedeclared(String),

    /// No policy has been installed for this process.
    #[error("no policy installed")]
    NotInstalled,

    /// A policy was already installed for this process.
    #[error("policy already installed")]
    AlreadyInstalled,

    #[error("storage: {0}")]
    Storage(#[from] heed::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for permitbit operations
pub type Result<T> = std::result::Result<T, PermitError>;
