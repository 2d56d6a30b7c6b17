//! Error types and result definitions.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by containers and the keyed-construction helpers.
///
/// Nothing in this crate catches or translates these; they bubble up to the
/// direct caller of the failing operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A helper was asked to replace a key the container does not hold.
    #[error("key not found: {key:?}")]
    KeyNotFound { key: String },

    /// A raw value handed to a container constructor is not a mapping.
    #[error("expected a mapping, found {found}")]
    NotAMapping { found: String },

    /// A target type refused to build from the raw value under `key`.
    #[error("failed to construct {key:?}: {message}")]
    Construct { key: String, message: String },

    /// Anything raised from inside a parse hook or a caller's constructor.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Shorthand for [`Error::Construct`].
    pub fn construct(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Construct {
            key: key.into(),
            message: message.into(),
        }
    }
}
