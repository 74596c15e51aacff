//! Id parsing errors.

use thiserror::Error;

/// Errors that can occur when parsing an id from its string form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,

    /// The input has no `_` between prefix and ULID.
    #[error("id missing underscore separator")]
    MissingSeparator,

    /// The prefix names a different kind of id.
    #[error("invalid id prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ULID portion does not decode.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    /// Returns true if the id was rejected because of its prefix.
    pub fn is_prefix_error(&self) -> bool {
        matches!(self, IdError::InvalidPrefix { .. })
    }
}
