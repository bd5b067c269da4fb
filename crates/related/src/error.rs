//! Error types for related DTO loading
//!
//! Configuration problems (bad shape declarations, missing id fields) are
//! reported when a shape is registered wherever possible, and otherwise on
//! the first load that hits them. Failures raised by a loader rule are
//! carried through untouched in [`RelatedError::Fetch`].

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by loader rules
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for related loading operations
pub type RelatedResult<T> = Result<T, RelatedError>;

/// Related loading errors
#[derive(Error, Debug)]
pub enum RelatedError {
    #[error("Unsupported target type '{shape}': no related dto metadata is registered for it")]
    UnsupportedTargetShape { shape: &'static str },

    #[error("Missing id field for related property '{field}' on '{shape}'")]
    MissingIdField { shape: &'static str, field: String },

    #[error("Id field '{field}' on '{shape}' cannot be used: {reason}")]
    IdFieldMismatch {
        shape: &'static str,
        field: String,
        reason: String,
    },

    #[error("Field '{field}' is declared more than once on '{shape}'")]
    DuplicateField { shape: &'static str, field: String },

    #[error("Got {targets} target dtos but {key_providers} key providers")]
    LengthMismatch { targets: usize, key_providers: usize },

    #[error("Loader rule for '{entity}' failed: {source}")]
    Fetch {
        entity: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Loader rule for '{entity}' timed out after {timeout:?}")]
    FetchTimeout {
        entity: &'static str,
        timeout: Duration,
    },

    #[error("Loader configuration error: {0}")]
    Configuration(String),
}

impl RelatedError {
    /// Returns true for errors caused by how shapes or the loader were set up,
    /// as opposed to failures raised while fetching data
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Fetch { .. } | Self::FetchTimeout { .. })
    }
}
