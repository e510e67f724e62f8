//! Error types for kompox-core

use std::path::PathBuf;
use thiserror::Error;

use crate::document::{Kind, Provenance};
use crate::fqn::Fqn;
use crate::validator::ValidationErrors;

/// Result type alias for kompox-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by repository adapters
pub type RepositoryError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in kompox-core
#[derive(Error, Debug)]
pub enum Error {
    /// Top-level load path does not exist or cannot be inspected
    #[error("cannot stat path {}: {source}", .path.display())]
    PathNotFound {
        /// Path that was requested
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Source file is larger than the loader accepts
    #[error("file {} exceeds max size {limit} bytes ({size} bytes)", .path.display())]
    FileTooLarge {
        /// Offending file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Source file could not be read
    #[error("reading {}: {source}", .path.display())]
    Read {
        /// Offending file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The batch did not pass validation; carries every collected error
    #[error("validation errors:\n{0}")]
    Validation(ValidationErrors),

    /// A nested structure of a sink entry is invalid
    #[error("{} \"{fqn}\" projection error: {message} from {provenance}", .kind.as_str().to_lowercase())]
    Projection {
        /// Kind of the entry
        kind: Kind,
        /// FQN of the entry
        fqn: Fqn,
        /// What is wrong
        message: String,
        /// Where the entry was defined
        provenance: Provenance,
    },

    /// A repository port rejected a record
    #[error("failed to create {} \"{fqn}\": {source}", .kind.as_str().to_lowercase())]
    Repository {
        /// Kind of the record
        kind: Kind,
        /// FQN of the record
        fqn: Fqn,
        /// Adapter failure
        #[source]
        source: RepositoryError,
    },
}
