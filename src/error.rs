// src/error.rs

//! Crate-wide error type and result alias.

use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by the resolution and differencing engine
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed artifact coordinate string
    #[error("invalid artifact coordinates: {0}")]
    Coordinates(String),

    /// A distribution spec references itself through its parent chain
    #[error("cyclic parent distribution chain: {0}")]
    CyclicParentChain(String),

    /// A LATEST/LATEST-SNAPSHOT requirement could not be satisfied
    #[error("no version of {0} is available in the artifact store")]
    NoVersionAvailable(String),

    /// Malformed or inconsistent distribution spec
    #[error("invalid distribution spec: {0}")]
    Spec(String),

    /// Failure reading or writing the flat property format
    #[error("{context}: {source}")]
    PropertyFormat {
        context: String,
        #[source]
        source: java_properties::PropertiesError,
    },

    /// A module descriptor could not be parsed
    #[error("module descriptor {path}: {reason}")]
    Descriptor { path: String, reason: String },

    /// Content packages whose dependencies cannot be ordered
    #[error("unable to order content packages, unresolved dependencies remain: {0}")]
    ContentOrdering(String),

    /// A content package variable with no default and no override
    #[error("content package {package} variable {variable} must be assigned a value in the distribution spec")]
    UnboundVariable { package: String, variable: String },

    /// Declared dependencies missing from the distribution
    #[error("distribution is missing required dependencies:{0}")]
    MissingDependencies(String),

    /// A version range declared by a content package could not be parsed
    #[error("invalid version range '{range}' declared by {declared_by}: {reason}")]
    VersionRange {
        range: String,
        declared_by: String,
        reason: String,
    },

    /// The target distribution does not declare a core runtime but one is deployed
    #[error("the core runtime cannot be removed; the target distribution must declare one")]
    RuntimeRemoval,

    /// Artifact store failure
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
