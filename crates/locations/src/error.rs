//! Error types for endpoint resolution and transfers.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by the storage client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving or driving an endpoint.
#[derive(Error, Debug)]
pub enum Error {
    /// The location string did not map onto any endpoint
    #[error("Unable to resolve {role}: {location:?}")]
    Unresolved {
        role: &'static str,
        location: String,
    },

    /// A local file could not be opened for reading
    #[error("Failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local file could not be created or truncated for writing
    #[error("Failed to create {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading, writing or flushing a stream failed
    #[error("I/O error while {operation} {target}")]
    Io {
        operation: &'static str,
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// A request to the object store failed
    #[error("{operation} failed for s3://{target}")]
    Storage {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxError,
    },

    /// The object store answered without a field we rely on
    #[error("{operation} for s3://{target} returned no {field}")]
    MissingMetadata {
        operation: &'static str,
        target: String,
        field: &'static str,
    },

    /// The stream needs more parts than a multipart upload allows
    #[error("s3://{target} needs more than {limit} parts; raise the upload part size")]
    TooManyParts { target: String, limit: i32 },
}

impl Error {
    pub(crate) fn io(
        operation: &'static str,
        target: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            operation,
            target: target.into(),
            source,
        }
    }

    pub(crate) fn storage(
        operation: &'static str,
        target: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Storage {
            operation,
            target: target.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
