//! Source and destination endpoints for copying a byte stream between
//! locations: local files, standard input/output, or S3 objects.
//!
//! # Location Strings
//!
//! - `-` - standard input when used as a source, standard output as a destination
//! - `s3://bucket/key/to/object` - an S3 object
//! - anything else that is not empty - a local file path
//!
//! # Hand-off
//!
//! A [`Destination`] drives the copy: it asks the [`Source`] for a forward-only
//! stream with [`Source::read`], consumes it, and the source is released with
//! [`Source::done`] exactly once whatever the outcome. Implementations get that
//! guarantee by wrapping the source in a [`Release`] guard.
//!
//! # Example
//!
//! ```ignore
//! use s3copy_locations::{AwsConnector, Resolver, S3Options};
//!
//! let resolver = Resolver::new(AwsConnector::default(), S3Options::default());
//! let mut source = resolver.source("s3://my-bucket/data/file.csv")?;
//! let mut destination = resolver.destination("-")?;
//! let written = destination.write(source.as_mut()).await?;
//! ```

mod error;
mod local;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod resolver;
mod s3;
mod stdio;
mod store;

use async_trait::async_trait;
use std::ffi::OsStr;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use tokio::io::AsyncRead;

pub use error::{BoxError, Error, Result};
pub use local::LocalFile;
pub use resolver::Resolver;
pub use s3::{
    S3Object, S3Options, DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_DOWNLOAD_PART_SIZE,
    DEFAULT_UPLOAD_PART_SIZE, MAX_UPLOAD_PARTS, MIN_UPLOAD_PART_SIZE,
};
pub use stdio::{Input, Output};
pub use store::{AwsConnector, ObjectBody, ObjectStore, S3Store, StoreConnector, UploadedPart};

/// Location string selecting standard input or standard output
pub const STDIO_LOCATION: &str = "-";

/// Scheme prefix selecting an S3 object
pub const S3_SCHEME: &str = "s3://";

/// Forward-only byte stream handed from a source to a destination
pub type SourceStream<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// An endpoint that can produce a readable byte stream
#[async_trait]
pub trait Source: Send {
    /// Short endpoint kind used in log lines
    fn name(&self) -> &str;

    /// Open the stream. The stream stays owned by the source until [`Source::done`].
    async fn read<'a>(&'a mut self) -> Result<SourceStream<'a>>;

    /// Release whatever `read` opened. Must be safe to call when `read` failed
    /// or was never called.
    fn done(&mut self);
}

/// An endpoint that consumes a source's stream and persists it
#[async_trait]
pub trait Destination: Send {
    /// Short endpoint kind used in log lines
    fn name(&self) -> &str;

    fn path(&self) -> &str;

    /// Copy the whole source stream, returning the number of bytes persisted.
    /// The source is always released before this returns.
    async fn write(&mut self, source: &mut dyn Source) -> Result<u64>;
}

/// Guard that calls [`Source::done`] when dropped
///
/// Destinations wrap the borrowed source in this guard before calling `read`,
/// so every exit path (including `?` returns) releases the source once.
pub struct Release<'a> {
    source: &'a mut dyn Source,
}

impl<'a> Release<'a> {
    pub fn new(source: &'a mut dyn Source) -> Self {
        Self { source }
    }
}

impl<'a> Deref for Release<'a> {
    type Target = dyn Source + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.source
    }
}

impl<'a> DerefMut for Release<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.source
    }
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        tracing::debug!("Releasing source: {}", self.source.name());
        self.source.done();
    }
}

/// Parsed form of a location string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Standard input or standard output
    Stdio,
    /// Local filesystem path
    Local(PathBuf),
    /// S3 object
    S3 { bucket: String, key: String },
}

impl Location {
    /// Parse a location string, auto-detecting the endpoint kind
    ///
    /// - `-` -> Stdio
    /// - `s3://bucket/key` -> S3
    /// - any other non-empty string -> Local
    /// - empty string -> None
    ///
    /// Local paths need not be valid UTF-8.
    pub fn parse(location: impl AsRef<OsStr>) -> Option<Self> {
        let location = location.as_ref();
        let text = location.to_str();
        if text == Some(STDIO_LOCATION) {
            Some(Location::Stdio)
        } else if let Some(path) = text.and_then(|t| t.strip_prefix(S3_SCHEME)) {
            let (bucket, key) = split_bucket_key(path);
            Some(Location::S3 { bucket, key })
        } else if !location.is_empty() {
            Some(Location::Local(PathBuf::from(location)))
        } else {
            None
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            Location::Stdio => STDIO_LOCATION.to_string(),
            Location::Local(path) => path.display().to_string(),
            Location::S3 { bucket, key } => format!("{S3_SCHEME}{bucket}/{key}"),
        }
    }
}

/// Split an S3 path (scheme already stripped) into bucket and key
///
/// The bucket is everything up to the first `/`, the key everything after it.
/// A path without any `/` names the bucket and is reused as the key.
pub fn split_bucket_key(path: &str) -> (String, String) {
    match path.split_once('/') {
        Some((bucket, key)) => (bucket.to_string(), key.to_string()),
        None => (path.to_string(), path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_stdio() {
        assert_eq!(Location::parse("-"), Some(Location::Stdio));
    }

    #[test]
    fn test_parse_s3_object() {
        let location = Location::parse("s3://b/k").unwrap();
        assert_eq!(
            location,
            Location::S3 {
                bucket: "b".to_string(),
                key: "k".to_string()
            }
        );
    }

    #[test]
    fn test_parse_s3_nested_key() {
        let location = Location::parse("s3://b/a/b/c").unwrap();
        assert_eq!(
            location,
            Location::S3 {
                bucket: "b".to_string(),
                key: "a/b/c".to_string()
            }
        );
        assert_eq!(location.display_name(), "s3://b/a/b/c");
    }

    #[test]
    fn test_parse_s3_bucket_only_reuses_bucket_as_key() {
        let location = Location::parse("s3://bucket-only").unwrap();
        assert_eq!(
            location,
            Location::S3 {
                bucket: "bucket-only".to_string(),
                key: "bucket-only".to_string()
            }
        );
    }

    #[test]
    fn test_parse_s3_bucket_starting_with_scheme_letters() {
        let (bucket, key) = split_bucket_key("s3data/obj");
        assert_eq!(bucket, "s3data");
        assert_eq!(key, "obj");
    }

    #[test]
    fn test_parse_local_file() {
        let location = Location::parse("/data/file.csv").unwrap();
        assert_eq!(location, Location::Local(PathBuf::from("/data/file.csv")));
        assert!(matches!(Location::parse("relative.txt"), Some(Location::Local(_))));
        assert!(matches!(Location::parse("--"), Some(Location::Local(_))));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Location::parse(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_non_utf8_local_path() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"f\xff");
        let location = Location::parse(raw).unwrap();
        assert_eq!(location, Location::Local(PathBuf::from(raw)));

        let raw = OsStr::from_bytes(b"s3://b/\xff");
        assert!(matches!(Location::parse(raw), Some(Location::Local(_))));
    }

    struct Counting {
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Source for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn read<'a>(&'a mut self) -> Result<SourceStream<'a>> {
            unreachable!("not read in this test")
        }

        fn done(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_calls_done_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut source = Counting {
            released: released.clone(),
        };
        {
            let guard = Release::new(&mut source);
            assert_eq!(guard.name(), "counting");
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
