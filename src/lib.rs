//! s3copy Library
//!
//! Copies a byte stream from one location to another. A location is a local
//! file path, `-` for standard input/output, or an `s3://bucket/key` object.
//!
//! # CLI Usage
//!
//! ```bash
//! # Upload a local file
//! s3copy ./backup.tar s3://my-bucket/backups/backup.tar
//!
//! # Stream an object to stdout
//! s3copy s3://my-bucket/logs/app.log - | grep ERROR
//!
//! # Upload from a pipe
//! pg_dump mydb | s3copy - s3://my-bucket/dumps/mydb.sql
//! ```
//!
//! S3 credentials and region come from the usual AWS configuration chain
//! (`AWS_*` environment variables, shared profiles, instance metadata).

use anyhow::Context;
use std::ffi::OsStr;
use tracing::info;

pub mod config;

pub use config::TransferOpts;
pub use s3copy_locations as locations;
use s3copy_locations::Resolver;

/// Program name used for scratch file names, taken from `argv[0]`
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_ref()
        .and_then(|arg| std::path::Path::new(arg).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Resolve both locations and copy the source into the destination
///
/// Returns the number of bytes written. Local paths need not be valid UTF-8.
pub async fn copy(
    resolver: &Resolver,
    source: impl AsRef<OsStr>,
    destination: impl AsRef<OsStr>,
) -> anyhow::Result<u64> {
    let (source, destination) = (source.as_ref(), destination.as_ref());
    info!(
        "Copying from {} to {}",
        source.to_string_lossy(),
        destination.to_string_lossy()
    );

    let mut input = resolver
        .source(source)
        .context("Error resolving input source")?;
    let mut output = resolver
        .destination(destination)
        .context("Error resolving output destination")?;

    info!("Source: {}", input.name());
    info!("Destination: {}", output.name());

    let written = output
        .write(input.as_mut())
        .await
        .with_context(|| format!("Error writing to {} from {}", output.name(), input.name()))?;

    info!("Finished writing bytes: {written}");

    Ok(written)
}
