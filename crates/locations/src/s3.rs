//! S3 object endpoint
//!
//! Downloads are fetched as ranged parts, several in flight at once, each
//! written at its own offset into a scratch file. Destinations consume a
//! single forward-only stream, so the object is fully materialised locally
//! before the scratch file is reopened and handed out. Uploads stream the
//! source straight into a multipart upload.

use crate::store::{ObjectStore, StoreConnector, UploadedPart};
use crate::{Destination, Error, Release, Result, Source, SourceStream};
use async_trait::async_trait;
use futures::TryStreamExt;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Default size of each ranged download request (2GiB)
pub const DEFAULT_DOWNLOAD_PART_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Default size of each multipart upload part (1GiB)
pub const DEFAULT_UPLOAD_PART_SIZE: usize = 1024 * 1024 * 1024;

/// Smallest part S3 accepts for any part but the last (5MiB)
pub const MIN_UPLOAD_PART_SIZE: usize = 5 * 1024 * 1024;

/// Largest part count of a multipart upload
pub const MAX_UPLOAD_PARTS: i32 = 10_000;

/// Default number of download parts in flight
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// Transfer tuning shared by every S3 endpoint of a run
#[derive(Debug, Clone)]
pub struct S3Options {
    pub download_part_size: u64,
    pub upload_part_size: usize,
    pub download_concurrency: usize,
    /// Where scratch files for downloads go; the current directory when unset
    pub scratch_dir: Option<PathBuf>,
    /// File name prefix of scratch files
    pub temp_prefix: String,
}

impl S3Options {
    /// Scratch file prefix for a program: `.tmp.<program>-`
    pub fn temp_prefix_for(program: &str) -> String {
        format!(".tmp.{program}-")
    }
}

impl Default for S3Options {
    fn default() -> Self {
        Self {
            download_part_size: DEFAULT_DOWNLOAD_PART_SIZE,
            upload_part_size: DEFAULT_UPLOAD_PART_SIZE,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            scratch_dir: None,
            temp_prefix: Self::temp_prefix_for("s3copy"),
        }
    }
}

/// Scratch file holding a downloaded object
struct Download {
    temp: NamedTempFile,
    reader: Option<File>,
}

/// An S3 object, usable as a source or a destination
pub struct S3Object {
    path: String,
    bucket: String,
    key: String,
    connector: Arc<dyn StoreConnector>,
    options: Arc<S3Options>,
    download: Option<Download>,
}

impl S3Object {
    pub fn new(
        bucket: String,
        key: String,
        connector: Arc<dyn StoreConnector>,
        options: Arc<S3Options>,
    ) -> Self {
        Self {
            path: format!("{bucket}/{key}"),
            bucket,
            key,
            connector,
            options,
            download: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn scratch_dir(&self) -> Result<PathBuf> {
        match &self.options.scratch_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir()
                .map_err(|e| Error::io("resolving", "current directory", e)),
        }
    }
}

#[async_trait]
impl Source for S3Object {
    fn name(&self) -> &str {
        "S3"
    }

    async fn read<'a>(&'a mut self) -> Result<SourceStream<'a>> {
        let store = self.connector.connect().await?;

        let dir = self.scratch_dir()?;
        let temp = tempfile::Builder::new()
            .prefix(&self.options.temp_prefix)
            .tempfile_in(&dir)
            .map_err(|source| Error::Create { path: dir, source })?;
        let temp_path = temp.path().to_path_buf();
        debug!("Created scratch file: {}", temp_path.display());

        // Track the scratch file before downloading so done() removes it on failure too.
        let download = self.download.insert(Download { temp, reader: None });

        let size = download_object(
            store.as_ref(),
            &self.bucket,
            &self.key,
            &temp_path,
            &self.options,
        )
        .await?;
        info!("Downloaded {size} bytes from s3://{}", self.path);

        let reader = File::open(&temp_path).await.map_err(|source| Error::Open {
            path: temp_path.clone(),
            source,
        })?;
        Ok(download.reader.insert(reader))
    }

    fn done(&mut self) {
        if let Some(download) = self.download.take() {
            drop(download.reader);
            let path = download.temp.path().to_path_buf();
            match download.temp.close() {
                Ok(()) => debug!("Removed scratch file: {}", path.display()),
                Err(e) => warn!("Failed to remove scratch file {}: {e}", path.display()),
            }
        }
    }
}

#[async_trait]
impl Destination for S3Object {
    fn name(&self) -> &str {
        "S3"
    }

    fn path(&self) -> &str {
        &self.path
    }

    async fn write(&mut self, source: &mut dyn Source) -> Result<u64> {
        let mut source = Release::new(source);
        let reader = source.read().await?;

        let store = self.connector.connect().await?;
        let uploaded = upload_object(
            store.as_ref(),
            &self.bucket,
            &self.key,
            reader,
            self.options.upload_part_size,
        )
        .await?;
        info!("Uploaded {uploaded} bytes to s3://{}", self.path);

        Ok(uploaded)
    }
}

/// Split `size` bytes into consecutive ranges of at most `part_size`
fn part_ranges(size: u64, part_size: u64) -> Vec<Range<u64>> {
    let part_size = part_size.max(1);
    (0..size.div_ceil(part_size))
        .map(|index| {
            let start = index * part_size;
            start..start.saturating_add(part_size).min(size)
        })
        .collect()
}

/// Fetch the whole object into `path`, returning its size
async fn download_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: &Path,
    options: &S3Options,
) -> Result<u64> {
    let size = store.object_size(bucket, key).await?;

    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| Error::io("opening", path.display().to_string(), e))?;
    file.set_len(size)
        .await
        .map_err(|e| Error::io("allocating", path.display().to_string(), e))?;
    drop(file);

    let ranges = part_ranges(size, options.download_part_size);
    debug!(
        "Fetching s3://{bucket}/{key} in {} parts of up to {} bytes",
        ranges.len(),
        options.download_part_size
    );

    futures::stream::iter(ranges.into_iter().map(Ok::<_, Error>))
        .try_for_each_concurrent(options.download_concurrency.max(1), |range| {
            download_part(store, bucket, key, path, range)
        })
        .await?;

    Ok(size)
}

async fn download_part(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    path: &Path,
    range: Range<u64>,
) -> Result<()> {
    let target = format!("{bucket}/{key}");
    let mut body = store.get_range(bucket, key, range.clone()).await?;

    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| Error::io("opening", path.display().to_string(), e))?;
    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|e| Error::io("seeking", path.display().to_string(), e))?;

    let copied = tokio::io::copy(&mut body, &mut file)
        .await
        .map_err(|e| Error::io("downloading", target.clone(), e))?;
    file.flush()
        .await
        .map_err(|e| Error::io("flushing", path.display().to_string(), e))?;

    let expected = range.end - range.start;
    if copied != expected {
        return Err(Error::storage(
            "GetObject",
            target,
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {expected} bytes at offset {}, received {copied}", range.start),
            ),
        ));
    }

    debug!("Fetched bytes {}..{} of s3://{target}", range.start, range.end);
    Ok(())
}

/// Read up to `part_size` bytes; a short part means the stream ended
async fn read_part<R>(reader: &mut R, part_size: usize, target: &str) -> Result<Vec<u8>>
where
    R: AsyncRead + Send + Unpin + ?Sized,
{
    let mut part = Vec::new();
    reader
        .take(part_size as u64)
        .read_to_end(&mut part)
        .await
        .map_err(|e| Error::io("reading source for", target, e))?;
    Ok(part)
}

/// Upload the stream, returning the number of bytes sent
async fn upload_object<R>(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    reader: &mut R,
    part_size: usize,
) -> Result<u64>
where
    R: AsyncRead + Send + Unpin + ?Sized,
{
    let target = format!("{bucket}/{key}");
    let part_size = part_size.max(1);

    let first = read_part(reader, part_size, &target).await?;
    if first.len() < part_size {
        let size = first.len() as u64;
        store.put_object(bucket, key, first).await?;
        return Ok(size);
    }

    let upload_id = store.create_multipart_upload(bucket, key).await?;
    debug!("Started multipart upload {upload_id} for s3://{target}");

    match upload_parts(store, bucket, key, &upload_id, first, reader, part_size).await {
        Ok(total) => Ok(total),
        Err(e) => {
            if let Err(abort) = store.abort_multipart_upload(bucket, key, &upload_id).await {
                warn!("Failed to abort multipart upload {upload_id} for s3://{target}: {abort}");
            }
            Err(e)
        }
    }
}

async fn upload_parts<R>(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    upload_id: &str,
    first: Vec<u8>,
    reader: &mut R,
    part_size: usize,
) -> Result<u64>
where
    R: AsyncRead + Send + Unpin + ?Sized,
{
    let target = format!("{bucket}/{key}");
    let mut parts: Vec<UploadedPart> = Vec::new();
    let mut total = 0u64;
    let mut part_number = 1;
    let mut body = first;

    loop {
        if part_number > MAX_UPLOAD_PARTS {
            return Err(Error::TooManyParts {
                target,
                limit: MAX_UPLOAD_PARTS,
            });
        }

        let len = body.len() as u64;
        let part = store
            .upload_part(bucket, key, upload_id, part_number, body)
            .await?;
        total += len;
        debug!("Uploaded part {part_number} ({len} bytes) of s3://{target}");
        parts.push(part);

        body = read_part(reader, part_size, &target).await?;
        if body.is_empty() {
            break;
        }
        part_number += 1;
    }

    store
        .complete_multipart_upload(bucket, key, upload_id, parts)
        .await?;
    Ok(total)
}
