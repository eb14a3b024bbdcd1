//! Local filesystem endpoint

use crate::{Destination, Error, Release, Result, Source, SourceStream};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// A file on the local filesystem, usable as a source or a destination
///
/// While reading, the endpoint owns the open handle until [`Source::done`].
pub struct LocalFile {
    path: PathBuf,
    display: String,
    file: Option<File>,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display = path.display().to_string();
        Self {
            path,
            display,
            file: None,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Source for LocalFile {
    fn name(&self) -> &str {
        "file"
    }

    async fn read<'a>(&'a mut self) -> Result<SourceStream<'a>> {
        let file = File::open(&self.path).await.map_err(|source| Error::Open {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.file.insert(file))
    }

    fn done(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!("Closed file: {}", self.display);
        }
    }
}

#[async_trait]
impl Destination for LocalFile {
    fn name(&self) -> &str {
        "file"
    }

    fn path(&self) -> &str {
        &self.display
    }

    async fn write(&mut self, source: &mut dyn Source) -> Result<u64> {
        let mut source = Release::new(source);
        let reader = source.read().await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|source| Error::Create {
                path: self.path.clone(),
                source,
            })?;

        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| Error::io("copying into", self.display.clone(), e))?;
        file.flush()
            .await
            .map_err(|e| Error::io("flushing", self.display.clone(), e))?;

        tracing::debug!("Wrote {written} bytes to {}", self.display);

        Ok(written)
    }
}
