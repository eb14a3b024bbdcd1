//! Standard-stream endpoints
//!
//! [`Input`] and [`Output`] wrap any async reader or writer; the usual
//! instances are [`Input::stdin`] and [`Output::stdout`]. The process owns the
//! lifetime of the standard streams, so releasing an `Input` does nothing.

use crate::{Destination, Error, Release, Result, Source, SourceStream, STDIO_LOCATION};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, Stdin, Stdout};

/// A source that hands out an already open reader
pub struct Input<R> {
    name: &'static str,
    reader: R,
}

impl Input<Stdin> {
    pub fn stdin() -> Self {
        Self::new("stdin", tokio::io::stdin())
    }
}

impl<R> Input<R> {
    pub fn new(name: &'static str, reader: R) -> Self {
        Self { name, reader }
    }
}

#[async_trait]
impl<R> Source for Input<R>
where
    R: AsyncRead + Send + Unpin,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn read<'a>(&'a mut self) -> Result<SourceStream<'a>> {
        Ok(&mut self.reader)
    }

    fn done(&mut self) {}
}

/// A destination that copies into an already open writer through a buffer
pub struct Output<W> {
    name: &'static str,
    path: &'static str,
    writer: W,
}

impl Output<Stdout> {
    pub fn stdout() -> Self {
        Self::new("stdout", STDIO_LOCATION, tokio::io::stdout())
    }
}

impl<W> Output<W> {
    pub fn new(name: &'static str, path: &'static str, writer: W) -> Self {
        Self { name, path, writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> Destination for Output<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn name(&self) -> &str {
        self.name
    }

    fn path(&self) -> &str {
        self.path
    }

    async fn write(&mut self, source: &mut dyn Source) -> Result<u64> {
        let mut source = Release::new(source);
        let reader = source.read().await?;

        let target = self.name;
        let mut output = BufWriter::new(&mut self.writer);

        // Flush whatever was buffered even when the copy fails part-way.
        let copied = tokio::io::copy(reader, &mut output).await;
        let flushed = output.flush().await;

        let written = copied.map_err(|e| Error::io("copying into", target, e))?;
        flushed.map_err(|e| Error::io("flushing", target, e))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_input_to_output() {
        let mut source = Input::new("memory", &b"hello world"[..]);
        let mut destination = Output::new("memory", "-", Vec::new());

        let written = destination.write(&mut source).await.unwrap();

        assert_eq!(written, 11);
        assert_eq!(destination.into_inner(), b"hello world");
    }

    #[tokio::test]
    async fn test_output_flushes_after_failed_copy() {
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(io::Error::new(io::ErrorKind::Other, "boom"))
            .build();
        let mut source = Input::new("mock", reader);
        let mut destination = Output::new("memory", "-", Vec::new());

        let err = destination.write(&mut source).await.unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(destination.into_inner(), b"partial");
    }

    #[tokio::test]
    async fn test_input_read_is_repeatable_until_exhausted() {
        let mut source = Input::new("memory", &b"abc"[..]);
        let mut first = Vec::new();
        tokio::io::copy(source.read().await.unwrap(), &mut first)
            .await
            .unwrap();
        source.done();
        assert_eq!(first, b"abc");

        let mut second = Vec::new();
        tokio::io::copy(source.read().await.unwrap(), &mut second)
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_standard_stream_names() {
        let input = Input::stdin();
        let output = Output::stdout();
        assert_eq!(input.name(), "stdin");
        assert_eq!(output.name(), "stdout");
        assert_eq!(output.path(), "-");
    }
}
