//! Byte streams produced by fetchers.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;

use crate::fetch::FetchError;

const FILE_CHUNK_SIZE: usize = 64 * 1024;

type BoxStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A fetched resource body.
///
/// The underlying file or connection is released when the stream is dropped,
/// whether it was consumed, converted into a response body, or abandoned on
/// an error path.
pub struct ModuleStream {
    inner: BoxStream,
    content_length: Option<u64>,
}

impl ModuleStream {
    /// Wrap an arbitrary chunk stream.
    pub fn from_stream<S>(stream: S, content_length: Option<u64>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            content_length,
        }
    }

    /// A single in-memory chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::from_stream(stream::once(async move { Ok(bytes) }), Some(len))
    }

    /// Read an open file in fixed-size chunks.
    pub fn from_file(file: tokio::fs::File, content_length: Option<u64>) -> Self {
        let chunks = stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; FILE_CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok::<_, io::Error>(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), file)))
        });
        Self::from_stream(chunks, content_length)
    }

    /// Length announced by the source, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Buffer the whole stream.
    ///
    /// Fails with [`FetchError::Truncated`] if the stream errors midway or
    /// ends before the announced length.
    pub async fn read_to_end(self) -> Result<Bytes, FetchError> {
        let expected = self.content_length;
        let chunks: Vec<Bytes> = self
            .inner
            .try_collect()
            .await
            .map_err(|e| FetchError::Truncated(e.to_string()))?;

        let total: usize = chunks.iter().map(Bytes::len).sum();
        if let Some(expected) = expected {
            if total as u64 != expected {
                return Err(FetchError::Truncated(format!(
                    "expected {expected} bytes, got {total}"
                )));
            }
        }

        if chunks.len() == 1 {
            return Ok(chunks.into_iter().next().unwrap_or_default());
        }
        let mut out = Vec::with_capacity(total);
        for chunk in &chunks {
            out.extend_from_slice(chunk);
        }
        Ok(Bytes::from(out))
    }

    /// Convert into a streaming response body without buffering.
    pub fn into_body(self) -> Body {
        Body::from_stream(self.inner)
    }
}

impl Stream for ModuleStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ModuleStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
