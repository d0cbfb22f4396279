use crate::record::SerializedRecord;
use async_trait::async_trait;
use std::error::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Asynchronous destination for [`SerializedRecord`]s produced by a
/// pipeline.
///
/// Records arrive already packaged and redacted. The logger calls `send`
/// from a background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Send a single serialized record to the underlying destination.
    ///
    /// **Parameters**
    /// - `record`: JSON line plus the severity it was logged at, for
    ///   sinks that route by level.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was accepted.
    /// - `Err(..)` if the write failed. The logger treats this as a
    ///   transient failure and retries the rest of the batch with backoff.
    async fn send(&self, record: &SerializedRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered records. Called after every delivered batch.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

/// Writes one JSON document per line to any async writer.
pub struct StreamSink<W> {
    writer: Mutex<W>,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> LogSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, record: &SerializedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut writer = self.writer.lock().await;
        writer.write_all(record.json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}
