use crate::record::SerializedRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;

/// A sink that simply drops all records.
///
/// Useful for measuring the overhead of the pipelines themselves without
/// any I/O, and for callers that want logging switched off.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _record: &SerializedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
