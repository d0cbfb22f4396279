use crate::level::Level;
use crate::record::SerializedRecord;
use crate::sink::{LogSink, StreamSink};
use async_trait::async_trait;
use std::error::Error;
use tokio::io::{Stderr, Stdout};

/// Console destination: one JSON line per record on stdout, or on stderr
/// for the severities listed in `stderr_levels`.
pub struct ConsoleSink {
    stdout: StreamSink<Stdout>,
    stderr: StreamSink<Stderr>,
    stderr_levels: Vec<Level>,
}

impl ConsoleSink {
    /// Everything goes to stdout.
    pub fn new() -> Self {
        Self::with_stderr_levels(Vec::new())
    }

    /// Route the given severities to stderr instead of stdout.
    pub fn with_stderr_levels(stderr_levels: Vec<Level>) -> Self {
        Self {
            stdout: StreamSink::new(tokio::io::stdout()),
            stderr: StreamSink::new(tokio::io::stderr()),
            stderr_levels,
        }
    }

    /// Every severity goes to stderr.
    pub fn stderr_only() -> Self {
        Self::with_stderr_levels(vec![
            Level::Error,
            Level::Warn,
            Level::Info,
            Level::Http,
            Level::Verbose,
            Level::Debug,
            Level::Silly,
        ])
    }

    fn routes_to_stderr(&self, level: Level) -> bool {
        self.stderr_levels.contains(&level)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    async fn send(&self, record: &SerializedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.routes_to_stderr(record.level) {
            self.stderr.send(record).await
        } else {
            self.stdout.send(record).await
        }
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.stdout.flush().await?;
        self.stderr.flush().await
    }
}
