use crate::init::LoggerConfig;
use crate::level::Level;
use crate::pipeline::Pipeline;
use crate::record::{LogRecord, RecordError, SerializedRecord};
use crate::sink::LogSink;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

/// Front-end that runs records through a [`Pipeline`] on the calling
/// thread and forwards the serialized result to an asynchronous
/// [`LogSink`] via a bounded channel and background task.
///
/// Formatting is synchronous and cheap; sink I/O never happens on the
/// caller's thread. Records that cannot be formatted or queued are
/// dropped and counted, never surfaced to the caller.
#[derive(Clone)]
pub struct PipelineLogger {
    pipeline: Arc<Pipeline>,
    sender: mpsc::Sender<SerializedRecord>,
    min_level: Level,
    /// Records handed to [`PipelineLogger::log`] or [`PipelineLogger::log_with`],
    /// plus events a front-end filtered out early via [`PipelineLogger::skip`].
    /// Counted before level filtering.
    pub total_events: Arc<AtomicU64>,
    /// Successfully queued for the sink.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full or closed.
    pub dropped_events: Arc<AtomicU64>,
    /// Dropped because the record could not be built or serialized.
    pub failed_events: Arc<AtomicU64>,
}

impl PipelineLogger {
    /// Create a logger and spawn the background task that drains the
    /// channel into `sink`.
    ///
    /// The task ends once every clone of the logger is dropped and the
    /// remaining records are delivered. Minimal thresholds are enforced for
    /// the buffer, batch size and flush interval to avoid degenerate
    /// configurations.
    pub fn new(
        pipeline: Arc<Pipeline>,
        sink: Arc<dyn LogSink>,
        config: &LoggerConfig,
    ) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let max_retries = config.max_retries;

        let (tx, mut rx) = mpsc::channel::<SerializedRecord>(buffer);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            // One ticker for the task's lifetime, so incoming records never
            // push the next flush back. `interval` rejects a zero period.
            let mut ticker = interval(flush_interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= batch_size {
                                if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff, max_retries).await {
                                    eprintln!("error sending log batch: {}", e);
                                }
                            }
                        }
                        None => {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff, max_retries).await {
                                eprintln!("error draining log batch: {}", e);
                            }
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        if !batch.is_empty() {
                            if let Err(e) = send_batch(&*sink, &mut batch, backoff, max_backoff, max_retries).await {
                                eprintln!("error flushing log batch: {}", e);
                            }
                        }
                    }
                }
            }
        });

        let logger = Self {
            pipeline,
            sender: tx,
            min_level: config.min_level,
            total_events: Arc::new(AtomicU64::new(0)),
            enqueued_events: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        };
        (logger, handle)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level.enabled_at(self.min_level)
    }

    /// Stamp, format and queue one record.
    pub fn log(&self, mut record: LogRecord) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if !self.enabled(record.severity()) {
            return;
        }

        record.stamp(Utc::now());
        let formatted = match self.pipeline.format(record) {
            Ok(formatted) => formatted,
            Err(e) => return self.report_failure(&e),
        };

        match self.sender.try_send(formatted) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping {} record", self.pipeline.name());
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel closed, dropping {} record", self.pipeline.name());
            }
        }
    }

    /// Log `message` with the fields of `extras` merged in at the top
    /// level. `extras` must serialize to a JSON object.
    pub fn log_with<T: Serialize>(&self, level: Level, message: impl Into<String>, extras: &T) {
        match build_record(level, message.into(), extras) {
            Ok(record) => self.log(record),
            Err(e) => {
                self.total_events.fetch_add(1, Ordering::Relaxed);
                self.report_failure(&e);
            }
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogRecord::new(Level::Error, message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogRecord::new(Level::Warn, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogRecord::new(Level::Info, message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogRecord::new(Level::Debug, message));
    }

    /// Count an event that a front-end discarded below the level threshold
    /// without building a record for it.
    pub fn skip(&self) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn report_failure(&self, err: &dyn fmt::Display) {
        self.failed_events.fetch_add(1, Ordering::Relaxed);
        eprintln!("dropping {} log record: {}", self.pipeline.name(), err);
    }
}

fn build_record<T: Serialize>(level: Level, message: String, extras: &T) -> Result<LogRecord, RecordError> {
    let extras = serde_json::to_value(extras)
        .map_err(|source| RecordError::Serialize { key: "extras".to_string(), source })?;
    let mut record = LogRecord::new(level, message);
    match extras {
        Value::Object(fields) => {
            // The explicit level and message win over same-named extras.
            for (k, v) in fields {
                record.fields_mut().entry(k).or_insert(v);
            }
            Ok(record)
        }
        Value::Null => Ok(record),
        _ => Err(RecordError::NotAnObject),
    }
}

async fn send_batch(
    sink: &dyn LogSink,
    batch: &mut Vec<SerializedRecord>,
    mut backoff: Duration,
    max_backoff: Duration,
    max_retries: u32,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut attempt = 0;
    loop {
        let mut sent = 0;
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        for record in batch.iter() {
            match sink.send(record).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            }
        }
        batch.drain(..sent);

        let Some(err) = last_err else {
            return sink.flush().await;
        };

        if attempt >= max_retries {
            let lost = batch.len();
            batch.clear();
            return Err(format!("giving up on {} log records after {} retries: {}", lost, attempt, err).into());
        }
        attempt += 1;

        eprintln!("log sink send failed, retrying in {:?}", backoff);
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}
