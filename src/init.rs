use crate::backend::{make_sink, SinkBuildError, SinkTarget};
use crate::env::{
    env_or, env_parse_or, RPK_LOG_BATCH_SIZE_ENV, RPK_LOG_CHANNEL_BUFFER_ENV,
    RPK_LOG_ENABLE_STDOUT_ENV, RPK_LOG_FLUSH_INTERVAL_MS_ENV, RPK_LOG_MAX_RETRIES_ENV,
    RPK_LOG_MIN_LEVEL_ENV, RPK_LOG_SINK_ENV,
};
use crate::layer::AppLogLayer;
use crate::level::Level;
use crate::logger::PipelineLogger;
use crate::pipeline::Pipeline;
use crate::sink::LogSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Logger configuration.
///
/// Controls the size of the channel in front of the sink, the batch size
/// for sink writes, how often partial batches are flushed, how many times a
/// failed batch is retried, and the least severe level that is logged.
///
/// **Fields**
/// - `channel_buffer`: maximum number of queued records before new ones
///   are dropped.
/// - `batch_size`: records per sink batch.
/// - `flush_interval`: upper bound between flushes of a partial batch.
/// - `max_retries`: retries for a failing batch before it is discarded.
/// - `min_level`: records less severe than this are ignored.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   installed next to the [`AppLogLayer`] by [`init_tracing_with_config`].
/// - `sink`: destination used by [`init_from_env`].
#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub min_level: Level,
    pub enable_stdout: bool,
    pub sink: SinkTarget,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_retries: 5,
            min_level: Level::Info,
            enable_stdout: false,
            sink: SinkTarget::Stdout,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by the `RPK_LOG_*` variables in [`crate::env`].
    /// Unset or unparsable values keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let flush_ms = env_parse_or(
            RPK_LOG_FLUSH_INTERVAL_MS_ENV,
            defaults.flush_interval.as_millis() as u64,
        );
        let sink = env_or(RPK_LOG_SINK_ENV, "stdout").parse().unwrap_or_else(|e| {
            eprintln!("{e}, using stdout");
            defaults.sink
        });

        Self {
            channel_buffer: env_parse_or(RPK_LOG_CHANNEL_BUFFER_ENV, defaults.channel_buffer),
            batch_size: env_parse_or(RPK_LOG_BATCH_SIZE_ENV, defaults.batch_size),
            flush_interval: Duration::from_millis(flush_ms),
            max_retries: env_parse_or(RPK_LOG_MAX_RETRIES_ENV, defaults.max_retries),
            min_level: env_parse_or(RPK_LOG_MIN_LEVEL_ENV, defaults.min_level),
            enable_stdout: env_parse_or(RPK_LOG_ENABLE_STDOUT_ENV, defaults.enable_stdout),
            sink,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Sink(#[from] SinkBuildError),

    #[error("failed to install global tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber whose events flow through the
/// application pipeline into `sink`.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`] that will receive the
///   serialized `rpk` records.
/// - `config`: [`LoggerConfig`] controlling buffering, batching and the
///   level threshold.
///
/// **Returns** the handle of the background task feeding the sink.
///
/// Must be called from within a tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: &LoggerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (logger, handle) = PipelineLogger::new(Arc::new(Pipeline::app()), sink, config);
    let layer = AppLogLayer::new(logger);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(handle)
}

/// Initialize tracing with default settings.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LoggerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(sink, &LoggerConfig::default())
}

/// Read [`LoggerConfig::from_env`], build the configured sink and install
/// the subscriber. Returns the config so callers can build an access
/// logger with the same settings.
pub fn init_from_env() -> Result<(LoggerConfig, Arc<dyn LogSink>, JoinHandle<()>), InitError> {
    let config = LoggerConfig::from_env();
    let sink = make_sink(config.sink)?;
    let handle = init_tracing_with_config(Arc::clone(&sink), &config)?;
    Ok((config, sink, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_reads_overrides_and_ignores_garbage() {
        std::env::set_var(RPK_LOG_BATCH_SIZE_ENV, "7");
        std::env::set_var(RPK_LOG_MIN_LEVEL_ENV, "debug");
        std::env::set_var(RPK_LOG_FLUSH_INTERVAL_MS_ENV, "250");
        std::env::set_var(RPK_LOG_MAX_RETRIES_ENV, "not a number");
        std::env::set_var(RPK_LOG_SINK_ENV, "noop");

        let config = LoggerConfig::from_env();

        std::env::remove_var(RPK_LOG_BATCH_SIZE_ENV);
        std::env::remove_var(RPK_LOG_MIN_LEVEL_ENV);
        std::env::remove_var(RPK_LOG_FLUSH_INTERVAL_MS_ENV);
        std::env::remove_var(RPK_LOG_MAX_RETRIES_ENV);
        std::env::remove_var(RPK_LOG_SINK_ENV);

        assert_eq!(config.batch_size, 7);
        assert_eq!(config.min_level, Level::Debug);
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.max_retries, LoggerConfig::default().max_retries);
        assert_eq!(config.sink, SinkTarget::Noop);
        assert_eq!(config.channel_buffer, 1024);
    }
}
