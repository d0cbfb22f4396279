use std::str::FromStr;
use std::sync::Arc;

use crate::noop_sink::NoopSink;
use crate::sink::LogSink;

/// Sink destinations that can be selected by name, e.g. from
/// [`crate::env::RPK_LOG_SINK_ENV`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkTarget {
    Stdout,
    Stderr,
    Noop,
}

/// Error type returned when parsing a sink name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkTargetError {
    #[error("unknown log sink `{0}` (expected stdout, stderr or noop)")]
    Unknown(String),
}

impl FromStr for SinkTarget {
    type Err = SinkTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" | "console" => Ok(SinkTarget::Stdout),
            "stderr" => Ok(SinkTarget::Stderr),
            "noop" | "none" | "off" => Ok(SinkTarget::Noop),
            _ => Err(SinkTargetError::Unknown(s.to_string())),
        }
    }
}

/// Error type returned when building a sink for a target.
#[derive(thiserror::Error, Debug)]
pub enum SinkBuildError {
    #[error("console feature is not enabled")]
    ConsoleFeatureDisabled,
}

/// Create a concrete `LogSink` for a [`SinkTarget`].
pub fn make_sink(target: SinkTarget) -> Result<Arc<dyn LogSink>, SinkBuildError> {
    match target {
        SinkTarget::Noop => Ok(Arc::new(NoopSink)),
        SinkTarget::Stdout | SinkTarget::Stderr => {
            #[cfg(feature = "console")]
            {
                use crate::console::ConsoleSink;

                let sink = if target == SinkTarget::Stderr {
                    ConsoleSink::stderr_only()
                } else {
                    ConsoleSink::new()
                };
                Ok(Arc::new(sink) as Arc<dyn LogSink>)
            }

            #[cfg(not(feature = "console"))]
            {
                Err(SinkBuildError::ConsoleFeatureDisabled)
            }
        }
    }
}
