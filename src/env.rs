/// Environment variable names used by this crate for configuring the
/// loggers from a service's environment.
///
/// These are purely helpers; the pipelines themselves never read the
/// environment.

/// Capacity of the channel between callers and the sink task.
pub const RPK_LOG_CHANNEL_BUFFER_ENV: &str = "RPK_LOG_CHANNEL_BUFFER";

/// Number of records written to the sink per batch.
pub const RPK_LOG_BATCH_SIZE_ENV: &str = "RPK_LOG_BATCH_SIZE";

/// Maximum delay, in milliseconds, before a partial batch is flushed.
pub const RPK_LOG_FLUSH_INTERVAL_MS_ENV: &str = "RPK_LOG_FLUSH_INTERVAL_MS";

/// Retries for a failed batch before it is discarded.
pub const RPK_LOG_MAX_RETRIES_ENV: &str = "RPK_LOG_MAX_RETRIES";

/// Least severe level that is still logged, e.g. `info`.
pub const RPK_LOG_MIN_LEVEL_ENV: &str = "RPK_LOG_MIN_LEVEL";

/// Sink selector: `stdout`, `stderr` or `noop`.
pub const RPK_LOG_SINK_ENV: &str = "RPK_LOG_SINK";

/// Whether a human-readable `fmt` layer is installed alongside the
/// pipeline layer (`true` / `false`).
pub const RPK_LOG_ENABLE_STDOUT_ENV: &str = "RPK_LOG_ENABLE_STDOUT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable, falling back to `default` when
/// it is unset or does not parse.
pub fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            eprintln!("ignoring invalid value {raw:?} for {key}");
            default
        }),
        Err(_) => default,
    }
}
