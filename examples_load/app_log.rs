use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use rpk_logging::console::ConsoleSink;
use rpk_logging::init::{init_tracing_with_config, LoggerConfig};
use rpk_logging::Level;

#[tokio::main]
async fn main() {
    let config = LoggerConfig { flush_interval: Duration::from_millis(50), ..LoggerConfig::from_env() };
    let sink = Arc::new(ConsoleSink::with_stderr_levels(vec![Level::Error]));
    if let Err(e) = init_tracing_with_config(sink, &config) {
        eprintln!("{e}");
        return;
    }

    info!(port = 3000, "API Server started on port 3000 (development)");
    error!(user_id = 42, reason = "invalid password", "authentication failed");

    sleep(Duration::from_millis(200)).await;
}
