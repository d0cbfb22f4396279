use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use rpk_logging::access::{AccessLogger, Exchange, RequestDescriptor, ResponseDescriptor};
use rpk_logging::console::ConsoleSink;
use rpk_logging::init::LoggerConfig;
use serde_json::json;

/// Stand-in for an HTTP framework hook: describe each finished request
/// and hand it to the access logger.
#[tokio::main]
async fn main() {
    let config = LoggerConfig::from_env();
    let (logger, handle) = AccessLogger::new(Arc::new(ConsoleSink::new()), &config);

    for path in ["/api/status", "/app/health", "/app/deephealth"] {
        let started = Instant::now();

        let mut headers = BTreeMap::new();
        headers.insert("Host".to_string(), "localhost:3000".to_string());
        headers.insert("Authorization".to_string(), "Bearer not-for-the-logs".to_string());
        headers.insert("Cookie".to_string(), "sid=abc".to_string());

        let exchange = Exchange {
            request: RequestDescriptor {
                method: "GET".into(),
                url: path.into(),
                original_url: Some(path.into()),
                http_version: "1.1".into(),
                headers,
                ..RequestDescriptor::default()
            },
            response: ResponseDescriptor {
                status_code: 200,
                body: Some(json!({"statusCode": 200, "status": "OK"})),
                ..ResponseDescriptor::default()
            },
            response_time: started.elapsed().max(Duration::from_millis(1)),
        };
        logger.log_exchange(&exchange);
    }

    drop(logger);
    if let Err(e) = handle.await {
        eprintln!("access log task failed: {e}");
    }
}
