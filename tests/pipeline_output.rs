use rpk_logging::access::{AccessLogger, Exchange, RequestDescriptor, ResponseDescriptor};
use rpk_logging::init::LoggerConfig;
use rpk_logging::logger::PipelineLogger;
use rpk_logging::sink::StreamSink;
use rpk_logging::{Level, LogRecord, Pipeline};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn config() -> LoggerConfig {
    LoggerConfig { flush_interval: Duration::from_millis(10), ..LoggerConfig::default() }
}

fn lines(sink: Arc<StreamSink<Vec<u8>>>) -> Vec<Value> {
    let Ok(sink) = Arc::try_unwrap(sink) else {
        panic!("sink still shared after the logger task finished");
    };
    String::from_utf8(sink.into_inner())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn exchange(path: &str, token: &str) -> Exchange {
    let headers: BTreeMap<String, String> = [
        ("authorization", format!("Bearer {token}")),
        ("cookie", "sid=abc".to_string()),
        ("x-auth-token", token.to_string()),
        ("x-consumer-profile", "{\"id\":1}".to_string()),
        ("user-agent", "curl/8".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Exchange {
        request: RequestDescriptor {
            method: "GET".into(),
            url: path.into(),
            http_version: "1.1".into(),
            headers,
            ..RequestDescriptor::default()
        },
        response: ResponseDescriptor { status_code: 200, ..ResponseDescriptor::default() },
        response_time: Duration::from_millis(3),
    }
}

#[tokio::test]
async fn access_logger_writes_redacted_rpk_lines() {
    let sink = Arc::new(StreamSink::new(Vec::new()));
    let (logger, handle) = AccessLogger::new(sink.clone(), &config());

    logger.log_exchange(&exchange("/app/health", "secret-token"));
    drop(logger);
    handle.await.unwrap();

    let out = lines(sink);
    assert_eq!(out.len(), 1);
    let line = &out[0];

    assert_eq!(line.as_object().unwrap().len(), 2);
    assert_eq!(line["level"], json!("info"));
    assert_eq!(line["rpk"]["log"]["type"], json!("access"));
    assert_eq!(line["rpk"]["log"]["message"], json!("HTTP GET /app/health 200 3ms"));
    assert!(line["rpk"]["log"]["timestamp"].is_string());
    assert_eq!(line["rpk"]["req"]["headers"], json!({"user-agent": "curl/8"}));
    assert_eq!(line["rpk"]["res"], json!({"statusCode": 200}));
    assert!(!line.to_string().contains("secret-token"));
    assert!(line["rpk"].get("meta").is_none());
}

#[tokio::test]
async fn concurrent_callers_share_one_pipeline() {
    let sink = Arc::new(StreamSink::new(Vec::new()));
    let (logger, handle) = AccessLogger::new(sink.clone(), &config());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let logger = logger.clone();
            tokio::spawn(async move {
                logger.log_exchange(&exchange(&format!("/items/{i}"), &format!("t-{i}")));
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    drop(logger);
    handle.await.unwrap();

    let out = lines(sink);
    assert_eq!(out.len(), 16);
    for line in &out {
        assert_eq!(line["rpk"]["req"]["headers"], json!({"user-agent": "curl/8"}));
        assert!(!line.to_string().contains("Bearer"));
    }
}

#[tokio::test]
async fn app_logger_writes_two_key_lines() {
    let sink = Arc::new(StreamSink::new(Vec::new()));
    let (logger, handle) = PipelineLogger::new(Arc::new(Pipeline::app()), sink.clone(), &config());

    let record = LogRecord::try_from(json!({"level": "error", "message": "boom", "line": 42})).unwrap();
    logger.log(record);
    logger.log_with(Level::Info, "API Server started on port 3000 (development)", &json!({"port": 3000}));
    drop(logger);
    handle.await.unwrap();

    let out = lines(sink);
    assert_eq!(out.len(), 2);
    for line in &out {
        let keys: Vec<&String> = line.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["level", "rpk"]);
        assert_eq!(line["rpk"]["log"]["type"], json!("app"));
        assert!(line["rpk"].get("req").is_none());
        assert!(line["rpk"].get("res").is_none());
    }

    let first = &out[0]["rpk"]["log"];
    assert_eq!(first["level"], json!("error"));
    assert_eq!(first["message"], json!("boom"));
    assert_eq!(first["line"], json!(42));
    assert_eq!(out[1]["rpk"]["port"], json!(3000));
}
