use crate::level::Level;
use crate::logger::PipelineLogger;
use crate::record::{LogRecord, LEVEL_KEY, MESSAGE_KEY};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into
/// application-log records and hands them to a [`PipelineLogger`],
/// normally one built around [`crate::pipeline::Pipeline::app`].
///
/// The event message becomes `message`; source file, line and the
/// current thread id become `file`, `line` and `threadID`; every other
/// event field is kept as a top-level payload field.
pub struct AppLogLayer {
    logger: PipelineLogger,
}

impl AppLogLayer {
    pub fn new(logger: PipelineLogger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &PipelineLogger {
        &self.logger
    }
}

impl<S> Layer<S> for AppLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.logger.enabled(level) {
            self.logger.skip();
            return;
        }

        let mut fields = Map::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        fields.insert(LEVEL_KEY.to_string(), Value::String(level.to_string()));
        fields.insert(MESSAGE_KEY.to_string(), Value::String(message.unwrap_or_default()));
        if let Some(file) = meta.file() {
            fields.insert("file".to_string(), Value::String(file.to_string()));
        }
        if let Some(line) = meta.line() {
            fields.insert("line".to_string(), Value::from(line));
        }
        fields.insert(
            "threadID".to_string(),
            Value::String(format!("{:?}", std::thread::current().id())),
        );

        self.logger.log(LogRecord::from_fields(level, fields));
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_KEY {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // Non-finite floats have no JSON form and become null.
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == MESSAGE_KEY {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::LoggerConfig;
    use crate::pipeline::Pipeline;
    use crate::noop_sink::NoopSink;
    use crate::record::SerializedRecord;
    use crate::sink::LogSink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::error::Error;
    use std::sync::{Arc, Mutex};
    use tokio::time::Duration;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<SerializedRecord>>,
    }

    #[async_trait]
    impl LogSink for CollectingSink {
        async fn send(&self, record: &SerializedRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn tracing_events_become_app_records() {
        let sink = Arc::new(CollectingSink::default());
        let config = LoggerConfig { flush_interval: Duration::from_millis(10), ..LoggerConfig::default() };
        let (logger, handle) = PipelineLogger::new(Arc::new(Pipeline::app()), sink.clone(), &config);

        let subscriber = Registry::default().with(AppLogLayer::new(logger));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(order_id = 42, retry = true, "payment failed");
            tracing::debug!("below the default threshold");
        });
        // Dropping the subscriber drops the last logger clone.
        handle.await.unwrap();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Error);

        let out: Value = serde_json::from_str(&records[0].json).unwrap();
        assert_eq!(out.as_object().unwrap().len(), 2);
        let log = &out["rpk"]["log"];
        assert_eq!(log["type"], json!("app"));
        assert_eq!(log["level"], json!("error"));
        assert_eq!(log["message"], json!("payment failed"));
        assert!(log["line"].is_u64());
        assert!(log["file"].as_str().unwrap().ends_with("layer.rs"));
        assert!(log["threadID"].as_str().unwrap().starts_with("ThreadId("));
        assert_eq!(out["rpk"]["order_id"], json!(42));
        assert_eq!(out["rpk"]["retry"], json!(true));
    }

    #[tokio::test]
    async fn layer_respects_logger_threshold() {
        let config = LoggerConfig { min_level: Level::Error, ..LoggerConfig::default() };
        let (logger, handle) = PipelineLogger::new(Arc::new(Pipeline::app()), Arc::new(NoopSink), &config);
        let total = logger.total_events.clone();
        let enqueued = logger.enqueued_events.clone();

        let subscriber = Registry::default().with(AppLogLayer::new(logger));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("filtered before the visitor runs");
        });
        handle.await.unwrap();

        // Counted, but never visited or queued.
        assert_eq!(total.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(enqueued.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
