//! HTTP access logging.
//!
//! The HTTP framework is kept at arm's length: instrumentation code builds
//! an [`Exchange`] describing a completed request/response pair and hands
//! it to an [`AccessLogger`]. The [`AccessRecorder`] turns the exchange into
//! a record whose `meta.req` / `meta.res` bags hold the allow-listed
//! request and response fields; the access pipeline then lifts and
//! redacts them.

use crate::init::LoggerConfig;
use crate::level::Level;
use crate::logger::PipelineLogger;
use crate::pipeline::Pipeline;
use crate::record::{LogRecord, RecordError};
use crate::sink::LogSink;
use crate::stage::{META_KEY, REQ_KEY, RES_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Request fields captured when no allow-list is configured.
pub const DEFAULT_REQUEST_FIELDS: &[&str] =
    &["url", "headers", "method", "httpVersion", "originalUrl", "query"];

/// Response fields captured when no allow-list is configured.
pub const DEFAULT_RESPONSE_FIELDS: &[&str] = &["statusCode"];

const RESPONSE_TIME_KEY: &str = "responseTime";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    pub http_version: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// A completed request/response pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    pub request: RequestDescriptor,
    pub response: ResponseDescriptor,
    pub response_time: Duration,
}

/// Which request/response fields are copied into the side-channel bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureAllowList {
    request: Vec<String>,
    response: Vec<String>,
}

impl CaptureAllowList {
    /// [`DEFAULT_REQUEST_FIELDS`] and [`DEFAULT_RESPONSE_FIELDS`].
    pub fn defaults() -> Self {
        Self {
            request: DEFAULT_REQUEST_FIELDS.iter().map(|s| s.to_string()).collect(),
            response: DEFAULT_RESPONSE_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Defaults plus request and response bodies. This is what the access
    /// pipeline is configured with.
    pub fn with_bodies() -> Self {
        Self::defaults().allow_request("body").allow_response("body")
    }

    pub fn allow_request(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.request.contains(&field) {
            self.request.push(field);
        }
        self
    }

    pub fn allow_response(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.response.contains(&field) {
            self.response.push(field);
        }
        self
    }

    pub fn request_fields(&self) -> &[String] {
        &self.request
    }

    pub fn response_fields(&self) -> &[String] {
        &self.response
    }
}

impl Default for CaptureAllowList {
    fn default() -> Self {
        Self::with_bodies()
    }
}

/// Builds access-log records from [`Exchange`]s.
#[derive(Debug, Clone, Default)]
pub struct AccessRecorder {
    capture: CaptureAllowList,
    status_levels: bool,
}

impl AccessRecorder {
    pub fn new(capture: CaptureAllowList) -> Self {
        Self { capture, status_levels: false }
    }

    /// When enabled, 5xx responses log at `error` and 4xx at `warn`;
    /// otherwise every exchange logs at `info`.
    pub fn with_status_levels(mut self, enabled: bool) -> Self {
        self.status_levels = enabled;
        self
    }

    pub fn capture(&self) -> &CaptureAllowList {
        &self.capture
    }

    pub fn level_for(&self, status_code: u16) -> Level {
        match status_code {
            500..=u16::MAX if self.status_levels => Level::Error,
            400..=499 if self.status_levels => Level::Warn,
            _ => Level::Info,
        }
    }

    /// `HTTP <method> <url> <status> <ms>ms`
    pub fn message(exchange: &Exchange) -> String {
        format!(
            "HTTP {} {} {} {}ms",
            exchange.request.method,
            exchange.request.url,
            exchange.response.status_code,
            exchange.response_time.as_millis()
        )
    }

    /// Record shaped `{level, message, meta: {req, res, responseTime}}`.
    pub fn record(&self, exchange: &Exchange) -> Result<LogRecord, RecordError> {
        let response_time = Value::from(exchange.response_time.as_millis() as u64);

        let mut request = exchange.request.clone();
        request.headers = lowercase_keys(&request.headers);
        let req = capture(&request, self.capture.request_fields(), "meta.req")?;

        let mut response = exchange.response.clone();
        response.headers = lowercase_keys(&response.headers);
        let mut res = capture_all(&response, "meta.res")?;
        res.insert(RESPONSE_TIME_KEY.to_string(), response_time.clone());
        let res = select(res, self.capture.response_fields());

        let mut meta = Map::new();
        meta.insert(REQ_KEY.to_string(), Value::Object(req));
        meta.insert(RES_KEY.to_string(), Value::Object(res));
        meta.insert(RESPONSE_TIME_KEY.to_string(), response_time);

        let level = self.level_for(exchange.response.status_code);
        Ok(LogRecord::new(level, Self::message(exchange)).with(META_KEY, Value::Object(meta)))
    }
}

fn lowercase_keys(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect()
}

fn capture_all<T: Serialize>(descriptor: &T, key: &str) -> Result<Map<String, Value>, RecordError> {
    match serde_json::to_value(descriptor) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RecordError::NotAnObject),
        Err(source) => Err(RecordError::Serialize { key: key.to_string(), source }),
    }
}

fn capture<T: Serialize>(
    descriptor: &T,
    allowed: &[String],
    key: &str,
) -> Result<Map<String, Value>, RecordError> {
    Ok(select(capture_all(descriptor, key)?, allowed))
}

fn select(mut all: Map<String, Value>, allowed: &[String]) -> Map<String, Value> {
    allowed
        .iter()
        .filter_map(|field| all.remove(field).map(|v| (field.clone(), v)))
        .collect()
}

/// [`AccessRecorder`] feeding the access [`Pipeline`].
#[derive(Clone)]
pub struct AccessLogger {
    recorder: Arc<AccessRecorder>,
    logger: PipelineLogger,
}

impl AccessLogger {
    /// Access logger with the body-capturing allow-list.
    pub fn new(sink: Arc<dyn LogSink>, config: &LoggerConfig) -> (Self, JoinHandle<()>) {
        Self::with_recorder(AccessRecorder::new(CaptureAllowList::with_bodies()), sink, config)
    }

    pub fn with_recorder(
        recorder: AccessRecorder,
        sink: Arc<dyn LogSink>,
        config: &LoggerConfig,
    ) -> (Self, JoinHandle<()>) {
        let (logger, handle) = PipelineLogger::new(Arc::new(Pipeline::access()), sink, config);
        (Self { recorder: Arc::new(recorder), logger }, handle)
    }

    pub fn logger(&self) -> &PipelineLogger {
        &self.logger
    }

    /// Log one completed exchange. Failures are counted on the underlying
    /// logger and never returned.
    pub fn log_exchange(&self, exchange: &Exchange) {
        match self.recorder.record(exchange) {
            Ok(record) => self.logger.log(record),
            Err(e) => self.logger.report_failure(&e),
        }
    }
}
