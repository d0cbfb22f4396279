//! Record-rewriting stages.
//!
//! Each stage is a pure `LogRecord -> LogRecord` transformation over its
//! own record plus immutable configuration. The order in which stages run
//! is validated by [`crate::pipeline::PipelineBuilder`] using each stage's
//! [`Placement`].

use crate::path::{self, FieldPath};
use crate::record::LogRecord;
use crate::redact::Redactor;
use serde_json::{Map, Value};
use std::fmt;

/// Top-level fields the common-info formatter nests under `log`.
pub const COMMON_INFO_KEYS: &[&str] = &["level", "timestamp", "message", "line", "file", "threadID"];

pub const LOG_KEY: &str = "log";
pub const META_KEY: &str = "meta";
pub const REQ_KEY: &str = "req";
pub const RES_KEY: &str = "res";

/// Root key every packaged record is nested under.
pub const NAMESPACE_ROOT: &str = "rpk";

/// Where a stage may sit within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Must run before every other stage.
    Leading,
    /// Runs between the leading and terminal stage.
    Middle,
    /// Must run after every other stage.
    Terminal,
}

pub trait Stage: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn placement(&self) -> Placement {
        Placement::Middle
    }

    fn apply(&self, record: LogRecord) -> LogRecord;
}

impl fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Log flavour written into `log.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Access,
    App,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Access => "access",
            LogType::App => "app",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moves the common top-level fields (see [`COMMON_INFO_KEYS`]) plus the
/// configured `type` under a `log` object.
#[derive(Debug, Clone)]
pub struct CommonInfoFormatter {
    log_type: LogType,
}

impl CommonInfoFormatter {
    pub fn new(log_type: LogType) -> Self {
        Self { log_type }
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }
}

impl Stage for CommonInfoFormatter {
    fn name(&self) -> &'static str {
        "common-info"
    }

    fn placement(&self) -> Placement {
        Placement::Leading
    }

    fn apply(&self, mut record: LogRecord) -> LogRecord {
        let mut nested = record.pick(COMMON_INFO_KEYS);
        nested.insert("type".to_string(), Value::String(self.log_type.to_string()));

        let fields = record.fields_mut();
        for key in COMMON_INFO_KEYS {
            fields.remove(*key);
        }

        // A caller-supplied `log` object is kept and extended.
        match fields.get_mut(LOG_KEY) {
            Some(existing) if existing.is_object() => {
                path::deep_merge(existing, Value::Object(nested))
            }
            _ => {
                fields.insert(LOG_KEY.to_string(), Value::Object(nested));
            }
        }
        record
    }
}

/// Lifts `meta.req` / `meta.res` to top-level `req` / `res`, then redacts.
#[derive(Debug, Clone)]
pub struct RequestResponseLifter {
    req_path: FieldPath,
    res_path: FieldPath,
    redactor: Redactor,
}

impl RequestResponseLifter {
    pub fn new() -> Self {
        Self {
            req_path: FieldPath::from_keys([META_KEY, REQ_KEY]),
            res_path: FieldPath::from_keys([META_KEY, RES_KEY]),
            redactor: Redactor::new(),
        }
    }
}

impl Default for RequestResponseLifter {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for RequestResponseLifter {
    fn name(&self) -> &'static str {
        "request-response-lifter"
    }

    fn apply(&self, mut record: LogRecord) -> LogRecord {
        let req = record.get(&self.req_path).cloned();
        let res = record.get(&self.res_path).cloned();

        let fields = record.fields_mut();
        for (key, lifted) in [(REQ_KEY, req), (RES_KEY, res)] {
            match lifted {
                Some(value) => {
                    fields.insert(key.to_string(), value);
                }
                None => {
                    fields.remove(key);
                }
            }
        }

        self.redactor.redact(&mut record);
        record
    }
}

/// Wraps every remaining field under [`NAMESPACE_ROOT`]. The severity
/// stays outside the namespace on the record itself.
#[derive(Debug, Clone, Default)]
pub struct SchemaPackager;

impl Stage for SchemaPackager {
    fn name(&self) -> &'static str {
        "schema-packager"
    }

    fn placement(&self) -> Placement {
        Placement::Terminal
    }

    fn apply(&self, mut record: LogRecord) -> LogRecord {
        let inner = record.replace_fields(Map::new());
        record.fields_mut().insert(NAMESPACE_ROOT.to_string(), Value::Object(inner));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use serde_json::json;

    fn record(value: Value) -> LogRecord {
        LogRecord::try_from(value).unwrap()
    }

    fn fields(record: LogRecord) -> Value {
        Value::Object(record.into_fields())
    }

    #[test]
    fn common_info_nests_known_keys() {
        let out = CommonInfoFormatter::new(LogType::App).apply(record(json!({
            "level": "error",
            "message": "boom",
            "timestamp": "t",
            "line": 42,
            "file": "main.rs",
            "threadID": "ThreadId(1)",
            "orderId": "o-1"
        })));

        assert_eq!(out.severity(), Level::Error);
        assert_eq!(
            fields(out),
            json!({
                "orderId": "o-1",
                "log": {
                    "type": "app",
                    "level": "error",
                    "message": "boom",
                    "timestamp": "t",
                    "line": 42,
                    "file": "main.rs",
                    "threadID": "ThreadId(1)"
                }
            })
        );
    }

    #[test]
    fn common_info_only_picks_present_keys() {
        let out = CommonInfoFormatter::new(LogType::Access).apply(record(json!({"level": "info"})));
        assert_eq!(fields(out), json!({"log": {"type": "access", "level": "info"}}));
    }

    #[test]
    fn common_info_extends_existing_log_object() {
        let out = CommonInfoFormatter::new(LogType::App)
            .apply(record(json!({"level": "info", "log": {"traceId": "abc"}})));
        assert_eq!(fields(out), json!({"log": {"traceId": "abc", "type": "app", "level": "info"}}));
    }

    #[test]
    fn lifter_moves_meta_and_redacts() {
        let out = RequestResponseLifter::new().apply(record(json!({
            "level": "info",
            "meta": {
                "req": {"headers": {"authorization": "Bearer x", "x-auth-token": "t", "host": "a"}},
                "res": {"statusCode": 200},
                "responseTime": 4
            }
        })));
        assert_eq!(
            fields(out),
            json!({
                "level": "info",
                "req": {"headers": {"host": "a"}},
                "res": {"statusCode": 200}
            })
        );
    }

    #[test]
    fn lifter_without_meta_leaves_req_res_absent() {
        let out = RequestResponseLifter::new().apply(record(json!({
            "level": "info",
            "req": {"headers": {"cookie": "stale"}}
        })));
        assert_eq!(fields(out), json!({"level": "info"}));
    }

    #[test]
    fn packager_nests_everything_under_namespace_root() {
        let out = SchemaPackager.apply(record(json!({"level": "warn", "log": {"type": "app"}})));
        assert_eq!(out.severity(), Level::Warn);
        assert_eq!(fields(out), json!({"rpk": {"level": "warn", "log": {"type": "app"}}}));
    }

    #[test]
    fn placements() {
        assert_eq!(CommonInfoFormatter::new(LogType::App).placement(), Placement::Leading);
        assert_eq!(RequestResponseLifter::new().placement(), Placement::Middle);
        assert_eq!(SchemaPackager.placement(), Placement::Terminal);
    }
}
