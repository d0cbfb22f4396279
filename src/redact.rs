//! Fixed redaction of sensitive and redundant access-log fields.
//!
//! The path list is static. Callers cannot extend or shrink it at runtime;
//! adding a path means changing [`REDACTED_PATHS`].

use crate::path::FieldPath;
use crate::record::LogRecord;

/// Paths that must never reach a sink.
pub const REDACTED_PATHS: &[&str] = &[
    "meta",
    "req.headers.authorization",
    "req.headers.cookie",
    r#"req.headers["x-auth-token"]"#,
    r#"req.headers["x-consumer-profile"]"#,
];

/// Deletes every path of [`REDACTED_PATHS`] from a record.
#[derive(Debug, Clone)]
pub struct Redactor {
    paths: Vec<FieldPath>,
}

impl Redactor {
    pub fn new() -> Self {
        let paths = REDACTED_PATHS
            .iter()
            .filter_map(|raw| match FieldPath::parse(raw) {
                Ok(path) => Some(path),
                Err(e) => {
                    eprintln!("skipping invalid redaction path {raw}: {e}");
                    None
                }
            })
            .collect();
        Self { paths }
    }

    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }

    /// Remove every redacted path that is present. Absent paths are
    /// skipped, so applying this twice is the same as applying it once.
    pub fn redact(&self, record: &mut LogRecord) {
        for path in &self.paths {
            record.remove(path);
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> LogRecord {
        LogRecord::try_from(value).unwrap()
    }

    #[test]
    fn every_static_path_parses() {
        assert_eq!(Redactor::new().paths().len(), REDACTED_PATHS.len());
    }

    #[test]
    fn strips_sensitive_headers_and_meta() {
        let mut rec = record(json!({
            "level": "info",
            "meta": {"anything": true},
            "req": {"headers": {
                "authorization": "Bearer x",
                "cookie": "sid=1",
                "x-auth-token": "t",
                "x-consumer-profile": "p",
                "host": "a"
            }},
            "res": {"headers": {"cookie": "kept on the response side"}}
        }));

        Redactor::new().redact(&mut rec);

        assert_eq!(
            Value::Object(rec.into_fields()),
            json!({
                "level": "info",
                "req": {"headers": {"host": "a"}},
                "res": {"headers": {"cookie": "kept on the response side"}}
            })
        );
    }

    #[test]
    fn missing_paths_are_ignored() {
        let mut rec = record(json!({"level": "info", "req": "not an object"}));
        let before = rec.clone();
        Redactor::new().redact(&mut rec);
        assert_eq!(rec, before);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn header_name() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("authorization".to_string()),
                Just("cookie".to_string()),
                Just("x-auth-token".to_string()),
                Just("x-consumer-profile".to_string()),
                "[a-z-]{1,12}",
            ]
        }

        proptest! {
            /// Redacting an already redacted record changes nothing.
            #[test]
            fn redaction_is_idempotent(
                headers in proptest::collection::btree_map(header_name(), "[ -~]{0,16}", 0..8),
                with_meta in any::<bool>(),
            ) {
                let mut value = json!({"level": "info", "req": {"headers": headers}});
                if with_meta {
                    value["meta"] = json!({"req": {}});
                }
                let redactor = Redactor::new();

                let mut once = record(value);
                redactor.redact(&mut once);
                let mut twice = once.clone();
                redactor.redact(&mut twice);

                prop_assert_eq!(&once, &twice);
                prop_assert!(once.fields().get("meta").is_none());
                for path in redactor.paths() {
                    prop_assert!(once.get(path).is_none());
                }
            }
        }
    }
}
