use crate::level::{Level, ParseLevelError};
use crate::path::{self, FieldPath};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

pub const LEVEL_KEY: &str = "level";
pub const MESSAGE_KEY: &str = "message";
pub const TIMESTAMP_KEY: &str = "timestamp";

/// One in-flight log event.
///
/// `severity` is the level indicator sinks route on; it lives outside the
/// field map so it survives any reshaping the pipeline stages perform.
/// The field map holds everything that ends up in the serialized payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    severity: Level,
    fields: Map<String, Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("field `{key}` is not serializable: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("log record must be a JSON object")]
    NotAnObject,

    #[error("log record has no `level` field")]
    MissingLevel,

    #[error(transparent)]
    InvalidLevel(#[from] ParseLevelError),
}

impl LogRecord {
    /// Fresh record carrying `level` and `message` fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(LEVEL_KEY.to_string(), Value::String(level.to_string()));
        fields.insert(MESSAGE_KEY.to_string(), Value::String(message.into()));
        Self { severity: level, fields }
    }

    /// Record over an existing field map. The map is taken as-is; it is not
    /// required to contain a `level` entry.
    pub fn from_fields(severity: Level, fields: Map<String, Value>) -> Self {
        Self { severity, fields }
    }

    pub fn severity(&self) -> Level {
        self.severity
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Builder-style insert of an already-converted value.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Builder-style insert of any serializable value.
    pub fn try_with<T: serde::Serialize>(
        mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Self, RecordError> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|source| RecordError::Serialize { key: key.clone(), source })?;
        self.fields.insert(key, value);
        Ok(self)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path::get(&self.fields, path)
    }

    pub fn set(&mut self, path: &FieldPath, value: Value) {
        path::set(&mut self.fields, path, value);
    }

    pub fn remove(&mut self, path: &FieldPath) -> Option<Value> {
        path::remove(&mut self.fields, path)
    }

    pub fn merge(&mut self, other: Map<String, Value>) {
        path::merge(&mut self.fields, other);
    }

    pub fn pick(&self, keys: &[&str]) -> Map<String, Value> {
        path::pick(&self.fields, keys)
    }

    /// Swap the whole field map, keeping the severity.
    pub fn replace_fields(&mut self, fields: Map<String, Value>) -> Map<String, Value> {
        std::mem::replace(&mut self.fields, fields)
    }

    /// Insert an RFC 3339 `timestamp` unless the record already has one.
    pub fn stamp(&mut self, at: DateTime<Utc>) {
        if !self.fields.contains_key(TIMESTAMP_KEY) {
            self.fields.insert(
                TIMESTAMP_KEY.to_string(),
                Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
    }
}

impl TryFrom<Value> for LogRecord {
    type Error = RecordError;

    /// Build a record from a JSON object whose `level` field names the
    /// severity, e.g. `{"level": "info", "message": "hit"}`.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(fields) = value else {
            return Err(RecordError::NotAnObject);
        };
        let severity = fields
            .get(LEVEL_KEY)
            .and_then(Value::as_str)
            .ok_or(RecordError::MissingLevel)?
            .parse::<Level>()?;
        Ok(Self { severity, fields })
    }
}

/// Serializes as one JSON object: the severity under `level`, followed by
/// every field except a stale `level` entry.
impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = self.fields.len() - usize::from(self.fields.contains_key(LEVEL_KEY));
        let mut map = serializer.serialize_map(Some(extra + 1))?;
        map.serialize_entry(LEVEL_KEY, &self.severity)?;
        for (k, v) in self.fields.iter().filter(|(k, _)| k.as_str() != LEVEL_KEY) {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// A fully processed record, ready for a sink: the severity for routing
/// and the JSON line to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedRecord {
    pub level: Level,
    pub json: String,
}
