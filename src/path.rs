//! Field-path addressing over semi-structured JSON values.
//!
//! Paths use dot-separated keys with optional bracket segments, so
//! `req.headers["x-auth-token"]`, `req.headers['cookie']` and `items[0].id`
//! are all valid. Inside a quoted bracket a backslash escapes the next
//! character, so `["say \"hi\""]` names the key `say "hi"`. Lookups and
//! removals through missing segments are no-ops; writes create
//! intermediate objects (or arrays for index segments) as needed.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    /// Key used when the segment addresses an object.
    fn as_key(&self) -> String {
        match self {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }
}

/// Parsed, validated field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

/// Error returned when a path string cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,

    #[error("empty segment in field path `{0}`")]
    EmptySegment(String),

    #[error("unclosed bracket in field path `{0}`")]
    Unclosed(String),

    #[error("unexpected character `{ch}` in field path `{path}`")]
    Unexpected { path: String, ch: char },
}

impl FieldPath {
    /// Parse a dotted/bracketed path such as `req.headers["x-auth-token"]`.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut after_bracket = false;
        let mut trailing_dot = false;
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    } else if !after_bracket {
                        return Err(PathError::EmptySegment(raw.to_string()));
                    }
                    after_bracket = false;
                    trailing_dot = true;
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    segments.push(parse_bracket(&mut chars, raw)?);
                    after_bracket = true;
                    trailing_dot = false;
                }
                ']' => {
                    return Err(PathError::Unexpected { path: raw.to_string(), ch: c });
                }
                _ => {
                    if after_bracket {
                        return Err(PathError::Unexpected { path: raw.to_string(), ch: c });
                    }
                    key.push(c);
                    trailing_dot = false;
                }
            }
        }

        if trailing_dot {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        Ok(Self { segments })
    }

    /// Path consisting of a single top-level key. The key is taken
    /// verbatim, dots included.
    pub fn key(name: impl Into<String>) -> Self {
        Self { segments: vec![Segment::Key(name.into())] }
    }

    /// Path made of plain object keys, e.g. `["meta", "req"]`.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: keys.into_iter().map(|k| Segment::Key(k.into())).collect() }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

fn parse_bracket(chars: &mut std::str::Chars<'_>, raw: &str) -> Result<Segment, PathError> {
    let unclosed = || PathError::Unclosed(raw.to_string());

    match chars.clone().next() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some('\\') => key.push(chars.next().ok_or_else(unclosed)?),
                    Some(c) => key.push(c),
                    None => return Err(unclosed()),
                }
            }
            match chars.next() {
                Some(']') => Ok(Segment::Key(key)),
                Some(c) => Err(PathError::Unexpected { path: raw.to_string(), ch: c }),
                None => Err(unclosed()),
            }
        }
        _ => {
            let mut inner = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(c) => inner.push(c),
                    None => return Err(unclosed()),
                }
            }
            if inner.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            Ok(match inner.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) => Segment::Key(inner),
            })
        }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
                Segment::Key(k) if is_plain_key(k) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                Segment::Key(k) => {
                    f.write_str("[\"")?;
                    for c in k.chars() {
                        if c == '"' || c == '\\' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{}", c)?;
                    }
                    f.write_str("\"]")?;
                }
            }
        }
        Ok(())
    }
}

fn is_plain_key(k: &str) -> bool {
    !k.is_empty()
        && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !k.chars().all(|c| c.is_ascii_digit())
}

/// Look up `path` under a record-level field map.
pub fn get<'a>(root: &'a Map<String, Value>, path: &FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.segments.split_first()?;
    let head = root.get(&first.as_key())?;
    walk(head, rest)
}

fn walk<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |cur, seg| match (seg, cur) {
        (Segment::Index(i), Value::Array(items)) => items.get(*i),
        (seg, Value::Object(map)) => map.get(&seg.as_key()),
        _ => None,
    })
}

fn walk_mut<'a>(value: &'a mut Value, segments: &[Segment]) -> Option<&'a mut Value> {
    let mut cur = value;
    for seg in segments {
        cur = match (seg, cur) {
            (Segment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
            (seg, Value::Object(map)) => map.get_mut(&seg.as_key())?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Largest array index [`set`] will pad an array out to.
pub const MAX_ARRAY_INDEX: usize = 4096;

/// Write `new` at `path`, creating intermediate containers and replacing
/// scalars that stand in the way.
///
/// A path with an index segment above [`MAX_ARRAY_INDEX`] is ignored and
/// leaves `root` untouched.
pub fn set(root: &mut Map<String, Value>, path: &FieldPath, new: Value) {
    let Some((first, rest)) = path.segments.split_first() else {
        return;
    };
    if rest.iter().any(|seg| matches!(seg, Segment::Index(i) if *i > MAX_ARRAY_INDEX)) {
        return;
    }
    let mut cur = root.entry(first.as_key()).or_insert(Value::Null);
    for seg in rest {
        cur = match seg {
            Segment::Key(k) => ensure_object(cur).entry(k.clone()).or_insert(Value::Null),
            Segment::Index(i) => {
                let items = ensure_array(cur);
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                &mut items[*i]
            }
        };
    }
    *cur = new;
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn ensure_array(value: &mut Value) -> &mut Vec<Value> {
    if !value.is_array() {
        *value = Value::Array(Vec::new());
    }
    match value {
        Value::Array(items) => items,
        _ => unreachable!(),
    }
}

/// Delete the value at `path` and return it. Missing segments make this a
/// no-op. Array slots are nulled rather than shifted so sibling indices
/// stay stable.
pub fn remove(root: &mut Map<String, Value>, path: &FieldPath) -> Option<Value> {
    let (last, parents) = path.segments.split_last()?;
    let Some((first, middle)) = parents.split_first() else {
        return root.remove(&last.as_key());
    };

    let parent = walk_mut(root.get_mut(&first.as_key())?, middle)?;
    match (last, parent) {
        (Segment::Index(i), Value::Array(items)) => {
            items.get_mut(*i).map(|slot| std::mem::replace(slot, Value::Null))
        }
        (seg, Value::Object(map)) => map.remove(&seg.as_key()),
        _ => None,
    }
}

/// Project the given top-level keys out of `root`, skipping absent ones.
pub fn pick(root: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| root.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

/// Shallow union: every key of `source` overrides the same key in `target`.
pub fn merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (k, v) in source {
        target.insert(k, v);
    }
}

/// Recursive union of objects. Non-object values in `source` replace
/// whatever `target` holds at the same position.
pub fn deep_merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                match dst.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst.insert(k, v);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}
