//! Typed JSON paths
//!
//! A path is a sequence of segments evaluated left to right against a
//! `serde_json::Value`. The textual grammar is dot separated:
//!
//! ```text
//! data                      field access
//! data.[0].id               fixed index into a sequence
//! data.[].id                wildcard, one match per element
//! data.[?eventType=X].id    elements whose `eventType` equals X
//! ```
//!
//! `field[0]` (no dot before the bracket) is accepted as well. Paths are
//! parsed once, so a malformed expression fails at construction instead of
//! at first lookup.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{E2eError, E2eResult};

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
    Filter { key: String, value: String },
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, "{name}"),
            Segment::Index(i) => write!(f, "[{i}]"),
            Segment::Wildcard => write!(f, "[]"),
            Segment::Filter { key, value } => write!(f, "[?{key}={value}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// The empty path, which matches the whole document
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> E2eResult<Self> {
        let raw_trimmed = raw.trim();
        if raw_trimmed == "$" {
            return Ok(Self::root());
        }
        if raw_trimmed.is_empty() {
            return Err(syntax(raw, "empty path"));
        }

        let chars: Vec<char> = raw_trimmed.chars().collect();
        let mut segments = Vec::new();
        let mut pos = 0;
        let mut expect_segment = true;

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    if expect_segment {
                        return Err(syntax(raw, &format!("empty segment at offset {pos}")));
                    }
                    expect_segment = true;
                    pos += 1;
                }
                '[' => {
                    let close = chars[pos..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| pos + offset)
                        .ok_or_else(|| syntax(raw, &format!("unclosed `[` at offset {pos}")))?;
                    let inner: String = chars[pos + 1..close].iter().collect();
                    segments.push(parse_bracket(raw, &inner)?);
                    expect_segment = false;
                    pos = close + 1;
                }
                ']' => return Err(syntax(raw, &format!("unexpected `]` at offset {pos}"))),
                _ => {
                    if !expect_segment {
                        return Err(syntax(raw, &format!("missing `.` before offset {pos}")));
                    }
                    let start = pos;
                    while pos < chars.len() && !matches!(chars[pos], '.' | '[' | ']') {
                        pos += 1;
                    }
                    let name: String = chars[start..pos].iter().collect();
                    segments.push(Segment::Field(name));
                    expect_segment = false;
                }
            }
        }

        if expect_segment {
            return Err(syntax(raw, "path ends with `.`"));
        }

        Ok(Self { segments })
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.segments.push(Segment::Field(name.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.segments.push(Segment::Index(index));
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.segments.push(Segment::Wildcard);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.segments.push(Segment::Filter {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Every value the path reaches, in document order
    pub fn matches<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![document];

        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Field(name) => {
                        if let Some(found) = value.as_object().and_then(|map| map.get(name)) {
                            next.push(found);
                        }
                    }
                    Segment::Index(i) => {
                        if let Some(found) = value.as_array().and_then(|items| items.get(*i)) {
                            next.push(found);
                        }
                    }
                    Segment::Wildcard => {
                        if let Some(items) = value.as_array() {
                            next.extend(items.iter());
                        }
                    }
                    Segment::Filter { key, value: wanted } => {
                        if let Some(items) = value.as_array() {
                            next.extend(items.iter().filter(|item| {
                                item.get(key)
                                    .map(|field| scalar_matches(field, wanted))
                                    .unwrap_or(false)
                            }));
                        }
                    }
                }
            }
            current = next;
        }

        current
    }

    /// First match, or `PathNotFound` carrying the searched document
    pub fn first<'a>(&self, document: &'a Value) -> E2eResult<&'a Value> {
        self.nth(document, 0)
    }

    /// Nth match (zero based) among all matches
    pub fn nth<'a>(&self, document: &'a Value, n: usize) -> E2eResult<&'a Value> {
        self.matches(document)
            .into_iter()
            .nth(n)
            .ok_or_else(|| E2eError::PathNotFound {
                path: if n == 0 {
                    self.to_string()
                } else {
                    format!("{self} (match #{n})")
                },
                document: document.clone(),
            })
    }

    /// Whether at least one value exists at this path
    pub fn exists(&self, document: &Value) -> bool {
        !self.matches(document).is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for JsonPath {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for JsonPath {
    type Error = E2eError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn parse_bracket(raw: &str, inner: &str) -> E2eResult<Segment> {
    let inner = inner.trim();

    if inner.is_empty() || inner == "*" {
        return Ok(Segment::Wildcard);
    }

    if let Some(filter) = inner.strip_prefix('?') {
        let (key, value) = filter
            .split_once('=')
            .ok_or_else(|| syntax(raw, &format!("filter `[{inner}]` needs `key=value`")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(syntax(raw, &format!("filter `[{inner}]` has an empty key")));
        }
        return Ok(Segment::Filter {
            key: key.to_string(),
            value: unquote(value.trim()).to_string(),
        });
    }

    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| syntax(raw, &format!("`[{inner}]` is not an index, wildcard or filter")))
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(stripped) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return stripped;
        }
    }
    value
}

/// Filter comparison: strings compare by content, other scalars by their JSON text
fn scalar_matches(field: &Value, wanted: &str) -> bool {
    match field {
        Value::String(s) => s == wanted,
        Value::Array(_) | Value::Object(_) => false,
        other => other.to_string() == wanted,
    }
}

fn syntax(path: &str, reason: &str) -> E2eError {
    E2eError::PathSyntax {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
