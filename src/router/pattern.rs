//! Path templates.
//!
//! A template is a `/`-separated list of segments:
//!
//! - `roles` matches that literal segment
//! - `{name}` captures exactly one segment
//! - `{*path}` captures one or more trailing segments and must come last

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{BackendError, BackendResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
    CatchAll(String),
}

impl Segment {
    /// Higher outranks lower at the same position
    fn weight(&self) -> u8 {
        match self {
            Segment::Literal(_) => 3,
            Segment::Capture(_) => 2,
            Segment::CatchAll(_) => 1,
        }
    }
}

/// A parsed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> BackendResult<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(BackendError::internal("route pattern must not be empty"));
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut names: Vec<&str> = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (catch_all, name) = match inner.strip_prefix('*') {
                        Some(name) => (true, name),
                        None => (false, inner),
                    };
                    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        return Err(BackendError::internal(format!(
                            "route pattern '{}' has an invalid capture name",
                            raw
                        )));
                    }
                    if names.contains(&name) {
                        return Err(BackendError::internal(format!(
                            "route pattern '{}' repeats capture '{}'",
                            raw, name
                        )));
                    }
                    names.push(name);
                    if catch_all {
                        if index + 1 != parts.len() {
                            return Err(BackendError::internal(format!(
                                "catch-all in route pattern '{}' must be the last segment",
                                raw
                            )));
                        }
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Capture(name.to_string())
                    }
                }
                None if part.is_empty() || part.contains(['{', '}']) => {
                    return Err(BackendError::internal(format!("invalid route pattern '{}'", raw)));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { raw: trimmed.to_string(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Template with capture names erased; two patterns with the same shape
    /// match exactly the same paths.
    pub fn shape(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.as_str(),
                Segment::Capture(_) => "{}",
                Segment::CatchAll(_) => "{*}",
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Specificity key: per-position weights compared lexicographically, so a
    /// literal beats a capture beats a catch-all at the first differing
    /// position, and on an equal prefix the longer pattern wins.
    pub fn rank(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::weight).collect()
    }

    /// Match a normalized path, returning its captures
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let parts: Vec<&str> = path.split('/').collect();
        let mut captures = Captures::default();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    let part = parts.get(index)?;
                    captures.insert(name, part);
                }
                Segment::CatchAll(name) => {
                    if index >= parts.len() {
                        return None;
                    }
                    captures.insert(name, &parts[index..].join("/"));
                    return Some(captures);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Values captured from a path by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(BTreeMap<String, String>);

impl Captures {
    fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// A capture the route's own pattern guarantees
    pub fn require(&self, name: &str) -> BackendResult<&str> {
        self.get(name)
            .ok_or_else(|| BackendError::internal(format!("route did not capture '{}'", name)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
