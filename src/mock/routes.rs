//! Route Table
//!
//! Ordered alias list read from the routes file. Each entry redirects a
//! request key, exactly or through single-segment wildcards, to another
//! on-disk target key.
//!
//! ```json
//! {
//!   "GET /test": "./GET/test",
//!   "GET /test-*": "./GET/test"
//! }
//! ```
//!
//! A `*` may only end a segment and always stands for one or more characters
//! within that single segment. There is no multi-segment wildcard: `/a/*`
//! matches `/a/b` but never `/a/b/c`.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{MockError, Result};
use crate::mock::key::{normalize_segments, parse_target, Method, MockKey};

// == Pattern ==
#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    /// Must equal the request segment
    Literal(String),
    /// Request segment must start with the prefix and have at least one more character
    Wildcard(String),
}

impl PatternSegment {
    fn parse(segment: &str) -> Result<Self> {
        match segment.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('*') => Err(MockError::InvalidPath(format!(
                "multi-segment wildcard '{}' is not supported",
                segment
            ))),
            Some(prefix) => Ok(PatternSegment::Wildcard(prefix.to_string())),
            None => Ok(PatternSegment::Literal(segment.to_string())),
        }
    }

    /// Returns the wildcard capture (empty for literals) when the segment matches.
    fn capture<'a>(&self, segment: &'a str) -> Option<&'a str> {
        match self {
            PatternSegment::Literal(lit) => (lit == segment).then_some(""),
            PatternSegment::Wildcard(prefix) => segment
                .strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty()),
        }
    }
}

/// Left-hand side of a routes-file entry, e.g. `GET /test-*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    method: Method,
    segments: Vec<PatternSegment>,
}

impl RoutePattern {
    /// Parses `"METHOD /path"`.
    pub fn parse(source: &str) -> Result<Self> {
        let (method, path) = source
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| MockError::InvalidPath(format!("expected 'METHOD /path', got '{}'", source)))?;

        let method = method.parse::<Method>()?;
        let segments = normalize_segments(path.trim())?
            .iter()
            .map(|s| PatternSegment::parse(s))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { method, segments })
    }

    /// Matches a key, returning the wildcard captures in order.
    pub fn matches(&self, key: &MockKey) -> Option<Vec<String>> {
        if self.method != key.method || self.segments.len() != key.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (pattern, segment) in self.segments.iter().zip(&key.segments) {
            let captured = pattern.capture(segment)?;
            if matches!(pattern, PatternSegment::Wildcard(_)) {
                params.push(captured.to_string());
            }
        }
        Some(params)
    }

    pub fn is_wildcard(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PatternSegment::Wildcard(_)))
    }
}

// == Route Entry ==
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Key as written in the routes file
    pub source: String,
    pub pattern: RoutePattern,
    /// Key whose files answer the request
    pub target: MockKey,
}

/// Result of a successful table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub target: MockKey,
    /// Wildcard captures in pattern order
    pub params: Vec<String>,
}

// == Route Table ==
/// Immutable, ordered alias table. Reloads build a new table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from `(pattern, target)` pairs, skipping invalid ones.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut entries = Vec::new();

        for (source, target) in pairs {
            let pattern = match RoutePattern::parse(source) {
                Ok(p) => p,
                Err(e) => {
                    warn!(route = source, error = %e, "Skipping route with invalid pattern");
                    continue;
                }
            };
            let target_key = match parse_target(target) {
                Ok(t) => t,
                Err(e) => {
                    warn!(route = source, target, error = %e, "Skipping route with invalid target");
                    continue;
                }
            };
            entries.push(RouteEntry {
                source: source.to_string(),
                pattern,
                target: target_key,
            });
        }

        Self { entries }
    }

    /// Parses routes-file content (JSON5 object), preserving declaration order.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let value: Value = json5::from_str(content).map_err(|e| MockError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let Value::Object(map) = value else {
            return Err(MockError::Parse {
                path: path.to_path_buf(),
                message: "routes file must contain an object".to_string(),
            });
        };

        let pairs = map.iter().filter_map(|(source, target)| match target.as_str() {
            Some(t) => Some((source.as_str(), t)),
            None => {
                warn!(route = %source, "Skipping route whose target is not a string");
                None
            }
        });

        Ok(Self::from_pairs(pairs))
    }

    // == Load ==
    /// Reads the routes file.
    ///
    /// A missing file is an empty table. An unreadable or malformed file is
    /// logged and also yields an empty table.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No routes file, using empty route table");
                return Self::empty();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read routes file");
                return Self::empty();
            }
        };

        match Self::parse(&content, path) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "Failed to parse routes file, using empty route table");
                Self::empty()
            }
        }
    }

    // == Match ==
    /// First entry, in declaration order, whose pattern matches `key`.
    pub fn find(&self, key: &MockKey) -> Option<RouteMatch> {
        self.entries.iter().find_map(|entry| {
            entry.pattern.matches(key).map(|params| RouteMatch {
                target: entry.target.clone(),
                params,
            })
        })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Shared Route Table ==
/// Handle to the live table. Readers take an `Arc` snapshot; reloads swap the
/// whole table, so nobody observes a partially built one.
#[derive(Debug, Clone, Default)]
pub struct SharedRouteTable {
    current: Arc<RwLock<Arc<RouteTable>>>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Loads the initial table from disk.
    pub async fn load(path: &Path) -> Self {
        Self::new(RouteTable::load(path).await)
    }

    pub async fn snapshot(&self) -> Arc<RouteTable> {
        self.current.read().await.clone()
    }

    pub async fn replace(&self, table: RouteTable) {
        *self.current.write().await = Arc::new(table);
    }

    /// Re-reads the routes file and swaps it in. Returns the new entry count.
    pub async fn reload(&self, path: &Path) -> usize {
        let table = RouteTable::load(path).await;
        let count = table.len();
        self.replace(table).await;
        info!(path = %path.display(), routes = count, "Route table reloaded");
        count
    }
}
