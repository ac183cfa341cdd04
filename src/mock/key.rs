//! Path Codec
//!
//! Pure conversions between a request `(method, path)`, its canonical
//! [`MockKey`], and the file that backs it on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MockError, Result};

/// Segment used for the root path.
pub const INDEX_SEGMENT: &str = "index";

// == Method ==
/// HTTP methods that have a data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Uppercase name, also used as the directory name under the data root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(MockError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Mock Key ==
/// Canonical identifier of a mocked route.
///
/// Two requests with the same method and normalized path always produce
/// equal keys. Segments are never empty and never `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockKey {
    pub method: Method,
    pub segments: Vec<String>,
}

impl MockKey {
    pub fn new(method: Method, segments: Vec<String>) -> Self {
        Self { method, segments }
    }

    /// Normalized request path, e.g. `/users/42`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl fmt::Display for MockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path())
    }
}

// == Encode ==
/// Converts a method and URL path into a [`MockKey`].
///
/// The query string and fragment are dropped, repeated and trailing slashes
/// collapse, `.` and `..` are resolved without climbing above the root, and
/// the root path becomes `index`.
pub fn encode(method: &str, url_path: &str) -> Result<MockKey> {
    let method = method.parse::<Method>()?;
    let segments = normalize_segments(url_path)?;
    Ok(MockKey::new(method, segments))
}

/// Splits a URL path into normalized segments.
pub fn normalize_segments(url_path: &str) -> Result<Vec<String>> {
    let path = url_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if path.chars().any(char::is_control) {
        return Err(MockError::InvalidPath(path.escape_default().to_string()));
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_string()),
        }
    }

    if segments.is_empty() {
        segments.push(INDEX_SEGMENT.to_string());
    }

    Ok(segments)
}

// == To File Path ==
/// Joins `root/METHOD/seg/.../last.ext`.
///
/// The extension is appended, never substituted, so a segment such as
/// `v1.2` keeps its dot.
pub fn to_file_path(key: &MockKey, root: &Path, ext: &str) -> PathBuf {
    let ext = ext.trim_start_matches('.');
    let mut path = root.join(key.method.as_str());

    if let Some((last, parents)) = key.segments.split_last() {
        for segment in parents {
            path.push(segment);
        }
        path.push(format!("{}.{}", last, ext));
    }

    path
}

// == Parse Target ==
/// Parses a route-table target such as `./GET/test`, `GET/test` or `GET /test`.
pub fn parse_target(target: &str) -> Result<MockKey> {
    let target = target.trim();

    if let Some((method, path)) = target.split_once(char::is_whitespace) {
        return encode(method, path.trim());
    }

    let target = target.trim_start_matches("./").trim_start_matches('/');
    let (method, path) = target.split_once('/').unwrap_or((target, ""));
    encode(method, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segs(key: &MockKey) -> Vec<&str> {
        key.segments.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_encode_basic() {
        let key = encode("get", "/users/42").unwrap();
        assert_eq!(key.method, Method::Get);
        assert_eq!(segs(&key), ["users", "42"]);
        assert_eq!(key.to_string(), "GET /users/42");
    }

    #[test]
    fn test_encode_root_is_index() {
        assert_eq!(segs(&encode("GET", "/").unwrap()), ["index"]);
        assert_eq!(segs(&encode("GET", "").unwrap()), ["index"]);
        assert_eq!(segs(&encode("GET", "/?q=1").unwrap()), ["index"]);
    }

    #[test]
    fn test_encode_normalizes() {
        let expected = encode("POST", "/a/b").unwrap();
        for path in ["/a/b/", "//a//b", "/a/b?x=1", "/a/b#frag", "/a/./b", "/a/c/../b"] {
            assert_eq!(encode("post", path).unwrap(), expected, "path {}", path);
        }
    }

    #[test]
    fn test_encode_never_escapes_root() {
        let key = encode("GET", "/../../etc/passwd").unwrap();
        assert_eq!(segs(&key), ["etc", "passwd"]);
    }

    #[test]
    fn test_encode_rejects_null_byte() {
        assert!(matches!(
            encode("GET", "/a\0b"),
            Err(MockError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_encode_rejects_unknown_method() {
        assert!(matches!(
            encode("PATCH", "/a"),
            Err(MockError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_to_file_path() {
        let key = encode("GET", "/users/v1.2").unwrap();
        let path = to_file_path(&key, Path::new("/mock/data"), "json");
        assert_eq!(path, PathBuf::from("/mock/data/GET/users/v1.2.json"));

        let key = encode("DELETE", "/").unwrap();
        let path = to_file_path(&key, Path::new("/mock/data"), ".rhai");
        assert_eq!(path, PathBuf::from("/mock/data/DELETE/index.rhai"));
    }

    #[test]
    fn test_parse_target_forms() {
        let expected = encode("GET", "/test").unwrap();
        assert_eq!(parse_target("./GET/test").unwrap(), expected);
        assert_eq!(parse_target("GET/test").unwrap(), expected);
        assert_eq!(parse_target("GET /test").unwrap(), expected);
        assert_eq!(parse_target("/GET/test/").unwrap(), expected);
        assert_eq!(segs(&parse_target("./PUT").unwrap()), ["index"]);
        assert!(parse_target("./HEAD/test").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // Encoding is a pure function of method and path, and appending a
        // trailing slash or a query string never changes the key.
        #[test]
        fn prop_encode_is_stable(
            method in prop_oneof![Just("get"), Just("POST"), Just("Put"), Just("delete")],
            parts in prop::collection::vec("[a-z0-9_-]{1,8}", 0..5)
        ) {
            let path = format!("/{}", parts.join("/"));
            let key = encode(method, &path).unwrap();

            prop_assert_eq!(&encode(method, &path).unwrap(), &key);
            prop_assert_eq!(&encode(method, &format!("{}/", path)).unwrap(), &key);
            prop_assert_eq!(&encode(method, &format!("{}?a=b", path)).unwrap(), &key);

            let root = Path::new("/mock/data");
            prop_assert_eq!(to_file_path(&key, root, "json"), to_file_path(&key, root, "json"));
            prop_assert!(key.segments.iter().all(|s| !s.is_empty()));
        }
    }
}
