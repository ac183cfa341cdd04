//! Response models
//!
//! The per-request [`MockArtifact`] plus the bodies of the `/_mock` admin endpoints.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::CacheStats;
use crate::error::MockError;
use crate::mock::MockKey;

/// Header naming the key whose files produced a response.
pub const MOCK_TARGET_HEADER: &str = "x-mock-target";

// == Mock Artifact ==
/// Resolved output for one request. Built per request and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct MockArtifact {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl MockArtifact {
    /// 200 with the resolved body, tagged with the target that produced it.
    pub fn ok(target: &MockKey, body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                (MOCK_TARGET_HEADER.to_string(), target.to_string()),
            ],
            body,
        }
    }

    /// 404 for a key with neither a data nor a logic file.
    pub fn not_found(target: &MockKey) -> Self {
        Self::error(
            StatusCode::NOT_FOUND,
            format!("No mock data for {}", target),
        )
    }

    pub fn from_error(err: &MockError) -> Self {
        Self::error(err.status_code(), err.to_string())
    }

    fn error(status: StatusCode, message: String) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: json!({ "error": message }),
        }
    }
}

impl IntoResponse for MockArtifact {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }

        response
    }
}

/// Response body for `GET /_mock/stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub total_entries: usize,
    pub capacity: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, capacity: usize) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            total_entries: stats.total_entries,
            capacity,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// One route-table entry in `GET /_mock/routes`
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub pattern: String,
    pub target: String,
    pub wildcard: bool,
}

/// Response body for `GET /_mock/routes`
#[derive(Debug, Clone, Serialize)]
pub struct RoutesResponse {
    /// Alias entries in declaration order
    pub routes: Vec<RouteInfo>,
    /// Data files found under the data directory, relative and `/`-separated
    pub data_files: Vec<String>,
}

/// Response body for `GET /_mock/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::encode;

    #[test]
    fn test_ok_artifact_headers() {
        let key = encode("GET", "/users").unwrap();
        let artifact = MockArtifact::ok(&key, json!({"a": 1}));

        assert_eq!(artifact.status, StatusCode::OK);
        assert!(artifact
            .headers
            .contains(&(MOCK_TARGET_HEADER.to_string(), "GET /users".to_string())));
    }

    #[test]
    fn test_not_found_artifact() {
        let key = encode("POST", "/missing").unwrap();
        let artifact = MockArtifact::not_found(&key);

        assert_eq!(artifact.status, StatusCode::NOT_FOUND);
        assert!(artifact.body["error"]
            .as_str()
            .unwrap()
            .contains("POST /missing"));
    }

    #[test]
    fn test_artifact_into_response() {
        let key = encode("GET", "/").unwrap();
        let response = MockArtifact::ok(&key, json!([])).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[MOCK_TARGET_HEADER], "GET /index");
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            invalidations: 3,
            total_entries: 40,
        };
        let resp = StatsResponse::new(&stats, 50);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.capacity, 50);
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::healthy()).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
