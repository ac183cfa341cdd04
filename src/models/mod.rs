//! Request and Response models
//!
//! Transport-independent request/response types shared by the resolver and
//! the HTTP adapter.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{MockRequest, RequestExtra};
pub use responses::{
    HealthResponse, MockArtifact, RouteInfo, RoutesResponse, StatsResponse, MOCK_TARGET_HEADER,
};
