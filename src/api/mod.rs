//! API Module
//!
//! HTTP adapter over the resolver.
//!
//! # Endpoints
//! - `GET /_mock/health` - Health check endpoint
//! - `GET /_mock/stats` - Module cache statistics
//! - `GET /_mock/routes` - Route aliases and scanned data files
//! - any other method and path - Mock resolution

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, ADMIN_PREFIX};
