//! hotmock - A file-backed mock HTTP server with live reload
//!
//! Maps each request onto a data file and an optional logic script under a
//! mock directory, caches what it parsed, and drops cache entries as soon as
//! the files change on disk.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod mock;
pub mod models;
pub mod resolver;
pub mod scanner;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{MockError, Result};
pub use loader::Loader;
pub use resolver::Resolver;
pub use tasks::MockWatcher;
