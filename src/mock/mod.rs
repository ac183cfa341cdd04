//! Mock Addressing
//!
//! Path codec and route alias table: everything needed to turn a request into
//! the key whose files answer it.

pub mod key;
pub mod routes;

pub use key::{encode, normalize_segments, parse_target, to_file_path, Method, MockKey};
pub use routes::{RouteEntry, RouteMatch, RoutePattern, RouteTable, SharedRouteTable};
