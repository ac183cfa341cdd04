//! Background Tasks Module
//!
//! Contains the tasks that run alongside the HTTP server.
//!
//! # Tasks
//! - Live reload: invalidates cached mocks and reloads routes on file changes

mod watcher;

pub use watcher::{
    apply_action, FsAction, MockWatcher, WatchFilter, WatcherState, EVENT_CHANNEL_CAPACITY,
};
