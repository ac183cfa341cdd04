//! Live-Reload Watcher
//!
//! Background task that turns filesystem events under the mock root into
//! cache invalidations and route-table reloads.
//!
//! notify delivers events on its own thread; they are forwarded into a
//! bounded channel and consumed by a single dispatcher task, so every
//! invalidation is applied in arrival order by one writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DATA_FAMILY_EXTS};
use crate::error::{MockError, Result};
use crate::loader::Loader;
use crate::mock::SharedRouteTable;

/// Capacity of the event mailbox between notify and the dispatcher.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Extensions that never back a mock: media and office documents.
const IGNORED_EXTS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "wav", "ogg",
    "webm", "avi", "mov", "mkv", "flac", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "pdf",
    "odt", "ods", "odp", "swp", "swo", "swx", "tmp",
];

/// Directory names skipped anywhere below the root.
const IGNORED_DIRS: &[&str] = &["node_modules"];

// == State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Constructed, not subscribed yet
    Idle,
    /// Subscribed and dispatching events
    Watching,
    /// Shut down; terminal
    Closed,
}

/// What a filesystem event asks the engine to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsAction {
    /// Drop the cached data or logic module for this path
    Invalidate(PathBuf),
    /// Re-read the routes file and swap the table
    ReloadRoutes,
}

// == Watch Filter ==
/// Decides which events matter. Pure; holds no handles.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    routes_file: PathBuf,
    logic_ext: Option<String>,
}

impl WatchFilter {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.mock_dir.clone(),
            routes_file: config.routes_file_path.clone(),
            logic_ext: config
                .use_logic_file
                .then(|| config.logic_file_ext.to_ascii_lowercase()),
        }
    }

    /// True for dotfiles, VCS/editor directories, temp files and media.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        let in_ignored_dir = relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            (name.starts_with('.') && name != "." && name != "..")
                || IGNORED_DIRS.contains(&name.as_ref())
        });
        if in_ignored_dir {
            return true;
        }

        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return true;
        };
        if name.ends_with('~') || (name.starts_with('#') && name.ends_with('#')) {
            return true;
        }

        extension(path)
            .map(|ext| IGNORED_EXTS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// True for data-family files and, when enabled, logic files.
    pub fn is_mock_file(&self, path: &Path) -> bool {
        match extension(path) {
            Some(ext) => {
                DATA_FAMILY_EXTS.contains(&ext.as_str())
                    || self.logic_ext.as_deref() == Some(ext.as_str())
            }
            None => false,
        }
    }

    // == Classify ==
    /// Maps one event to the actions it requires.
    ///
    /// Content changes and removals invalidate; renames invalidate both
    /// sides; creations, metadata changes, access and folder removal do
    /// nothing. Any event on the routes file reloads the table.
    pub fn classify(&self, event: &Event) -> Vec<FsAction> {
        let mut actions = Vec::new();

        if matches!(event.kind, EventKind::Access(_)) {
            return actions;
        }

        if event.paths.iter().any(|p| p == &self.routes_file) {
            actions.push(FsAction::ReloadRoutes);
        }

        let invalidates = match event.kind {
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            EventKind::Remove(RemoveKind::Folder) => false,
            EventKind::Remove(_) => true,
            _ => false,
        };

        if invalidates {
            for path in &event.paths {
                if path == &self.routes_file || self.is_ignored(path) || !self.is_mock_file(path) {
                    continue;
                }
                let action = FsAction::Invalidate(path.clone());
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }

        actions
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

// == Apply ==
/// Carries out one action against the loader or route table.
pub async fn apply_action(
    action: &FsAction,
    loader: &Loader,
    routes: &SharedRouteTable,
    routes_file: &Path,
) {
    match action {
        FsAction::Invalidate(path) => {
            if loader.invalidate(path).await {
                info!(path = %path.display(), "Mock file changed, cache entry dropped");
            } else {
                debug!(path = %path.display(), "Mock file changed, nothing cached");
            }
        }
        FsAction::ReloadRoutes => {
            routes.reload(routes_file).await;
        }
    }
}

// == Mock Watcher ==
/// Owns the notify subscription and the dispatcher task.
#[derive(Debug)]
pub struct MockWatcher {
    state: WatcherState,
    filter: Arc<WatchFilter>,
    loader: Arc<Loader>,
    routes: SharedRouteTable,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl MockWatcher {
    pub fn new(config: &Config, loader: Arc<Loader>, routes: SharedRouteTable) -> Self {
        Self {
            state: WatcherState::Idle,
            filter: Arc::new(WatchFilter::new(config)),
            loader,
            routes,
            watcher: None,
            task: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    // == Start ==
    /// Subscribes to the mock root and spawns the dispatcher task.
    ///
    /// Must be called from within a Tokio runtime. A routes file outside the
    /// mock root is watched separately; failing to watch it only logs.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            WatcherState::Idle => {}
            WatcherState::Watching => {
                return Err(MockError::Watch("watcher already started".to_string()))
            }
            WatcherState::Closed => {
                return Err(MockError::Watch("watcher is closed".to_string()))
            }
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                let _ = tx.blocking_send(res);
            })?;

        watcher.watch(&self.filter.root, RecursiveMode::Recursive)?;

        if !self.filter.routes_file.starts_with(&self.filter.root) {
            if let Some(parent) = self.filter.routes_file.parent() {
                if let Err(e) = watcher.watch(parent, RecursiveMode::NonRecursive) {
                    warn!(path = %parent.display(), error = %e, "Cannot watch routes file directory");
                }
            }
        }

        self.task = Some(self.spawn_dispatcher(rx));
        self.watcher = Some(watcher);
        self.state = WatcherState::Watching;

        info!(root = %self.filter.root.display(), "Watching mock directory for changes");
        Ok(())
    }

    fn spawn_dispatcher(&self, mut rx: mpsc::Receiver<notify::Result<Event>>) -> JoinHandle<()> {
        let filter = Arc::clone(&self.filter);
        let loader = Arc::clone(&self.loader);
        let routes = self.routes.clone();

        tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(event) => {
                        for action in filter.classify(&event) {
                            apply_action(&action, &loader, &routes, &filter.routes_file).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Watch error");
                    }
                }
            }
            debug!("Watch event channel closed");
        })
    }

    // == Close ==
    /// Drops the subscription and stops the dispatcher. No events are
    /// delivered afterwards.
    pub fn close(&mut self) {
        if self.state == WatcherState::Closed {
            return;
        }

        self.watcher = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = WatcherState::Closed;
        info!("Watcher closed");
    }
}

impl Drop for MockWatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
