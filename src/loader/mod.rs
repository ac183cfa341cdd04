//! Loader Module
//!
//! Reads data files and compiles logic files through the module cache. Every
//! failure is degraded here: a broken data file reads as `{}` and a broken
//! logic file reads as "no transform".

pub mod logic;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheStats, ModuleCache};
use crate::config::{Config, ScriptDialect};
use crate::error::{MockError, Result};

pub use logic::{ConvertFn, LogicModule, PlainScript, ScriptCompiler, TypedScript};

/// Reads of one file before giving up on caching it while it keeps changing.
const MAX_LOAD_ATTEMPTS: usize = 3;

// == Cached Module ==
/// What the module cache holds for a path.
#[derive(Debug, Clone)]
pub enum CachedModule {
    /// Parsed data file
    Data(Arc<Value>),
    /// Compiled logic file
    Logic(ConvertFn),
}

/// Per-call loading options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Skip the cache lookup and re-read the file
    pub force_refresh: bool,
}

impl LoadOptions {
    pub const FORCE_REFRESH: Self = Self {
        force_refresh: true,
    };
}

// == Loader ==
/// Sole owner of the module cache.
///
/// Every cache operation is its own critical section and no lock is held
/// across file I/O or script compilation, so a concurrent invalidation is
/// observed either fully before or fully after a load.
#[derive(Debug, Clone)]
pub struct Loader {
    cache: Arc<RwLock<ModuleCache<CachedModule>>>,
    compiler: ScriptCompiler,
}

impl Loader {
    /// Creates a loader with a cache sized and a dialect chosen by `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_cache(
            ModuleCache::new(config.cache_capacity),
            config.script_dialect,
        )
    }

    /// Creates a loader around an existing cache instance.
    pub fn with_cache(cache: ModuleCache<CachedModule>, dialect: ScriptDialect) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            compiler: ScriptCompiler::new(dialect),
        }
    }

    // == Load Data ==
    /// Returns the parsed data file at `path`.
    ///
    /// Comments and trailing commas are accepted. Read or parse failures are
    /// logged and produce an empty object, which is not cached.
    pub async fn load_data(&self, path: &Path, options: LoadOptions) -> Arc<Value> {
        let loaded = self
            .load_through_cache(
                path,
                options,
                |module| match module {
                    CachedModule::Data(value) => Some(value),
                    CachedModule::Logic(_) => None,
                },
                CachedModule::Data,
                move || async move { read_json(path).await.map(Arc::new) },
            )
            .await;

        match loaded {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Serving empty object for unreadable data file");
                Arc::new(Value::Object(Map::new()))
            }
        }
    }

    // == Load Logic ==
    /// Returns the compiled logic file at `path`, or `None` if it cannot be
    /// read or compiled.
    pub async fn load_logic(&self, path: &Path, options: LoadOptions) -> Option<ConvertFn> {
        let loaded = self
            .load_through_cache(
                path,
                options,
                |module| match module {
                    CachedModule::Logic(module) => Some(module),
                    CachedModule::Data(_) => None,
                },
                CachedModule::Logic,
                move || async move {
                    let code = tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| MockError::Io {
                            path: path.to_path_buf(),
                            source,
                        })?;
                    self.compiler.compile(path, &code)
                },
            )
            .await;

        match loaded {
            Ok(module) => Some(module),
            Err(e) => {
                warn!(error = %e, "Ignoring logic file that failed to load");
                None
            }
        }
    }

    /// Cache lookup, then `load` on a miss, storing the result only if `path`
    /// was not invalidated while it was being read. A load that lost that race
    /// is retried so the caller gets the content that caused the
    /// invalidation.
    async fn load_through_cache<V, F, Fut>(
        &self,
        path: &Path,
        options: LoadOptions,
        from_cache: fn(CachedModule) -> Option<V>,
        into_cache: fn(V) -> CachedModule,
        load: F,
    ) -> Result<V>
    where
        V: Clone,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let mut attempt = 0;
        loop {
            let generation = {
                let mut cache = self.cache.write().await;
                if attempt > 0 || !options.force_refresh {
                    if let Some(value) = cache.get(path).and_then(from_cache) {
                        return Ok(value);
                    }
                }
                cache.generation(path)
            };

            let value = load().await?;
            attempt += 1;

            let stored = self.cache.write().await.set_if_current(
                path.to_path_buf(),
                into_cache(value.clone()),
                generation,
            );
            if stored {
                debug!(path = %path.display(), "Loaded into cache");
                return Ok(value);
            }

            if attempt >= MAX_LOAD_ATTEMPTS {
                warn!(path = %path.display(), "File kept changing while loading, serving it uncached");
                return Ok(value);
            }
            debug!(path = %path.display(), "File changed while loading, reading it again");
        }
    }

    // == Invalidate ==
    /// Drops the cache entry for `path`, data or logic alike.
    pub async fn invalidate(&self, path: &Path) -> bool {
        let mut cache = self.cache.write().await;
        let age_ms = cache.age_ms(path);
        let removed = cache.invalidate(path);
        if let Some(age_ms) = age_ms {
            debug!(path = %path.display(), cached_for_ms = age_ms, "Cache entry invalidated");
        }
        removed
    }

    /// Empties the cache. Called on shutdown.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn is_cached(&self, path: &Path) -> bool {
        self.cache.read().await.contains(path)
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    pub async fn capacity(&self) -> usize {
        self.cache.read().await.capacity()
    }

    pub fn dialect(&self) -> ScriptDialect {
        self.compiler.dialect()
    }
}

async fn read_json(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| MockError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    json5::from_str(&content).map_err(|e| MockError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MockRequest, RequestExtra};
    use serde_json::json;
    use std::fs;

    fn loader() -> Loader {
        Loader::with_cache(ModuleCache::new(50), ScriptDialect::Plain)
    }

    #[tokio::test]
    async fn test_load_data_caches_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"{"v": 1}"#).unwrap();

        let loader = loader();
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"v": 1}));

        // Without invalidation the stale value is served
        fs::write(&path, r#"{"v": 2}"#).unwrap();
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"v": 1}));

        assert!(loader.invalidate(&path).await);
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"v": 2}));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalidation_during_load_is_not_lost() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());

        let loader = loader();
        let load = tokio::spawn({
            let loader = loader.clone();
            let path = path.clone();
            async move { loader.load_data(&path, LoadOptions::default()).await }
        });

        // Opening the write end waits until the load has opened the read end
        let mut writer = tokio::task::spawn_blocking({
            let path = path.clone();
            move || fs::OpenOptions::new().write(true).open(path).unwrap()
        })
        .await
        .unwrap();
        writer.write_all(br#"{"v": 1}"#).unwrap();

        // The file is replaced and invalidated while the old content is in flight
        let replacement = dir.path().join("a.json.new");
        fs::write(&replacement, r#"{"v": 2}"#).unwrap();
        fs::rename(&replacement, &path).unwrap();
        loader.invalidate(&path).await;
        drop(writer);

        assert_eq!(*load.await.unwrap(), json!({"v": 2}));
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_invalidated_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, r#"{"v": 1}"#).unwrap();

        let cache = Arc::new(RwLock::new(ModuleCache::new(10)));
        let loader = Loader {
            cache: Arc::clone(&cache),
            compiler: ScriptCompiler::new(ScriptDialect::Plain),
        };

        // Every read races an invalidation, so nothing may be stored
        let value = loader
            .load_through_cache(
                &path,
                LoadOptions::default(),
                |_| None,
                CachedModule::Data,
                || {
                    let cache = Arc::clone(&cache);
                    let path = path.clone();
                    async move {
                        let value = read_json(&path).await.map(Arc::new);
                        cache.write().await.invalidate(&path);
                        value
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(*value, json!({"v": 1}));
        assert!(!loader.is_cached(&path).await);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, r#"{"v": 1}"#).unwrap();

        let loader = loader();
        loader.load_data(&path, LoadOptions::default()).await;
        fs::write(&path, r#"{"v": 2}"#).unwrap();

        let fresh = loader.load_data(&path, LoadOptions::FORCE_REFRESH).await;
        assert_eq!(*fresh, json!({"v": 2}));
        // The refreshed value replaced the cached one
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_load_data_accepts_json5() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "// items\n{ items: [1, 2,], }").unwrap();

        let value = loader().load_data(&path, LoadOptions::default()).await;
        assert_eq!(*value, json!({"items": [1, 2]}));
    }

    #[tokio::test]
    async fn test_malformed_data_is_empty_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ this is not").unwrap();

        let loader = loader();
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({}));
        assert!(!loader.is_cached(&path).await);

        // Fixing the file is picked up without an explicit invalidation
        fs::write(&path, r#"{"ok": true}"#).unwrap();
        assert_eq!(*loader.load_data(&path, LoadOptions::default()).await, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_missing_data_is_empty() {
        let value = loader()
            .load_data(Path::new("/no/such/file.json"), LoadOptions::default())
            .await;
        assert_eq!(*value, json!({}));
    }

    #[tokio::test]
    async fn test_load_logic_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.rhai");
        fs::write(&path, "fn convert(data, extra) { data.n = 1; data }").unwrap();

        let loader = loader();
        let extra = RequestExtra::new(&MockRequest::new("GET", "/users"), "GET", &[]);

        let module = loader.load_logic(&path, LoadOptions::default()).await.unwrap();
        assert_eq!(module.convert(json!({}), &extra).await.unwrap(), json!({"n": 1}));

        fs::write(&path, "fn convert(data, extra) { data.n = 2; data }").unwrap();
        loader.invalidate(&path).await;

        let module = loader.load_logic(&path, LoadOptions::default()).await.unwrap();
        assert_eq!(module.convert(json!({}), &extra).await.unwrap(), json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_broken_logic_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.rhai");
        fs::write(&path, "fn convert(data, extra) {").unwrap();

        let loader = loader();
        assert!(loader.load_logic(&path, LoadOptions::default()).await.is_none());
        assert!(loader
            .load_logic(Path::new("/no/such.rhai"), LoadOptions::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_data_and_logic_share_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("a.json");
        let logic = dir.path().join("a.rhai");
        fs::write(&data, "{}").unwrap();
        fs::write(&logic, "data").unwrap();

        let loader = loader();
        loader.load_data(&data, LoadOptions::default()).await;
        loader.load_logic(&logic, LoadOptions::default()).await.unwrap();
        assert_eq!(loader.stats().await.total_entries, 2);

        loader.clear().await;
        assert_eq!(loader.stats().await.total_entries, 0);
    }
}
