//! Configuration Module
//!
//! Handles loading and validating server configuration from environment variables.
//! The resulting [`Config`] is built once at startup and handed to every component.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MockError, Result};

/// Default number of parsed files kept in the module cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Extensions treated as JSON-family data files by the watcher.
pub const DATA_FAMILY_EXTS: [&str; 2] = ["json", "json5"];

// == Data File Extension ==
/// Extension of data files under the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileExt {
    Json,
    Json5,
}

impl DataFileExt {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFileExt::Json => "json",
            DataFileExt::Json5 => "json5",
        }
    }
}

impl FromStr for DataFileExt {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Ok(DataFileExt::Json),
            "json5" => Ok(DataFileExt::Json5),
            other => Err(MockError::Config(format!(
                "data file extension must be json or json5, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DataFileExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Script Dialect ==
/// How logic files are compiled. Chosen once for the whole server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDialect {
    /// Strict variables and a mandatory `convert(data, extra)` function
    Typed,
    /// Permissive: `convert` is optional, the script body may produce the result
    Plain,
}

impl FromStr for ScriptDialect {
    type Err = MockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "typed" => Ok(ScriptDialect::Typed),
            "plain" => Ok(ScriptDialect::Plain),
            other => Err(MockError::Config(format!(
                "script dialect must be typed or plain, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ScriptDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptDialect::Typed => f.write_str("typed"),
            ScriptDialect::Plain => f.write_str("plain"),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the mock tree; data files live under `{mock_dir}/data`
    pub mock_dir: PathBuf,
    /// Extension of data files
    pub data_file_ext: DataFileExt,
    /// Whether logic files are consulted at all
    pub use_logic_file: bool,
    /// Extension of logic files, without the leading dot
    pub logic_file_ext: String,
    /// Route alias table
    pub routes_file_path: PathBuf,
    /// Logic-file compilation mode
    pub script_dialect: ScriptDialect,
    /// Maximum number of entries in the module cache
    pub cache_capacity: usize,
    /// Whether to watch the mock directory for changes
    pub watch: bool,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MOCK_DIR` - Mock root directory (default: ./mock)
    /// - `MOCK_DATA_EXT` - json or json5 (default: json)
    /// - `MOCK_USE_LOGIC` - Enable logic files (default: true)
    /// - `MOCK_LOGIC_EXT` - Logic file extension (default: rhai)
    /// - `MOCK_ROUTES_FILE` - Routes file (default: {MOCK_DIR}/routes.json)
    /// - `MOCK_SCRIPT_DIALECT` - typed or plain (default: plain)
    /// - `MOCK_CACHE_CAPACITY` - Module cache size (default: 50)
    /// - `MOCK_WATCH` - Enable live reload (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unparseable numeric or boolean values fall back to their defaults;
    /// unknown extensions or dialects are rejected.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mock_dir = env::var("MOCK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.mock_dir);

        let data_file_ext = match env::var("MOCK_DATA_EXT") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.data_file_ext,
        };

        let script_dialect = match env::var("MOCK_SCRIPT_DIALECT") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.script_dialect,
        };

        let routes_file_path = env::var("MOCK_ROUTES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| mock_dir.join("routes.json"));

        let config = Self {
            data_file_ext,
            use_logic_file: env_flag("MOCK_USE_LOGIC").unwrap_or(defaults.use_logic_file),
            logic_file_ext: env::var("MOCK_LOGIC_EXT")
                .map(|v| v.trim_start_matches('.').to_string())
                .unwrap_or(defaults.logic_file_ext),
            routes_file_path,
            script_dialect,
            cache_capacity: env::var("MOCK_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_capacity),
            watch: env_flag("MOCK_WATCH").unwrap_or(defaults.watch),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            mock_dir,
        };

        config.validate()?;
        Ok(config)
    }

    /// Builds a config rooted at `mock_dir` with every other value defaulted.
    pub fn for_mock_dir(mock_dir: impl Into<PathBuf>) -> Self {
        let mock_dir = mock_dir.into();
        Self {
            routes_file_path: mock_dir.join("routes.json"),
            mock_dir,
            ..Self::default()
        }
    }

    /// Rejects combinations the engine cannot serve predictably.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(MockError::Config(
                "cache capacity must be at least 1".to_string(),
            ));
        }

        let logic_ext = self.logic_file_ext.to_ascii_lowercase();
        if logic_ext.is_empty() {
            return Err(MockError::Config(
                "logic file extension cannot be empty".to_string(),
            ));
        }
        if DATA_FAMILY_EXTS.contains(&logic_ext.as_str()) {
            return Err(MockError::Config(format!(
                "logic file extension '{}' collides with data files",
                logic_ext
            )));
        }

        Ok(())
    }

    /// Makes `mock_dir` and `routes_file_path` absolute and canonical.
    ///
    /// The watcher reports canonical paths, and cache keys must match them.
    /// The routes file itself may not exist yet, so only its directory is
    /// canonicalized.
    pub fn resolve_paths(mut self) -> Result<Self> {
        self.mock_dir = self.mock_dir.canonicalize().map_err(|source| MockError::Io {
            path: self.mock_dir.clone(),
            source,
        })?;

        if let (Some(parent), Some(name)) = (
            self.routes_file_path.parent(),
            self.routes_file_path.file_name(),
        ) {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            if let Ok(parent) = parent.canonicalize() {
                self.routes_file_path = parent.join(name);
            }
        }

        Ok(self)
    }

    /// Directory holding the `{METHOD}/...` data and logic trees.
    pub fn data_dir(&self) -> PathBuf {
        self.mock_dir.join("data")
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

impl Default for Config {
    fn default() -> Self {
        let mock_dir = PathBuf::from("./mock");
        Self {
            routes_file_path: mock_dir.join("routes.json"),
            mock_dir,
            data_file_ext: DataFileExt::Json,
            use_logic_file: true,
            logic_file_ext: "rhai".to_string(),
            script_dialect: ScriptDialect::Plain,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            watch: true,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.mock_dir, PathBuf::from("./mock"));
        assert_eq!(config.data_file_ext, DataFileExt::Json);
        assert!(config.use_logic_file);
        assert_eq!(config.logic_file_ext, "rhai");
        assert_eq!(config.script_dialect, ScriptDialect::Plain);
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.server_port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_mock_dir_derives_paths() {
        let config = Config::for_mock_dir("/srv/mock");
        assert_eq!(config.data_dir(), PathBuf::from("/srv/mock/data"));
        assert_eq!(config.routes_file_path, PathBuf::from("/srv/mock/routes.json"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = Config {
            cache_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(MockError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_colliding_logic_ext() {
        let config = Config {
            logic_file_ext: "JSON5".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(MockError::Config(_))));

        let config = Config {
            logic_file_ext: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(".json5".parse::<DataFileExt>().unwrap(), DataFileExt::Json5);
        assert!("yaml".parse::<DataFileExt>().is_err());
        assert_eq!("Typed".parse::<ScriptDialect>().unwrap(), ScriptDialect::Typed);
        assert!("lua".parse::<ScriptDialect>().is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mock")).unwrap();

        let config = Config::for_mock_dir(dir.path().join("mock/../mock"))
            .resolve_paths()
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap().join("mock");
        assert_eq!(config.mock_dir, canonical);
        assert_eq!(config.routes_file_path, canonical.join("routes.json"));

        let missing = Config::for_mock_dir(dir.path().join("absent")).resolve_paths();
        assert!(matches!(missing, Err(MockError::Io { .. })));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "MOCK_DIR",
            "MOCK_DATA_EXT",
            "MOCK_USE_LOGIC",
            "MOCK_LOGIC_EXT",
            "MOCK_ROUTES_FILE",
            "MOCK_SCRIPT_DIALECT",
            "MOCK_CACHE_CAPACITY",
            "MOCK_WATCH",
            "SERVER_PORT",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.routes_file_path, PathBuf::from("./mock/routes.json"));
        assert!(config.watch);
    }
}
