//! Resolver / Dispatcher
//!
//! Turns a [`MockRequest`] into a [`MockArtifact`]:
//!
//! 1. encode the request into a key
//! 2. let the route table redirect it, else keep the key
//! 3. load the target's data file
//! 4. run the target's logic file over the data, if there is one
//! 5. 404 when neither file exists, otherwise 200

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{Config, DataFileExt};
use crate::loader::{LoadOptions, Loader};
use crate::mock::{encode, to_file_path, SharedRouteTable};
use crate::models::{MockArtifact, MockRequest, RequestExtra};

// == Resolver ==
#[derive(Debug, Clone)]
pub struct Resolver {
    loader: Arc<Loader>,
    routes: SharedRouteTable,
    data_dir: PathBuf,
    data_ext: DataFileExt,
    /// None when logic files are disabled
    logic_ext: Option<String>,
}

impl Resolver {
    pub fn new(config: &Config, loader: Arc<Loader>, routes: SharedRouteTable) -> Self {
        Self {
            loader,
            routes,
            data_dir: config.data_dir(),
            data_ext: config.data_file_ext,
            logic_ext: config
                .use_logic_file
                .then(|| config.logic_file_ext.clone()),
        }
    }

    // == Resolve ==
    /// Resolves one request. Never fails: problems become 400/404/405
    /// artifacts or degraded bodies.
    pub async fn resolve(&self, request: &MockRequest) -> MockArtifact {
        let key = match encode(&request.method, &request.path) {
            Ok(key) => key,
            Err(e) => {
                debug!(method = %request.method, path = %request.path, error = %e, "Rejected request");
                return MockArtifact::from_error(&e);
            }
        };

        // Logic files see the inbound method even when an alias points elsewhere
        let request_method = key.method;

        // Route-table override always precedes the filesystem convention
        let table = self.routes.snapshot().await;
        let (target, params) = match table.find(&key) {
            Some(found) => {
                debug!(request = %key, target = %found.target, "Route alias matched");
                (found.target, found.params)
            }
            None => (key, Vec::new()),
        };

        let data_path = to_file_path(&target, &self.data_dir, self.data_ext.as_str());
        let logic_path = self
            .logic_ext
            .as_deref()
            .map(|ext| to_file_path(&target, &self.data_dir, ext));

        let has_data = is_file(&data_path).await;
        let has_logic = match &logic_path {
            Some(path) => is_file(path).await,
            None => false,
        };

        if !has_data && !has_logic {
            debug!(target = %target, "No mock files for target");
            return MockArtifact::not_found(&target);
        }

        let base = if has_data {
            self.loader
                .load_data(&data_path, LoadOptions::default())
                .await
                .as_ref()
                .clone()
        } else {
            Value::Object(Map::new())
        };

        let body = match logic_path.filter(|_| has_logic) {
            Some(path) => {
                let extra = RequestExtra::new(request, request_method.as_str(), &params);
                self.transform(&path, base, &extra).await
            }
            None => base,
        };

        MockArtifact::ok(&target, body)
    }

    /// Runs the logic file over fully loaded base data, passing the data
    /// through if the module is unavailable or fails.
    async fn transform(&self, path: &Path, base: Value, extra: &RequestExtra) -> Value {
        let Some(module) = self.loader.load_logic(path, LoadOptions::default()).await else {
            return base;
        };

        match module.convert(base.clone(), extra).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Logic file failed, serving untransformed data");
                base
            }
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
