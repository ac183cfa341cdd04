//! Logic Modules
//!
//! Logic files are Rhai scripts that transform a route's base data. The
//! resolver only sees the [`LogicModule`] trait; the dialect decides how a
//! script is compiled and what it must export.
//!
//! ```rhai
//! fn convert(data, extra) {
//!     data.page = extra.query.page;
//!     data
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ScriptDialect;
use crate::error::{MockError, Result};
use crate::models::RequestExtra;

/// Name of the function a logic file exports.
pub const CONVERT_FN: &str = "convert";

// == Logic Module ==
/// A compiled transform `(original data, request extra) -> new data`.
#[async_trait]
pub trait LogicModule: Send + Sync + fmt::Debug {
    fn dialect(&self) -> ScriptDialect;

    /// Runs the transform. Errors mean "no transform"; callers pass the
    /// original data through.
    async fn convert(&self, data: Value, extra: &RequestExtra) -> Result<Value>;
}

/// Shared handle to a compiled transform, as stored in the module cache.
pub type ConvertFn = Arc<dyn LogicModule>;

// == Script Compiler ==
/// Compiles logic files for one dialect. Built once from configuration.
#[derive(Clone)]
pub struct ScriptCompiler {
    dialect: ScriptDialect,
    engine: Arc<Engine>,
}

impl fmt::Debug for ScriptCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCompiler")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl ScriptCompiler {
    pub fn new(dialect: ScriptDialect) -> Self {
        let mut engine = Engine::new();

        // A runaway script fails instead of hanging its request
        engine.set_max_expr_depths(64, 32);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(1024 * 1024);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);

        if dialect == ScriptDialect::Typed {
            engine.set_strict_variables(true);
        }

        register_functions(&mut engine);

        Self {
            dialect,
            engine: Arc::new(engine),
        }
    }

    pub fn dialect(&self) -> ScriptDialect {
        self.dialect
    }

    /// Compiles `code` read from `path` into a transform.
    pub fn compile(&self, path: &Path, code: &str) -> Result<ConvertFn> {
        let ast = self.engine.compile(code).map_err(|e| MockError::Script {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let has_convert = ast
            .iter_functions()
            .any(|f| f.name == CONVERT_FN && f.params.len() == 2);

        let module: ConvertFn = match self.dialect {
            ScriptDialect::Typed => {
                if !has_convert {
                    return Err(MockError::Script {
                        path: path.to_path_buf(),
                        message: format!("typed logic files must define fn {}(data, extra)", CONVERT_FN),
                    });
                }
                Arc::new(TypedScript {
                    path: path.to_path_buf(),
                    engine: Arc::clone(&self.engine),
                    ast,
                })
            }
            ScriptDialect::Plain => Arc::new(PlainScript {
                path: path.to_path_buf(),
                engine: Arc::clone(&self.engine),
                ast,
                has_convert,
            }),
        };

        debug!(path = %path.display(), dialect = %self.dialect, "Logic file compiled");
        Ok(module)
    }
}

/// Helpers available to every logic file.
fn register_functions(engine: &mut Engine) {
    engine.register_fn("log_debug", |msg: &str| {
        debug!(script_log = msg);
    });

    engine.register_fn("log_info", |msg: &str| {
        info!(script_log = msg);
    });

    engine.register_fn("log_warn", |msg: &str| {
        warn!(script_log = msg);
    });
}

fn script_error(path: &Path, err: impl fmt::Display) -> MockError {
    MockError::Script {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn to_script_args(path: &Path, data: &Value, extra: &RequestExtra) -> Result<(Dynamic, Dynamic)> {
    let data = rhai::serde::to_dynamic(data).map_err(|e| script_error(path, e))?;
    let extra = rhai::serde::to_dynamic(extra).map_err(|e| script_error(path, e))?;
    Ok((data, extra))
}

fn from_script_result(path: &Path, result: &Dynamic) -> Result<Value> {
    rhai::serde::from_dynamic::<Value>(result).map_err(|e| script_error(path, e))
}

// == Typed Script ==
/// Strict dialect: undeclared variables fail compilation and the file must
/// define `convert(data, extra)` returning a value.
#[derive(Debug)]
pub struct TypedScript {
    path: PathBuf,
    engine: Arc<Engine>,
    ast: AST,
}

#[async_trait]
impl LogicModule for TypedScript {
    fn dialect(&self) -> ScriptDialect {
        ScriptDialect::Typed
    }

    async fn convert(&self, data: Value, extra: &RequestExtra) -> Result<Value> {
        let (data, extra) = to_script_args(&self.path, &data, extra)?;

        let result: Dynamic = self
            .engine
            .call_fn::<Dynamic>(&mut Scope::new(), &self.ast, CONVERT_FN, (data, extra))
            .map_err(|e| script_error(&self.path, e))?;

        if result.is_unit() {
            return Err(script_error(&self.path, "convert returned no value"));
        }

        from_script_result(&self.path, &result)
    }
}

// == Plain Script ==
/// Permissive dialect: calls `convert` when defined, otherwise evaluates the
/// script with `data` and `extra` in scope and takes its final value. A unit
/// result leaves the data unchanged.
#[derive(Debug)]
pub struct PlainScript {
    path: PathBuf,
    engine: Arc<Engine>,
    ast: AST,
    has_convert: bool,
}

#[async_trait]
impl LogicModule for PlainScript {
    fn dialect(&self) -> ScriptDialect {
        ScriptDialect::Plain
    }

    async fn convert(&self, data: Value, extra: &RequestExtra) -> Result<Value> {
        let (data_dyn, extra_dyn) = to_script_args(&self.path, &data, extra)?;
        let mut scope = Scope::new();

        let result: Dynamic = if self.has_convert {
            self.engine
                .call_fn::<Dynamic>(&mut scope, &self.ast, CONVERT_FN, (data_dyn, extra_dyn))
        } else {
            scope.push_dynamic("data", data_dyn);
            scope.push_dynamic("extra", extra_dyn);
            self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
        }
        .map_err(|e| script_error(&self.path, e))?;

        if result.is_unit() {
            return Ok(data);
        }

        from_script_result(&self.path, &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MockRequest;
    use serde_json::json;

    fn extra() -> RequestExtra {
        let req = MockRequest::new("GET", "/users?page=2");
        RequestExtra::new(&req, "GET", &[])
    }

    #[tokio::test]
    async fn test_plain_convert_fn() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        let module = compiler
            .compile(
                Path::new("users.rhai"),
                "fn convert(data, extra) { data.b = 2; data }",
            )
            .unwrap();

        let out = module.convert(json!({"a": 1}), &extra()).await.unwrap();
        assert_eq!(out, json!({"a": 1, "b": 2}));
        assert_eq!(module.dialect(), ScriptDialect::Plain);
    }

    #[tokio::test]
    async fn test_plain_script_body() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        let module = compiler
            .compile(Path::new("users.rhai"), "data.page = extra.query.page; data")
            .unwrap();

        let out = module.convert(json!({"items": []}), &extra()).await.unwrap();
        assert_eq!(out, json!({"items": [], "page": "2"}));
    }

    #[tokio::test]
    async fn test_plain_unit_result_passes_through() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        let module = compiler
            .compile(Path::new("noop.rhai"), r#"log_debug("seen");"#)
            .unwrap();

        let out = module.convert(json!({"a": 1}), &extra()).await.unwrap();
        assert_eq!(out, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_typed_requires_convert() {
        let compiler = ScriptCompiler::new(ScriptDialect::Typed);
        let result = compiler.compile(Path::new("bad.rhai"), "let x = 1; x");
        assert!(matches!(result, Err(MockError::Script { .. })));

        let result = compiler.compile(Path::new("bad.rhai"), "fn convert(data) { data }");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_typed_rejects_undeclared_variables() {
        let compiler = ScriptCompiler::new(ScriptDialect::Typed);
        let result = compiler.compile(
            Path::new("strict.rhai"),
            "fn convert(data, extra) { data.x = missing; data }\nmissing",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_typed_convert() {
        let compiler = ScriptCompiler::new(ScriptDialect::Typed);
        let module = compiler
            .compile(
                Path::new("typed.rhai"),
                "fn convert(data, extra) { #{ method: extra.method, count: data.len() } }",
            )
            .unwrap();

        let out = module.convert(json!([1, 2, 3]), &extra()).await.unwrap();
        assert_eq!(out, json!({"count": 3, "method": "GET"}));
    }

    #[tokio::test]
    async fn test_runtime_error_is_reported() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        let module = compiler
            .compile(Path::new("boom.rhai"), r#"fn convert(data, extra) { throw "boom"; }"#)
            .unwrap();

        let result = module.convert(json!({}), &extra()).await;
        assert!(matches!(result, Err(MockError::Script { .. })));
    }

    #[tokio::test]
    async fn test_runaway_script_is_stopped() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        let module = compiler
            .compile(Path::new("loop.rhai"), "loop { }")
            .unwrap();

        assert!(module.convert(json!({}), &extra()).await.is_err());
    }

    #[test]
    fn test_syntax_error() {
        let compiler = ScriptCompiler::new(ScriptDialect::Plain);
        assert!(compiler.compile(Path::new("x.rhai"), "fn convert(").is_err());
    }
}
