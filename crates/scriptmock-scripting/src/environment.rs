//! Per-request scripting environments

use crate::bridge::HostBridge;
use crate::error::ScriptError;
use rhai::packages::{Package, StandardPackage};
use rhai::{Dynamic, Engine, Module, Scope};
use scriptmock_config::ScriptConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Global the script assigns its response value to
pub const RESULT_BINDING: &str = "result";

/// Token returned by the progress hook when the deadline passes
const TIMEOUT_TOKEN: &str = "execution timeout";

/// Engine limits applied to every environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum operations per run (0 = unlimited)
    pub max_operations: u64,
    /// Maximum function call depth
    pub max_call_depth: usize,
    /// Maximum string length (0 = unlimited)
    pub max_string_size: usize,
    /// Maximum array length (0 = unlimited)
    pub max_array_size: usize,
    /// Maximum object map size (0 = unlimited)
    pub max_map_size: usize,
}

impl From<&ScriptConfig> for EngineLimits {
    fn from(config: &ScriptConfig) -> Self {
        Self {
            max_operations: config.max_operations,
            max_call_depth: config.max_call_depth,
            max_string_size: config.max_string_size,
            max_array_size: config.max_array_size,
            max_map_size: config.max_map_size,
        }
    }
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self::from(&ScriptConfig::default())
    }
}

/// Builds isolated environments.
///
/// The standard library package is built once and shared read-only; every
/// environment gets its own engine, callables and scope.
#[derive(Debug, Clone)]
pub struct EnvironmentFactory {
    stdlib: Arc<Module>,
    limits: EngineLimits,
}

impl EnvironmentFactory {
    /// Create a factory with the given limits
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            stdlib: StandardPackage::new().as_shared_module(),
            limits,
        }
    }

    /// Create a fresh environment for one script run.
    ///
    /// The run is terminated once `deadline` passes.
    pub fn create(&self, script_name: &str, deadline: Instant) -> ScriptEnvironment {
        let mut engine = Engine::new_raw();
        engine.register_global_module(Arc::clone(&self.stdlib));

        engine.set_max_operations(self.limits.max_operations);
        engine.set_max_call_levels(self.limits.max_call_depth);
        engine.set_max_string_size(self.limits.max_string_size);
        engine.set_max_array_size(self.limits.max_array_size);
        engine.set_max_map_size(self.limits.max_map_size);
        engine.set_max_expr_depths(128, 64);

        engine.on_progress(move |ops| {
            // Clock is sampled every 256 operations.
            if ops % 256 == 0 && Instant::now() >= deadline {
                Some(Dynamic::from(TIMEOUT_TOKEN.to_string()))
            } else {
                None
            }
        });

        Self::register_logging(&mut engine, Arc::from(script_name));

        let mut scope = Scope::new();
        scope.push(RESULT_BINDING, String::new());

        ScriptEnvironment { engine, scope }
    }

    fn register_logging(engine: &mut Engine, script: Arc<str>) {
        let name = Arc::clone(&script);
        engine.on_print(move |msg| info!(script = %name, script_log = msg));

        let name = Arc::clone(&script);
        engine.on_debug(move |msg, _, pos| debug!(script = %name, %pos, script_log = msg));

        let name = Arc::clone(&script);
        engine.register_fn("log_debug", move |msg: &str| {
            debug!(script = %name, script_log = msg);
        });

        let name = Arc::clone(&script);
        engine.register_fn("log_info", move |msg: &str| {
            info!(script = %name, script_log = msg);
        });

        let name = script;
        engine.register_fn("log_warn", move |msg: &str| {
            warn!(script = %name, script_log = msg);
        });
    }
}

impl Default for EnvironmentFactory {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

/// A single-use execution context: one engine, one global scope
#[derive(Debug)]
pub struct ScriptEnvironment {
    engine: Engine,
    scope: Scope<'static>,
}

impl ScriptEnvironment {
    /// Expose `bridge` to the script
    pub fn install(&mut self, bridge: &Arc<HostBridge>, deadline: Instant) {
        bridge.register(&mut self.engine, deadline);
    }

    /// Compile and run `code` against this environment's scope
    pub fn run(&mut self, code: &str, timeout_ms: u64) -> Result<(), ScriptError> {
        let ast = self.engine.compile(code)?;

        self.engine
            .run_ast_with_scope(&mut self.scope, &ast)
            .map_err(|err| match *err {
                rhai::EvalAltResult::ErrorTerminated(..) => ScriptError::timeout(timeout_ms),
                _ => ScriptError::from(err),
            })
    }

    /// Value of the result binding.
    ///
    /// Top-level `let result = ...` shadows the seeded binding; the newest
    /// binding wins.
    pub fn result(&self) -> Result<Dynamic, ScriptError> {
        self.scope
            .get(RESULT_BINDING)
            .cloned()
            .ok_or_else(|| ScriptError::missing_result(RESULT_BINDING))
    }
}
