//! Script executor
//!
//! Runs one script per request on the blocking pool. A semaphore caps how
//! many interpreters are alive at once; each run gets its own environment
//! and bridge, so concurrent requests never observe each other.

use crate::bridge::HostBridge;
use crate::encode;
use crate::environment::{EngineLimits, EnvironmentFactory};
use crate::error::{Error, Result, ScriptError};
use crate::source::ScriptSource;
use scriptmock_config::{FormErrorPolicy, ScriptConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{trace, warn};

/// Extra time the async side waits past the script deadline before giving up
const DEADLINE_GRACE: Duration = Duration::from_millis(250);

/// Executes request scripts
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    factory: EnvironmentFactory,
    permits: Arc<Semaphore>,
    timeout: Duration,
    form_error_policy: FormErrorPolicy,
}

impl ScriptExecutor {
    /// Create an executor from script settings
    pub fn new(config: &ScriptConfig) -> Self {
        Self {
            factory: EnvironmentFactory::new(EngineLimits::from(config)),
            permits: Arc::new(Semaphore::new(config.max_concurrent_scripts.max(1))),
            timeout: config.timeout,
            form_error_policy: config.form_error_policy,
        }
    }

    /// Load `source`, run it against `bridge` and return the `result` value
    /// as JSON.
    ///
    /// A value JSON cannot represent yields [`Error::Encoding`].
    pub async fn execute(
        &self,
        source: &ScriptSource,
        bridge: Arc<HostBridge>,
    ) -> Result<serde_json::Value> {
        let code = source.load().await?;
        let name = source.name();

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ScriptError::Unavailable {
                message: e.to_string(),
            })?;

        let start = Instant::now();
        let deadline = start + self.timeout;
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        let factory = self.factory.clone();
        let run_bridge = Arc::clone(&bridge);
        let task = tokio::task::spawn_blocking(move || -> Result<serde_json::Value> {
            let _permit = permit;
            let mut env = factory.create(&name, deadline);
            env.install(&run_bridge, deadline);
            env.run(&code, timeout_ms)?;
            let value = env.result()?;
            encode::to_json(&value).map_err(Error::Encoding)
        });

        let value = match tokio::time::timeout(self.timeout + DEADLINE_GRACE, task).await {
            Ok(Ok(outcome)) => outcome?,
            Ok(Err(join_err)) => return Err(ScriptError::panic(join_err.to_string()).into()),
            Err(_) => return Err(ScriptError::timeout(timeout_ms).into()),
        };

        trace!(
            script = %source.name(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Script executed"
        );

        if let Some(err) = bridge.form_error() {
            match self.form_error_policy {
                FormErrorPolicy::Abort => return Err(Error::FormParse(err)),
                FormErrorPolicy::Degrade => {
                    warn!(error = %err, "Form parsing failed; script saw an empty form");
                }
            }
        }

        Ok(value)
    }
}
