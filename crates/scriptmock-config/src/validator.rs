//! Configuration validation

use crate::Config;
use scriptmock_core::{Error, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_script(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    if config.server.listen.port() == 0 {
        tracing::warn!("listen port is 0, an ephemeral port will be chosen");
    }
    Ok(())
}

fn validate_script(config: &Config) -> Result<()> {
    let script = &config.script;

    if script.path.as_os_str().is_empty() {
        return Err(Error::Config("script path cannot be empty".to_string()));
    }

    if script.timeout.is_zero() {
        return Err(Error::Config("script timeout must be > 0".to_string()));
    }

    if script.timeout.as_secs() > 300 {
        tracing::warn!("script timeout is very high (>5 minutes)");
    }

    if script.max_body_size == 0 {
        return Err(Error::Config("max_body_size must be > 0".to_string()));
    }

    if script.max_concurrent_scripts == 0 {
        return Err(Error::Config(
            "max_concurrent_scripts must be > 0".to_string(),
        ));
    }

    if script.max_call_depth == 0 {
        return Err(Error::Config("max_call_depth must be > 0".to_string()));
    }

    Ok(())
}
