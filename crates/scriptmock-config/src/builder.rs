//! Configuration builder

use crate::types::{Config, FormErrorPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Set listen address
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.config.server.listen = addr;
        self
    }

    /// Set only the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.set_port(port);
        self
    }

    /// Set script path
    pub fn script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.script.path = path.into();
        self
    }

    /// Set script execution deadline
    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.config.script.timeout = timeout;
        self
    }

    /// Set form error policy
    pub fn form_error_policy(mut self, policy: FormErrorPolicy) -> Self {
        self.config.script.form_error_policy = policy;
        self
    }

    /// Set max concurrently running scripts
    pub fn max_concurrent_scripts(mut self, max: usize) -> Self {
        self.config.script.max_concurrent_scripts = max;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> scriptmock_core::Result<Config> {
        crate::validator::validate_config(&self.config)?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        let config = ConfigBuilder::new()
            .listen(addr)
            .script_path("/tmp/mock.js")
            .form_error_policy(FormErrorPolicy::Degrade)
            .build()
            .unwrap();

        assert_eq!(config.server.listen, addr);
        assert_eq!(config.script.path, PathBuf::from("/tmp/mock.js"));
        assert_eq!(config.script.form_error_policy, FormErrorPolicy::Degrade);
    }

    #[test]
    fn test_builder_port_override() {
        let config = ConfigBuilder::new().port(9100).build().unwrap();
        assert_eq!(config.server.listen.port(), 9100);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let result = ConfigBuilder::new().script_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }
}
