//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Port used when nothing else is configured
pub const DEFAULT_PORT: u16 = 7788;

/// Script file name looked up beside the executable
pub const DEFAULT_SCRIPT_NAME: &str = "script.js";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Script execution configuration
    #[serde(default)]
    pub script: ScriptConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Log every handled request at info level (debug otherwise)
    #[serde(default)]
    pub request_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_log: false,
        }
    }
}

impl ServerConfig {
    /// Replace the port, keeping the bind address
    pub fn set_port(&mut self, port: u16) {
        self.listen.set_port(port);
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Script execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptConfig {
    /// Path of the script evaluated for every request
    #[serde(default = "default_script_path")]
    pub path: PathBuf,

    /// Wall-clock deadline for a single script run
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum engine operations per run (0 = unlimited)
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    /// Maximum function call depth
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    /// Maximum string length in bytes (0 = unlimited)
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,

    /// Maximum array length (0 = unlimited)
    #[serde(default = "default_max_collection_size")]
    pub max_array_size: usize,

    /// Maximum object map size (0 = unlimited)
    #[serde(default = "default_max_collection_size")]
    pub max_map_size: usize,

    /// Maximum request body size read by `getBody` / `getForm` (bytes)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Maximum number of scripts running at the same time
    #[serde(default = "default_max_concurrent_scripts")]
    pub max_concurrent_scripts: usize,

    /// What to do when `getForm` fails to parse the request
    #[serde(default)]
    pub form_error_policy: FormErrorPolicy,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: default_script_path(),
            timeout: default_timeout(),
            max_operations: default_max_operations(),
            max_call_depth: default_max_call_depth(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_collection_size(),
            max_map_size: default_max_collection_size(),
            max_body_size: default_max_body_size(),
            max_concurrent_scripts: default_max_concurrent_scripts(),
            form_error_policy: FormErrorPolicy::default(),
        }
    }
}

/// `script.js` in the directory holding the running executable
pub fn default_script_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_SCRIPT_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_NAME))
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_operations() -> u64 {
    0
}

fn default_max_call_depth() -> usize {
    64
}

fn default_max_string_size() -> usize {
    16 * 1024 * 1024 // 16MB
}

fn default_max_collection_size() -> usize {
    0
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_max_concurrent_scripts() -> usize {
    num_cpus::get() * 4
}

/// Outcome of a failed `getForm` parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormErrorPolicy {
    /// Fail the request with the parse error once the script finishes
    #[default]
    Abort,
    /// Log the error and keep the empty form the script already received
    Degrade,
}

impl FromStr for FormErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "degrade" => Ok(Self::Degrade),
            other => Err(format!(
                "unknown form error policy '{other}' (expected 'abort' or 'degrade')"
            )),
        }
    }
}

impl fmt::Display for FormErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Degrade => write!(f, "degrade"),
        }
    }
}
