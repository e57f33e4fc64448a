//! # scriptmock configuration
//!
//! Settings for the listener and for script execution. A config file is
//! optional; every field has a default and command-line flags are applied
//! on top through [`ConfigBuilder`].

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod loader;
pub mod types;
pub mod validator;

pub use builder::ConfigBuilder;
pub use loader::{load_config, load_from_str, ConfigFormat};
pub use types::{Config, FormErrorPolicy, ScriptConfig, ServerConfig, DEFAULT_PORT};
pub use validator::validate_config;
