//! # scriptmock scripting
//!
//! Per-request script execution for the mock server.
//!
//! Every request gets a fresh [Rhai](https://rhai.rs) environment with six
//! host callables bound to that request (`getHost`, `getMethod`, `getUri`,
//! `getQuery`, `getForm`, `getBody`). Whatever the script leaves in the
//! global `result` becomes the JSON response.
//!
//! ## Features
//!
//! - Script file re-read on every request
//! - Isolated engine and scope per run
//! - Deadline enforcement and engine resource limits
//! - Bounded number of concurrently running scripts

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bridge;
pub mod encode;
pub mod environment;
pub mod error;
pub mod executor;
pub mod form;
pub mod source;

pub use bridge::{FormOutcome, HostBridge};
pub use environment::{EngineLimits, EnvironmentFactory, ScriptEnvironment, RESULT_BINDING};
pub use error::{Error, FormParseError, Result, ScriptError};
pub use executor::ScriptExecutor;
pub use source::ScriptSource;

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::bridge::HostBridge;
    pub use crate::error::{Error, Result, ScriptError};
    pub use crate::executor::ScriptExecutor;
    pub use crate::source::ScriptSource;
}
