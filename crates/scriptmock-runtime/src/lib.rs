//! # scriptmock runtime
//!
//! HTTP server and lifecycle management:
//! - Single catch-all route running the script for every request
//! - Server lifecycle (startup, running, stopped)
//! - Signal handling

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod handler;
pub mod server;
pub mod shutdown;

pub use handler::RequestHandler;
pub use server::{Server, ServerBuilder};
pub use shutdown::{ShutdownSignal, SignalHandler};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Server is initializing
    Initializing,
    /// Server is accepting connections
    Running,
    /// Server is stopped
    Stopped,
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::server::{Server, ServerBuilder};
    pub use crate::shutdown::{ShutdownSignal, SignalHandler};
    pub use crate::RuntimeState;
}
