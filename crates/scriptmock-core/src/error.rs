//! Process-level error types
//!
//! Errors raised while handling a single request live in the scripting crate;
//! this type covers startup and serving failures.

use std::net::SocketAddr;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the scriptmock server
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to bind the listening socket
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to assemble an HTTP response
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
