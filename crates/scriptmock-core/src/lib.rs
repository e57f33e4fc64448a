//! # scriptmock core
//!
//! Foundational types shared by the scriptmock crates:
//! - Process-level error type and `Result` alias
//! - Response body alias and builder

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod response;

pub use error::{Error, Result};
pub use response::{Body, ResponseBuilder};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::response::{responses, Body, ResponseBuilder};
}
