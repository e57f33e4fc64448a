//! Response builder and utilities

use crate::Result;
use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::Full;

/// Body type alias
pub type Body = Full<Bytes>;

/// Builds a response with a fixed content type
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
}

impl ResponseBuilder {
    /// Create a new response builder
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }

    /// Build response with text body
    pub fn text(self, body: impl Into<String>) -> Result<Response<Body>> {
        self.with_content_type("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    /// Build response with an already serialized JSON body
    pub fn json_bytes(self, body: impl Into<Bytes>) -> Result<Response<Body>> {
        self.with_content_type("application/json", body.into())
    }

    fn with_content_type(self, content_type: &'static str, body: Bytes) -> Result<Response<Body>> {
        Ok(Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, content_type)
            .body(Full::new(body))?)
    }
}

/// Convenience functions for common responses
pub mod responses {
    use super::*;

    /// 200 OK
    pub fn ok() -> ResponseBuilder {
        ResponseBuilder::new(StatusCode::OK)
    }

    /// 500 Internal Server Error
    pub fn internal_error(message: impl Into<String>) -> Result<Response<Body>> {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR).text(message)
    }
}
