//! HTTP request handler

use bytes::Bytes;
use http::{Method, Request, Response, Uri};
use scriptmock_core::response::responses;
use scriptmock_core::{Body, Result};
use scriptmock_scripting::{HostBridge, ScriptExecutor, ScriptSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Runs the configured script for every request, whatever its method or path
#[derive(Debug, Clone)]
pub struct RequestHandler {
    executor: ScriptExecutor,
    source: Arc<ScriptSource>,
    max_body_size: usize,
    request_count: Arc<AtomicUsize>,
    request_log: bool,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(
        executor: ScriptExecutor,
        source: ScriptSource,
        max_body_size: usize,
        request_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            executor,
            source: Arc::new(source),
            max_body_size,
            request_count,
            request_log: false,
        }
    }

    /// Log every completed request at `info`
    pub fn with_request_log(mut self, enabled: bool) -> Self {
        self.request_log = enabled;
        self
    }

    /// Number of requests seen so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Handle one request.
    ///
    /// Script failures never surface as `Err`: they become a `500` whose body
    /// is the error message. `Err` is reserved for responses that cannot be
    /// built at all.
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Body>>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let request_id = uuid::Uuid::new_v4();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let span = tracing::debug_span!("request", id = %request_id, method = %method, uri = %uri);

        self.respond(req, method, uri).instrument(span).await
    }

    async fn respond<B>(&self, req: Request<B>, method: Method, uri: Uri) -> Result<Response<Body>>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        debug!("Handling request");

        let bridge = HostBridge::from_request(req, self.max_body_size);
        let outcome = self
            .executor
            .execute(&self.source, bridge)
            .await
            .and_then(|value| Ok(serde_json::to_vec(&value)?));

        let response = match outcome {
            Ok(body) => responses::ok().json_bytes(body)?,
            Err(e) => {
                warn!(
                    method = %method,
                    uri = %uri,
                    kind = e.kind(),
                    error = %e,
                    "Request failed"
                );
                responses::internal_error(e.to_string())?
            }
        };

        if self.request_log {
            info!(
                method = %method,
                uri = %uri,
                status = response.status().as_u16(),
                latency_ms = %start.elapsed().as_millis(),
                "Request completed"
            );
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, StatusCode};
    use http_body_util::{BodyExt, Full};
    use scriptmock_config::ScriptConfig;

    fn handler(code: &str) -> RequestHandler {
        let config = ScriptConfig::default();
        RequestHandler::new(
            ScriptExecutor::new(&config),
            ScriptSource::inline(code),
            config.max_body_size,
            Arc::new(AtomicUsize::new(0)),
        )
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "localhost")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_is_json() {
        let handler = handler(r#"result = #{ path: getUri() };"#);
        let response = handler.handle(get("/hello?x=1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_string(response).await, r#"{"path":"/hello?x=1"}"#);
        assert_eq!(handler.request_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unset_result_is_empty_string() {
        let response = handler("let x = 1;").handle(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#""""#);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_runtime_error_is_plain_text_500() {
        let response = handler("result = nope;").handle(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert!(body_string(response).await.contains("nope"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unencodable_result_is_500() {
        let response = handler("result = 0.0 / 0.0;").handle(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "unsupported value: NaN");

        let response = handler(r#"result = Fn("x");"#).handle(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "unsupported type: Fn");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScriptConfig::default();
        let handler = RequestHandler::new(
            ScriptExecutor::new(&config),
            ScriptSource::file(dir.path().join("script.js")),
            config.max_body_size,
            Arc::new(AtomicUsize::new(0)),
        );

        let response = handler.handle(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "script not found");
    }
}
