//! End-to-end tests driving a real listener

use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use scriptmock_config::{ConfigBuilder, FormErrorPolicy};
use scriptmock_runtime::{ServerBuilder, ShutdownSignal};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownSignal,
    _dir: TempDir,
}

impl TestServer {
    async fn start(script: Option<&str>, configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.js");
        if let Some(code) = script {
            std::fs::write(&path, code).unwrap();
        }

        let config = configure(ConfigBuilder::new().script_path(&path))
            .build()
            .unwrap();

        let shutdown = ShutdownSignal::new();
        let server = ServerBuilder::new()
            .config(config)
            .shutdown_signal(shutdown.clone())
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        Self {
            addr,
            shutdown,
            _dir: dir,
        }
    }

    async fn send(&self, method: Method, path: &str, content_type: Option<&str>, body: &str) -> (StatusCode, String, String) {
        let client: Client<HttpConnector, Full<Bytes>> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let mut builder = Request::builder()
            .method(method)
            .uri(format!("http://{}{}", self.addr, path));
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Full::new(Bytes::from(body.to_string()))).unwrap();

        let response = client.request(req).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, String, String) {
        self.send(Method::GET, path, None, "").await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_result_is_returned_as_json() {
    let server = TestServer::start(Some(r#"result = #{ ok: true, items: [1, 2] };"#), |b| b).await;

    let (status, content_type, body) = server.get("/anything").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json");
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, serde_json::json!({"ok": true, "items": [1, 2]}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_script_is_500_on_every_request() {
    let server = TestServer::start(None, |b| b).await;

    for path in ["/", "/a", "/b?c=d"] {
        let (status, content_type, body) = server.get(path).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "script not found");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_method_host_and_query() {
    let server = TestServer::start(
        Some("result = #{ method: getMethod(), host: getHost(), query: getQuery() };"),
        |b| b,
    )
    .await;

    let (status, _, body) = server.send(Method::POST, "/x?a=1&b=2", None, "").await;
    assert_eq!(status, StatusCode::OK);

    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["method"], "POST");
    assert_eq!(value["host"], server.addr.to_string());
    assert_eq!(value["query"], serde_json::json!({"a": ["1"], "b": ["2"]}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_script_edits_are_picked_up() {
    let server = TestServer::start(Some("result = 1;"), |b| b).await;
    assert_eq!(server.get("/").await.2, "1");

    std::fs::write(server._dir.path().join("script.js"), "result = 2;").unwrap();
    assert_eq!(server.get("/").await.2, "2");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_form_policies() {
    let script = Some("result = getForm();");
    let form = Some("application/x-www-form-urlencoded");

    let abort = TestServer::start(script, |b| b).await;
    let (status, _, body) = abort.send(Method::POST, "/", form, "a=%zz").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "invalid URL escape \"%zz\"");

    let (status, _, body) = abort.send(Method::POST, "/?q=1", form, "a=1&a=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"a":["1","2"],"q":["1"]}"#);

    let degrade = TestServer::start(script, |b| b.form_error_policy(FormErrorPolicy::Degrade)).await;
    let (status, _, body) = degrade.send(Method::POST, "/", form, "a=%zz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "{}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout() {
    let server = TestServer::start(Some("let i = 0; loop { i += 1; }"), |b| {
        b.script_timeout(Duration::from_millis(200))
    })
    .await;

    let (status, _, body) = server.get("/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "execution timeout");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_are_isolated() {
    let server = TestServer::start(
        Some(r#"let id = getQuery()["id"][0]; result = #{ id: id, uri: getUri() };"#),
        |b| b.max_concurrent_scripts(4),
    )
    .await;
    let server = std::sync::Arc::new(server);

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let server = std::sync::Arc::clone(&server);
            tokio::spawn(async move {
                let (status, _, body) = server.get(&format!("/r?id={i}")).await;
                (i, status, body)
            })
        })
        .collect();

    for task in tasks {
        let (i, status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["id"], i.to_string());
        assert_eq!(value["uri"], format!("/r?id={i}"));
    }
}
