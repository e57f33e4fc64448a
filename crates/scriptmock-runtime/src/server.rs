//! HTTP server implementation

use crate::handler::RequestHandler;
use crate::shutdown::ShutdownSignal;
use crate::RuntimeState;
use hyper_util::rt::TokioIo;
use scriptmock_config::Config;
use scriptmock_core::{Error, Result};
use scriptmock_scripting::{ScriptExecutor, ScriptSource};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// HTTP server
#[derive(Debug)]
pub struct Server {
    config: Config,
    handler: RequestHandler,
    state: Arc<RwLock<RuntimeState>>,
    shutdown: ShutdownSignal,
    request_count: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Get the current state
    pub async fn state(&self) -> RuntimeState {
        *self.state.read().await
    }

    /// Get listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.server.listen
    }

    /// Get request count
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get shutdown signal
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.listen_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })
    }

    /// Bind and serve until shutdown is triggered
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown is triggered.
    ///
    /// In-flight requests are not drained: connection tasks are detached and
    /// end with the process.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = RuntimeState::Running;
        }

        tracing::info!(
            listen = %listener.local_addr()?,
            script = %self.config.script.path.display(),
            "Server starting"
        );

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::trace!("Accepted connection from {}", addr);
                            let handler = self.handler.clone();

                            tokio::spawn(async move {
                                let service = hyper::service::service_fn(move |req| {
                                    let handler = handler.clone();
                                    async move {
                                        handler.handle(req).await.map_err(|e| {
                                            tracing::error!("Failed to build response: {}", e);
                                            e
                                        })
                                    }
                                });

                                let io = TokioIo::new(stream);
                                if let Err(e) = hyper::server::conn::http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    tracing::debug!("HTTP connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = self.shutdown.triggered() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        {
            let mut state = self.state.write().await;
            *state = RuntimeState::Stopped;
        }

        tracing::info!(requests = self.request_count(), "Server stopped");
        Ok(())
    }
}

/// Server builder
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<Config>,
    shutdown: Option<ShutdownSignal>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing shutdown signal instead of a fresh one
    pub fn shutdown_signal(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown = Some(signal);
        self
    }

    /// Build the server
    pub fn build(self) -> Result<Server> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("config is required".to_string()))?;

        let request_count = Arc::new(AtomicUsize::new(0));
        let executor = ScriptExecutor::new(&config.script);
        let handler = RequestHandler::new(
            executor,
            ScriptSource::file(config.script.path.clone()),
            config.script.max_body_size,
            Arc::clone(&request_count),
        )
        .with_request_log(config.server.request_log);

        tracing::debug!(
            timeout_ms = config.script.timeout.as_millis() as u64,
            max_concurrent_scripts = config.script.max_concurrent_scripts,
            form_error_policy = %config.script.form_error_policy,
            "Script executor configured"
        );

        Ok(Server {
            config,
            handler,
            state: Arc::new(RwLock::new(RuntimeState::Initializing)),
            shutdown: self.shutdown.unwrap_or_default(),
            request_count,
        })
    }
}
