//! Host capability bridge
//!
//! Exposes one request to a script through a fixed table of callables:
//!
//! | name          | returns                       |
//! |---------------|-------------------------------|
//! | `getHost()`   | target host                   |
//! | `getMethod()` | HTTP verb                     |
//! | `getUri()`    | path and query                |
//! | `getQuery()`  | `#{ key: [values] }`          |
//! | `getForm()`   | `#{ key: [values] }`          |
//! | `getBody()`   | raw body, `""` once consumed  |
//!
//! The body stream is read at most once. `getBody` and `getForm` share it, so
//! whichever runs first owns the bytes.

use crate::error::FormParseError;
use crate::form::{self, Values};
use bytes::Bytes;
use http::{header, Method, Request};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Limited};
use rhai::{Array, Dynamic, Engine, Map};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tokio::runtime::Handle;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// Result of the first `getForm` call
#[derive(Debug, Clone)]
pub enum FormOutcome {
    /// Form parsed; values handed to the script
    Parsed(Values),
    /// Parsing failed; the script received an empty mapping
    Failed(FormParseError),
}

/// Request state shared with the callables registered for one script run
pub struct HostBridge {
    host: String,
    method: Method,
    uri: String,
    raw_query: String,
    content_type: Option<String>,
    max_body_size: usize,
    body: Mutex<Option<RequestBody>>,
    form: OnceLock<FormOutcome>,
    runtime: Handle,
}

impl fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBridge")
            .field("host", &self.host)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("form_parsed", &self.form.get().is_some())
            .finish()
    }
}

impl HostBridge {
    /// Capture a request for scripting.
    ///
    /// Must be called from within a Tokio runtime; the body is read later,
    /// from the blocking thread running the script, through that runtime.
    pub fn from_request<B>(req: Request<B>, max_body_size: usize) -> Arc<Self>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let body: RequestBody = body.map_err(Into::into).boxed_unsync();

        Arc::new(Self {
            host,
            method: parts.method,
            uri,
            raw_query: parts.uri.query().unwrap_or_default().to_string(),
            content_type,
            max_body_size,
            body: Mutex::new(Some(body)),
            form: OnceLock::new(),
            runtime: Handle::current(),
        })
    }

    /// Request target host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI including query
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Query parameters; malformed pairs are skipped
    pub fn query(&self) -> Values {
        form::parse_query_lenient(&self.raw_query)
    }

    /// Parse the form on first call and return the cached outcome afterwards.
    pub fn form(&self, deadline: Instant) -> &FormOutcome {
        self.form.get_or_init(|| match self.parse_form(deadline) {
            Ok(values) => FormOutcome::Parsed(values),
            Err(e) => {
                tracing::debug!(error = %e, "Form parsing failed");
                FormOutcome::Failed(e)
            }
        })
    }

    /// Error recorded by `getForm`, if the script called it and parsing failed
    pub fn form_error(&self) -> Option<FormParseError> {
        match self.form.get() {
            Some(FormOutcome::Failed(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Read the remaining body. Returns empty bytes once the stream was taken.
    pub fn take_body(&self, deadline: Instant) -> Result<Bytes, FormParseError> {
        let body = match self.body.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(body) = body else {
            return Ok(Bytes::new());
        };

        let limit = self.max_body_size;
        let read = Limited::new(body, limit).collect();
        let deadline = tokio::time::Instant::from_std(deadline);

        match self
            .runtime
            .block_on(async move { tokio::time::timeout_at(deadline, read).await })
        {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) if e.is::<http_body_util::LengthLimitError>() => {
                Err(FormParseError::BodyTooLarge { limit })
            }
            Ok(Err(e)) => Err(FormParseError::BodyRead(e.to_string())),
            Err(_) => Err(FormParseError::BodyRead("deadline exceeded".to_string())),
        }
    }

    fn parse_form(&self, deadline: Instant) -> Result<Values, FormParseError> {
        let mut values = Values::new();
        let mut first_error = None;

        if matches!(self.method, Method::POST | Method::PUT | Method::PATCH) {
            let media_type = form::media_type(self.content_type.as_deref())?;
            if media_type == form::FORM_URLENCODED {
                let body = self.take_body(deadline)?;
                let (body_values, err) = form::parse_urlencoded(&String::from_utf8_lossy(&body));
                values = body_values;
                first_error = err;
            }
        }

        let (query_values, err) = form::parse_urlencoded(&self.raw_query);
        form::merge_values(&mut values, query_values);

        match first_error.or(err) {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }

    /// Register the host callables into `engine`, bound to this request.
    ///
    /// Body reads performed by the callables give up at `deadline`.
    pub fn register(self: &Arc<Self>, engine: &mut Engine, deadline: Instant) {
        let bridge = Arc::clone(self);
        engine.register_fn("getHost", move || -> String { bridge.host.clone() });

        let bridge = Arc::clone(self);
        engine.register_fn("getMethod", move || -> String {
            bridge.method.as_str().to_string()
        });

        let bridge = Arc::clone(self);
        engine.register_fn("getUri", move || -> String { bridge.uri.clone() });

        let bridge = Arc::clone(self);
        engine.register_fn("getQuery", move || -> Map { values_to_map(&bridge.query()) });

        let bridge = Arc::clone(self);
        engine.register_fn("getForm", move || -> Map {
            match bridge.form(deadline) {
                FormOutcome::Parsed(values) => values_to_map(values),
                FormOutcome::Failed(_) => Map::new(),
            }
        });

        let bridge = Arc::clone(self);
        engine.register_fn("getBody", move || -> String {
            match bridge.take_body(deadline) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read request body for script");
                    String::new()
                }
            }
        });
    }
}

fn values_to_map(values: &Values) -> Map {
    values
        .iter()
        .map(|(key, vals)| {
            let array: Array = vals.iter().cloned().map(Dynamic::from).collect();
            (key.as_str().into(), Dynamic::from_array(array))
        })
        .collect()
}
