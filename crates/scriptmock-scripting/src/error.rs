//! Request-scoped error types
//!
//! Every variant of [`Error`] ends the request with a `500` whose body is the
//! error's `Display` output, so the messages here are part of the wire contract.

use std::fmt;
use std::path::PathBuf;

/// Result type for script handling
pub type Result<T> = std::result::Result<T, Error>;

/// Failure while serving a single request
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configured script path does not exist
    #[error("script not found")]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Script exists but could not be read
    #[error("read script error")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Script execution or result lookup failed
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Request form could not be parsed
    #[error(transparent)]
    FormParse(#[from] FormParseError),

    /// Result holds a value JSON cannot represent
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-friendly name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Read { .. } => "read",
            Self::Script(_) => "script",
            Self::FormParse(_) => "form_parse",
            Self::Encoding(_) => "encoding",
        }
    }
}

/// Script execution error
#[derive(Debug, Clone)]
pub enum ScriptError {
    /// Script compilation/parsing error
    CompilationError {
        /// Error message
        message: String,
        /// Line number if available
        line: Option<usize>,
        /// Column number if available
        column: Option<usize>,
    },

    /// Script runtime error
    RuntimeError {
        /// Error message
        message: String,
        /// Script line where error occurred
        line: Option<usize>,
    },

    /// Script ran past its deadline
    Timeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The `result` binding was not present after the run
    MissingResult {
        /// Binding name
        name: String,
    },

    /// Script execution panic
    Panic {
        /// Panic message
        message: String,
    },

    /// No execution slot could be obtained
    Unavailable {
        /// Error message
        message: String,
    },
}

impl ScriptError {
    /// Create a compilation error
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::CompilationError {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a missing result error
    pub fn missing_result<S: Into<String>>(name: S) -> Self {
        Self::MissingResult { name: name.into() }
    }

    /// Create a panic error
    pub fn panic<S: Into<String>>(message: S) -> Self {
        Self::Panic {
            message: message.into(),
        }
    }

    /// Whether the script was stopped by its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Engine messages already carry "(line N, position M)".
            Self::CompilationError { message, .. } => {
                write!(f, "Script compilation error: {}", message)
            }
            Self::RuntimeError { message, .. } => {
                write!(f, "Script runtime error: {}", message)
            }
            Self::Timeout { .. } => write!(f, "execution timeout"),
            Self::MissingResult { name } => {
                write!(f, "{} binding missing", name)
            }
            Self::Panic { message } => write!(f, "Script panic: {}", message),
            Self::Unavailable { message } => {
                write!(f, "Script execution unavailable: {}", message)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<rhai::ParseError> for ScriptError {
    fn from(err: rhai::ParseError) -> Self {
        let pos = err.position();
        Self::CompilationError {
            message: err.to_string(),
            line: pos.line(),
            column: pos.position(),
        }
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        // Syntax errors surfaced at run time keep their category.
        if let rhai::EvalAltResult::ErrorParsing(..) = *err {
            return Self::compilation(err.to_string());
        }

        let pos = err.position();
        Self::RuntimeError {
            message: err.to_string(),
            line: pos.line(),
        }
    }
}

/// Failure while parsing the request form for `getForm`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormParseError {
    /// Malformed percent-escape
    #[error("invalid URL escape \"{0}\"")]
    InvalidEscape(String),

    /// `;` used as a pair separator
    #[error("invalid semicolon separator in query")]
    SemicolonSeparator,

    /// Unparseable `Content-Type` header
    #[error("invalid content type: {0}")]
    ContentType(String),

    /// Body larger than the configured limit
    #[error("request body too large (limit {limit} bytes)")]
    BodyTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Body stream failed
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}
