//! Script source loading

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Where the per-request script comes from
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// Inline script code
    Inline {
        /// Script code
        code: String,
        /// Optional name for debugging
        name: Option<String>,
    },
    /// File-based script, re-read on every load
    File {
        /// Path to script file
        path: PathBuf,
    },
}

impl ScriptSource {
    /// Create inline script source
    pub fn inline<S: Into<String>>(code: S) -> Self {
        Self::Inline {
            code: code.into(),
            name: None,
        }
    }

    /// Create inline script with name
    pub fn inline_named<S: Into<String>, N: Into<String>>(code: S, name: N) -> Self {
        Self::Inline {
            code: code.into(),
            name: Some(name.into()),
        }
    }

    /// Create file-based script source
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File { path: path.into() }
    }

    /// Load the script text.
    ///
    /// File sources are never cached: edits are picked up by the next call.
    /// A path that cannot be stat'ed yields [`Error::NotFound`]; a file that
    /// exists but cannot be read as UTF-8 text yields [`Error::Read`].
    pub async fn load(&self) -> Result<String> {
        match self {
            Self::Inline { code, .. } => Ok(code.clone()),
            Self::File { path } => {
                if let Err(e) = tokio::fs::metadata(path).await {
                    tracing::debug!(path = %path.display(), error = %e, "Script file not found");
                    return Err(Error::NotFound { path: path.clone() });
                }

                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| Error::Read {
                        path: path.clone(),
                        source,
                    })
            }
        }
    }

    /// Get a descriptive name for this script
    pub fn name(&self) -> String {
        match self {
            Self::Inline { name, .. } => name.clone().unwrap_or_else(|| "inline".to_string()),
            Self::File { path } => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_inline_source() {
        let source = ScriptSource::inline_named("result = 1;", "answer");
        assert_eq!(source.load().await.unwrap(), "result = 1;");
        assert_eq!(source.name(), "answer");
        assert_eq!(ScriptSource::inline("1").name(), "inline");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptSource::file(dir.path().join("nope.js"));

        let err = source.load().await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(err.to_string(), "script not found");
    }

    #[tokio::test]
    async fn test_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptSource::file(dir.path());

        let err = source.load().await.unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert_eq!(err.to_string(), "read script error");
    }

    #[tokio::test]
    async fn test_file_is_reread_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "result = 1;").unwrap();
        let source = ScriptSource::file(file.path());
        assert_eq!(source.load().await.unwrap(), "result = 1;");

        std::fs::write(file.path(), "result = 2;").unwrap();
        assert_eq!(source.load().await.unwrap(), "result = 2;");
    }
}
