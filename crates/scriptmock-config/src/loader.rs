//! Config file loading
//!
//! The file format follows the extension. `${VAR}` and `${VAR:-fallback}`
//! references are substituted from the environment before parsing; every
//! unset variable without a fallback is reported in one error.

use crate::Config;
use regex::{Captures, Regex};
use scriptmock_core::{Error, Result};
use std::path::Path;

const ENV_REFERENCE: &str = r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<fallback>[^}]*))?\}";

/// Serialization format of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Pick the format from the file extension (case-insensitive)
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(Error::Config(format!(
                "{}: expected a .yaml, .yml, .toml or .json file",
                path.display()
            ))),
        }
    }

    fn parse(self, content: &str) -> Result<Config> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|msg| Error::Config(format!("invalid {:?} config: {msg}", self)))
    }
}

/// Parse `content` without validating it
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Config> {
    format.parse(&substitute_env(content)?)
}

/// Read, parse and validate the config file at `path`
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let format = ConfigFormat::detect(path)?;

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    let config = load_from_str(&content, format)?;
    crate::validator::validate_config(&config)?;

    tracing::debug!(path = %path.display(), ?format, "Config file loaded");
    Ok(config)
}

fn substitute_env(content: &str) -> Result<String> {
    let re = Regex::new(ENV_REFERENCE).map_err(|e| Error::Config(e.to_string()))?;
    let mut unset = Vec::new();

    let expanded = re.replace_all(content, |caps: &Captures<'_>| {
        let name = &caps["name"];
        match (std::env::var(name), caps.name("fallback")) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                unset.push(name.to_string());
                String::new()
            }
        }
    });
    let expanded = expanded.into_owned();

    if unset.is_empty() {
        Ok(expanded)
    } else {
        Err(Error::Config(format!(
            "environment variables not set: {}",
            unset.join(", ")
        )))
    }
}
