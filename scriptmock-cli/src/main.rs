//! scriptmock CLI

use anyhow::Result;
use clap::Parser;
use scriptmock_config::{load_config, Config, ConfigBuilder, FormErrorPolicy, DEFAULT_PORT};
use scriptmock_runtime::{ServerBuilder, SignalHandler};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BANNER: &str = r#"
   __ ____     ______        __    ____
  / // / /    /_  __/__ ___ / /_  / __/__ _____  _____ ____
 / _  / /__    / / / -_|_-</ __/ _\ \/ -_) __/ |/ / -_) __/
/_//_/____/   /_/  \__/___/\__/ /___/\__/_/  |___/\__/_/
"#;

#[derive(Parser, Debug)]
#[command(name = "scriptmock")]
#[command(about = "Programmable HTTP mock server driven by a per-request script", long_about = None)]
#[command(version)]
struct Cli {
    /// Port to listen on [default: 7788]
    #[arg(short, long)]
    port: Option<u16>,

    /// Script path [default: script.js beside the executable]
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Script execution deadline, e.g. `500ms` or `30s`
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// What to do when the request form cannot be parsed (abort, degrade)
    #[arg(long)]
    form_errors: Option<FormErrorPolicy>,
}

impl Cli {
    /// Load the config file, if any, then apply explicit flags on top
    fn resolve_config(&self) -> Result<Config> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };

        let mut builder = ConfigBuilder::from_config(base);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(script) = &self.script {
            builder = builder.script_path(script);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.script_timeout(timeout);
        }
        if let Some(policy) = self.form_errors {
            builder = builder.form_error_policy(policy);
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = cli.resolve_config()?;

    println!("{}", BANNER);
    println!("Server Listen at {}", config.server.listen.port());
    println!("Script file is {}", config.script.path.display());

    tracing::debug!(
        listen = %config.server.listen,
        script = %config.script.path.display(),
        timeout = %humantime::format_duration(config.script.timeout),
        default_port = DEFAULT_PORT,
        "Configuration loaded"
    );

    let server = ServerBuilder::new().config(config).build()?;

    let shutdown_signal = server.shutdown_signal();
    tokio::spawn(async move {
        if let Err(e) = SignalHandler::new(shutdown_signal).run().await {
            tracing::error!("Failed to install signal handlers: {}", e);
        }
    });

    server.run().await?;

    // In-flight scripts are abandoned rather than drained.
    println!("Bye Bye");
    std::process::exit(0);
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(filter.into())
                .add_directive("hyper=warn".parse()?),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["scriptmock"]).unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.server.listen.port(), DEFAULT_PORT);
        assert!(config.script.path.ends_with("script.js"));
        assert_eq!(config.script.form_error_policy, FormErrorPolicy::Abort);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptmock.yaml");
        std::fs::write(
            &path,
            "server:\n  listen: 127.0.0.1:9000\nscript:\n  path: /srv/file.js\n  timeout: 5s\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "scriptmock",
            "-c",
            path.to_str().unwrap(),
            "-p",
            "8081",
            "-t",
            "250ms",
            "--form-errors",
            "degrade",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.server.listen, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(config.script.path, PathBuf::from("/srv/file.js"));
        assert_eq!(config.script.timeout, Duration::from_millis(250));
        assert_eq!(config.script.form_error_policy, FormErrorPolicy::Degrade);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Cli::try_parse_from(["scriptmock", "-p", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["scriptmock", "--form-errors", "ignore"]).is_err());
        assert!(Cli::try_parse_from(["scriptmock", "-t", "soon"]).is_err());
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let cli = Cli::try_parse_from(["scriptmock", "-t", "0s"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }
}
