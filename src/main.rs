//! flashpaste server entry point.
//!
//! Wires the store, the paste engine and the expiry sweeper together and
//! serves RESP clients until Ctrl+C.

use anyhow::{bail, Context};
use flashpaste::commands::CommandHandler;
use flashpaste::connection::{handle_connection, ConnectionStats};
use flashpaste::paste::{EngineConfig, PasteEngine, DEFAULT_BASE_URL};
use flashpaste::storage::{start_expiry_sweeper, MemoryStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    host: String,
    port: u16,
    /// Prefix of share links returned by PASTE.CREATE
    base_url: String,
    /// Honor the NOW argument of PASTE.CREATE / PASTE.GET
    test_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: flashpaste::DEFAULT_HOST.to_string(),
            port: flashpaste::DEFAULT_PORT,
            base_url: DEFAULT_BASE_URL.to_string(),
            test_mode: false,
        }
    }
}

/// What the command line asked for.
enum Invocation {
    Serve(Config),
    Help,
    Version,
}

impl Config {
    /// Environment first, then command-line flags on top.
    fn from_env_and_args<E, I>(env: E, args: I) -> anyhow::Result<Invocation>
    where
        E: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        if let Some(url) = env("BASE_URL").filter(|url| !url.is_empty()) {
            config.base_url = url;
        }
        config.test_mode = env("TEST_MODE").as_deref() == Some("1");

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().context("--host requires a value")?;
                }
                "--port" | "-p" => {
                    let port = args.next().context("--port requires a value")?;
                    config.port = port
                        .parse()
                        .with_context(|| format!("invalid port number '{}'", port))?;
                }
                "--base-url" => {
                    config.base_url = args.next().context("--base-url requires a value")?;
                }
                "--test-mode" => config.test_mode = true,
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                other => bail!("unknown argument: {}", other),
            }
        }

        Ok(Invocation::Serve(config))
    }

    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_base_url(self.base_url.clone())
            .with_test_mode(self.test_mode)
    }
}

fn print_help() {
    println!(
        r#"
flashpaste - Self-Expiring Paste Store

USAGE:
    flashpaste [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>        Port to listen on (default: 6380)
        --base-url <URL>     Prefix of share links (default: http://localhost:3000)
        --test-mode          Honor the NOW argument for deterministic expiry
    -v, --version            Print version information
        --help               Print this help message

ENVIRONMENT:
    BASE_URL                 Same as --base-url
    TEST_MODE=1              Same as --test-mode
    RUST_LOG                 Log filter (default: info)

CONNECTING:
    $ redis-cli -p 6380
    127.0.0.1:6380> PASTE.CREATE "hello" TTL 60 MAXVIEWS 3
    "{{\"id\":\"V1StGXR8_Z\",\"canonical_url_path\":\"/p/V1StGXR8_Z\",...}}"
    127.0.0.1:6380> PASTE.GET V1StGXR8_Z
    "{{\"content\":\"hello\",\"remaining_views\":2,...}}"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
flashpaste v{} - Self-Expiring Paste Store
──────────────────────────────────────────────
Server started on {}
Share links:      {}/p/<id>
Test mode:        {}

Use Ctrl+C to shutdown gracefully.
"#,
        flashpaste::VERSION,
        config.bind_address(),
        config.base_url.trim_end_matches('/'),
        if config.test_mode { "on" } else { "off" },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let invocation =
        Config::from_env_and_args(|key| std::env::var(key).ok(), std::env::args().skip(1));
    let config = match invocation {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("flashpaste version {}", flashpaste::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);

    let store = Arc::new(MemoryStore::new());
    let _sweeper = start_expiry_sweeper(Arc::clone(&store));
    info!("Background expiry sweeper started");

    let engine = Arc::new(PasteEngine::new(store, config.engine_config()));
    if config.test_mode {
        warn!("Test mode enabled: clients may override the current time");
    }

    let stats = Arc::new(ConnectionStats::new());
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "Listening");

    tokio::select! {
        _ = accept_loop(listener, CommandHandler::new(engine), stats) => {}
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn accept_loop(listener: TcpListener, commands: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    commands.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(env: &[(&str, &str)], args: &[&str]) -> anyhow::Result<Invocation> {
        let env: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_env_and_args(
            move |key| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
            args.iter().map(|s| s.to_string()),
        )
    }

    fn serve(env: &[(&str, &str)], args: &[&str]) -> Config {
        match parse(env, args).unwrap() {
            Invocation::Serve(config) => config,
            _ => panic!("expected a server configuration"),
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(serve(&[], &[]), Config::default());
        assert_eq!(Config::default().bind_address(), "127.0.0.1:6380");
    }

    #[test]
    fn test_flags() {
        let config = serve(
            &[],
            &["-p", "7000", "--host", "0.0.0.0", "--base-url", "https://p.example/", "--test-mode"],
        );
        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert!(config.test_mode);
        assert_eq!(config.engine_config().base_url, "https://p.example");
    }

    #[test]
    fn test_environment_fallbacks() {
        let config = serve(&[("TEST_MODE", "1"), ("BASE_URL", "https://env.example")], &[]);
        assert!(config.test_mode);
        assert_eq!(config.base_url, "https://env.example");

        assert!(!serve(&[("TEST_MODE", "true")], &[]).test_mode);
        let overridden = serve(
            &[("BASE_URL", "https://env.example")],
            &["--base-url", "https://flag.example"],
        );
        assert_eq!(overridden.base_url, "https://flag.example");
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse(&[], &["--port", "http"]).is_err());
        assert!(parse(&[], &["--port"]).is_err());
        assert!(parse(&[], &["--verbose"]).is_err());
        assert!(matches!(parse(&[], &["--help"]), Ok(Invocation::Help)));
    }
}
