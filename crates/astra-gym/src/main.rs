//! # astra-gym
//!
//! Sensory gym relay server binary — wires the auth layer and the relay
//! together and starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use astra_auth::{sign_token, Authenticator, Identity, InMemoryUserStore};
use astra_relay::config::RelayConfig;
use astra_relay::metrics::install_recorder;
use astra_relay::server::RelayServer;

/// Astra sensory gym relay server.
#[derive(Parser, Debug)]
#[command(name = "astra-gym", about = "Astra sensory gym relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Hand-tracking service WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:8001/ws/track")]
    upstream_url: String,

    /// Bound on the upstream connect phase, in seconds.
    #[arg(long, default_value = "10")]
    upstream_connect_timeout: u64,

    /// Token signing secret (falls back to the env var).
    #[arg(long, env = "ASTRA_JWT_SECRET")]
    jwt_secret: String,

    /// JSON file with the known accounts: an array of
    /// `{"user_id": 42, "username": "parent42"}` objects.
    #[arg(long)]
    users_file: Option<PathBuf>,

    /// Disable the Prometheus recorder and the `/metrics` endpoint.
    #[arg(long)]
    no_metrics: bool,

    /// Print a signed token for the given subject and exit. Development
    /// convenience; pair with `--users-file` on the running server.
    #[arg(long, value_name = "SUBJECT")]
    dev_token: Option<String>,
}

/// Load the account list into the in-memory store.
fn load_users(path: &PathBuf) -> Result<InMemoryUserStore> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read users file: {}", path.display()))?;
    let accounts: Vec<Identity> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid users file: {}", path.display()))?;

    let store = InMemoryUserStore::new();
    for account in accounts {
        store.insert(account);
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(subject) = args.dev_token {
        let token = sign_token(&args.jwt_secret, &subject, 3600)
            .context("failed to sign token")?;
        println!("{token}");
        return Ok(());
    }

    let store = match &args.users_file {
        Some(path) => load_users(path)?,
        None => {
            tracing::warn!("no --users-file given; every handshake will be refused");
            InMemoryUserStore::new()
        }
    };
    tracing::info!(accounts = store.len(), "user store loaded");

    let authenticator = Authenticator::new(&args.jwt_secret, Arc::new(store));
    let config = RelayConfig {
        host: args.host,
        port: args.port,
        upstream_url: args.upstream_url,
        upstream_connect_timeout_secs: args.upstream_connect_timeout,
        ..RelayConfig::default()
    };
    let shutdown_timeout = config.shutdown_timeout();

    let mut server = RelayServer::new(config, authenticator);
    if !args.no_metrics {
        server = server.with_metrics(install_recorder());
    }

    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("sensory gym relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server.shutdown().drain(vec![handle], shutdown_timeout).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use astra_core::ids::UserId;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["astra-gym", "--jwt-secret", "s3cret"]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 8000);
        assert_eq!(cli.upstream_url, "ws://127.0.0.1:8001/ws/track");
        assert_eq!(cli.upstream_connect_timeout, 10);
        assert!(cli.users_file.is_none());
        assert!(!cli.no_metrics);
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from([
            "astra-gym",
            "--host",
            "127.0.0.1",
            "--port",
            "0",
            "--upstream-url",
            "ws://tracker:9000/ws",
            "--jwt-secret",
            "s3cret",
            "--no-metrics",
        ]);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 0);
        assert_eq!(cli.upstream_url, "ws://tracker:9000/ws");
        assert!(cli.no_metrics);
    }

    #[test]
    fn cli_dev_token_mode() {
        let cli = Cli::parse_from([
            "astra-gym",
            "--jwt-secret",
            "s3cret",
            "--dev-token",
            "parent42",
        ]);
        assert_eq!(cli.dev_token.as_deref(), Some("parent42"));
    }

    #[tokio::test]
    async fn users_file_round_trips_into_the_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"user_id": 42, "username": "parent42"}}, {{"user_id": 7, "username": "parent7"}}]"#
        )
        .unwrap();

        let store = load_users(&file.path().to_path_buf()).unwrap();
        assert_eq!(store.len(), 2);

        use astra_auth::UserStore;
        let identity = store.resolve_user("parent42").await.unwrap();
        assert_eq!(identity.user_id, UserId::new(42));
    }

    #[test]
    fn malformed_users_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(load_users(&file.path().to_path_buf()).is_err());
    }
}
