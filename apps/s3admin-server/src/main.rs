//! s3admin server - provisioning API for buckets, websites and their users.
//!
//! Loads the JSON configuration, connects one set of cloud gateways per
//! account and serves the admin API until a shutdown signal arrives.
//!
//! # Usage
//!
//! ```text
//! s3admin-server [config.json]
//! S3ADMIN_CONFIG=/etc/s3admin.json s3admin-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `S3ADMIN_CONFIG` | `config.json` | Configuration file (a CLI argument wins) |
//! | `LISTEN_ADDRESS` | *(config)* | Bind address |
//! | `AUTH_TOKEN` | *(config)* | Shared secret for `X-Auth-Token` |
//! | `LOG_LEVEL` | *(config)* | Log level filter |
//! | `LOG_FORMAT` | `text` | `json` for structured output |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use s3admin_core::{AppConfig, ErrorClassifier};
use s3admin_http::{AdminHttpConfig, AdminHttpService, AdminHandler, Metrics, ProvisionHandler};
use s3admin_model::output::VersionOutput;
use s3admin_provision::{Provisioner, SagaStats};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported on `/version`.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file used when neither an argument nor `S3ADMIN_CONFIG` is given.
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `logLevel` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Pick the configuration file: first non-flag argument, then `S3ADMIN_CONFIG`.
fn config_path(args: impl IntoIterator<Item = String>, env: Option<String>) -> String {
    args.into_iter()
        .find(|a| !a.starts_with("--"))
        .or(env)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned())
}

/// Build information compiled into the binary.
fn version() -> VersionOutput {
    VersionOutput {
        version: VERSION.to_owned(),
        githash: option_env!("GIT_HASH").unwrap_or("unknown").to_owned(),
        buildstamp: option_env!("BUILD_STAMP").unwrap_or("unknown").to_owned(),
    }
}

/// Build the [`AdminHttpConfig`] from the application [`AppConfig`].
fn build_http_config(config: &AppConfig) -> AdminHttpConfig {
    AdminHttpConfig {
        token: config.token.clone(),
        request_timeout: config.request_timeout(),
        version: version(),
    }
}

/// Connect the gateways of every account.
async fn build_handler(config: &AppConfig, stats: &Arc<SagaStats>) -> ProvisionHandler {
    let classifier = ErrorClassifier::new(config.legacy_cdn_not_found);
    let mut names: Vec<&String> = config.accounts.keys().collect();
    names.sort();

    let mut provisioners = Vec::with_capacity(names.len());
    for name in names {
        let account = &config.accounts[name];
        let gateways = s3admin_gateway::connect(account, classifier).await;
        info!(
            account = %name,
            backend = ?account.backend,
            region = %account.region,
            domains = account.domains.len(),
            "account connected",
        );
        provisioners.push(Provisioner::new(
            name.clone(),
            account.clone(),
            gateways,
            Arc::clone(stats),
        ));
    }
    ProvisionHandler::new(provisioners)
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: AdminHandler>(
    listener: TcpListener,
    service: AdminHttpService<H>,
    config: &AppConfig,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let mut http = HttpConnBuilder::new(TokioExecutor::new());
    http.http1()
        .timer(TokioTimer::new())
        .header_read_timeout(config.request_timeout());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Perform a health check by requesting `/ping` from a running server.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /ping HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.ends_with("pong") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::args().skip(1), std::env::var("S3ADMIN_CONFIG").ok());
    let config = AppConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {path}"))?;

    // Handle --health-check flag for container probes.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen_address.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    info!(
        listen_address = %config.listen_address,
        accounts = config.accounts.len(),
        request_timeout_secs = config.request_timeout_secs,
        legacy_cdn_not_found = config.legacy_cdn_not_found,
        version = VERSION,
        "starting s3admin server",
    );

    let stats = Arc::new(SagaStats::default());
    let handler = build_handler(&config, &stats).await;
    let service = AdminHttpService::new(
        Arc::new(handler),
        build_http_config(&config),
        Arc::new(Metrics::new(stats)),
    );

    let addr: SocketAddr = config
        .listen_address
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen_address))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service, &config).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use s3admin_core::{AccountConfig, Backend};

    use super::*;

    fn memory_config() -> AppConfig {
        AppConfig::builder()
            .token("s3cret".to_owned())
            .request_timeout_secs(5)
            .accounts(HashMap::from([
                (
                    "p2".to_owned(),
                    AccountConfig::builder().backend(Backend::Memory).build(),
                ),
                (
                    "p1".to_owned(),
                    AccountConfig::builder().backend(Backend::Memory).build(),
                ),
            ]))
            .build()
    }

    #[test]
    fn test_should_build_http_config_from_app_config() {
        let config = memory_config();
        let http_config = build_http_config(&config);

        assert_eq!(http_config.token, "s3cret");
        assert_eq!(http_config.request_timeout.as_secs(), 5);
        assert_eq!(http_config.version.version, VERSION);
    }

    #[test]
    fn test_should_prefer_argument_over_environment() {
        let args = ["--health-check".to_owned(), "/etc/a.json".to_owned()];
        assert_eq!(config_path(args, Some("/etc/b.json".to_owned())), "/etc/a.json");
        assert_eq!(
            config_path(Vec::new(), Some("/etc/b.json".to_owned())),
            "/etc/b.json"
        );
        assert_eq!(config_path(Vec::new(), None), DEFAULT_CONFIG_PATH);
    }

    #[tokio::test]
    async fn test_should_connect_every_account() {
        let config = memory_config();
        let handler = build_handler(&config, &Arc::new(SagaStats::default())).await;

        assert_eq!(handler.provisioner("p1").map(Provisioner::name), Some("p1"));
        assert!(handler.provisioner("p2").is_some());
        assert!(handler.provisioner("p3").is_none());
    }
}
