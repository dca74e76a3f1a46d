//! Letterpress upload server.
//!
//! Accepts authenticated image uploads from the newsletter editor, stores
//! them in Cloudflare R2 through SigV4-signed S3 requests, and returns their
//! public URLs.
//!
//! # Usage
//!
//! ```text
//! R2_ACCOUNT_ID=... R2_ACCESS_KEY_ID=... R2_SECRET_ACCESS_KEY=... letterpress-upload-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:8787` | Bind address |
//! | `R2_ACCOUNT_ID` | *(required)* | Cloudflare account id |
//! | `R2_ACCESS_KEY_ID` | *(required)* | R2 access key id |
//! | `R2_SECRET_ACCESS_KEY` | *(required)* | R2 secret access key |
//! | `R2_BUCKET_NAME` | `newsletter-images` | Target bucket |
//! | `R2_PUBLIC_URL` | *(unset)* | Base of returned public URLs |
//! | `R2_ENDPOINT` | *(unset)* | Endpoint override for local emulators |
//! | `UPLOAD_MAX_SIZE` | `10485760` | Largest accepted upload in bytes |
//! | `SUPABASE_URL` | *(unset)* | Identity provider base URL |
//! | `SUPABASE_ANON_KEY` | *(unset)* | Identity provider API key |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod service;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use letterpress_upload::{
    ObjectStore, R2ObjectStore, SupabaseTokenVerifier, TokenVerifier, UploadConfig, UploadService,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::service::{HEALTH_PATH, UploadHttpService};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Wire the R2 store and the Supabase verifier into an [`UploadService`].
fn build_upload_service(
    config: UploadConfig,
) -> Result<UploadService<R2ObjectStore, SupabaseTokenVerifier>> {
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let store = R2ObjectStore::with_client(client.clone(), config.clone());
    let verifier = SupabaseTokenVerifier::new(client, &config);
    Ok(UploadService::new(store, verifier, config))
}

/// Resolve on Ctrl-C or, on Unix, `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Accept connections until [`shutdown_signal`] fires, then drain them.
async fn serve<S: ObjectStore, V: TokenVerifier>(
    listener: TcpListener,
    service: UploadHttpService<S, V>,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let builder = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let conn = builder.serve_connection(TokioIo::new(stream), service.clone());
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!(%peer_addr, error = %e, "connection error");
            }
        });
    }

    info!("shutdown requested, draining open connections");
    graceful.shutdown().await;
    info!("upload server stopped");

    Ok(())
}

/// Request the health endpoint of a running server.
///
/// Exits with code 0 if healthy, 1 otherwise.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET {HEALTH_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = UploadConfig::from_env();
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    let config = UploadConfig::from_env();

    init_tracing(&config.log_level)?;
    config.validate().context("invalid configuration")?;

    info!(
        gateway_listen = %config.gateway_listen,
        endpoint = %config.endpoint(),
        bucket = %config.bucket_name,
        max_upload_size = config.max_upload_size,
        version = VERSION,
        "starting Letterpress upload server",
    );

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let service = UploadHttpService::new(build_upload_service(config)?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
