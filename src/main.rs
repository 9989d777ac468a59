//! pairlink - pairing code redemption server
//!
//! Serves the `sendPairing` callable endpoint: the second party of a device
//! pairing redeems a code generated by the first, which is then notified on
//! topic `pair_<code>`.

use anyhow::{Context, Result};
use clap::Parser;
use pairlink_auth::{JsonFileStore, MemoryStore, PairingRedeemer, PairingStore};
use pairlink_core::{Config, StoreBackend};
use pairlink_messaging::TopicHub;
use pairlink_server::{create_router, AppState, CertificateStore, TlsMaterial};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// pairlink - redeem device pairing codes and notify the waiting party
#[derive(Parser, Debug)]
#[command(name = "pairlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Pairing-code collection file (default: <data dir>/pairlink/pairingCodes.json)
    #[arg(long, conflicts_with = "memory")]
    store: Option<PathBuf>,

    /// Keep pairing codes in memory only
    #[arg(long)]
    memory: bool,

    /// Messages buffered per topic before slow subscribers lag
    #[arg(long, default_value = "16")]
    topic_capacity: usize,

    /// Path to TLS certificate file (PEM format)
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// Serve HTTPS with a self-signed certificate kept in the data directory
    #[arg(long, conflicts_with = "cert")]
    self_signed: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("pairlink v{}", env!("CARGO_PKG_VERSION"));

    let store_backend = if args.memory {
        StoreBackend::Memory
    } else {
        StoreBackend::File(args.store.clone())
    };

    let config = Config::new()
        .with_bind(args.bind)
        .with_port(args.port)
        .with_store(store_backend)
        .with_topic_capacity(args.topic_capacity);

    let store = open_store(&config.store).await?;
    let topics = Arc::new(TopicHub::with_capacity(config.topic_capacity));
    let redeemer = Arc::new(PairingRedeemer::new(store, topics.clone()));

    let tls = load_tls(&args)?;
    let cert_fingerprint = tls.as_ref().map(|t| t.fingerprint.clone());
    if let Some(fp) = &cert_fingerprint {
        info!("Certificate fingerprint: {}", fp);
    }

    let state = Arc::new(AppState::new(redeemer, topics.clone(), cert_fingerprint));
    let router = create_router(state);
    let addr = config.socket_addr();

    let shutdown_topics = topics.clone();
    let shutdown = async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        shutdown_topics.close().await;
    };

    if let Some(tls) = tls {
        let tls_config = tls
            .rustls_config()
            .await
            .context("Failed to create TLS config")?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("Listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(router.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Listening on http://{}", addr);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
    }

    info!("Goodbye!");
    Ok(())
}

/// Open the configured pairing-code store
async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn PairingStore>> {
    let store: Arc<dyn PairingStore> = match backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store: codes are lost on exit and cannot be written externally");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::File(path) => {
            let store = match path {
                Some(path) => JsonFileStore::with_path(path.clone()).await,
                None => JsonFileStore::new().await,
            }
            .context("Failed to open pairing-code store")?;
            info!("Pairing codes read from {:?}", store.path());
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Resolve TLS material from explicit files or the self-signed store
fn load_tls(args: &Args) -> Result<Option<TlsMaterial>> {
    match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => {
            info!("Loading TLS certificate from files...");
            let material =
                TlsMaterial::from_files(cert, key).context("Failed to read TLS certificate")?;
            Ok(Some(material))
        }
        _ if args.self_signed => {
            let dir = dirs::data_dir()
                .context("Could not determine data directory")?
                .join("pairlink")
                .join("tls");
            let certs = CertificateStore::new(dir)?;

            let mut hostnames = vec!["localhost".to_string()];
            if let Some(ip) = get_local_ip() {
                hostnames.push(ip);
            }

            Ok(Some(certs.load_or_generate(&hostnames)?))
        }
        _ => Ok(None),
    }
}

/// Get the local IP address
fn get_local_ip() -> Option<String> {
    use std::net::UdpSocket;

    // Connecting a UDP socket sends nothing but selects the outbound interface
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    Some(addr.ip().to_string())
}
