//! EmberKV Server Binary
//!
//! Serves an engine over HTTP.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use emberkv::network::HttpServer;
use emberkv::{Config, DurabilityMode, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV Server
#[derive(Parser, Debug)]
#[command(name = "emberkv-server")]
#[command(about = "Embedded key-value store served over HTTP")]
#[command(version)]
struct Args {
    /// WAL file
    #[arg(short = 'f', long, default_value = "./emberkv.log")]
    log_path: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// TTL applied to every write, in seconds
    #[arg(short, long, default_value = "600")]
    ttl_secs: u64,

    /// What to do when a WAL append fails
    #[arg(short, long, value_enum, default_value = "relaxed")]
    durability: Durability,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Durability {
    Relaxed,
    Strict,
}

impl From<Durability> for DurabilityMode {
    fn from(d: Durability) -> Self {
        match d {
            Durability::Relaxed => DurabilityMode::Relaxed,
            Durability::Strict => DurabilityMode::Strict,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emberkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("EmberKV Server v{}", emberkv::VERSION);
    tracing::info!("WAL file: {}", args.log_path);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .log_path(&args.log_path)
        .listen_addr(&args.listen)
        .ttl(Duration::from_secs(args.ttl_secs))
        .durability(args.durability.into())
        .build();

    // Open engine and replay the WAL
    let engine = match Engine::start(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized with {} keys", engine.key_count());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    };

    let server = HttpServer::new(config.listen_addr.clone(), Arc::clone(&engine));
    if let Err(e) = server.run(shutdown).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = engine.sync() {
        tracing::error!("Failed to sync WAL on shutdown: {}", e);
    }

    tracing::info!("Server stopped");
}
