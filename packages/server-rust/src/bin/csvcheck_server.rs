//! csvcheck server binary.
//!
//! Parses flags (with environment fallbacks), installs logging and the
//! optional Prometheus listener, then serves until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use csvcheck_core::{claims, ReadProfile, RowIndexing, Schema, DEFAULT_CHUNK_BYTES};
use csvcheck_server::{NetworkConfig, NetworkModule, ValidationConfig, ValidationOrchestrator};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "csvcheck-server", about = "Validate large CSV files over HTTP")]
struct Args {
    #[arg(long, env = "CSVCHECK_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "CSVCHECK_PORT", default_value_t = csvcheck_server::network::DEFAULT_PORT)]
    port: u16,

    /// Approximate raw bytes per chunk.
    #[arg(long, env = "CSVCHECK_CHUNK_BYTES", default_value_t = DEFAULT_CHUNK_BYTES)]
    chunk_bytes: usize,

    /// Concurrent chunk validations. Defaults to the number of CPUs.
    #[arg(long, env = "CSVCHECK_WORKERS")]
    workers: Option<usize>,

    /// JSON schema file. The built-in claims schema is used when absent.
    #[arg(long, env = "CSVCHECK_SCHEMA")]
    schema: Option<PathBuf>,

    /// Address for the Prometheus scrape endpoint.
    #[arg(long, env = "CSVCHECK_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "CSVCHECK_LOG_JSON")]
    log_json: bool,

    /// Report row indices relative to each chunk instead of the file.
    #[arg(long, env = "CSVCHECK_CHUNK_LOCAL_INDEX")]
    chunk_local_index: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_schema(path: Option<&PathBuf>) -> anyhow::Result<(Schema, ReadProfile)> {
    match path {
        Some(path) => {
            let schema = Schema::load(path)?;
            let profile = ReadProfile::from_schema(&schema);
            info!(path = %path.display(), columns = schema.len(), "loaded schema");
            Ok((schema, profile))
        }
        None => {
            let schema = claims::claims_schema()?;
            let profile = claims::claims_profile(&schema);
            info!(columns = schema.len(), "using built-in claims schema");
            Ok((schema, profile))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let (schema, profile) = load_schema(args.schema.as_ref())?;

    let defaults = ValidationConfig::default();
    let validation = ValidationConfig {
        chunk_bytes: args.chunk_bytes,
        workers: args.workers.unwrap_or(defaults.workers),
        row_indexing: if args.chunk_local_index {
            RowIndexing::ChunkLocal
        } else {
            RowIndexing::Global
        },
        ..defaults
    };
    info!(
        chunk_bytes = validation.chunk_bytes,
        workers = validation.workers,
        "validation pipeline configured"
    );
    let orchestrator = ValidationOrchestrator::new(Arc::new(schema), Arc::new(profile), validation);

    let network = NetworkConfig {
        host: args.host,
        port: args.port,
        ..NetworkConfig::default()
    };
    let mut module = NetworkModule::new(network, Arc::new(orchestrator));
    module.start().await?;
    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
