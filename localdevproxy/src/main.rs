//! localdevproxy is a CLI tool (and container image) for proxying requests
//! to the platform's HTTP services during local development, standing in for
//! the production load balancing.
//!
//! Requests shaped like production URLs (`/v1/{service}/...`) are rewritten
//! onto locally running services so developers can run applications
//! together, or onto Kubernetes service DNS records when the proxy detects
//! it is running inside a cluster (tilt-style local dev).

use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use proxy::config::MetricsConfig;
use proxy::{Config, Mode};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "localdevproxy", version)]
struct Cli {
    /// HTTP listen address, overriding the config file
    #[arg(long = "http.addr")]
    http_addr: Option<SocketAddr>,

    /// Path to a YAML routing config; the built-in local routing table is
    /// used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every rewritten request with its original URL
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            process::exit(1);
        }
    };
    if let Some(addr) = cli.http_addr {
        config.listener.host = addr.ip().to_string();
        config.listener.port = addr.port();
    }
    config.debug |= cli.debug;

    if let Some(metrics_config) = &config.metrics {
        install_statsd(metrics_config);
    }

    let mode = Mode::detect();
    tracing::info!(mode = mode.as_str(), "starting localdevproxy");

    if let Err(err) = proxy::run(config, mode).await {
        tracing::error!(error = %err, "proxy exited");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, proxy::config::ConfigError> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::default_local(),
    }
}

/// Metrics are best-effort; a missing StatsD sink never stops the proxy.
fn install_statsd(config: &MetricsConfig) {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .with_queue_size(5000)
        .with_buffer_size(1024)
        .build(Some("localdevproxy"));

    match recorder {
        Ok(recorder) => {
            if let Err(err) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %err, "failed to install metrics recorder");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to set up statsd metrics"),
    }
}
