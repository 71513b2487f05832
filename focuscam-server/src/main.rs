// focuscam relay server
// Streams camera frames over WebSocket, marks the ones containing the target

use anyhow::Context;
use clap::Parser;
use focuscam_core::RelayConfig;
use focuscam_server::{build_detector, RelayServer};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "focuscam-server", version, about = "Real-time camera frame relay with object detection")]
struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// YOLOv8 ONNX model
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Detection worker pool size
    #[arg(short, long)]
    workers: Option<usize>,

    /// Class whose presence marks a frame
    #[arg(long)]
    target: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };
        config
            .apply_env()
            .context("invalid FOCUSCAM_* environment variable")?;

        if let Some(host) = &self.host {
            config.network.bind_address = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(model) = &self.model {
            config.detection.model_path = Some(model.clone());
        }
        if let Some(workers) = self.workers {
            config.dispatcher.workers = workers;
        }
        if let Some(target) = &self.target {
            config.detection.target_label = target.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(config: &RelayConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(&config);

    info!("🚀 Starting focuscam relay...");
    let detector = build_detector(&config).context("failed to initialise detector")?;
    info!(
        "🎯 Target class '{}' (min confidence {})",
        config.detection.target_label, config.detection.min_confidence
    );

    let server = RelayServer::new(config, detector);
    let listener = server.bind().await?;
    server.serve(listener, wait_for_shutdown()).await?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "focuscam-server",
            "--port",
            "9100",
            "--workers",
            "3",
            "--target",
            "cup",
            "--json-logs",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.dispatcher.workers, 3);
        assert_eq!(config.detection.target_label, "cup");
        assert!(config.logging.json);
    }

    #[test]
    fn test_cli_rejects_invalid_workers() {
        let cli = Cli::parse_from(["focuscam-server", "--workers", "0"]);
        assert!(cli.load_config().is_err());
    }
}
