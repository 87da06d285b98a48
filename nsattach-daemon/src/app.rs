//! Daemon assembly -- config resolution, runtime connection and the watch loop.
//!
//! # Startup Order
//!
//! 1. Resolve configuration (CLI > environment > TOML file > defaults)
//! 2. Install the metrics recorder (if enabled)
//! 3. Connect to the container runtime (fatal on failure)
//! 4. Run the watcher until a fatal stream error or a shutdown signal

use std::sync::Arc;

use anyhow::Result;

use nsattach_core::config::NsattachConfig;
use nsattach_watcher::{BollardRuntime, IpCommandAttacher, NetnsWatcherBuilder};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Build the effective configuration from the CLI arguments.
///
/// The TOML file is optional; environment overrides are applied on top of
/// it, then CLI flags, then the result is validated.
pub async fn resolve_config(cli: &DaemonCli) -> Result<NsattachConfig> {
    let mut config = match &cli.config {
        Some(path) => NsattachConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => NsattachConfig::default(),
    };

    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    Ok(config)
}

/// Apply CLI flags on top of the loaded configuration.
pub fn apply_cli_overrides(config: &mut NsattachConfig, cli: &DaemonCli) {
    if let Some(image) = &cli.image {
        config.watcher.image.clone_from(image);
    }
    if let Some(interface) = &cli.interface {
        config.watcher.interface.clone_from(interface);
    }
    if let Some(socket) = &cli.socket {
        config.watcher.socket.clone_from(socket);
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
}

/// Render the validated configuration for `--validate`.
pub fn render_config(config: &NsattachConfig) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("failed to render config: {}", e))
}

/// Connect to the runtime and watch until a fatal error or shutdown signal.
///
/// Returns `Ok(())` only on a shutdown signal.
pub async fn run(config: NsattachConfig) -> Result<()> {
    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    tracing::info!(
        image = config.watcher.image.as_str(),
        interface = config.watcher.interface.as_str(),
        socket = config.watcher.socket.as_str(),
        "nsattach-daemon starting"
    );

    let runtime = BollardRuntime::connect(config.watcher.socket_path())
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to connect to container runtime at {}: {}",
                config.watcher.socket,
                e
            )
        })?;
    let attacher = IpCommandAttacher::from_config(&config.watcher);

    let mut watcher = NetnsWatcherBuilder::new()
        .config(config.watcher)
        .runtime(Arc::new(runtime))
        .attacher(Arc::new(attacher))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build watcher: {}", e))?;

    tokio::select! {
        result = watcher.run() => {
            result.map_err(|e| anyhow::anyhow!("watcher stopped: {}", e))
        }
        signal = wait_for_shutdown_signal() => {
            let signal = signal?;
            tracing::info!(signal = signal, "shutdown signal received");
            Ok(())
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
