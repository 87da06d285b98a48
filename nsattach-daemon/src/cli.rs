//! CLI argument definitions for nsattach-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Moves a host network interface into the network namespace of
/// containers started from a given image.
///
/// Watches the Podman (or Docker) event stream and runs
/// `ip link set <interface> netns <pid>` for every matching container start.
#[derive(Parser, Debug, Default)]
#[command(name = "nsattach-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to an nsattach.toml configuration file.
    ///
    /// Optional: the daemon can run from environment variables alone.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target image name without tag (overrides FMA_IMAGE).
    #[arg(long)]
    pub image: Option<String>,

    /// Host interface to move into matching containers (overrides FMA_NETIF).
    #[arg(long)]
    pub interface: Option<String>,

    /// Container runtime socket (overrides PODMAN_SOCKET).
    #[arg(long)]
    pub socket: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration, print it and exit without watching.
    #[arg(long)]
    pub validate: bool,
}
