use anyhow::Result;
use clap::Parser;

use nsattach_daemon::cli::DaemonCli;
use nsattach_daemon::{app, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = app::resolve_config(&cli).await?;

    if cli.validate {
        print!("{}", app::render_config(&config)?);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    if let Err(e) = app::run(config).await {
        tracing::error!(error = %e, "nsattach-daemon stopped");
        return Err(e);
    }

    tracing::info!("nsattach-daemon shut down");
    Ok(())
}
