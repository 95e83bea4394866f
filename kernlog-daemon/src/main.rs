use anyhow::Result;
use clap::Parser;

use kernlog_core::config::KernlogConfig;
use kernlog_daemon::cli::DaemonCli;
use kernlog_daemon::orchestrator::{self, Orchestrator};
use kernlog_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = KernlogConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;

    // CLI flags take precedence over the file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        let rejected = orchestrator::validate(&config).await?;
        if rejected > 0 {
            tracing::warn!(rejected, "legacy directives were rejected");
        }
        tracing::info!(config = %cli.config.display(), "configuration is valid");
        return Ok(());
    }

    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "kernlog-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await
}
