//! Relaygate CLI - operator tool for the governance relay.
//!
//! Encodes and decodes command batches, reviews batches against the selector
//! allow-list and administers mediators, policies and role transitions in a
//! local state snapshot.

pub mod commands;
pub mod config;
pub mod metrics;
pub mod output;
pub mod telemetry;

use clap::Parser;
use tracing::{debug, info};

use crate::commands::{Cli, Commands, Context};
use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = if cli.config.exists() {
        RelayConfig::from_file(&cli.config)?
    } else {
        RelayConfig::default()
    };

    // Override with CLI args
    if let Some(state) = cli.state {
        config.state_path = state;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    // Init writes the file it would otherwise read
    if !matches!(cli.command, Commands::Init { .. }) {
        config.validate()?;
    }

    telemetry::init_from_config(&config.logging)?;
    debug!(config = %cli.config.display(), home_chain_id = config.home_chain_id, "Configuration loaded");

    let ctx = Context {
        caller: cli.caller.unwrap_or(config.admin),
        metrics: RelayMetrics::new()?,
        config_path: cli.config,
        config,
    };

    commands::execute(cli.command, &ctx)?;

    if ctx.config.metrics.enabled {
        let text = ctx.metrics.export()?;
        match &ctx.config.metrics.output {
            Some(path) => {
                std::fs::write(path, text)?;
                info!(path = %path.display(), "Metrics written");
            }
            None => println!("{}", text),
        }
    }
    Ok(())
}
