//! Command-line arguments for the runner.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use simulation::MarketConfig;

/// Tick market - discrete-tick market simulation
#[derive(Parser, Debug)]
#[command(name = "tick-market")]
#[command(about = "Runs a discrete-tick market and prints one JSON line per tick")]
#[command(version)]
pub struct Args {
    /// Market configuration (JSON). Uses the built-in demo market when absent.
    #[arg(long, env = "TICK_MARKET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ticks per run
    #[arg(long, env = "TICK_MARKET_TICKS", default_value_t = 500)]
    pub ticks: u64,

    /// Override the configured seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Independent runs on consecutive seeds, executed in parallel
    #[arg(long, default_value_t = 1)]
    pub runs: u64,

    /// Print only final per-account stats
    #[arg(long)]
    pub summary: bool,
}

impl Args {
    /// Load the market this invocation describes.
    pub fn market_config(&self) -> anyhow::Result<MarketConfig> {
        let config = match &self.config {
            Some(path) => MarketConfig::from_path(path)
                .with_context(|| format!("loading market config from {}", path.display()))?,
            None => MarketConfig::demo(),
        };
        Ok(match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        })
    }

    /// Parallel runs always report summaries.
    pub fn summary_only(&self) -> bool {
        self.summary || self.runs > 1
    }
}
