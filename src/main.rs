//! Tick market - command-line runner.
//!
//! Streams one JSON `TickResult` per line to stdout. Logs go to stderr so
//! the stream stays machine-readable.
//!
//! ```text
//! tick-market --ticks 1000                  # demo market, full stream
//! tick-market --config market.json --summary
//! tick-market --runs 8 --seed 42            # 8 seeds in parallel, one line each
//! ```

mod config;

use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use simulation::{AccountStats, MarketConfig, MarketEngine, TickResult};
use tracing::info;

use crate::config::Args;

/// Final state of one run.
#[derive(Debug, Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u64,
    price: f64,
    volume: u64,
    accounts: BTreeMap<String, AccountStats>,
}

impl RunSummary {
    fn new(seed: u64, engine: &MarketEngine, last: Option<TickResult>) -> Self {
        let volume = engine
            .state()
            .volume_history
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(*v));
        Self {
            seed,
            ticks: engine.current_tick(),
            price: engine.price().to_float(),
            volume,
            accounts: last.map(|r| r.accounts).unwrap_or_default(),
        }
    }
}

/// Run one market to completion, streaming ticks to `out` unless only a
/// summary is wanted.
fn run_market(config: MarketConfig, ticks: u64, mut out: Option<&mut dyn Write>) -> anyhow::Result<RunSummary> {
    let seed = config.seed;
    let mut engine = MarketEngine::new(config).with_context(|| format!("building market for seed {seed}"))?;

    let mut last = None;
    for _ in 0..ticks {
        let result = engine.tick();
        if let Some(out) = out.as_deref_mut() {
            serde_json::to_writer(&mut *out, &result)?;
            out.write_all(b"\n")?;
        }
        last = Some(result);
    }
    engine.end_episode();

    Ok(RunSummary::new(seed, &engine, last))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let base = args.market_config()?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    info!(
        ticks = args.ticks,
        runs = args.runs,
        seed = base.seed,
        traders = base.traders.len(),
        "starting"
    );

    if args.runs > 1 {
        let summaries = (0..args.runs)
            .into_par_iter()
            .map(|i| {
                let config = base.clone().with_seed(base.seed.wrapping_add(i));
                run_market(config, args.ticks, None)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        for summary in &summaries {
            serde_json::to_writer(&mut out, summary)?;
            out.write_all(b"\n")?;
        }
    } else if args.summary_only() {
        let summary = run_market(base, args.ticks, None)?;
        serde_json::to_writer(&mut out, &summary)?;
        out.write_all(b"\n")?;
    } else {
        run_market(base, args.ticks, Some(&mut out as &mut dyn Write))?;
    }

    out.flush().context("flushing stdout")?;
    info!("done");
    Ok(())
}
