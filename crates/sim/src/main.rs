use anyhow::Context;

use strata_core::SystemClock;
use strata_dungeon::GenerationConfig;
use strata_sim::{SimConfig, run};

fn main() -> anyhow::Result<()> {
    strata_observability::init();

    let generation = GenerationConfig::from_env().context("loading generation config")?;
    let sim = SimConfig::from_env().context("loading simulation config")?;
    tracing::info!(ticks = sim.ticks, tick_ms = sim.tick.as_millis() as u64, seed = sim.seed, "simulation starting");

    let summary = run(&sim, generation, SystemClock::shared(), true)?;

    let json = serde_json::to_string_pretty(&summary).context("serializing summary")?;
    println!("{json}");
    Ok(())
}
