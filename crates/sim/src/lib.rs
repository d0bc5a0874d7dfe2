//! Demo host: drives the dungeon generation subsystem from a tick loop
//! against in-memory collaborators.

use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use serde::Serialize;
use tracing::info;

use strata_core::SharedClock;
use strata_dungeon::in_memory::{InMemoryStations, InMemoryWorld};
use strata_dungeon::{DungeonGenerationHandler, GenerationConfig, LevelRecord, RequestOutcome};
use strata_jobs::QueueStats;

pub const ENV_TICKS: &str = "STRATA_TICKS";
pub const ENV_TICK_MS: &str = "STRATA_TICK_MS";
pub const ENV_SEED: &str = "STRATA_SEED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimConfig {
    /// Upper bound on ticks; the loop also stops once generation is idle.
    pub ticks: u32,
    /// Target frame time.
    pub tick: Duration,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 600,
            tick: Duration::from_millis(16),
            seed: 1,
        }
    }
}

impl SimConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_TICKS) {
            config.ticks = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TICKS}={raw:?}"))?;
        }
        if let Some(raw) = lookup(ENV_TICK_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TICK_MS}={raw:?}"))?;
            if ms == 0 {
                bail!("{ENV_TICK_MS} must be at least 1");
            }
            config.tick = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_SEED) {
            config.seed = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SEED}={raw:?}"))?;
        }
        Ok(config)
    }
}

/// What a simulation run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimSummary {
    pub ticks_run: u32,
    pub requests: Vec<RequestOutcome>,
    pub levels: Vec<LevelRecord>,
    pub maps_in_world: usize,
    pub jobs_reaped: usize,
    pub jobs_faulted: usize,
    pub stats: QueueStats,
}

/// Run the demo scenario: one station with dungeon data and one without,
/// both initialised, then an entrance activation, then ticks until idle.
///
/// With `pace` set each tick sleeps for the remainder of the frame and the
/// measured frame time is passed to the handler; otherwise the nominal tick
/// length is used.
pub fn run(
    sim: &SimConfig,
    generation: GenerationConfig,
    clock: SharedClock,
    pace: bool,
) -> anyhow::Result<SimSummary> {
    let world = Rc::new(InMemoryWorld::with_default_prototypes(sim.seed));
    let stations = Rc::new(InMemoryStations::new());
    let (station, data) = stations.add_station();
    let bare = stations.add_station_without_data();

    let mut handler = DungeonGenerationHandler::new(
        generation,
        clock,
        InMemoryWorld::services(&world),
        stations.clone(),
    );

    let mut requests = Vec::new();
    for id in [station, bare] {
        requests.push(
            handler
                .on_station_post_init(id)
                .context("station post-init trigger")?,
        );
    }
    requests.push(
        handler
            .on_entrance_activated()
            .context("entrance trigger")?,
    );

    let mut ticks_run = 0;
    let mut jobs_reaped = 0;
    let mut jobs_faulted = 0;
    let mut last = Instant::now();
    while ticks_run < sim.ticks && !handler.is_idle() {
        let frame_time = if pace {
            let spent = last.elapsed();
            if spent < sim.tick {
                std::thread::sleep(sim.tick - spent);
            }
            let frame = last.elapsed();
            last = Instant::now();
            frame
        } else {
            sim.tick
        };

        let report = handler.update(frame_time);
        jobs_reaped += report.reaped.len();
        jobs_faulted += report.reaped.iter().filter(|r| r.fault.is_some()).count();
        ticks_run += 1;
    }

    info!(
        ticks = ticks_run,
        levels = data.level_count(),
        outstanding = handler.outstanding(),
        "simulation finished"
    );

    Ok(SimSummary {
        ticks_run,
        requests,
        levels: data.levels(),
        maps_in_world: world.map_count(),
        jobs_reaped,
        jobs_faulted,
        stats: handler.scheduler().stats().clone(),
    })
}
