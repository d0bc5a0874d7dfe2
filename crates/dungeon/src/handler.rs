//! Generation request handler.
//!
//! Turns "generate a dungeon level" into a registered, enqueued
//! [`SpawnDungeonLevelJob`]. Target resolution is best-effort: with no usable
//! station the request is skipped, which is not an error.

use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use strata_core::{JobId, SchedulerError, SchedulerResult, SharedClock, StationId};
use strata_jobs::{CancellationSource, JobScheduler, TickReport};

use crate::collaborators::GenerationServices;
use crate::config::GenerationConfig;
use crate::job::SpawnDungeonLevelJob;
use crate::prototype::LevelProtoId;
use crate::station::{GenerationTarget, TargetResolver};

/// What `request` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RequestOutcome {
    Submitted { job: JobId, station: StationId },
    /// An equivalent job is still in flight.
    Duplicate { job: JobId, station: StationId },
    Skipped { reason: String },
}

impl RequestOutcome {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            RequestOutcome::Submitted { job, .. } => Some(*job),
            RequestOutcome::Duplicate { job, .. } => Some(*job),
            RequestOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, RequestOutcome::Submitted { .. })
    }
}

pub struct DungeonGenerationHandler {
    config: GenerationConfig,
    clock: SharedClock,
    services: GenerationServices,
    resolver: Rc<dyn TargetResolver>,
    scheduler: JobScheduler<SpawnDungeonLevelJob>,
}

impl DungeonGenerationHandler {
    pub fn new(
        config: GenerationConfig,
        clock: SharedClock,
        services: GenerationServices,
        resolver: Rc<dyn TargetResolver>,
    ) -> Self {
        let scheduler = JobScheduler::new("dungeon", clock.clone(), config.queue_budget);
        Self {
            config,
            clock,
            services,
            resolver,
            scheduler,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &JobScheduler<SpawnDungeonLevelJob> {
        &self.scheduler
    }

    /// The first known station, provided it carries dungeon data.
    fn resolve_target(&self) -> SchedulerResult<GenerationTarget> {
        let station = self
            .resolver
            .stations()
            .into_iter()
            .next()
            .ok_or_else(|| SchedulerError::resolution("no station exists"))?;
        self.target_for(station)
    }

    fn target_for(&self, station: StationId) -> SchedulerResult<GenerationTarget> {
        let data = self.resolver.dungeon_data(station).ok_or_else(|| {
            SchedulerError::resolution(format!("station {station} has no dungeon data"))
        })?;
        Ok(GenerationTarget { station, data })
    }

    /// Request a level for the first known station.
    ///
    /// Resolution failures come back as `Ok(Skipped)`. `Err` is reserved for
    /// scheduler misuse.
    pub fn request(&mut self, level: LevelProtoId) -> SchedulerResult<RequestOutcome> {
        match self.resolve_target() {
            Ok(target) => self.submit(level, target),
            Err(SchedulerError::ResolutionFailure(reason)) => {
                warn!(level = %level, reason = %reason, "dungeon request skipped");
                Ok(RequestOutcome::Skipped { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Request a level for a specific station.
    pub fn request_for(
        &mut self,
        station: StationId,
        level: LevelProtoId,
    ) -> SchedulerResult<RequestOutcome> {
        match self.target_for(station) {
            Ok(target) => self.submit(level, target),
            Err(SchedulerError::ResolutionFailure(reason)) => {
                warn!(level = %level, reason = %reason, "dungeon request skipped");
                Ok(RequestOutcome::Skipped { reason })
            }
            Err(e) => Err(e),
        }
    }

    fn submit(
        &mut self,
        level: LevelProtoId,
        target: GenerationTarget,
    ) -> SchedulerResult<RequestOutcome> {
        let station = target.station;

        if self.config.dedupe_requests {
            let existing = self
                .scheduler
                .registry()
                .find_outstanding(|job| job.station() == station && *job.level() == level);
            if let Some(job) = existing {
                info!(station = %station, level = %level, job_id = %job, "duplicate dungeon request");
                return Ok(RequestOutcome::Duplicate { job, station });
            }
        }

        let cancel = CancellationSource::new();
        let job = SpawnDungeonLevelJob::new(
            self.config.step_budget,
            self.clock.clone(),
            self.services.clone(),
            level,
            target,
            cancel.token(),
        );
        let handle = self.scheduler.submit(job, cancel)?;
        Ok(RequestOutcome::Submitted {
            job: handle.id(),
            station,
        })
    }

    /// Station finished initialising. Only stations carrying dungeon data get
    /// a level.
    pub fn on_station_post_init(&mut self, station: StationId) -> SchedulerResult<RequestOutcome> {
        let level = self.config.default_level.clone();
        self.request_for(station, level)
    }

    /// A dungeon entrance was used.
    pub fn on_entrance_activated(&mut self) -> SchedulerResult<RequestOutcome> {
        let level = self.config.default_level.clone();
        self.request(level)
    }

    /// Cancel every job targeting `station`. Takes effect at each job's next
    /// checkpoint.
    pub fn on_station_removed(&mut self, station: StationId) -> usize {
        let n = self.scheduler.cancel_where(|job| job.station() == station);
        if n > 0 {
            info!(station = %station, cancelled = n, "station removed, generation cancelled");
        }
        n
    }

    /// One host tick. `frame_time` is the real time since the previous tick.
    pub fn update(&mut self, frame_time: Duration) -> TickReport {
        let budget = self.config.tick_budget(frame_time);
        self.scheduler.tick_with_budget(budget)
    }

    pub fn outstanding(&self) -> usize {
        self.scheduler.outstanding()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }
}

impl core::fmt::Debug for DungeonGenerationHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DungeonGenerationHandler")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryStations, InMemoryWorld};
    use strata_core::ManualClock;

    fn handler(config: GenerationConfig) -> (DungeonGenerationHandler, Rc<InMemoryStations>) {
        let clock = ManualClock::new();
        let world = Rc::new(InMemoryWorld::with_default_prototypes(3));
        let stations = Rc::new(InMemoryStations::new());
        let handler = DungeonGenerationHandler::new(
            config,
            clock.shared(),
            InMemoryWorld::services(&world),
            stations.clone(),
        );
        (handler, stations)
    }

    #[test]
    fn request_without_station_is_skipped() {
        let (mut h, _) = handler(GenerationConfig::default());
        let outcome = h.request(LevelProtoId::new("TestProceduralLevel")).unwrap();
        assert!(matches!(outcome, RequestOutcome::Skipped { .. }));
        assert_eq!(h.outstanding(), 0);
        assert!(h.scheduler().queue().is_empty());
    }

    #[test]
    fn only_the_first_station_is_considered() {
        let (mut h, stations) = handler(GenerationConfig::default());
        stations.add_station_without_data();
        stations.add_station();

        let outcome = h.on_entrance_activated().unwrap();
        assert!(matches!(outcome, RequestOutcome::Skipped { ref reason } if reason.contains("no dungeon data")));
        assert!(h.is_idle());
    }

    #[test]
    fn duplicate_requests_are_collapsed_when_enabled() {
        let (mut h, stations) = handler(GenerationConfig::default());
        let (station, _) = stations.add_station();

        let first = h.on_station_post_init(station).unwrap();
        let second = h.on_entrance_activated().unwrap();
        assert!(first.is_submitted());
        assert_eq!(
            second,
            RequestOutcome::Duplicate {
                job: first.job_id().unwrap(),
                station
            }
        );
        assert_eq!(h.outstanding(), 1);
    }

    #[test]
    fn duplicates_are_allowed_when_disabled() {
        let config = GenerationConfig {
            dedupe_requests: false,
            ..GenerationConfig::default()
        };
        let (mut h, stations) = handler(config);
        stations.add_station();

        assert!(h.on_entrance_activated().unwrap().is_submitted());
        assert!(h.on_entrance_activated().unwrap().is_submitted());
        assert_eq!(h.outstanding(), 2);
        assert_eq!(h.scheduler().queue().len(), 2);
    }

    #[test]
    fn outcome_serializes_with_a_tag() {
        let json = serde_json::to_value(RequestOutcome::Skipped {
            reason: "none".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "none");
    }
}
