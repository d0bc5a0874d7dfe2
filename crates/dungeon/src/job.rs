//! The spawn-dungeon-level job.
//!
//! Generation is split into phases, and every phase into small work units.
//! A `step` runs units until its [`SliceBudget`](strata_jobs::SliceBudget) is
//! exhausted, polling the cancellation token before each one. A unit never
//! does work proportional to a prototype number: chunks are derived from an
//! index and rooms are drawn one at a time. Nothing is rolled back on a
//! fault: a map created before the fault stays in the world.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use strata_core::{JobFault, SharedClock, StationId};
use strata_jobs::{CancellationToken, Job, JobState, JobStatus, StepBudget};

use crate::collaborators::{ChunkPos, EntityId, GenerationServices, MapId, RoomPlan, TilePos};
use crate::prototype::{DungeonLevelPrototype, LayoutBounds, LevelProtoId};
use crate::station::{GenerationTarget, LevelRecord};

/// Where a generation job is in its pipeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GenerationPhase {
    ResolvePrototype,
    CreateMap,
    NameMap,
    PaintBiome,
    SetupAtmosphere,
    PlanLayout,
    BuildRooms,
    AnchorEntities,
    Commit,
    Done,
}

impl GenerationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationPhase::ResolvePrototype => "resolve_prototype",
            GenerationPhase::CreateMap => "create_map",
            GenerationPhase::NameMap => "name_map",
            GenerationPhase::PaintBiome => "paint_biome",
            GenerationPhase::SetupAtmosphere => "setup_atmosphere",
            GenerationPhase::PlanLayout => "plan_layout",
            GenerationPhase::BuildRooms => "build_rooms",
            GenerationPhase::AnchorEntities => "anchor_entities",
            GenerationPhase::Commit => "commit",
            GenerationPhase::Done => "done",
        }
    }
}

impl core::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generates one dungeon level for a station.
pub struct SpawnDungeonLevelJob {
    budget: StepBudget,
    clock: SharedClock,
    services: GenerationServices,
    level: LevelProtoId,
    target: GenerationTarget,
    token: CancellationToken,
    state: JobState,
    phase: GenerationPhase,

    proto: Option<DungeonLevelPrototype>,
    layout: Option<LayoutBounds>,
    map: Option<MapId>,
    next_chunk: u64,
    rooms_to_plan: Option<u32>,
    rooms: VecDeque<RoomPlan>,
    rooms_built: usize,
    spawned: Vec<EntityId>,
    anchored: usize,
    units: u64,
}

impl SpawnDungeonLevelJob {
    pub fn new(
        budget: StepBudget,
        clock: SharedClock,
        services: GenerationServices,
        level: LevelProtoId,
        target: GenerationTarget,
        token: CancellationToken,
    ) -> Self {
        Self {
            budget,
            clock,
            services,
            level,
            target,
            token,
            state: JobState::new(),
            phase: GenerationPhase::ResolvePrototype,
            proto: None,
            layout: None,
            map: None,
            next_chunk: 0,
            rooms_to_plan: None,
            rooms: VecDeque::new(),
            rooms_built: 0,
            spawned: Vec::new(),
            anchored: 0,
            units: 0,
        }
    }

    pub fn station(&self) -> StationId {
        self.target.station
    }

    pub fn level(&self) -> &LevelProtoId {
        &self.level
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// Map created by this job, if it got that far.
    pub fn map(&self) -> Option<MapId> {
        self.map
    }

    /// Work units completed across all steps.
    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn chunks_painted(&self) -> u64 {
        self.next_chunk
    }

    fn fault_here(&self, reason: impl Into<String>) -> JobFault {
        JobFault::generation(self.phase.as_str(), reason)
    }

    fn live_map(&self) -> Result<MapId, JobFault> {
        let map = self
            .map
            .ok_or_else(|| self.fault_here("no map has been created"))?;
        if !self.services.maps.map_exists(map) {
            return Err(self.fault_here(format!("{map} no longer exists")));
        }
        Ok(map)
    }

    fn prototype(&self) -> Result<&DungeonLevelPrototype, JobFault> {
        self.proto
            .as_ref()
            .ok_or_else(|| self.fault_here("prototype not resolved"))
    }

    fn layout(&self) -> Result<LayoutBounds, JobFault> {
        self.layout
            .ok_or_else(|| self.fault_here("prototype not resolved"))
    }

    /// Perform one work unit of the current phase.
    fn advance(&mut self) -> Result<(), JobFault> {
        if self.target.data.is_detached() {
            return Err(self.fault_here(format!(
                "dungeon data of station {} is gone",
                self.target.station
            )));
        }

        match self.phase {
            GenerationPhase::ResolvePrototype => {
                let proto = self.services.prototypes.level(&self.level).ok_or_else(|| {
                    self.fault_here(format!("unknown level prototype {}", self.level))
                })?;
                let layout = proto.layout_bounds().map_err(|e| {
                    self.fault_here(format!("invalid level prototype {}: {e}", self.level))
                })?;
                self.layout = Some(layout);
                self.proto = Some(proto);
                self.phase = GenerationPhase::CreateMap;
            }
            GenerationPhase::CreateMap => {
                let map = self
                    .services
                    .maps
                    .create_map()
                    .map_err(|e| self.fault_here(e.to_string()))?;
                debug!(map = %map, level = %self.level, "dungeon map created");
                self.map = Some(map);
                self.phase = GenerationPhase::NameMap;
            }
            GenerationPhase::NameMap => {
                let map = self.live_map()?;
                let name = self.prototype()?.name.clone();
                self.services
                    .metadata
                    .set_name(map, &name)
                    .map_err(|e| self.fault_here(e.to_string()))?;
                self.phase = GenerationPhase::PaintBiome;
            }
            GenerationPhase::PaintBiome => {
                let layout = self.layout()?;
                if self.next_chunk < layout.biome_chunks {
                    let map = self.live_map()?;
                    let chunk = chunk_at(layout.biome_radius, self.next_chunk);
                    let biome = self.prototype()?.biome.clone().unwrap_or_default();
                    self.services
                        .biomes
                        .paint_chunk(map, &biome, chunk)
                        .map_err(|e| self.fault_here(e.to_string()))?;
                    self.next_chunk += 1;
                } else {
                    self.phase = GenerationPhase::SetupAtmosphere;
                }
            }
            GenerationPhase::SetupAtmosphere => {
                let map = self.live_map()?;
                if let Some(atmosphere) = self.prototype()?.atmosphere.clone() {
                    self.services
                        .atmosphere
                        .set_atmosphere(map, &atmosphere)
                        .map_err(|e| self.fault_here(e.to_string()))?;
                }
                self.phase = GenerationPhase::PlanLayout;
            }
            GenerationPhase::PlanLayout => {
                let layout = self.layout()?;
                let random = &self.services.random;
                match self.rooms_to_plan {
                    None => {
                        let count = random.range(layout.rooms.0, layout.rooms.1);
                        self.rooms_to_plan = Some(count.max(0) as u32);
                    }
                    Some(0) => {
                        debug!(level = %self.level, rooms = self.rooms.len(), "dungeon layout planned");
                        self.phase = GenerationPhase::BuildRooms;
                    }
                    Some(left) => {
                        let (min_size, max_size) = layout.room_size;
                        let width = random.range(min_size, max_size);
                        let height = random.range(min_size, max_size);
                        // bounds >= 0, so the negation cannot overflow.
                        let origin = TilePos::new(
                            random.range(-layout.bounds, layout.bounds),
                            random.range(-layout.bounds, layout.bounds),
                        );
                        let proto = self.prototype()?.rooms.room_proto.clone();
                        self.rooms.push_back(RoomPlan {
                            origin,
                            width: width.max(1) as u32,
                            height: height.max(1) as u32,
                            proto,
                        });
                        self.rooms_to_plan = Some(left - 1);
                    }
                }
            }
            GenerationPhase::BuildRooms => match self.rooms.pop_front() {
                Some(room) => {
                    let map = self.live_map()?;
                    let entities = self
                        .services
                        .rooms
                        .build_room(map, &room)
                        .map_err(|e| self.fault_here(e.to_string()))?;
                    self.spawned.extend(entities);
                    self.rooms_built += 1;
                }
                None => self.phase = GenerationPhase::AnchorEntities,
            },
            GenerationPhase::AnchorEntities => match self.spawned.get(self.anchored).copied() {
                Some(entity) => {
                    self.services
                        .anchors
                        .anchor(entity)
                        .map_err(|e| self.fault_here(e.to_string()))?;
                    self.anchored += 1;
                }
                None => self.phase = GenerationPhase::Commit,
            },
            GenerationPhase::Commit => {
                let map = self.live_map()?;
                let record = LevelRecord {
                    map,
                    level: self.level.clone(),
                    depth: 0,
                    rooms: self.rooms_built,
                    entities: std::mem::take(&mut self.spawned),
                };
                let depth = self.target.data.record_level(record).ok_or_else(|| {
                    self.fault_here(format!(
                        "dungeon data of station {} is gone",
                        self.target.station
                    ))
                })?;
                info!(
                    station = %self.target.station,
                    level = %self.level,
                    map = %map,
                    depth,
                    rooms = self.rooms_built,
                    "dungeon level generated"
                );
                self.phase = GenerationPhase::Done;
            }
            GenerationPhase::Done => {}
        }
        Ok(())
    }

    /// Enter `Faulted` and drop partial work buffers. World state already
    /// mutated stays as it is.
    fn abort(&mut self, fault: JobFault) {
        warn!(
            station = %self.target.station,
            level = %self.level,
            map = ?self.map,
            fault = %fault,
            "dungeon generation aborted"
        );
        self.rooms.clear();
        self.spawned.clear();
        self.proto = None;
        self.layout = None;
        self.rooms_to_plan = None;
        self.state.fail(fault);
    }
}

/// The `index`-th chunk of the square of side `2 * radius + 1` centred on the
/// origin, row by row.
fn chunk_at(radius: i32, index: u64) -> ChunkPos {
    let side = 2 * i64::from(radius) as u64 + 1;
    let x = (index % side) as i64 - i64::from(radius);
    let y = (index / side) as i64 - i64::from(radius);
    // Both lie in [-radius, radius].
    ChunkPos::new(x as i32, y as i32)
}

impl Job for SpawnDungeonLevelJob {
    fn step(&mut self) {
        if !self.state.begin_step() {
            return;
        }

        let mut slice = self.budget.start(self.clock.clone());
        loop {
            if self.token.is_cancelled() {
                self.abort(JobFault::cancelled(self.phase.as_str()));
                return;
            }

            if let Err(fault) = self.advance() {
                self.abort(fault);
                return;
            }
            slice.record_unit();
            self.units += 1;

            if self.phase == GenerationPhase::Done {
                self.state.finish();
                return;
            }
            if slice.exhausted() {
                debug!(
                    level = %self.level,
                    phase = %self.phase,
                    units = slice.units(),
                    "generation step yielded"
                );
                return;
            }
        }
    }

    fn status(&self) -> JobStatus {
        self.state.status()
    }

    fn fault(&self) -> Option<&JobFault> {
        self.state.fault()
    }

    fn describe(&self) -> String {
        format!(
            "spawn dungeon level {} for station {} ({})",
            self.level, self.target.station, self.phase
        )
    }
}

impl core::fmt::Debug for SpawnDungeonLevelJob {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpawnDungeonLevelJob")
            .field("level", &self.level)
            .field("station", &self.target.station)
            .field("phase", &self.phase)
            .field("status", &self.state.status())
            .field("map", &self.map)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::collaborators::MapService;
    use crate::in_memory::{InMemoryWorld, TEST_LEVEL};
    use crate::station::StationDungeonData;
    use crate::prototype::{DungeonLevelPrototype, RoomSettings};
    use strata_core::{ManualClock, SystemClock};
    use strata_jobs::CancellationSource;

    const COST: Duration = Duration::from_millis(1);

    struct Fixture {
        world: Rc<InMemoryWorld>,
        data: StationDungeonData,
        cancel: CancellationSource,
        job: SpawnDungeonLevelJob,
    }

    fn fixture(level: &str, budget: StepBudget) -> Fixture {
        let clock = ManualClock::new();
        let world = Rc::new(
            InMemoryWorld::with_default_prototypes(7).with_operation_cost(clock.clone(), COST),
        );
        let data = StationDungeonData::new();
        let cancel = CancellationSource::new();
        let job = SpawnDungeonLevelJob::new(
            budget,
            clock.shared(),
            InMemoryWorld::services(&world),
            LevelProtoId::new(level),
            GenerationTarget {
                station: StationId::new(),
                data: data.clone(),
            },
            cancel.token(),
        );
        Fixture {
            world,
            data,
            cancel,
            job,
        }
    }

    fn run_to_end(job: &mut SpawnDungeonLevelJob) -> u32 {
        let mut steps = 0;
        while !job.status().is_terminal() {
            job.step();
            steps += 1;
            assert!(steps < 10_000, "job never terminated");
        }
        steps
    }

    #[test]
    fn generates_and_commits_a_level() {
        let mut f = fixture(TEST_LEVEL, StepBudget::new(2 * COST));
        let steps = run_to_end(&mut f.job);

        assert_eq!(f.job.status(), JobStatus::Finished);
        assert!(steps > 1, "work should be spread across steps");

        let levels = f.data.levels();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].depth, 1);
        assert_eq!(Some(levels[0].map), f.job.map());
        assert!(levels[0].rooms >= 1);

        let map = levels[0].map;
        assert_eq!(f.world.map_name(map).as_deref(), Some("Test procedural level"));
        assert!(f.world.painted_chunks(map) > 0);
        assert!(f.world.has_atmosphere(map));
        for entity in &levels[0].entities {
            assert!(f.world.is_anchored(*entity));
        }
    }

    #[test]
    fn unit_cap_bounds_work_per_step() {
        let mut f = fixture(TEST_LEVEL, StepBudget::new(Duration::from_secs(1)).with_unit_cap(1));
        f.job.step();
        assert_eq!(f.job.units(), 1);
        assert_eq!(f.job.phase(), GenerationPhase::CreateMap);
        f.job.step();
        assert_eq!(f.job.units(), 2);
        assert_eq!(f.job.phase(), GenerationPhase::NameMap);
    }

    #[test]
    fn unknown_prototype_faults_without_touching_the_world() {
        let mut f = fixture("NoSuchLevel", StepBudget::default());
        f.job.step();

        assert_eq!(f.job.status(), JobStatus::Faulted);
        let fault = f.job.fault().cloned().unwrap();
        assert!(!fault.is_cancellation());
        assert!(fault.to_string().contains("NoSuchLevel"));
        assert_eq!(f.world.map_count(), 0);
    }

    #[test]
    fn cancellation_is_observed_at_the_next_checkpoint() {
        let mut f = fixture(TEST_LEVEL, StepBudget::new(Duration::from_secs(1)).with_unit_cap(2));
        f.job.step();
        f.job.step();
        assert_eq!(f.job.status(), JobStatus::Running);
        let map = f.job.map().unwrap();

        f.cancel.cancel();
        let before = f.job.units();
        f.job.step();

        assert_eq!(f.job.status(), JobStatus::Faulted);
        assert!(f.job.fault().unwrap().is_cancellation());
        assert_eq!(f.job.units(), before);
        // No rollback.
        assert!(f.world.map_exists(map));
        assert_eq!(f.data.level_count(), 0);
    }

    #[test]
    fn detached_station_data_is_a_generation_fault() {
        let mut f = fixture(TEST_LEVEL, StepBudget::new(Duration::from_secs(1)).with_unit_cap(2));
        f.job.step();
        f.data.detach();
        f.job.step();

        assert_eq!(f.job.status(), JobStatus::Faulted);
        let fault = f.job.fault().unwrap();
        assert!(!fault.is_cancellation());
        assert!(fault.to_string().contains("is gone"));
    }

    #[test]
    fn room_build_failure_faults_in_build_phase() {
        let mut f = fixture(TEST_LEVEL, StepBudget::default());
        f.world.fail_room_builds("rubble");
        run_to_end(&mut f.job);

        assert_eq!(f.job.status(), JobStatus::Faulted);
        assert_eq!(
            f.job.fault().cloned(),
            Some(JobFault::generation(
                "build_rooms",
                "build_room failed: rubble"
            ))
        );
        assert_eq!(f.data.level_count(), 0);
    }

    #[test]
    fn stepping_a_terminal_job_is_a_no_op() {
        let mut f = fixture(TEST_LEVEL, StepBudget::default());
        run_to_end(&mut f.job);
        let units = f.job.units();
        let maps = f.world.map_count();

        f.job.step();
        assert_eq!(f.job.status(), JobStatus::Finished);
        assert_eq!(f.job.units(), units);
        assert_eq!(f.world.map_count(), maps);
    }

    #[test]
    fn chunks_are_walked_row_by_row() {
        assert_eq!(chunk_at(1, 0), ChunkPos::new(-1, -1));
        assert_eq!(chunk_at(1, 2), ChunkPos::new(1, -1));
        assert_eq!(chunk_at(1, 4), ChunkPos::new(0, 0));
        assert_eq!(chunk_at(1, 8), ChunkPos::new(1, 1));
        assert_eq!(chunk_at(0, 0), ChunkPos::new(0, 0));
    }

    #[test]
    fn huge_biome_is_painted_one_chunk_per_unit() {
        let mut f = fixture("Vast", StepBudget::new(Duration::from_secs(1)).with_unit_cap(1));
        f.world
            .register_prototype(DungeonLevelPrototype::new("Vast", "Vast").with_biome("Caves", 2000));

        // resolve, create, name, then two chunks.
        for _ in 0..5 {
            f.job.step();
        }
        assert_eq!(f.job.phase(), GenerationPhase::PaintBiome);
        assert_eq!(f.job.units(), 5);
        assert_eq!(f.job.chunks_painted(), 2);
        assert_eq!(f.world.painted_chunks(f.job.map().unwrap()), 2);
    }

    #[test]
    fn huge_biome_steps_stay_near_their_budget() {
        let world = Rc::new(InMemoryWorld::new(1));
        world.register_prototype(DungeonLevelPrototype::new("Vast", "Vast").with_biome("Caves", 2000));
        let mut job = SpawnDungeonLevelJob::new(
            StepBudget::new(Duration::from_millis(2)),
            SystemClock::shared(),
            InMemoryWorld::services(&world),
            LevelProtoId::new("Vast"),
            GenerationTarget {
                station: StationId::new(),
                data: StationDungeonData::new(),
            },
            CancellationToken::none(),
        );

        for _ in 0..3 {
            let started = std::time::Instant::now();
            job.step();
            assert!(
                started.elapsed() < Duration::from_millis(250),
                "step took {:?}",
                started.elapsed()
            );
        }
        assert_eq!(job.status(), JobStatus::Running);
    }

    #[test]
    fn room_plans_are_drawn_one_per_unit() {
        let mut f = fixture("Rooms", StepBudget::new(Duration::from_secs(1)).with_unit_cap(1));
        f.world.register_prototype(DungeonLevelPrototype::new("Rooms", "Rooms").with_rooms(
            RoomSettings {
                min_rooms: 4,
                max_rooms: 4,
                ..RoomSettings::default()
            },
        ));

        // resolve, create, name, leave paint, atmosphere, draw count.
        for _ in 0..6 {
            f.job.step();
        }
        assert_eq!(f.job.phase(), GenerationPhase::PlanLayout);
        f.job.step();
        assert_eq!(f.job.rooms.len(), 1);
        for _ in 0..3 {
            f.job.step();
        }
        assert_eq!(f.job.rooms.len(), 4);
        f.job.step();
        assert_eq!(f.job.phase(), GenerationPhase::BuildRooms);
    }

    fn assert_invalid_prototype(proto: DungeonLevelPrototype) {
        let level = proto.id.clone();
        let mut f = fixture(level.as_str(), StepBudget::default());
        f.world.register_prototype(proto);
        run_to_end(&mut f.job);

        assert_eq!(f.job.status(), JobStatus::Faulted);
        let fault = f.job.fault().cloned().unwrap();
        assert!(matches!(&fault, JobFault::Generation { phase, .. } if phase == "resolve_prototype"));
        assert!(fault.to_string().contains("invalid level prototype"));
        assert_eq!(f.world.map_count(), 0);
    }

    #[test]
    fn negative_room_bounds_fault_instead_of_panicking() {
        assert_invalid_prototype(DungeonLevelPrototype::new("Bad", "Bad").with_rooms(RoomSettings {
            bounds: i32::MIN,
            ..RoomSettings::default()
        }));
    }

    #[test]
    fn oversized_prototype_numbers_fault() {
        assert_invalid_prototype(DungeonLevelPrototype::new("Wide", "Wide").with_biome("Caves", u32::MAX));
        assert_invalid_prototype(DungeonLevelPrototype::new("Many", "Many").with_rooms(RoomSettings {
            max_rooms: u32::MAX,
            ..RoomSettings::default()
        }));
        assert_invalid_prototype(DungeonLevelPrototype::new("Inverted", "Inverted").with_rooms(
            RoomSettings {
                min_rooms: 6,
                max_rooms: 2,
                ..RoomSettings::default()
            },
        ));
    }

    #[test]
    fn vanished_map_is_a_generation_fault() {
        let mut f = fixture(TEST_LEVEL, StepBudget::new(Duration::from_secs(1)).with_unit_cap(2));
        f.job.step();
        let map = f.job.map().unwrap();
        assert!(f.world.delete_map(map));

        f.job.step();
        assert_eq!(f.job.status(), JobStatus::Faulted);
        let fault = f.job.fault().cloned().unwrap();
        assert!(matches!(&fault, JobFault::Generation { phase, .. } if phase == "name_map"));
        assert!(fault.to_string().contains("no longer exists"));
        assert_eq!(f.data.level_count(), 0);
    }
}
