//! In-memory collaborators for dev/tests and the demo host.
//!
//! Deliberately trivial: maps are records in a `BTreeMap`, painting a chunk
//! appends to a list, building a room spawns a handful of entity ids. An
//! optional [`ManualClock`] cost is charged per mutation so time budgets can
//! be exercised deterministically.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_core::{ManualClock, StationId};

use crate::collaborators::{
    AnchorService, AtmosphereService, BiomePainter, ChunkPos, CollaboratorError,
    CollaboratorResult, EntityId, GenerationServices, MapId, MapService, MetadataService,
    PrototypeCatalog, RandomSource, RoomBuilder, RoomPlan,
};
use crate::prototype::{
    AtmosphereSpec, DEFAULT_LEVEL, DungeonLevelPrototype, LevelProtoId, RoomSettings,
};
use crate::station::{StationDungeonData, TargetResolver};

/// Level id registered by [`InMemoryWorld::with_default_prototypes`].
pub const TEST_LEVEL: &str = DEFAULT_LEVEL;

#[derive(Debug, Default)]
struct MapState {
    name: Option<String>,
    painted: Vec<(String, ChunkPos)>,
    atmosphere: Option<AtmosphereSpec>,
    rooms: Vec<RoomPlan>,
    entities: Vec<EntityId>,
}

#[derive(Debug, Default)]
struct WorldState {
    next_map: u32,
    next_entity: u64,
    maps: BTreeMap<MapId, MapState>,
    anchored: HashSet<EntityId>,
    prototypes: HashMap<LevelProtoId, DungeonLevelPrototype>,
    room_failure: Option<String>,
}

#[derive(Debug)]
pub struct InMemoryWorld {
    state: RefCell<WorldState>,
    rng: RefCell<StdRng>,
    cost: Option<(ManualClock, Duration)>,
}

impl InMemoryWorld {
    pub fn new(seed: u64) -> Self {
        Self {
            state: RefCell::new(WorldState::default()),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
            cost: None,
        }
    }

    /// World with the [`TEST_LEVEL`] prototype registered.
    pub fn with_default_prototypes(seed: u64) -> Self {
        let world = Self::new(seed);
        world.register_prototype(
            DungeonLevelPrototype::new(TEST_LEVEL, "Test procedural level")
                .with_biome("Caves", 1)
                .with_atmosphere(AtmosphereSpec::standard_air())
                .with_rooms(RoomSettings::default()),
        );
        world
    }

    /// Advance `clock` by `cost` on every mutating call.
    pub fn with_operation_cost(mut self, clock: ManualClock, cost: Duration) -> Self {
        self.cost = Some((clock, cost));
        self
    }

    pub fn register_prototype(&self, proto: DungeonLevelPrototype) {
        self.state
            .borrow_mut()
            .prototypes
            .insert(proto.id.clone(), proto);
    }

    /// Make every subsequent `build_room` fail with `reason`.
    pub fn fail_room_builds(&self, reason: impl Into<String>) {
        self.state.borrow_mut().room_failure = Some(reason.into());
    }

    /// Remove a map, as if the host deleted it out from under a job.
    pub fn delete_map(&self, map: MapId) -> bool {
        self.state.borrow_mut().maps.remove(&map).is_some()
    }

    /// Bundle this world as every collaborator a job needs.
    pub fn services(this: &Rc<Self>) -> GenerationServices {
        GenerationServices {
            maps: this.clone(),
            metadata: this.clone(),
            prototypes: this.clone(),
            random: this.clone(),
            biomes: this.clone(),
            atmosphere: this.clone(),
            rooms: this.clone(),
            anchors: this.clone(),
        }
    }

    pub fn map_count(&self) -> usize {
        self.state.borrow().maps.len()
    }

    pub fn map_ids(&self) -> Vec<MapId> {
        self.state.borrow().maps.keys().copied().collect()
    }

    pub fn map_name(&self, map: MapId) -> Option<String> {
        self.state.borrow().maps.get(&map).and_then(|m| m.name.clone())
    }

    pub fn painted_chunks(&self, map: MapId) -> usize {
        self.state.borrow().maps.get(&map).map_or(0, |m| m.painted.len())
    }

    pub fn has_atmosphere(&self, map: MapId) -> bool {
        self.state
            .borrow()
            .maps
            .get(&map)
            .is_some_and(|m| m.atmosphere.is_some())
    }

    pub fn room_count(&self, map: MapId) -> usize {
        self.state.borrow().maps.get(&map).map_or(0, |m| m.rooms.len())
    }

    pub fn entities_on(&self, map: MapId) -> Vec<EntityId> {
        self.state
            .borrow()
            .maps
            .get(&map)
            .map(|m| m.entities.clone())
            .unwrap_or_default()
    }

    pub fn is_anchored(&self, entity: EntityId) -> bool {
        self.state.borrow().anchored.contains(&entity)
    }

    fn charge(&self) {
        if let Some((clock, cost)) = &self.cost {
            clock.advance(*cost);
        }
    }
}

impl MapService for InMemoryWorld {
    fn create_map(&self) -> CollaboratorResult<MapId> {
        self.charge();
        let mut state = self.state.borrow_mut();
        state.next_map += 1;
        let id = MapId(state.next_map);
        state.maps.insert(id, MapState::default());
        Ok(id)
    }

    fn map_exists(&self, map: MapId) -> bool {
        self.state.borrow().maps.contains_key(&map)
    }
}

impl MetadataService for InMemoryWorld {
    fn set_name(&self, map: MapId, name: &str) -> CollaboratorResult<()> {
        self.charge();
        let mut state = self.state.borrow_mut();
        let entry = state
            .maps
            .get_mut(&map)
            .ok_or(CollaboratorError::MissingMap(map))?;
        entry.name = Some(name.to_string());
        Ok(())
    }
}

impl PrototypeCatalog for InMemoryWorld {
    fn level(&self, id: &LevelProtoId) -> Option<DungeonLevelPrototype> {
        self.state.borrow().prototypes.get(id).cloned()
    }
}

impl RandomSource for InMemoryWorld {
    fn range(&self, low: i32, high: i32) -> i32 {
        if high <= low {
            return low;
        }
        self.rng.borrow_mut().gen_range(low..=high)
    }
}

impl BiomePainter for InMemoryWorld {
    fn paint_chunk(&self, map: MapId, biome: &str, chunk: ChunkPos) -> CollaboratorResult<()> {
        self.charge();
        let mut state = self.state.borrow_mut();
        let entry = state
            .maps
            .get_mut(&map)
            .ok_or(CollaboratorError::MissingMap(map))?;
        entry.painted.push((biome.to_string(), chunk));
        Ok(())
    }
}

impl AtmosphereService for InMemoryWorld {
    fn set_atmosphere(&self, map: MapId, atmosphere: &AtmosphereSpec) -> CollaboratorResult<()> {
        self.charge();
        let mut state = self.state.borrow_mut();
        let entry = state
            .maps
            .get_mut(&map)
            .ok_or(CollaboratorError::MissingMap(map))?;
        entry.atmosphere = Some(atmosphere.clone());
        Ok(())
    }
}

impl RoomBuilder for InMemoryWorld {
    fn build_room(&self, map: MapId, room: &RoomPlan) -> CollaboratorResult<Vec<EntityId>> {
        self.charge();
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.room_failure {
            return Err(CollaboratorError::failed("build_room", reason.clone()));
        }
        if !state.maps.contains_key(&map) {
            return Err(CollaboratorError::MissingMap(map));
        }

        // One entity for the room itself, plus one per four tiles of width.
        let count = 1 + room.width as u64 / 4;
        let first = state.next_entity + 1;
        state.next_entity += count;
        let spawned: Vec<EntityId> = (first..first + count).map(EntityId).collect();

        if let Some(entry) = state.maps.get_mut(&map) {
            entry.rooms.push(room.clone());
            entry.entities.extend(spawned.iter().copied());
        }
        Ok(spawned)
    }
}

impl AnchorService for InMemoryWorld {
    fn anchor(&self, entity: EntityId) -> CollaboratorResult<()> {
        self.charge();
        self.state.borrow_mut().anchored.insert(entity);
        Ok(())
    }
}

/// Station list kept by the host, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStations {
    stations: RefCell<Vec<(StationId, Option<StationDungeonData>)>>,
}

impl InMemoryStations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a station that carries dungeon data.
    pub fn add_station(&self) -> (StationId, StationDungeonData) {
        let id = StationId::new();
        let data = StationDungeonData::new();
        self.stations.borrow_mut().push((id, Some(data.clone())));
        (id, data)
    }

    pub fn add_station_without_data(&self) -> StationId {
        let id = StationId::new();
        self.stations.borrow_mut().push((id, None));
        id
    }

    /// Drop a station and detach its dungeon data.
    pub fn remove_station(&self, station: StationId) -> bool {
        let mut stations = self.stations.borrow_mut();
        let Some(index) = stations.iter().position(|(id, _)| *id == station) else {
            return false;
        };
        let (_, data) = stations.remove(index);
        if let Some(data) = data {
            data.detach();
        }
        true
    }
}

impl TargetResolver for InMemoryStations {
    fn stations(&self) -> Vec<StationId> {
        self.stations.borrow().iter().map(|(id, _)| *id).collect()
    }

    fn dungeon_data(&self, station: StationId) -> Option<StationDungeonData> {
        self.stations
            .borrow()
            .iter()
            .find(|(id, _)| *id == station)
            .and_then(|(_, data)| data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_range_is_seeded_and_inclusive() {
        let a = InMemoryWorld::new(42);
        let b = InMemoryWorld::new(42);
        let xs: Vec<i32> = (0..32).map(|_| a.range(1, 3)).collect();
        let ys: Vec<i32> = (0..32).map(|_| b.range(1, 3)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (1..=3).contains(x)));
        assert_eq!(a.range(5, 5), 5);
        assert_eq!(a.range(5, 2), 5);
    }

    #[test]
    fn mutations_charge_the_clock() {
        let clock = ManualClock::new();
        let world = InMemoryWorld::new(1).with_operation_cost(clock.clone(), Duration::from_millis(3));
        let map = world.create_map().unwrap();
        world.set_name(map, "x").unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(6));

        // Reads are free.
        world.map_exists(map);
        assert_eq!(clock.elapsed(), Duration::from_millis(6));
    }

    #[test]
    fn operations_on_missing_maps_fail() {
        let world = InMemoryWorld::new(1);
        let map = world.create_map().unwrap();
        assert!(world.delete_map(map));
        assert_eq!(
            world.set_name(map, "x"),
            Err(CollaboratorError::MissingMap(map))
        );
    }

    #[test]
    fn removing_a_station_detaches_its_data() {
        let stations = InMemoryStations::new();
        let bare = stations.add_station_without_data();
        let (id, data) = stations.add_station();

        assert_eq!(stations.stations(), vec![bare, id]);
        assert!(stations.dungeon_data(bare).is_none());
        assert!(stations.remove_station(id));
        assert!(data.is_detached());
        assert!(stations.dungeon_data(id).is_none());
        assert!(!stations.remove_station(id));
    }
}
