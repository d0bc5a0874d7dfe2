//! Capability interfaces the generation job calls into.
//!
//! The job owns none of these. Every method takes `&self` so a host can hand
//! the same service to many jobs; implementations use interior mutability for
//! their own state.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prototype::{AtmosphereSpec, DungeonLevelPrototype, LevelProtoId};

/// Host map identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub u32);

impl core::fmt::Display for MapId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "map-{}", self.0)
    }
}

/// Host entity identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ent-{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A room the layout phase decided to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlan {
    pub origin: TilePos,
    pub width: u32,
    pub height: u32,
    pub proto: String,
}

/// A collaborator refused or failed an operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("map {0} does not exist")]
    MissingMap(MapId),

    #[error("unknown prototype: {0}")]
    UnknownPrototype(String),

    #[error("{operation} failed: {reason}")]
    Failed { operation: String, reason: String },
}

impl CollaboratorError {
    pub fn failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Map creation and lookup.
pub trait MapService {
    fn create_map(&self) -> CollaboratorResult<MapId>;
    fn map_exists(&self, map: MapId) -> bool;
}

/// Entity/map metadata mutation.
pub trait MetadataService {
    fn set_name(&self, map: MapId, name: &str) -> CollaboratorResult<()>;
}

/// Level-parameters lookup by identifier.
pub trait PrototypeCatalog {
    fn level(&self, id: &LevelProtoId) -> Option<DungeonLevelPrototype>;
}

/// Randomness draw.
pub trait RandomSource {
    /// Uniform integer in `[low, high]`. Returns `low` when `high <= low`.
    fn range(&self, low: i32, high: i32) -> i32;
}

/// Paints one chunk of a biome template onto a map.
pub trait BiomePainter {
    fn paint_chunk(&self, map: MapId, biome: &str, chunk: ChunkPos) -> CollaboratorResult<()>;
}

pub trait AtmosphereService {
    fn set_atmosphere(&self, map: MapId, atmosphere: &AtmosphereSpec) -> CollaboratorResult<()>;
}

/// Builds room geometry and spawns its contents.
pub trait RoomBuilder {
    fn build_room(&self, map: MapId, room: &RoomPlan) -> CollaboratorResult<Vec<EntityId>>;
}

pub trait AnchorService {
    fn anchor(&self, entity: EntityId) -> CollaboratorResult<()>;
}

/// Every collaborator a generation job needs, bundled for construction.
#[derive(Clone)]
pub struct GenerationServices {
    pub maps: Rc<dyn MapService>,
    pub metadata: Rc<dyn MetadataService>,
    pub prototypes: Rc<dyn PrototypeCatalog>,
    pub random: Rc<dyn RandomSource>,
    pub biomes: Rc<dyn BiomePainter>,
    pub atmosphere: Rc<dyn AtmosphereService>,
    pub rooms: Rc<dyn RoomBuilder>,
    pub anchors: Rc<dyn AnchorService>,
}

impl core::fmt::Debug for GenerationServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GenerationServices").finish_non_exhaustive()
    }
}
