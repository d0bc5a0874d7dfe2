//! `strata-dungeon`
//!
//! **Responsibility:** turn "generate a dungeon level for parameters P" into a
//! cooperative job on the `strata-jobs` scheduler.
//!
//! The generation algorithms themselves are external collaborators reached
//! through the traits in [`collaborators`]; this crate only sequences them in
//! bounded, cancellable slices.

pub mod collaborators;
pub mod config;
pub mod handler;
pub mod in_memory;
pub mod job;
pub mod prototype;
pub mod station;

pub use collaborators::{
    AnchorService, AtmosphereService, BiomePainter, ChunkPos, CollaboratorError, EntityId,
    GenerationServices, MapId, MapService, MetadataService, PrototypeCatalog, RandomSource,
    RoomBuilder, RoomPlan, TilePos,
};
pub use config::{ConfigError, GenerationConfig};
pub use handler::{DungeonGenerationHandler, RequestOutcome};
pub use job::{GenerationPhase, SpawnDungeonLevelJob};
pub use prototype::{
    AtmosphereSpec, DEFAULT_LEVEL, DungeonLevelPrototype, LayoutBounds, LevelProtoId,
    PrototypeError, RoomSettings,
};
pub use station::{GenerationTarget, LevelRecord, StationDungeonData, TargetResolver};
