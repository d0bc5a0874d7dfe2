//! Level-parameter prototypes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Level requested by the built-in triggers unless configured otherwise.
pub const DEFAULT_LEVEL: &str = "TestProceduralLevel";

/// Identifier of a dungeon level prototype (the level-parameters id a request
/// names).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelProtoId(String);

impl LevelProtoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for LevelProtoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LevelProtoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Gas mixture a generated map is filled with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereSpec {
    /// Kelvin
    pub temperature: f32,
    /// (gas, moles per tile)
    pub moles: Vec<(String, f32)>,
}

impl AtmosphereSpec {
    /// Breathable air at room temperature.
    pub fn standard_air() -> Self {
        Self {
            temperature: 293.15,
            moles: vec![("oxygen".to_string(), 21.8), ("nitrogen".to_string(), 82.1)],
        }
    }
}

/// Room layout parameters handed to the layout collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub min_rooms: u32,
    pub max_rooms: u32,
    /// Smallest/largest room side, in tiles.
    pub min_size: u32,
    pub max_size: u32,
    /// Half-extent of the square area rooms are placed in, in tiles.
    pub bounds: i32,
    /// Prototype of the room contents.
    pub room_proto: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            min_rooms: 3,
            max_rooms: 5,
            min_size: 4,
            max_size: 8,
            bounds: 32,
            room_proto: "BasicRoom".to_string(),
        }
    }
}

/// Parameters of one dungeon level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonLevelPrototype {
    pub id: LevelProtoId,
    /// Name given to the generated map.
    pub name: String,
    /// Biome template painted onto the map, if any.
    pub biome: Option<String>,
    /// Radius (in chunks) of the painted biome area around the origin.
    pub biome_radius: u32,
    pub atmosphere: Option<AtmosphereSpec>,
    pub rooms: RoomSettings,
}

impl DungeonLevelPrototype {
    pub fn new(id: impl Into<LevelProtoId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            biome: None,
            biome_radius: 0,
            atmosphere: None,
            rooms: RoomSettings::default(),
        }
    }

    pub fn with_biome(mut self, biome: impl Into<String>, radius: u32) -> Self {
        self.biome = Some(biome.into());
        self.biome_radius = radius;
        self
    }

    pub fn with_atmosphere(mut self, atmosphere: AtmosphereSpec) -> Self {
        self.atmosphere = Some(atmosphere);
        self
    }

    pub fn with_rooms(mut self, rooms: RoomSettings) -> Self {
        self.rooms = rooms;
        self
    }
}

/// A prototype whose numbers the generator cannot work with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PrototypeError {
    #[error("biome radius {0} is too large")]
    BiomeRadius(u32),

    #[error("{field} = {value} does not fit a tile coordinate")]
    OutOfRange { field: &'static str, value: u32 },

    #[error("room bounds must be non-negative, got {0}")]
    NegativeBounds(i32),

    #[error("{min_field} > {max_field} ({min} > {max})")]
    InvertedRange {
        min_field: &'static str,
        max_field: &'static str,
        min: u32,
        max: u32,
    },
}

/// Chunk and room ranges of a checked prototype, in signed tile units.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayoutBounds {
    pub biome_radius: i32,
    /// `(2 * radius + 1)²`, or 0 without a biome.
    pub biome_chunks: u64,
    pub rooms: (i32, i32),
    pub room_size: (i32, i32),
    pub bounds: i32,
}

impl DungeonLevelPrototype {
    /// Check every number the generator turns into coordinates or counts.
    pub fn layout_bounds(&self) -> Result<LayoutBounds, PrototypeError> {
        let biome_radius = i32::try_from(self.biome_radius)
            .map_err(|_| PrototypeError::BiomeRadius(self.biome_radius))?;
        let biome_chunks = if self.biome.is_some() {
            let side = 2 * i64::from(biome_radius) + 1;
            side.checked_mul(side)
                .map(|n| n as u64)
                .ok_or(PrototypeError::BiomeRadius(self.biome_radius))?
        } else {
            0
        };

        let r = &self.rooms;
        if r.bounds < 0 {
            return Err(PrototypeError::NegativeBounds(r.bounds));
        }
        let rooms = (
            coordinate("min_rooms", r.min_rooms)?,
            coordinate("max_rooms", r.max_rooms)?,
        );
        let room_size = (
            coordinate("min_size", r.min_size)?,
            coordinate("max_size", r.max_size)?,
        );
        if rooms.0 > rooms.1 {
            return Err(PrototypeError::InvertedRange {
                min_field: "min_rooms",
                max_field: "max_rooms",
                min: r.min_rooms,
                max: r.max_rooms,
            });
        }
        if room_size.0 > room_size.1 {
            return Err(PrototypeError::InvertedRange {
                min_field: "min_size",
                max_field: "max_size",
                min: r.min_size,
                max: r.max_size,
            });
        }

        Ok(LayoutBounds {
            biome_radius,
            biome_chunks,
            rooms,
            room_size,
            bounds: r.bounds,
        })
    }
}

fn coordinate(field: &'static str, value: u32) -> Result<i32, PrototypeError> {
    i32::try_from(value).map_err(|_| PrototypeError::OutOfRange { field, value })
}

impl From<String> for LevelProtoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto() -> DungeonLevelPrototype {
        DungeonLevelPrototype::new(DEFAULT_LEVEL, "test").with_biome("Caves", 2)
    }

    #[test]
    fn default_settings_are_accepted() {
        let bounds = proto().layout_bounds().unwrap();
        assert_eq!(bounds.biome_radius, 2);
        assert_eq!(bounds.biome_chunks, 25);
        assert_eq!(bounds.rooms, (3, 5));
    }

    #[test]
    fn no_biome_means_no_chunks() {
        let p = DungeonLevelPrototype::new("x", "x");
        assert_eq!(p.layout_bounds().unwrap().biome_chunks, 0);
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let mut p = proto();
        p.rooms.bounds = i32::MIN;
        assert_eq!(p.layout_bounds(), Err(PrototypeError::NegativeBounds(i32::MIN)));

        let mut p = proto();
        p.biome_radius = u32::MAX;
        assert_eq!(p.layout_bounds(), Err(PrototypeError::BiomeRadius(u32::MAX)));

        let mut p = proto();
        p.rooms.max_rooms = u32::MAX;
        assert!(matches!(
            p.layout_bounds(),
            Err(PrototypeError::OutOfRange { field: "max_rooms", .. })
        ));

        let mut p = proto();
        p.rooms.min_size = 9;
        p.rooms.max_size = 2;
        assert!(matches!(
            p.layout_bounds(),
            Err(PrototypeError::InvertedRange { min_field: "min_size", .. })
        ));
    }
}
