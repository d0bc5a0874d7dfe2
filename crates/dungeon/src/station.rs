//! Generation targets: stations and the dungeon data they carry.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use strata_core::StationId;

use crate::collaborators::{EntityId, MapId};
use crate::prototype::LevelProtoId;

/// A level committed to a station once its job finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelRecord {
    pub map: MapId,
    pub level: LevelProtoId,
    pub depth: u32,
    pub rooms: usize,
    pub entities: Vec<EntityId>,
}

#[derive(Debug, Default)]
struct DungeonDataInner {
    levels: Vec<LevelRecord>,
    detached: bool,
}

/// Dungeon data attached to a station.
///
/// Shared between the host and every job targeting the station. When the
/// station goes away the host detaches it; jobs still holding it then fault
/// at their next checkpoint that touches it.
#[derive(Debug, Clone, Default)]
pub struct StationDungeonData {
    inner: Rc<RefCell<DungeonDataInner>>,
}

impl StationDungeonData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished level. Returns its depth (1 for the first level), or
    /// `None` if the data was detached.
    pub fn record_level(&self, mut record: LevelRecord) -> Option<u32> {
        let mut inner = self.inner.borrow_mut();
        if inner.detached {
            return None;
        }
        let depth = inner.levels.len() as u32 + 1;
        record.depth = depth;
        inner.levels.push(record);
        Some(depth)
    }

    pub fn detach(&self) {
        self.inner.borrow_mut().detached = true;
    }

    pub fn is_detached(&self) -> bool {
        self.inner.borrow().detached
    }

    pub fn levels(&self) -> Vec<LevelRecord> {
        self.inner.borrow().levels.clone()
    }

    pub fn level_count(&self) -> usize {
        self.inner.borrow().levels.len()
    }
}

/// The resolved target of a generation request.
#[derive(Debug, Clone)]
pub struct GenerationTarget {
    pub station: StationId,
    pub data: StationDungeonData,
}

/// Host-side lookup of candidate targets.
pub trait TargetResolver {
    /// Known stations, in the host's order. The first one is the target.
    fn stations(&self) -> Vec<StationId>;

    /// Dungeon data attached to `station`, if it carries any.
    fn dungeon_data(&self, station: StationId) -> Option<StationDungeonData>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: &str) -> LevelRecord {
        LevelRecord {
            map: MapId(1),
            level: LevelProtoId::new(level),
            depth: 0,
            rooms: 0,
            entities: Vec::new(),
        }
    }

    #[test]
    fn levels_are_numbered_by_depth() {
        let data = StationDungeonData::new();
        assert_eq!(data.record_level(record("a")), Some(1));
        assert_eq!(data.record_level(record("b")), Some(2));
        assert_eq!(data.levels()[1].depth, 2);
    }

    #[test]
    fn detached_data_refuses_records_and_is_shared() {
        let data = StationDungeonData::new();
        let held_by_job = data.clone();
        data.detach();
        assert!(held_by_job.is_detached());
        assert_eq!(held_by_job.record_level(record("a")), None);
        assert_eq!(data.level_count(), 0);
    }
}
