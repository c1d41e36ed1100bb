use std::collections::HashMap;

use plaza_core::grid::RoomGeometry;

use crate::config::RoomDef;

/// External map/space geometry collaborator: resolves a room id to its grid
/// bounds and static obstacles.
pub trait SpaceGeometry: Send + Sync {
    fn room(&self, room_id: &str) -> Option<RoomGeometry>;
}

/// In-process geometry directory built from configured room definitions.
#[derive(Default)]
pub struct StaticSpaces {
    rooms: HashMap<String, RoomGeometry>,
}

impl StaticSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_defs(defs: &[RoomDef]) -> Self {
        let mut spaces = Self::new();
        for def in defs {
            spaces.insert(def.id.clone(), def.geometry());
        }
        spaces
    }

    pub fn insert(&mut self, room_id: impl Into<String>, geometry: RoomGeometry) {
        self.rooms.insert(room_id.into(), geometry);
    }
}

impl SpaceGeometry for StaticSpaces {
    fn room(&self, room_id: &str) -> Option<RoomGeometry> {
        self.rooms.get(room_id).cloned()
    }
}
