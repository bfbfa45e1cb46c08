//! Rectangle queries across entities and tiles at once

use crate::core::types::{EntityId, Rect};
use crate::entity::registry::EntityRegistry;
use crate::spatial::grid::{TileGrid, TileHit};

/// Everything overlapping one query rectangle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHits {
    /// In registry order
    pub entities: Vec<EntityId>,
    /// Row-major, empty cells excluded
    pub tiles: Vec<TileHit>,
}

impl QueryHits {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.tiles.is_empty()
    }
}

pub fn query_rect(entities: &EntityRegistry, tiles: &TileGrid, rect: Rect) -> QueryHits {
    QueryHits {
        entities: entities.find_in_rect(rect),
        tiles: tiles.find_cells_in_rect(rect),
    }
}
