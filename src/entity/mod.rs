//! Simulation entities
//!
//! An entity is anything the loop updates once per tick and the renderer draws:
//! players, projectiles, pickups. Each one carries a [`Body`] and an explicit
//! [`EntityKind`] tag used for exact-match filtering.

pub mod body;
pub mod registry;

pub use body::Body;
pub use registry::EntityRegistry;

use crate::core::types::{EntityId, Rect, Tick, TileCode};
use crate::simulation::commands::Commands;
use crate::spatial::grid::TileGrid;

/// Exact-match type tag
///
/// Two entities share a kind only if their tags are equal; there is no
/// subtype relation between kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKind(pub &'static str);

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Behaviour of a live simulation object
pub trait Entity: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn body(&self) -> &Body;

    fn body_mut(&mut self) -> &mut Body;

    /// Called once per tick, in registry order.
    ///
    /// Clear `body_mut().active` (or call [`Body::destroy`]) to be removed
    /// after the pass. Other registry mutations go through `ctx.commands`.
    fn update(&mut self, ctx: &mut UpdateContext<'_>);
}

/// What an entity can see and request while it is being updated
pub struct UpdateContext<'a> {
    pub id: EntityId,
    pub tick: Tick,
    pub tiles: &'a TileGrid,
    pub commands: &'a mut Commands,
}

impl UpdateContext<'_> {
    /// Codes of non-empty tiles overlapping `rect`
    pub fn tiles_in_rect(&self, rect: Rect) -> Vec<TileCode> {
        self.tiles.find_tiles_in_rect(rect)
    }
}
