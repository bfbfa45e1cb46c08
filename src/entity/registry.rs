//! Ordered collection of live entities
//!
//! Order is update order and render order: index 0 is updated and drawn first
//! (the back layer), the last index last (the front layer).

use ahash::AHashSet;

use crate::core::types::{EntityId, Rect, Tick};
use crate::entity::{Entity, EntityKind, UpdateContext};
use crate::simulation::commands::Commands;
use crate::spatial::grid::TileGrid;

/// Layer used when none is given: append at the front of the draw order
pub const FRONT_LAYER: f32 = 1.0;
pub const BACK_LAYER: f32 = 0.0;

struct Slot {
    id: EntityId,
    layer: f32,
    entity: Box<dyn Entity>,
}

/// The authoritative sequence of live entities
///
/// Entities are owned here once added and handed back by [`remove`](Self::remove).
/// Every id appears at most once.
#[derive(Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an entity at `(x, y)` and insert it by layer
    ///
    /// The base index is `round(len * layer)`; it is then moved past any
    /// neighbours whose layer would be out of order, so an entity never lands
    /// in front of a higher layer or behind a lower one.
    pub fn add(&mut self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> EntityId {
        let id = EntityId::new();
        self.add_with_id(id, entity, x, y, layer);
        id
    }

    pub(crate) fn add_with_id(
        &mut self,
        id: EntityId,
        mut entity: Box<dyn Entity>,
        x: f32,
        y: f32,
        layer: f32,
    ) {
        let body = entity.body_mut();
        body.set_start_position(x, y);
        body.jump_to_start_position();

        let layer = sanitize_layer(layer);
        let index = self.insertion_index(layer);
        tracing::trace!(?id, kind = %entity.kind(), index, layer, "entity added");
        self.slots.insert(index, Slot { id, layer, entity });
    }

    /// Append entities in the given order, keeping their current positions
    pub fn add_many<I>(&mut self, entities: I) -> Vec<EntityId>
    where
        I: IntoIterator<Item = Box<dyn Entity>>,
    {
        entities
            .into_iter()
            .map(|entity| {
                let id = EntityId::new();
                self.slots.push(Slot {
                    id,
                    layer: FRONT_LAYER,
                    entity,
                });
                id
            })
            .collect()
    }

    /// Remove an entity, handing it back. `None` if it is not registered.
    pub fn remove(&mut self, id: EntityId) -> Option<Box<dyn Entity>> {
        let index = self.index_of(id)?;
        tracing::trace!(?id, "entity removed");
        Some(self.slots.remove(index).entity)
    }

    pub(crate) fn remove_set(&mut self, ids: &AHashSet<EntityId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let before = self.slots.len();
        self.slots.retain(|slot| !ids.contains(&slot.id));
        before - self.slots.len()
    }

    pub fn remove_all(&mut self) {
        self.slots.clear();
    }

    /// Remove every entity tagged exactly `kind`; returns how many went
    pub fn remove_all_of_kind(&mut self, kind: EntityKind) -> usize {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.entity.kind() != kind);
        before - self.slots.len()
    }

    /// One drain pass
    ///
    /// Each entity present at the start of the pass is updated exactly once,
    /// in order. Entities that end up inactive are dropped together once the
    /// pass is complete, so a removal never shifts an unvisited entity past
    /// the cursor. Returns the number of entities removed.
    pub fn update_all(&mut self, tick: Tick, tiles: &TileGrid, commands: &mut Commands) -> usize {
        for slot in self.slots.iter_mut() {
            let mut ctx = UpdateContext {
                id: slot.id,
                tick,
                tiles,
                commands: &mut *commands,
            };
            slot.entity.update(&mut ctx);
        }

        let before = self.slots.len();
        self.slots.retain(|slot| slot.entity.body().active);
        let removed = before - self.slots.len();
        if removed > 0 {
            tracing::trace!(removed, tick, "inactive entities dropped");
        }
        removed
    }

    /// Ids of entities whose bounds intersect `rect`, in current order
    pub fn find_in_rect(&self, rect: Rect) -> Vec<EntityId> {
        self.slots
            .iter()
            .filter(|slot| rect.intersects(&slot.entity.body().bounds()))
            .map(|slot| slot.id)
            .collect()
    }

    /// Ids of entities tagged exactly `kind`, in current order
    pub fn of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.slots
            .iter()
            .filter(|slot| slot.entity.kind() == kind)
            .map(|slot| slot.id)
            .collect()
    }

    pub fn get(&self, id: EntityId) -> Option<&dyn Entity> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.entity.as_ref())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut (dyn Entity + 'static)> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .map(|slot| slot.entity.as_mut())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index_of(id).is_some()
    }

    /// Registered and not yet marked inactive
    pub fn is_active(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(|entity| entity.body().active)
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Ids in update/render order
    pub fn ids(&self) -> Vec<EntityId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Entities in update/render order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &dyn Entity)> + '_ {
        self.slots.iter().map(|slot| (slot.id, slot.entity.as_ref()))
    }

    fn insertion_index(&self, layer: f32) -> usize {
        let count = self.slots.len();
        let mut index = ((count as f32 * layer).round() as usize).min(count);

        while index < count && self.slots[index].layer < layer {
            index += 1;
        }
        while index > 0 && self.slots[index - 1].layer > layer {
            index -= 1;
        }
        index
    }
}

fn sanitize_layer(layer: f32) -> f32 {
    if layer.is_nan() {
        FRONT_LAYER
    } else {
        layer.clamp(BACK_LAYER, FRONT_LAYER)
    }
}
