//! World - state shared between the simulation and render contexts
//!
//! Owns the entity registry, the alarms, the active tile grid and the
//! viewport-related settings. Both contexts reach it through a [`WorldHandle`];
//! the simulation holds the write lock for a whole tick, so a reader always
//! sees the state between two ticks, never a half-drained registry or a
//! half-swapped grid.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashSet;

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::{AlarmId, EntityId, Rect, Tick, TileCode, Vec2};
use crate::engine::render::RenderSettings;
use crate::entity::registry::{EntityRegistry, FRONT_LAYER};
use crate::entity::{Entity, EntityKind};
use crate::simulation::alarm::{Alarm, AlarmRegistry};
use crate::simulation::commands::{Command, Commands};
use crate::spatial::grid::{TileGrid, TileHit};
use crate::spatial::query::{query_rect, QueryHits};

/// The game world containing all entities, alarms and the tile map
pub struct World {
    pub current_tick: Tick,
    pub entities: EntityRegistry,
    pub alarms: AlarmRegistry,
    pub render: RenderSettings,
    tiles: Arc<TileGrid>,
    player: Option<EntityId>,
    tile_size: f32,
    empty_tile: TileCode,
}

impl World {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current_tick: 0,
            entities: EntityRegistry::new(),
            alarms: AlarmRegistry::new(),
            render: RenderSettings::from_config(&config.display),
            tiles: Arc::new(TileGrid::empty(config.tiles.tile_size, config.tiles.empty_tile)),
            player: None,
            tile_size: config.tiles.tile_size,
            empty_tile: config.tiles.empty_tile,
        }
    }

    pub fn add_entity(&mut self, entity: Box<dyn Entity>, x: f32, y: f32) -> EntityId {
        self.entities.add(entity, x, y, FRONT_LAYER)
    }

    pub fn add_entity_at_layer(&mut self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> EntityId {
        self.entities.add(entity, x, y, layer)
    }

    pub fn add_entities<I>(&mut self, entities: I) -> Vec<EntityId>
    where
        I: IntoIterator<Item = Box<dyn Entity>>,
    {
        self.entities.add_many(entities)
    }

    /// Add the viewport anchor. Replaces any previous player reference; the
    /// previous player stays registered as an ordinary entity.
    pub fn add_player(&mut self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> EntityId {
        let id = self.entities.add(entity, x, y, layer);
        if let Some(previous) = self.player.replace(id) {
            tracing::debug!(?previous, player = ?id, "player replaced");
        }
        id
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Box<dyn Entity>> {
        let removed = self.entities.remove(id);
        if removed.is_some() && self.player == Some(id) {
            self.player = None;
        }
        removed
    }

    pub fn remove_all_entities(&mut self) {
        self.entities.remove_all();
        self.player = None;
    }

    pub fn remove_entities_of_kind(&mut self, kind: EntityKind) -> usize {
        let removed = self.entities.remove_all_of_kind(kind);
        self.forget_missing_player();
        removed
    }

    pub fn add_alarm(&mut self, alarm: Alarm) -> AlarmId {
        self.alarms.add(alarm)
    }

    pub fn cancel_alarm(&mut self, id: AlarmId) -> bool {
        self.alarms.cancel(id)
    }

    pub fn remove_all_alarms(&mut self) {
        self.alarms.remove_all();
    }

    /// Replace the tile map
    ///
    /// The new grid is fully built before it replaces the old one; on error
    /// the previous grid stays active.
    pub fn load_tile_map(&mut self, map: Vec<Vec<TileCode>>, x: f32, y: f32) -> Result<()> {
        let grid = TileGrid::new(map, self.tile_size, self.empty_tile, Vec2::new(x, y))?;
        tracing::info!(
            rows = grid.rows(),
            cols = grid.cols(),
            width = grid.map_width(),
            height = grid.map_height(),
            "tile map loaded"
        );
        self.tiles = Arc::new(grid);
        Ok(())
    }

    /// The active grid. The `Arc` stays valid after a later map load.
    pub fn tiles(&self) -> Arc<TileGrid> {
        Arc::clone(&self.tiles)
    }

    pub fn tile_grid(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn find_entities_in_rect(&self, rect: Rect) -> Vec<EntityId> {
        self.entities.find_in_rect(rect)
    }

    pub fn find_tiles_in_rect(&self, rect: Rect) -> Vec<TileCode> {
        self.tiles.find_tiles_in_rect(rect)
    }

    pub fn find_cells_in_rect(&self, rect: Rect) -> Vec<TileHit> {
        self.tiles.find_cells_in_rect(rect)
    }

    pub fn query_rect(&self, rect: Rect) -> QueryHits {
        query_rect(&self.entities, &self.tiles, rect)
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        self.entities.of_kind(kind)
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    /// Position of the viewport anchor, if one is registered
    pub fn player_position(&self) -> Option<Vec2> {
        let id = self.player?;
        self.entities.get(id).map(|entity| entity.body().position)
    }

    pub fn map_width(&self) -> f32 {
        self.tiles.map_width()
    }

    pub fn map_height(&self) -> f32 {
        self.tiles.map_height()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entity drain followed by its queued commands
    pub fn update_entities(&mut self) -> usize {
        let mut commands = Commands::new();
        let removed = self
            .entities
            .update_all(self.current_tick, &self.tiles, &mut commands);
        self.forget_missing_player();
        self.apply_commands(&mut commands);
        removed
    }

    /// Alarm drain followed by its queued commands
    pub fn update_alarms(&mut self) -> usize {
        let mut commands = Commands::new();
        let removed = self
            .alarms
            .update_all(&self.entities, self.current_tick, &mut commands);
        self.apply_commands(&mut commands);
        removed
    }

    pub fn tick(&mut self) {
        self.current_tick += 1;
    }

    /// Apply queued mutations in order
    ///
    /// Consecutive despawns are batched into one removal pass.
    pub fn apply_commands(&mut self, commands: &mut Commands) {
        let mut despawned = AHashSet::new();
        for command in commands.drain() {
            if !matches!(command, Command::Despawn(_)) && !despawned.is_empty() {
                self.entities.remove_set(&despawned);
                despawned.clear();
            }
            match command {
                Command::Spawn {
                    id,
                    entity,
                    x,
                    y,
                    layer,
                } => self.entities.add_with_id(id, entity, x, y, layer),
                Command::Despawn(id) => {
                    despawned.insert(id);
                }
                Command::AddAlarm(alarm) => {
                    self.alarms.add(alarm);
                }
                Command::CancelAlarm(id) => {
                    self.alarms.cancel(id);
                }
            }
        }
        self.entities.remove_set(&despawned);
        self.forget_missing_player();
    }

    /// Drop everything the world owns
    pub fn clear(&mut self) {
        self.entities.remove_all();
        self.alarms.remove_all();
        self.player = None;
        self.tiles = Arc::new(TileGrid::empty(self.tile_size, self.empty_tile));
    }

    fn forget_missing_player(&mut self) {
        if self
            .player
            .is_some_and(|player| !self.entities.contains(player))
        {
            self.player = None;
        }
    }
}

/// Shared handle to a [`World`]
///
/// Cloning is cheap. Lock errors surface as [`EngineError::Poisoned`], which
/// only happens after a simulation hook panicked while holding the lock.
#[derive(Clone)]
pub struct WorldHandle(Arc<RwLock<World>>);

impl WorldHandle {
    pub fn new(world: World) -> Self {
        Self(Arc::new(RwLock::new(world)))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, World>> {
        self.0.read().map_err(|_| EngineError::Poisoned("world"))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, World>> {
        self.0.write().map_err(|_| EngineError::Poisoned("world"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Body, UpdateContext};

    const CRATE: EntityKind = EntityKind("crate");

    struct Crate {
        body: Body,
        spawn_child: bool,
        despawn: Option<EntityId>,
    }

    impl Crate {
        fn boxed() -> Box<dyn Entity> {
            Box::new(Crate {
                body: Body::new(10.0, 10.0),
                spawn_child: false,
                despawn: None,
            })
        }
    }

    impl Entity for Crate {
        fn kind(&self) -> EntityKind {
            CRATE
        }

        fn body(&self) -> &Body {
            &self.body
        }

        fn body_mut(&mut self) -> &mut Body {
            &mut self.body
        }

        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            if self.spawn_child {
                self.spawn_child = false;
                ctx.commands.spawn(Crate::boxed(), 50.0, 50.0);
            }
            if let Some(target) = self.despawn.take() {
                ctx.commands.despawn(target);
            }
        }
    }

    #[test]
    fn test_spawn_from_update_lands_after_pass() {
        let mut world = World::new(&EngineConfig::default());
        world.add_entity(
            Box::new(Crate {
                body: Body::new(10.0, 10.0),
                spawn_child: true,
                despawn: None,
            }),
            0.0,
            0.0,
        );

        world.update_entities();
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.find_entities_in_rect(Rect::new(50.0, 50.0, 51.0, 51.0)).len(), 1);
    }

    #[test]
    fn test_despawn_from_update_applies_after_pass() {
        let mut world = World::new(&EngineConfig::default());
        let victim = world.add_entity(Crate::boxed(), 0.0, 0.0);
        world.add_entity_at_layer(
            Box::new(Crate {
                body: Body::new(10.0, 10.0),
                spawn_child: false,
                despawn: Some(victim),
            }),
            0.0,
            0.0,
            0.0,
        );

        world.update_entities();
        assert!(!world.entities.contains(victim));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_removing_player_clears_anchor() {
        let mut world = World::new(&EngineConfig::default());
        let player = world.add_player(Crate::boxed(), 30.0, 40.0, FRONT_LAYER);
        assert_eq!(world.player_position(), Some(Vec2::new(30.0, 40.0)));

        world.remove_entity(player);
        assert_eq!(world.player(), None);
        assert_eq!(world.player_position(), None);
    }

    #[test]
    fn test_second_player_replaces_anchor() {
        let mut world = World::new(&EngineConfig::default());
        let first = world.add_player(Crate::boxed(), 10.0, 10.0, FRONT_LAYER);
        let second = world.add_player(Crate::boxed(), 70.0, 20.0, FRONT_LAYER);

        assert_eq!(world.player(), Some(second));
        assert_eq!(world.player_position(), Some(Vec2::new(70.0, 20.0)));
        assert!(world.entities.contains(first));
        assert_eq!(world.entity_count(), 2);

        // The old player is an ordinary entity now
        world.remove_entity(first);
        assert_eq!(world.player(), Some(second));
    }

    #[test]
    fn test_removing_player_kind_clears_anchor() {
        let mut world = World::new(&EngineConfig::default());
        world.add_entity(Crate::boxed(), 0.0, 0.0);
        world.add_player(Crate::boxed(), 30.0, 40.0, FRONT_LAYER);

        assert_eq!(world.remove_entities_of_kind(CRATE), 2);
        assert_eq!(world.player(), None);
        assert_eq!(world.player_position(), None);
    }

    #[test]
    fn test_failed_map_load_keeps_previous_grid() {
        let mut world = World::new(&EngineConfig::default());
        world.load_tile_map(vec![vec![1, 2], vec![3, 4]], 0.0, 0.0).unwrap();
        let before = world.tiles();

        assert!(world.load_tile_map(vec![vec![1, 2], vec![3]], 0.0, 0.0).is_err());
        assert_eq!(*world.tiles(), *before);
        assert_eq!(world.map_width(), 64.0);
    }

    #[test]
    fn test_held_grid_survives_reload() {
        let mut world = World::new(&EngineConfig::default());
        world.load_tile_map(vec![vec![1]], 0.0, 0.0).unwrap();
        let held = world.tiles();

        world.load_tile_map(vec![vec![2, 2]], 0.0, 0.0).unwrap();
        assert_eq!(held.cols(), 1);
        assert_eq!(world.tile_grid().cols(), 2);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut world = World::new(&EngineConfig::default());
        world.add_player(Crate::boxed(), 0.0, 0.0, FRONT_LAYER);
        world.add_alarm(Alarm::once(5, |_| {}));
        world.load_tile_map(vec![vec![1]], 0.0, 0.0).unwrap();

        world.clear();
        assert_eq!(world.entity_count(), 0);
        assert!(world.alarms.is_empty());
        assert!(world.tile_grid().is_empty());
        assert_eq!(world.player(), None);
    }
}
