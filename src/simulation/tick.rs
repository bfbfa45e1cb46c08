//! Tick system - orchestrates one simulation step
//!
//! Order within a tick is fixed:
//! game hook -> entity drain -> alarm drain -> tick counter.
//!
//! Commands queued by entities are applied before alarms run, so an alarm
//! owned by an entity that despawned this tick is already orphaned.

use crate::core::error::Result;
use crate::core::types::Tick;
use crate::ecs::world::{World, WorldHandle};
use crate::engine::game::Game;
use crate::simulation::game_loop::Simulation;

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Ticks completed including this one
    pub tick: Tick,
    pub entities_removed: usize,
    pub alarms_removed: usize,
}

/// Run one tick against an already locked world
pub fn run_simulation_tick<G: Game + ?Sized>(world: &mut World, game: &mut G) -> TickReport {
    game.update(world);
    let entities_removed = world.update_entities();
    let alarms_removed = world.update_alarms();
    world.tick();

    let report = TickReport {
        tick: world.current_tick,
        entities_removed,
        alarms_removed,
    };
    if entities_removed > 0 || alarms_removed > 0 {
        tracing::trace!(
            tick = report.tick,
            entities_removed,
            alarms_removed,
            entities = world.entity_count(),
            "tick drained"
        );
    }
    report
}

/// The engine's [`Simulation`]: a game plus the world it plays in
///
/// Each tick holds the world write lock from the game hook until the last
/// drain completes.
pub struct Stepper<G: Game> {
    world: WorldHandle,
    game: G,
}

impl<G: Game> Stepper<G> {
    pub fn new(world: WorldHandle, game: G) -> Self {
        Self { world, game }
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn world(&self) -> &WorldHandle {
        &self.world
    }
}

impl<G: Game> Simulation for Stepper<G> {
    fn tick(&mut self) -> Result<Tick> {
        let mut world = self.world.write()?;
        Ok(run_simulation_tick(&mut world, &mut self.game).tick)
    }
}
