//! User-supplied game logic

use crate::core::error::Result;
use crate::ecs::world::World;
use crate::engine::host::InputEvent;

/// Hooks the engine calls into
///
/// Every hook runs with the world write lock held, so the renderer never
/// observes a hook's partial work.
pub trait Game: Send + 'static {
    /// Runs once when the engine is created, before the initial map loads
    fn initialize(&mut self, _world: &mut World) -> Result<()> {
        Ok(())
    }

    /// Runs at the start of every tick, before entities update
    fn update(&mut self, _world: &mut World) {}

    fn on_input(&mut self, _world: &mut World, _event: InputEvent) {}
}
