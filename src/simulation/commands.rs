//! Deferred mutations requested from inside a drain pass
//!
//! Entities and alarm actions cannot touch the registries they are being
//! iterated from. They queue requests here instead; the world applies the
//! queue in FIFO order once the pass is over.

use crate::core::types::{AlarmId, EntityId};
use crate::entity::registry::FRONT_LAYER;
use crate::entity::Entity;
use crate::simulation::alarm::Alarm;

pub enum Command {
    Spawn {
        id: EntityId,
        entity: Box<dyn Entity>,
        x: f32,
        y: f32,
        layer: f32,
    },
    Despawn(EntityId),
    AddAlarm(Alarm),
    CancelAlarm(AlarmId),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Spawn { id, x, y, layer, .. } => f
                .debug_struct("Spawn")
                .field("id", id)
                .field("x", x)
                .field("y", y)
                .field("layer", layer)
                .finish(),
            Command::Despawn(id) => f.debug_tuple("Despawn").field(id).finish(),
            Command::AddAlarm(alarm) => f.debug_tuple("AddAlarm").field(&alarm.id()).finish(),
            Command::CancelAlarm(id) => f.debug_tuple("CancelAlarm").field(id).finish(),
        }
    }
}

/// FIFO buffer of pending mutations
#[derive(Debug, Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity for insertion at the front layer. The id is valid
    /// immediately but only resolves once the queue is applied.
    pub fn spawn(&mut self, entity: Box<dyn Entity>, x: f32, y: f32) -> EntityId {
        self.spawn_at_layer(entity, x, y, FRONT_LAYER)
    }

    pub fn spawn_at_layer(&mut self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> EntityId {
        let id = EntityId::new();
        self.queue.push(Command::Spawn {
            id,
            entity,
            x,
            y,
            layer,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) {
        self.queue.push(Command::Despawn(id));
    }

    pub fn add_alarm(&mut self, alarm: Alarm) -> AlarmId {
        let id = alarm.id();
        self.queue.push(Command::AddAlarm(alarm));
        id
    }

    pub fn cancel_alarm(&mut self, id: AlarmId) {
        self.queue.push(Command::CancelAlarm(id));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued command, leaving the buffer empty
    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.queue.drain(..)
    }
}
