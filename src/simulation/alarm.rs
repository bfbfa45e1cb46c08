//! Timed callbacks ("alarms") counted in ticks
//!
//! An alarm counts down once per tick. When it reaches zero its action runs;
//! a repeating alarm then rewinds to its full duration, a one-shot alarm
//! expires. Every alarm is bound to an owner whose liveness is checked on
//! every pass: once the owner is gone the alarm is dropped at the end of that
//! pass without firing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::types::{AlarmId, EntityId, Tick};
use crate::entity::registry::EntityRegistry;
use crate::simulation::commands::Commands;

/// Who keeps an alarm alive
#[derive(Debug, Clone)]
pub enum AlarmOwner {
    /// Lives until cancelled or expired
    Engine,
    /// Lives while the entity is registered and active
    Entity(EntityId),
    /// Lives while the flag is set
    Flag(Arc<AtomicBool>),
}

impl AlarmOwner {
    pub fn is_alive(&self, entities: &EntityRegistry) -> bool {
        match self {
            AlarmOwner::Engine => true,
            AlarmOwner::Entity(id) => entities.is_active(*id),
            AlarmOwner::Flag(flag) => flag.load(Ordering::Acquire),
        }
    }
}

/// Passed to an alarm action when it fires
pub struct AlarmContext<'a> {
    pub id: AlarmId,
    pub tick: Tick,
    /// How many times this alarm has fired, including this one
    pub fired: u64,
    pub commands: &'a mut Commands,
}

type AlarmAction = Box<dyn FnMut(&mut AlarmContext<'_>) + Send + Sync>;

pub struct Alarm {
    id: AlarmId,
    duration: u32,
    remaining: u32,
    repeating: bool,
    expired: bool,
    fired: u64,
    owner: AlarmOwner,
    action: AlarmAction,
}

impl std::fmt::Debug for Alarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alarm")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("remaining", &self.remaining)
            .field("repeating", &self.repeating)
            .field("expired", &self.expired)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Alarm {
    /// Fires once, `ticks` ticks from now. A zero duration counts as one tick.
    pub fn once<F>(ticks: u32, action: F) -> Self
    where
        F: FnMut(&mut AlarmContext<'_>) + Send + Sync + 'static,
    {
        Self::build(ticks, false, Box::new(action))
    }

    /// Fires every `ticks` ticks until cancelled or orphaned
    pub fn repeating<F>(ticks: u32, action: F) -> Self
    where
        F: FnMut(&mut AlarmContext<'_>) + Send + Sync + 'static,
    {
        Self::build(ticks, true, Box::new(action))
    }

    fn build(ticks: u32, repeating: bool, action: AlarmAction) -> Self {
        let duration = ticks.max(1);
        Self {
            id: AlarmId::new(),
            duration,
            remaining: duration,
            repeating,
            expired: false,
            fired: 0,
            owner: AlarmOwner::Engine,
            action,
        }
    }

    pub fn owned_by(mut self, owner: AlarmOwner) -> Self {
        self.owner = owner;
        self
    }

    pub fn id(&self) -> AlarmId {
        self.id
    }

    pub fn owner(&self) -> &AlarmOwner {
        &self.owner
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Advance one tick, firing the action on zero
    pub fn update(&mut self, tick: Tick, commands: &mut Commands) {
        if self.expired {
            return;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return;
        }

        self.fired += 1;
        let mut ctx = AlarmContext {
            id: self.id,
            tick,
            fired: self.fired,
            commands,
        };
        (self.action)(&mut ctx);

        if self.repeating {
            self.remaining = self.duration;
        } else {
            self.expired = true;
        }
    }
}

/// Live alarms in registration order
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarms: Vec<Alarm>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alarm: Alarm) -> AlarmId {
        let id = alarm.id();
        tracing::trace!(?id, duration = alarm.duration, repeating = alarm.repeating, "alarm added");
        self.alarms.push(alarm);
        id
    }

    /// Drop an alarm before it fires. Returns false if it was not registered.
    pub fn cancel(&mut self, id: AlarmId) -> bool {
        let before = self.alarms.len();
        self.alarms.retain(|alarm| alarm.id != id);
        before != self.alarms.len()
    }

    pub fn remove_all(&mut self) {
        self.alarms.clear();
    }

    /// One drain pass
    ///
    /// Owners are consulted for every alarm on every pass. Alarms whose owner
    /// is gone are skipped, and they are removed together with expired alarms
    /// after the pass, never in the middle of it. Returns the number removed.
    pub fn update_all(&mut self, entities: &EntityRegistry, tick: Tick, commands: &mut Commands) -> usize {
        let mut orphaned = Vec::new();
        for alarm in self.alarms.iter_mut() {
            if alarm.owner.is_alive(entities) {
                alarm.update(tick, commands);
            } else {
                orphaned.push(alarm.id);
            }
        }

        let before = self.alarms.len();
        self.alarms
            .retain(|alarm| !alarm.expired && !orphaned.contains(&alarm.id));
        before - self.alarms.len()
    }

    pub fn contains(&self, id: AlarmId) -> bool {
        self.alarms.iter().any(|alarm| alarm.id == id)
    }

    pub fn get(&self, id: AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }
}
