//! Integration tests for the engine facade running a real loop thread
//!
//! These verify:
//! - pause stops entity updates completely and resume continues them
//! - the facade state machine, including teardown
//! - alarms die with the entity or flag that owns them
//! - a panic in the game hook reaches the thread that stops the loop

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tile_engine::core::config::EngineConfig;
use tile_engine::core::error::{EngineError, Result};
use tile_engine::core::types::Tick;
use tile_engine::ecs::World;
use tile_engine::engine::{frame_channel, Engine, EngineState, FrameInfo, Game, RenderTarget};
use tile_engine::entity::{Body, Entity, EntityKind, UpdateContext};
use tile_engine::simulation::{Alarm, AlarmOwner, LoopState};

const COUNTER: EntityKind = EntityKind("counter");

/// Counts its own updates in a field and mirrors the count outside
struct Counter {
    body: Body,
    seen: usize,
    mirror: Arc<AtomicUsize>,
}

impl Counter {
    fn boxed() -> (Box<dyn Entity>, Arc<AtomicUsize>) {
        let mirror = Arc::new(AtomicUsize::new(0));
        let counter = Counter {
            body: Body::new(2.0, 2.0),
            seen: 0,
            mirror: Arc::clone(&mirror),
        };
        (Box::new(counter), mirror)
    }
}

impl Entity for Counter {
    fn kind(&self) -> EntityKind {
        COUNTER
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {
        self.seen += 1;
        self.mirror.store(self.seen, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Quiet;

impl Game for Quiet {}

/// Panics in the game hook once the world reaches `at`
struct Fragile {
    at: Tick,
}

impl Game for Fragile {
    fn update(&mut self, world: &mut World) {
        if world.current_tick == self.at {
            panic!("game hook failed at tick {}", self.at);
        }
    }
}

struct FailingSetup;

impl Game for FailingSetup {
    fn initialize(&mut self, _world: &mut World) -> Result<()> {
        Err(EngineError::Config("missing assets".into()))
    }
}

struct CountingTarget(AtomicUsize);

impl RenderTarget for CountingTarget {
    fn frame_ready(&self, _frame: FrameInfo) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.game_loop.target_tps = 1000;
    config
}

fn running<G: Game>(game: G) -> Engine<G> {
    let (signal, _frames) = frame_channel();
    let mut engine = Engine::new(fast_config(), game)
        .unwrap()
        .with_render_target(Arc::new(signal));
    engine.on_create().unwrap();
    engine
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        thread::sleep(Duration::from_millis(1));
    }
}

fn current_tick<G: Game>(engine: &Engine<G>) -> Tick {
    engine.world().read().unwrap().current_tick
}

// ============================================================================
// Pause and resume
// ============================================================================

#[test]
fn test_no_updates_while_paused() {
    let mut engine = running(Quiet);
    let (counter, updates) = Counter::boxed();
    let id = engine.add_entity(counter, 0.0, 0.0).unwrap();

    engine.start_game().unwrap();
    wait_until(|| updates.load(Ordering::SeqCst) >= 5);

    engine.pause_game().unwrap();
    assert_eq!(engine.state(), EngineState::Paused);
    assert_eq!(engine.loop_state(), LoopState::Paused);
    let paused_at = updates.load(Ordering::SeqCst);
    let paused_tick = current_tick(&engine);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(updates.load(Ordering::SeqCst), paused_at);
    assert_eq!(current_tick(&engine), paused_tick);

    engine.resume_game().unwrap();
    wait_until(|| updates.load(Ordering::SeqCst) >= paused_at + 5);

    // Same entity, state carried across the pause
    assert_eq!(engine.entities_of_kind(COUNTER).unwrap(), vec![id]);
    engine.end_game().unwrap();
    assert_eq!(updates.load(Ordering::SeqCst) as Tick, current_tick(&engine));
}

#[test]
fn test_render_target_sees_every_tick() {
    let target = Arc::new(CountingTarget(AtomicUsize::new(0)));
    let mut engine = Engine::new(fast_config(), Quiet)
        .unwrap()
        .with_render_target(Arc::clone(&target) as Arc<dyn RenderTarget>);
    engine.on_create().unwrap();

    engine.start_game().unwrap();
    wait_until(|| current_tick(&engine) >= 10);
    engine.end_game().unwrap();

    assert_eq!(target.0.load(Ordering::SeqCst) as Tick, current_tick(&engine));
    assert_eq!(engine.tick_metrics().total_ticks, current_tick(&engine));
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn test_full_host_lifecycle() {
    let (signal, _frames) = frame_channel();
    let mut engine = Engine::new(fast_config(), Quiet)
        .unwrap()
        .with_render_target(Arc::new(signal))
        .with_initial_map(vec![vec![1, 1], vec![1, 1]], 0.0, 0.0);
    assert_eq!(engine.state(), EngineState::Created);
    assert_eq!(engine.loop_state(), LoopState::NotStarted);

    engine.on_create().unwrap();
    assert_eq!(engine.state(), EngineState::Initialized);
    assert_eq!(engine.map_width().unwrap(), 64.0);

    engine.on_resume().unwrap();
    assert_eq!(engine.state(), EngineState::Running);

    engine.on_pause().unwrap();
    assert_eq!(engine.state(), EngineState::Paused);

    engine.on_resume().unwrap();
    assert_eq!(engine.state(), EngineState::Running);
    wait_until(|| current_tick(&engine) >= 2);

    engine.on_destroy().unwrap();
    assert_eq!(engine.state(), EngineState::Destroyed);
    assert_eq!(engine.loop_state(), LoopState::Terminated);
    assert!(matches!(engine.on_resume(), Err(EngineError::Destroyed)));
    assert!(matches!(engine.map_width(), Err(EngineError::Destroyed)));
}

#[test]
fn test_start_requires_initialization() {
    let (signal, _frames) = frame_channel();
    let mut engine = Engine::new(fast_config(), Quiet)
        .unwrap()
        .with_render_target(Arc::new(signal));

    assert!(matches!(
        engine.start_game(),
        Err(EngineError::InvalidTransition {
            from: EngineState::Created,
            to: EngineState::Running
        })
    ));
    assert_eq!(engine.loop_state(), LoopState::NotStarted);
}

#[test]
fn test_failed_setup_leaves_engine_created() {
    let (signal, _frames) = frame_channel();
    let mut engine = Engine::new(fast_config(), FailingSetup)
        .unwrap()
        .with_render_target(Arc::new(signal))
        .with_initial_map(vec![vec![1]], 0.0, 0.0);

    assert!(matches!(engine.on_create(), Err(EngineError::Config(_))));
    assert_eq!(engine.state(), EngineState::Created);
    assert_eq!(engine.map_width().unwrap(), 0.0);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let mut config = EngineConfig::default();
    config.tiles.tile_size = 0.0;
    assert!(matches!(
        Engine::new(config, Quiet),
        Err(EngineError::InvalidTileSize(_))
    ));
}

#[test]
fn test_engines_do_not_share_state() {
    let first = running(Quiet);
    let second = running(Quiet);

    first.add_entity(Counter::boxed().0, 0.0, 0.0).unwrap();
    first.load_tile_map(vec![vec![1, 2, 3]], 0.0, 0.0).unwrap();

    assert_eq!(first.entity_count().unwrap(), 1);
    assert_eq!(second.entity_count().unwrap(), 0);
    assert_eq!(second.map_width().unwrap(), 0.0);
}

// ============================================================================
// Alarm ownership
// ============================================================================

#[test]
fn test_alarm_stops_with_owning_entity() {
    let mut engine = running(Quiet);
    let (counter, _) = Counter::boxed();
    let owner = engine.add_entity(counter, 0.0, 0.0).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_alarm = Arc::clone(&fired);
    engine
        .add_alarm(
            Alarm::repeating(1, move |_| {
                fired_in_alarm.fetch_add(1, Ordering::SeqCst);
            })
            .owned_by(AlarmOwner::Entity(owner)),
        )
        .unwrap();

    engine.start_game().unwrap();
    wait_until(|| fired.load(Ordering::SeqCst) >= 3);

    engine.pause_game().unwrap();
    assert!(engine.remove_entity(owner).unwrap().is_some());
    let fired_at_removal = fired.load(Ordering::SeqCst);
    let removal_tick = current_tick(&engine);

    engine.resume_game().unwrap();
    wait_until(|| current_tick(&engine) >= removal_tick + 3);
    engine.end_game().unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), fired_at_removal);
    assert!(engine.world().read().unwrap().alarms.is_empty());
}

#[test]
fn test_alarm_stops_when_flag_cleared() {
    let mut engine = running(Quiet);
    let alive = Arc::new(AtomicBool::new(true));
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_alarm = Arc::clone(&fired);
    let alarm = engine
        .add_alarm(
            Alarm::repeating(2, move |_| {
                fired_in_alarm.fetch_add(1, Ordering::SeqCst);
            })
            .owned_by(AlarmOwner::Flag(Arc::clone(&alive))),
        )
        .unwrap();

    engine.start_game().unwrap();
    wait_until(|| fired.load(Ordering::SeqCst) >= 2);
    alive.store(false, Ordering::SeqCst);
    wait_until(|| !engine.world().read().unwrap().alarms.contains(alarm));

    let after = fired.load(Ordering::SeqCst);
    let tick = current_tick(&engine);
    wait_until(|| current_tick(&engine) >= tick + 4);
    assert_eq!(fired.load(Ordering::SeqCst), after);
}

#[test]
fn test_one_shot_alarm_spawns_from_loop() {
    let mut engine = running(Quiet);
    engine
        .add_alarm(Alarm::once(3, |ctx| {
            ctx.commands.spawn(Counter::boxed().0, 5.0, 5.0);
        }))
        .unwrap();

    engine.start_game().unwrap();
    wait_until(|| current_tick(&engine) >= 6);
    engine.pause_game().unwrap();

    assert_eq!(engine.entities_of_kind(COUNTER).unwrap().len(), 1);
    assert!(engine.world().read().unwrap().alarms.is_empty());
}

// ============================================================================
// Failure propagation
// ============================================================================

#[test]
fn test_game_hook_panic_reaches_controller() {
    let mut engine = running(Fragile { at: 3 });
    engine.start_game().unwrap();
    wait_until(|| engine.loop_state() == LoopState::Terminated);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.end_game()));
    let payload = outcome.expect_err("panic should be re-raised");
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert_eq!(message, "game hook failed at tick 3");
}
