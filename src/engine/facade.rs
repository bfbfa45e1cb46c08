//! Engine facade
//!
//! One [`Engine`] owns one world, one loop thread and the host collaborators.
//! Nothing is process-global, so several engines can coexist (tests rely on
//! this).
//!
//! Lock order is always simulation, then world. The loop thread takes them in
//! that order every tick; facade calls that need both do the same.

use std::sync::{Arc, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::{AlarmId, EntityId, Rect, TileCode, Vec2};
use crate::ecs::world::{World, WorldHandle};
use crate::engine::game::Game;
use crate::engine::host::{AudioSink, HostSurface, InputEvent, InputSource, Orientation};
use crate::engine::render::RenderTarget;
use crate::engine::EngineState;
use crate::entity::registry::FRONT_LAYER;
use crate::entity::{Entity, EntityKind};
use crate::simulation::alarm::Alarm;
use crate::simulation::game_loop::{GameLoop, LoopState};
use crate::simulation::metrics::TickMetrics;
use crate::simulation::tick::Stepper;
use crate::spatial::query::QueryHits;

struct InitialMap {
    codes: Vec<Vec<TileCode>>,
    origin: Vec2,
}

pub struct Engine<G: Game> {
    config: EngineConfig,
    state: EngineState,
    world: WorldHandle,
    game_loop: GameLoop<Stepper<G>>,
    surface: Option<Box<dyn HostSurface>>,
    inputs: Vec<Box<dyn InputSource>>,
    inputs_registered: bool,
    audio: Vec<Box<dyn AudioSink>>,
    initial_map: Option<InitialMap>,
    screen: (u32, u32),
}

impl<G: Game> Engine<G> {
    pub fn new(config: EngineConfig, game: G) -> Result<Self> {
        config.validate()?;
        let world = WorldHandle::new(World::new(&config));
        let game_loop = GameLoop::new(config.game_loop.clone(), Stepper::new(world.clone(), game));

        Ok(Self {
            config,
            state: EngineState::Created,
            world,
            game_loop,
            surface: None,
            inputs: Vec::new(),
            inputs_registered: false,
            audio: Vec::new(),
            initial_map: None,
            screen: (0, 0),
        })
    }

    pub fn with_render_target(mut self, target: Arc<dyn RenderTarget>) -> Self {
        self.set_render_target(target);
        self
    }

    pub fn with_surface(mut self, surface: Box<dyn HostSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioSink>) -> Self {
        self.audio.push(audio);
        self
    }

    /// Map loaded right after [`Game::initialize`] during [`Engine::on_create`]
    pub fn with_initial_map(mut self, codes: Vec<Vec<TileCode>>, x: f32, y: f32) -> Self {
        self.initial_map = Some(InitialMap {
            codes,
            origin: Vec2::new(x, y),
        });
        self
    }

    /// Takes effect the next time the loop thread is spawned
    pub fn set_render_target(&mut self, target: Arc<dyn RenderTarget>) {
        self.game_loop.set_render_target(target);
    }

    // ------------------------------------------------------------------
    // Host lifecycle
    // ------------------------------------------------------------------

    /// `Created -> Initialized`
    ///
    /// Configures the surface, runs the setup hook once, then loads the
    /// initial map if one was given. On error the engine stays `Created`.
    pub fn on_create(&mut self) -> Result<()> {
        self.check_transition(EngineState::Initialized)?;

        if let Some(surface) = self.surface.as_mut() {
            if self.config.display.fullscreen {
                surface.request_fullscreen();
            }
            surface.request_orientation(Orientation::from_landscape(self.config.display.landscape));
            self.screen = surface.screen_size();
        }

        {
            let mut stepper = self
                .game_loop
                .simulation()
                .lock()
                .map_err(|_| EngineError::Poisoned("simulation"))?;
            let mut world = self.world.write()?;
            stepper.game_mut().initialize(&mut world)?;
            if let Some(map) = self.initial_map.take() {
                world.load_tile_map(map.codes, map.origin.x, map.origin.y)?;
            }
        }

        self.set_state(EngineState::Initialized);
        Ok(())
    }

    /// Re-register inputs, run the loop, resume audio
    pub fn on_resume(&mut self) -> Result<()> {
        match self.state {
            EngineState::Destroyed => return Err(EngineError::Destroyed),
            EngineState::Created => {
                return Err(EngineError::InvalidTransition {
                    from: EngineState::Created,
                    to: EngineState::Running,
                })
            }
            _ => {}
        }

        self.register_inputs();
        self.start_game()?;
        for sink in &mut self.audio {
            sink.resume();
        }
        Ok(())
    }

    /// Unregister inputs, park the loop, pause audio
    pub fn on_pause(&mut self) -> Result<()> {
        match self.state {
            EngineState::Destroyed => return Err(EngineError::Destroyed),
            EngineState::Created => {
                return Err(EngineError::InvalidTransition {
                    from: EngineState::Created,
                    to: EngineState::Paused,
                })
            }
            _ => {}
        }

        self.unregister_inputs();
        self.pause_game()?;
        for sink in &mut self.audio {
            sink.pause();
        }
        Ok(())
    }

    /// Stop and join the loop, release audio and drop all world state
    ///
    /// Safe to call more than once. Re-raises a panic that killed the loop.
    pub fn on_destroy(&mut self) -> Result<()> {
        if self.state.is_live() {
            return self.end_game();
        }
        self.release_resources()
    }

    // ------------------------------------------------------------------
    // Game control
    // ------------------------------------------------------------------

    /// Start ticking from `Initialized` or `Paused`
    ///
    /// Fails with [`EngineError::NoRenderTarget`] when no renderer is attached;
    /// the state is left unchanged.
    pub fn start_game(&mut self) -> Result<()> {
        if self.state == EngineState::Running {
            return self.game_loop.start();
        }
        self.check_transition(EngineState::Running)?;
        self.game_loop.start()?;
        self.set_state(EngineState::Running);
        Ok(())
    }

    /// Park the loop. Once this returns no further tick begins.
    pub fn pause_game(&mut self) -> Result<()> {
        match self.state {
            EngineState::Running => {
                self.game_loop.pause();
                self.set_state(EngineState::Paused);
                Ok(())
            }
            EngineState::Paused | EngineState::Initialized => Ok(()),
            EngineState::Created => Err(EngineError::InvalidTransition {
                from: EngineState::Created,
                to: EngineState::Paused,
            }),
            EngineState::Destroyed => Err(EngineError::Destroyed),
        }
    }

    pub fn resume_game(&mut self) -> Result<()> {
        self.start_game()
    }

    /// Stop the loop for good and release everything the engine owns
    pub fn end_game(&mut self) -> Result<()> {
        self.check_transition(EngineState::Destroyed)?;
        self.game_loop.stop();
        self.set_state(EngineState::Destroyed);
        self.release_resources()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn add_entity(&self, entity: Box<dyn Entity>, x: f32, y: f32) -> Result<EntityId> {
        Ok(self.write()?.add_entity(entity, x, y))
    }

    pub fn add_entity_at_layer(&self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> Result<EntityId> {
        Ok(self.write()?.add_entity_at_layer(entity, x, y, layer))
    }

    pub fn add_entities<I>(&self, entities: I) -> Result<Vec<EntityId>>
    where
        I: IntoIterator<Item = Box<dyn Entity>>,
    {
        Ok(self.write()?.add_entities(entities))
    }

    /// Add the viewport anchor at the front layer
    pub fn add_player(&self, entity: Box<dyn Entity>, x: f32, y: f32) -> Result<EntityId> {
        self.add_player_at_layer(entity, x, y, FRONT_LAYER)
    }

    pub fn add_player_at_layer(&self, entity: Box<dyn Entity>, x: f32, y: f32, layer: f32) -> Result<EntityId> {
        Ok(self.write()?.add_player(entity, x, y, layer))
    }

    /// `Ok(None)` if the entity was not registered
    pub fn remove_entity(&self, id: EntityId) -> Result<Option<Box<dyn Entity>>> {
        Ok(self.write()?.remove_entity(id))
    }

    pub fn remove_all_entities(&self) -> Result<()> {
        self.write()?.remove_all_entities();
        Ok(())
    }

    pub fn remove_entities_of_kind(&self, kind: EntityKind) -> Result<usize> {
        Ok(self.write()?.remove_entities_of_kind(kind))
    }

    pub fn add_alarm(&self, alarm: Alarm) -> Result<AlarmId> {
        Ok(self.write()?.add_alarm(alarm))
    }

    pub fn cancel_alarm(&self, id: AlarmId) -> Result<bool> {
        Ok(self.write()?.cancel_alarm(id))
    }

    pub fn remove_all_alarms(&self) -> Result<()> {
        self.write()?.remove_all_alarms();
        Ok(())
    }

    pub fn load_tile_map(&self, codes: Vec<Vec<TileCode>>, x: f32, y: f32) -> Result<()> {
        self.write()?.load_tile_map(codes, x, y)
    }

    // ------------------------------------------------------------------
    // Render settings
    // ------------------------------------------------------------------

    pub fn set_background_image(&self, name: impl Into<String>) -> Result<()> {
        self.write()?.render.background_image = Some(name.into());
        Ok(())
    }

    pub fn clear_background_image(&self) -> Result<()> {
        self.write()?.render.background_image = None;
        Ok(())
    }

    pub fn set_background_color(&self, argb: u32) -> Result<()> {
        self.write()?.render.background_color = argb;
        Ok(())
    }

    pub fn set_zoom_factor(&self, zoom: f32) -> Result<()> {
        self.write()?.render.set_zoom(zoom)
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Forward an event to [`Game::on_input`] between two ticks
    pub fn dispatch_input(&self, event: InputEvent) -> Result<()> {
        self.live()?;
        let mut stepper = self.stepper()?;
        let mut world = self.world.write()?;
        stepper.game_mut().on_input(&mut world, event);
        Ok(())
    }

    /// Run `f` against the game between two ticks
    pub fn with_game<R>(&self, f: impl FnOnce(&mut G) -> R) -> Result<R> {
        let mut stepper = self.stepper()?;
        Ok(f(stepper.game_mut()))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn find_entities_in_rect(&self, rect: Rect) -> Result<Vec<EntityId>> {
        Ok(self.read()?.find_entities_in_rect(rect))
    }

    pub fn find_tiles_in_rect(&self, rect: Rect) -> Result<Vec<TileCode>> {
        Ok(self.read()?.find_tiles_in_rect(rect))
    }

    /// Entities and tiles under `rect` from one consistent snapshot
    pub fn query_rect(&self, rect: Rect) -> Result<QueryHits> {
        Ok(self.read()?.query_rect(rect))
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> Result<Vec<EntityId>> {
        Ok(self.read()?.entities_of_kind(kind))
    }

    pub fn entity_count(&self) -> Result<usize> {
        Ok(self.read()?.entity_count())
    }

    pub fn map_width(&self) -> Result<f32> {
        Ok(self.read()?.map_width())
    }

    pub fn map_height(&self) -> Result<f32> {
        Ok(self.read()?.map_height())
    }

    /// Zero until `on_create` has asked the surface
    pub fn screen_width(&self) -> u32 {
        self.screen.0
    }

    pub fn screen_height(&self) -> u32 {
        self.screen.1
    }

    pub fn player(&self) -> Result<Option<EntityId>> {
        Ok(self.read()?.player())
    }

    pub fn player_position(&self) -> Result<Option<Vec2>> {
        Ok(self.read()?.player_position())
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn loop_state(&self) -> LoopState {
        self.game_loop.state()
    }

    pub fn tick_metrics(&self) -> TickMetrics {
        self.game_loop.metrics()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared world handle, for renderers
    pub fn world(&self) -> &WorldHandle {
        &self.world
    }

    // ------------------------------------------------------------------

    fn live(&self) -> Result<()> {
        if self.state.is_live() {
            Ok(())
        } else {
            Err(EngineError::Destroyed)
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, World>> {
        self.live()?;
        self.world.read()
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, World>> {
        self.live()?;
        self.world.write()
    }

    fn stepper(&self) -> Result<MutexGuard<'_, Stepper<G>>> {
        self.game_loop
            .simulation()
            .lock()
            .map_err(|_| EngineError::Poisoned("simulation"))
    }

    fn check_transition(&self, next: EngineState) -> Result<()> {
        if !self.state.is_live() {
            return Err(EngineError::Destroyed);
        }
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        Ok(())
    }

    fn set_state(&mut self, next: EngineState) {
        tracing::info!(from = ?self.state, to = ?next, "engine state changed");
        self.state = next;
    }

    fn register_inputs(&mut self) {
        if self.inputs_registered {
            return;
        }
        for input in &mut self.inputs {
            input.register();
        }
        self.inputs_registered = true;
    }

    fn unregister_inputs(&mut self) {
        if !self.inputs_registered {
            return;
        }
        for input in &mut self.inputs {
            input.unregister();
        }
        self.inputs_registered = false;
    }

    fn release_resources(&mut self) -> Result<()> {
        self.unregister_inputs();
        for mut sink in self.audio.drain(..) {
            sink.release();
        }
        self.world.write()?.clear();
        Ok(())
    }
}
