//! Fixed-cadence game loop on a dedicated thread
//!
//! The loop repeatedly:
//! 1. waits while paused (the thread stays alive, parked on a condvar),
//! 2. runs one [`Simulation::tick`] to completion,
//! 3. signals the render target,
//! 4. sleeps the rest of the tick budget, waking early on pause or stop.
//!
//! Pause and stop requests are observed between ticks only; a tick in flight
//! always finishes. The loop never inspects raw thread status to decide what
//! to do on resume: the thread publishes its exit into the shared control
//! block, [`GameLoop::state`] reports an explicit [`LoopState`] derived from
//! it, and `start` spawns or signals accordingly.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::config::LoopConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::Tick;
use crate::engine::render::{FrameInfo, RenderTarget};
use crate::simulation::metrics::TickMetrics;

/// Work performed once per tick on the loop thread
pub trait Simulation: Send + 'static {
    /// Run one tick. Returns the number of ticks completed so far.
    ///
    /// An `Err` stops the loop; a panic kills the loop thread and is re-raised
    /// on the thread that next stops or restarts the loop.
    fn tick(&mut self) -> Result<Tick>;
}

/// Lifecycle of the loop thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
    /// Thread alive and parked; no ticks run
    Paused,
    /// Thread exited (stopped, failed or panicked)
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Run,
    Pause,
    Shutdown,
}

#[derive(Debug)]
struct ControlState {
    request: Request,
    parked: bool,
    /// Set by the loop thread on its way out, including on panic
    exited: bool,
}

/// Requests from the controlling thread and acknowledgements from the loop
#[derive(Debug)]
struct Control {
    state: Mutex<ControlState>,
    signal: Condvar,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                request: Request::Run,
                parked: false,
                exited: false,
            }),
            signal: Condvar::new(),
        }
    }

    // The control state is plain data and never left half-written, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, request: Request) {
        let mut state = self.lock();
        state.request = request;
        if request != Request::Pause {
            state.parked = false;
        }
        self.signal.notify_all();
    }

    /// Block while paused. Returns false once shutdown is requested.
    fn wait_for_run(&self) -> bool {
        let mut state = self.lock();
        loop {
            match state.request {
                Request::Run => {
                    state.parked = false;
                    return true;
                }
                Request::Shutdown => return false,
                Request::Pause => {
                    if !state.parked {
                        state.parked = true;
                        self.signal.notify_all();
                        tracing::debug!("game loop parked");
                    }
                    state = self
                        .signal
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn mark_exited(&self) {
        self.lock().exited = true;
        self.signal.notify_all();
    }

    /// Sleep up to `duration`, returning early if anything but Run is requested
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        while state.request == Request::Run {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .signal
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }
}

/// Publishes the loop thread's exit when dropped, so unwinding counts too
struct ExitGuard<'a>(&'a Control);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Owner of the simulation thread
pub struct GameLoop<S: Simulation> {
    config: LoopConfig,
    simulation: Arc<Mutex<S>>,
    target: Option<Arc<dyn RenderTarget>>,
    control: Arc<Control>,
    metrics: Arc<Mutex<TickMetrics>>,
    handle: Option<JoinHandle<()>>,
    started: bool,
}

impl<S: Simulation> GameLoop<S> {
    pub fn new(config: LoopConfig, simulation: S) -> Self {
        Self {
            config,
            simulation: Arc::new(Mutex::new(simulation)),
            target: None,
            control: Arc::new(Control::new()),
            metrics: Arc::new(Mutex::new(TickMetrics::new())),
            handle: None,
            started: false,
        }
    }

    /// Takes effect the next time a thread is spawned
    pub fn set_render_target(&mut self, target: Arc<dyn RenderTarget>) {
        self.target = Some(target);
    }

    pub fn has_render_target(&self) -> bool {
        self.target.is_some()
    }

    /// The simulation, shared with the loop thread
    pub fn simulation(&self) -> &Arc<Mutex<S>> {
        &self.simulation
    }

    pub fn state(&self) -> LoopState {
        if self.handle.is_none() {
            return if self.started {
                LoopState::Terminated
            } else {
                LoopState::NotStarted
            };
        }
        let control = self.control.lock();
        if control.exited {
            return LoopState::Terminated;
        }
        match control.request {
            Request::Run => LoopState::Running,
            Request::Pause => LoopState::Paused,
            Request::Shutdown => LoopState::Terminated,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Snapshot of tick timing
    pub fn metrics(&self) -> TickMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start ticking
    ///
    /// No-op while running, signals a parked thread, and spawns a fresh
    /// thread when none is alive. Fails without a render target.
    pub fn start(&mut self) -> Result<()> {
        let Some(target) = self.target.clone() else {
            return Err(EngineError::NoRenderTarget);
        };

        match self.state() {
            LoopState::Running => Ok(()),
            LoopState::Paused => {
                tracing::debug!("game loop resumed");
                self.control.request(Request::Run);
                Ok(())
            }
            LoopState::NotStarted | LoopState::Terminated => {
                self.reap();
                self.spawn(target)
            }
        }
    }

    /// `true` starts or resumes, `false` pauses
    pub fn set_running(&mut self, running: bool) -> Result<()> {
        if running {
            self.start()
        } else {
            self.pause();
            Ok(())
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        self.start()
    }

    /// Park the loop thread
    ///
    /// Returns once the thread has parked (or exited), so no tick begins
    /// after this call. A tick already in flight completes first.
    pub fn pause(&mut self) {
        if self.state() != LoopState::Running {
            return;
        }
        self.control.request(Request::Pause);
        if self.on_loop_thread() {
            return;
        }

        let recheck = Duration::from_millis(self.config.pause_ack_timeout_ms.max(1));
        let mut state = self.control.lock();
        while !state.parked && !state.exited && state.request == Request::Pause {
            let (guard, _) = self
                .control
                .signal
                .wait_timeout(state, recheck)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        tracing::debug!("game loop paused");
    }

    /// Stop and join the loop thread
    ///
    /// Re-raises a panic that escaped the simulation.
    pub fn stop(&mut self) {
        self.control.request(Request::Shutdown);
        self.reap();
    }

    fn reap(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if let Err(payload) = handle.join() {
            tracing::error!("game loop thread panicked");
            std::panic::resume_unwind(payload);
        }
        tracing::debug!("game loop thread joined");
    }

    fn spawn(&mut self, target: Arc<dyn RenderTarget>) -> Result<()> {
        self.control.lock().exited = false;
        self.control.request(Request::Run);

        let simulation = Arc::clone(&self.simulation);
        let control = Arc::clone(&self.control);
        let metrics = Arc::clone(&self.metrics);
        let budget = self.config.tick_budget();

        let handle = thread::Builder::new()
            .name("game-loop".into())
            .spawn(move || run_loop(simulation, target, control, metrics, budget))?;

        self.handle = Some(handle);
        self.started = true;
        tracing::debug!(?budget, "game loop thread spawned");
        Ok(())
    }

    fn on_loop_thread(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }
}

impl<S: Simulation> Drop for GameLoop<S> {
    fn drop(&mut self) {
        self.control.request(Request::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("game loop thread panicked before shutdown");
            }
        }
    }
}

fn run_loop<S: Simulation>(
    simulation: Arc<Mutex<S>>,
    target: Arc<dyn RenderTarget>,
    control: Arc<Control>,
    metrics: Arc<Mutex<TickMetrics>>,
    budget: Option<Duration>,
) {
    let _exit = ExitGuard(&control);
    tracing::debug!("game loop thread started");

    while control.wait_for_run() {
        let started = Instant::now();

        let tick = {
            let Ok(mut simulation) = simulation.lock() else {
                tracing::error!("simulation lock poisoned, stopping game loop");
                break;
            };
            match simulation.tick() {
                Ok(tick) => tick,
                Err(err) => {
                    tracing::error!(%err, "simulation tick failed, stopping game loop");
                    break;
                }
            }
        };

        let tick_time = started.elapsed();
        metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_tick(tick_time);
        target.frame_ready(FrameInfo { tick, tick_time });

        if let Some(rest) = budget.and_then(|budget| budget.checked_sub(started.elapsed())) {
            control.sleep(rest);
        }
    }

    tracing::debug!("game loop thread exiting");
}
