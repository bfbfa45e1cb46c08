//! Engine facade and the interfaces it drives
//!
//! The [`Engine`] binds the game loop, the shared world and the host's
//! collaborators (surface, input, audio, renderer) to one lifecycle.

pub mod facade;
pub mod game;
pub mod host;
pub mod render;

pub use facade::Engine;
pub use game::Game;
pub use host::{AudioSink, HostSurface, InputEvent, InputSource, Orientation, TouchPhase};
pub use render::{frame_channel, FrameInfo, FrameReceiver, FrameSignal, RenderSettings, RenderTarget};

/// Lifecycle of an [`Engine`], mirroring the host's
///
/// `Created -> Initialized -> Running <-> Paused -> Destroyed`. Any live state
/// may go straight to `Destroyed`; nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Initialized,
    Running,
    Paused,
    Destroyed,
}

impl EngineState {
    pub fn can_transition_to(self, next: EngineState) -> bool {
        use EngineState::*;
        match (self, next) {
            (Destroyed, _) => false,
            (_, Destroyed) => true,
            (Created, Initialized) | (Initialized, Running) | (Running, Paused) | (Paused, Running) => true,
            _ => false,
        }
    }

    pub fn is_live(self) -> bool {
        self != EngineState::Destroyed
    }
}
