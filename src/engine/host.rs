//! Host-side collaborators
//!
//! The engine only tells these when to start and stop. What a surface, an
//! input device or an audio device actually does is up to the host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn from_landscape(landscape: bool) -> Self {
        if landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

/// Raw input forwarded to [`Game::on_input`](crate::engine::Game::on_input)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Touch { x: f32, y: f32, phase: TouchPhase },
    Key(u32),
    /// Accelerometer-style reading
    Motion { x: f32, y: f32, z: f32 },
}

/// Window or screen the game is shown on
pub trait HostSurface: Send {
    fn request_fullscreen(&mut self);

    fn request_orientation(&mut self, orientation: Orientation);

    /// Width and height in pixels
    fn screen_size(&self) -> (u32, u32);
}

/// Device whose listeners are attached only while the engine is in the foreground
pub trait InputSource: Send {
    fn register(&mut self);

    fn unregister(&mut self);
}

pub trait AudioSink: Send {
    fn resume(&mut self);

    fn pause(&mut self);

    /// Final teardown; the sink is not used again
    fn release(&mut self);
}
