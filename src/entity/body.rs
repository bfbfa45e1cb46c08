//! Spatial state shared by every entity

use serde::{Deserialize, Serialize};

use crate::core::types::{Rect, Vec2};

/// Position, extent and liveness of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Top-left corner in world coordinates
    pub position: Vec2,
    /// Where the entity was placed when it was added
    pub start_position: Vec2,
    /// Width and height of the bounding rectangle
    pub size: Vec2,
    /// Cleared to have the registry drop the entity after its update pass
    pub active: bool,
}

impl Body {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            position: Vec2::default(),
            start_position: Vec2::default(),
            size: Vec2::new(width, height),
            active: true,
        }
    }

    /// Bounding rectangle at the current position
    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(self.position.x, self.position.y, self.size.x, self.size.y)
    }

    pub fn set_start_position(&mut self, x: f32, y: f32) {
        self.start_position = Vec2::new(x, y);
    }

    /// Teleport to the start position
    pub fn jump_to_start_position(&mut self) {
        self.position = self.start_position;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.position = self.position + delta;
    }

    /// Mark for removal at the end of the current update pass
    pub fn destroy(&mut self) {
        self.active = false;
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
