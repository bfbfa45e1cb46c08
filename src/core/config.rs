//! Engine configuration with documented defaults
//!
//! Every engine instance owns its own `EngineConfig`; there is no process-wide
//! copy, so several engines can run side by side in one test binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::TileCode;

/// Top-level configuration, usually loaded from a TOML file
///
/// ```toml
/// [game_loop]
/// target_tps = 30
///
/// [tiles]
/// tile_size = 16.0
/// empty_tile = -1
///
/// [display]
/// landscape = false
/// zoom = 2.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game_loop: LoopConfig,
    pub tiles: TileConfig,
    pub display: DisplayConfig,
}

/// Timing of the simulation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Target ticks per second
    ///
    /// 0 means best effort: the loop never sleeps between ticks.
    pub target_tps: u32,

    /// How long a pause request waits for the loop thread to park (ms)
    ///
    /// The wait is re-armed until the thread parks or exits; this value only
    /// bounds how often the waiter re-checks whether the thread died.
    pub pause_ack_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            pause_ack_timeout_ms: 10,
        }
    }
}

impl LoopConfig {
    /// Budget for a single tick, or `None` when running best effort.
    pub fn tick_budget(&self) -> Option<std::time::Duration> {
        if self.target_tps == 0 {
            None
        } else {
            Some(std::time::Duration::from_nanos(
                1_000_000_000 / self.target_tps as u64,
            ))
        }
    }
}

/// Tile grid geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Edge length of one square tile (world units / pixels)
    pub tile_size: f32,

    /// Sentinel code marking an empty cell
    ///
    /// Empty cells are never returned by tile queries.
    pub empty_tile: TileCode,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            empty_tile: -1,
        }
    }
}

/// Presentation hints handed to the host surface and renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Request landscape orientation from the host
    pub landscape: bool,

    /// Request a fullscreen surface without title bar
    pub fullscreen: bool,

    /// Initial viewport zoom (2.0 = 200%)
    pub zoom: f32,

    /// Initial background color as 0xAARRGGBB
    pub background_color: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            landscape: true,
            fullscreen: true,
            zoom: 1.0,
            background_color: 0xFF00_0000,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let tile_size = self.tiles.tile_size;
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(EngineError::InvalidTileSize(tile_size));
        }

        let zoom = self.display.zoom;
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(EngineError::InvalidZoom(zoom));
        }

        if self.game_loop.pause_ack_timeout_ms == 0 {
            return Err(EngineError::Config(
                "game_loop.pause_ack_timeout_ms must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
