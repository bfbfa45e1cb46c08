pub mod config;
pub mod error;
pub mod types;

pub use config::{DisplayConfig, EngineConfig, LoopConfig, TileConfig};
pub use error::{EngineError, Result};
pub use types::{AlarmId, EntityId, Rect, Tick, TileCode, Vec2};
