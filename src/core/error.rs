use thiserror::Error;

use crate::engine::EngineState;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tile map is not rectangular: row {row} has {found} columns, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid tile size: {0} (must be finite and positive)")]
    InvalidTileSize(f32),

    #[error("Invalid zoom factor: {0} (must be finite and positive)")]
    InvalidZoom(f32),

    #[error("Game loop has no render target")]
    NoRenderTarget,

    #[error("Invalid engine transition: {from:?} -> {to:?}")]
    InvalidTransition { from: EngineState, to: EngineState },

    #[error("Engine has been destroyed")]
    Destroyed,

    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
