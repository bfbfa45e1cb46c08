pub mod grid;
pub mod query;

pub use grid::{TileGrid, TileHit};
pub use query::{query_rect, QueryHits};
