//! Tile map mapped onto world space
//!
//! Cell `(row, col)` covers the square
//! `(origin.x + col * tile_size, origin.y + row * tile_size, tile_size, tile_size)`.
//! The grid never changes after construction; loading a new map builds a new
//! grid and swaps it in whole.

use std::ops::Range;

use crate::core::error::{EngineError, Result};
use crate::core::types::{Rect, TileCode, Vec2};

/// One non-empty cell matched by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHit {
    pub row: usize,
    pub col: usize,
    pub code: TileCode,
}

/// Rectangular grid of tile codes with a precomputed cell rectangle table
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    tile_size: f32,
    empty_tile: TileCode,
    origin: Vec2,
    codes: Vec<TileCode>,
    cell_rects: Vec<Rect>,
}

impl TileGrid {
    /// Build a grid from rows of codes
    ///
    /// Every row must have the same length as the first one.
    pub fn new(map: Vec<Vec<TileCode>>, tile_size: f32, empty_tile: TileCode, origin: Vec2) -> Result<Self> {
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(EngineError::InvalidTileSize(tile_size));
        }

        let rows = map.len();
        let cols = map.first().map_or(0, Vec::len);
        if let Some((row, found)) = map
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != cols)
        {
            return Err(EngineError::RaggedGrid {
                row,
                expected: cols,
                found,
            });
        }

        let codes: Vec<TileCode> = map.into_iter().flatten().collect();
        let cell_rects = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .map(|(row, col)| {
                Rect::from_xywh(
                    origin.x + col as f32 * tile_size,
                    origin.y + row as f32 * tile_size,
                    tile_size,
                    tile_size,
                )
            })
            .collect();

        Ok(Self {
            rows,
            cols,
            tile_size,
            empty_tile,
            origin,
            codes,
            cell_rects,
        })
    }

    /// Grid with no cells
    pub fn empty(tile_size: f32, empty_tile: TileCode) -> Self {
        Self {
            rows: 0,
            cols: 0,
            tile_size,
            empty_tile,
            origin: Vec2::default(),
            codes: Vec::new(),
            cell_rects: Vec::new(),
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<TileCode> {
        if row < self.rows && col < self.cols {
            Some(self.codes[row * self.cols + col])
        } else {
            None
        }
    }

    #[inline]
    pub fn cell_rect(&self, row: usize, col: usize) -> Option<Rect> {
        if row < self.rows && col < self.cols {
            Some(self.cell_rects[row * self.cols + col])
        } else {
            None
        }
    }

    /// Cell containing a world position, if it is on the map
    pub fn world_to_cell(&self, pos: Vec2) -> Option<(usize, usize)> {
        let col = ((pos.x - self.origin.x) / self.tile_size).floor();
        let row = ((pos.y - self.origin.y) / self.tile_size).floor();
        if col >= 0.0 && row >= 0.0 && (col as usize) < self.cols && (row as usize) < self.rows {
            Some((row as usize, col as usize))
        } else {
            None
        }
    }

    /// Cell center in world coordinates
    pub fn cell_center(&self, row: usize, col: usize) -> Vec2 {
        Vec2::new(
            self.origin.x + (col as f32 + 0.5) * self.tile_size,
            self.origin.y + (row as f32 + 0.5) * self.tile_size,
        )
    }

    /// Codes of non-empty cells overlapping `rect`, row-major
    pub fn find_tiles_in_rect(&self, rect: Rect) -> Vec<TileCode> {
        self.find_cells_in_rect(rect)
            .into_iter()
            .map(|hit| hit.code)
            .collect()
    }

    /// Non-empty cells overlapping `rect`, row-major
    pub fn find_cells_in_rect(&self, rect: Rect) -> Vec<TileHit> {
        let Some((rows, cols)) = self.candidate_range(rect) else {
            return Vec::new();
        };

        let mut hits = Vec::new();
        for row in rows {
            for col in cols.clone() {
                let index = row * self.cols + col;
                let code = self.codes[index];
                if code != self.empty_tile && rect.intersects(&self.cell_rects[index]) {
                    hits.push(TileHit { row, col, code });
                }
            }
        }
        hits
    }

    /// Every non-empty cell, row-major
    pub fn non_empty_cells(&self) -> impl Iterator<Item = TileHit> + '_ {
        self.codes
            .iter()
            .enumerate()
            .filter(|(_, &code)| code != self.empty_tile)
            .map(|(index, &code)| TileHit {
                row: index / self.cols,
                col: index % self.cols,
                code,
            })
    }

    /// Rows and columns whose cells could overlap `rect`, clamped to the grid
    ///
    /// Low bounds use the floor of the near edge, high bounds the ceiling of
    /// the far edge, both relative to the origin. `None` when the clamped
    /// range is empty (including rects with NaN edges).
    fn candidate_range(&self, rect: Rect) -> Option<(Range<usize>, Range<usize>)> {
        let span = |near: f32, far: f32, origin: f32, limit: usize| -> Option<Range<usize>> {
            let low = ((near - origin) / self.tile_size).floor().max(0.0);
            let high = ((far - origin) / self.tile_size).ceil().min(limit as f32);
            if low < high {
                Some(low as usize..high as usize)
            } else {
                None
            }
        };

        let cols = span(rect.left, rect.right, self.origin.x, self.cols)?;
        let rows = span(rect.top, rect.bottom, self.origin.y, self.rows)?;
        Some((rows, cols))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn empty_tile(&self) -> TileCode {
        self.empty_tile
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Columns times tile size
    pub fn map_width(&self) -> f32 {
        self.cols as f32 * self.tile_size
    }

    /// Rows times tile size
    pub fn map_height(&self) -> f32 {
        self.rows as f32 * self.tile_size
    }

    /// Map bounds in world coordinates
    pub fn bounds(&self) -> Rect {
        Rect::from_xywh(self.origin.x, self.origin.y, self.map_width(), self.map_height())
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
