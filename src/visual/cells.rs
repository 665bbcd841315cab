//! Per-band cell columns
//!
//! Columns are created on first touch of their band, never up front. A cell's
//! baseline opacity depends only on its row; activation drives emissive glow.

use glam::Vec3;

use super::resources::{ResourceHandle, ResourceKind, ResourcePool};
use crate::grid::{NUM_BANDS, NUM_ROWS};

/// Half-extent of the grid in world units
pub const GRID_HALF_EXTENT: f32 = 9.0;
/// Edge length of one cell in world units
pub const CELL_SIZE: f32 = 2.0 * GRID_HALF_EXTENT / NUM_BANDS as f32;

/// RGB in [0, 1]
pub type Rgb = [f32; 3];

/// Six colors, one per contiguous block of six bands, low to high
pub const PALETTE: [Rgb; 6] = [
    [1.00, 0.25, 0.35],
    [1.00, 0.60, 0.20],
    [0.95, 0.90, 0.30],
    [0.30, 0.90, 0.50],
    [0.25, 0.60, 1.00],
    [0.65, 0.40, 1.00],
];

const BANDS_PER_COLOR: usize = NUM_BANDS / PALETTE.len();

pub fn band_color(band: usize) -> Rgb {
    PALETTE[(band / BANDS_PER_COLOR).min(PALETTE.len() - 1)]
}

/// Baseline opacity, increasing from the bottom row to the top row
pub fn base_opacity(row: usize) -> f32 {
    const FLOOR: f32 = 0.08;
    const SPAN: f32 = 0.42;
    FLOOR + SPAN * row.min(NUM_ROWS - 1) as f32 / (NUM_ROWS - 1) as f32
}

/// World-space center of a cell
pub fn cell_position(band: usize, row: usize) -> Vec3 {
    Vec3::new(
        -GRID_HALF_EXTENT + (band as f32 + 0.5) * CELL_SIZE,
        -GRID_HALF_EXTENT + (row as f32 + 0.5) * CELL_SIZE,
        0.0,
    )
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub row: usize,
    pub position: Vec3,
    pub opacity: f32,
    pub emissive: f32,
    pub color: Rgb,
    handle: ResourceHandle,
}

impl Cell {
    pub fn is_highlighted(&self) -> bool {
        self.emissive >= 1.0
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub band: usize,
    cells: Vec<Cell>,
    active_row: Option<usize>,
}

impl Column {
    pub fn new(band: usize, pool: &mut ResourcePool) -> Self {
        let color = band_color(band);
        let cells = (0..NUM_ROWS)
            .map(|row| Cell {
                row,
                position: cell_position(band, row),
                opacity: base_opacity(row),
                emissive: 0.0,
                color,
                handle: pool.allocate(ResourceKind::CellMesh),
            })
            .collect();

        Self {
            band,
            cells,
            active_row: None,
        }
    }

    /// Highlight `row`, clearing the previous highlight. Returns the previous row.
    pub fn activate(&mut self, row: usize) -> Option<usize> {
        let previous = self.active_row.take();
        if let Some(prev) = previous {
            if let Some(cell) = self.cells.get_mut(prev) {
                cell.emissive = 0.0;
            }
        }
        if let Some(cell) = self.cells.get_mut(row) {
            cell.emissive = 1.0;
            self.active_row = Some(row);
        }
        previous
    }

    pub fn active_row(&self) -> Option<usize> {
        self.active_row
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, row: usize) -> Option<&Cell> {
        self.cells.get(row)
    }

    /// Hand every cell's resources back to the pool
    pub fn release(self, pool: &mut ResourcePool) {
        for cell in self.cells {
            pool.release(cell.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_segments() {
        assert_eq!(band_color(0), PALETTE[0]);
        assert_eq!(band_color(5), PALETTE[0]);
        assert_eq!(band_color(6), PALETTE[1]);
        assert_eq!(band_color(35), PALETTE[5]);
    }

    #[test]
    fn test_base_opacity_monotonic() {
        for row in 1..NUM_ROWS {
            assert!(base_opacity(row) > base_opacity(row - 1));
        }
    }

    #[test]
    fn test_activation_moves_highlight() {
        let mut pool = ResourcePool::new();
        let mut column = Column::new(3, &mut pool);
        assert_eq!(pool.live(), NUM_ROWS);

        assert_eq!(column.activate(10), None);
        assert_eq!(column.activate(20), Some(10));

        assert!(!column.cell(10).unwrap().is_highlighted());
        assert!(column.cell(20).unwrap().is_highlighted());
        assert_eq!(column.cells().iter().filter(|c| c.is_highlighted()).count(), 1);
        // Baseline opacity is untouched by activation
        assert_eq!(column.cell(20).unwrap().opacity, base_opacity(20));

        column.release(&mut pool);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_cell_positions_span_grid() {
        let low = cell_position(0, 0);
        let high = cell_position(35, 35);
        assert!(low.x < 0.0 && low.y < 0.0);
        assert!((high.x + low.x).abs() < 1e-5);
        assert!((high.x - (GRID_HALF_EXTENT - CELL_SIZE / 2.0)).abs() < 1e-5);
    }
}
