//! The 36×36 gesture grid
//!
//! Columns are frequency bands spaced a third of an octave apart starting at
//! 20 Hz; rows are gain steps spread linearly over ±18 dB.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of frequency bands (grid columns)
pub const NUM_BANDS: usize = 36;
/// Number of gain steps (grid rows)
pub const NUM_ROWS: usize = 36;
/// Lowest band center frequency
pub const BASE_FREQUENCY_HZ: f64 = 20.0;
/// Gain range is symmetric around 0 dB
pub const MAX_GAIN_DB: f64 = 18.0;

/// One cell of the gesture grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub band: usize,
    pub row: usize,
}

impl GridCell {
    /// Returns `None` when either coordinate is off the grid.
    pub fn new(band: usize, row: usize) -> Option<Self> {
        let cell = Self { band, row };
        cell.is_on_grid().then_some(cell)
    }

    /// False for cells built directly with out-of-range coordinates
    pub fn is_on_grid(&self) -> bool {
        self.band < NUM_BANDS && self.row < NUM_ROWS
    }

    pub fn frequency_hz(&self) -> f64 {
        band_frequency(self.band)
    }

    pub fn gain_db(&self) -> f64 {
        row_gain_db(self.row)
    }
}

/// Center frequency for a band: `20 · 2^(band/3)`
pub fn band_frequency(band: usize) -> f64 {
    BASE_FREQUENCY_HZ * 2f64.powf(band as f64 / 3.0)
}

/// Gain for a row: `row/35 · 36 − 18`, always within ±18 dB
pub fn row_gain_db(row: usize) -> f64 {
    let row = row.min(NUM_ROWS - 1) as f64;
    row / (NUM_ROWS - 1) as f64 * (2.0 * MAX_GAIN_DB) - MAX_GAIN_DB
}

/// Short display label for a band, e.g. `"20Hz"` or `"1.3kHz"`
pub fn frequency_label(band: usize) -> String {
    let hz = band_frequency(band);
    if hz >= 1000.0 {
        format!("{:.1}kHz", hz / 1000.0)
    } else {
        format!("{}Hz", hz.round() as u32)
    }
}

/// Active row per band as currently shown; at most one row per band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqState {
    rows: [Option<usize>; NUM_BANDS],
}

impl Default for EqState {
    fn default() -> Self {
        Self {
            rows: [None; NUM_BANDS],
        }
    }
}

impl EqState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `cell.row` the active row of its band, returning the row it replaced.
    pub fn activate(&mut self, cell: GridCell) -> Option<usize> {
        self.rows[cell.band].replace(cell.row)
    }

    pub fn active_row(&self, band: usize) -> Option<usize> {
        self.rows.get(band).copied().flatten()
    }

    pub fn clear(&mut self) {
        self.rows = [None; NUM_BANDS];
    }
}

/// Sparse per-band snapshot of the last row touched during the final window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalEqState {
    rows: BTreeMap<usize, usize>,
}

impl FinalEqState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a final-window interaction, overwriting any earlier one for the band.
    pub fn record(&mut self, cell: GridCell) {
        self.rows.insert(cell.band, cell.row);
    }

    pub fn get(&self, band: usize) -> Option<usize> {
        self.rows.get(&band).copied()
    }

    /// Row used by the ribbon; untouched bands sit at row 0.
    pub fn row_or_floor(&self, band: usize) -> usize {
        self.get(band).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
