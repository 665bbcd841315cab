//! Pointer/touch to grid cell mapping
//!
//! Pure functions; no state. Each simultaneous contact is mapped on its own.

use serde::{Deserialize, Serialize};

use crate::grid::{GridCell, NUM_BANDS, NUM_ROWS};

/// Bounding rectangle of the interactive surface, in client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// A pointer or touch contact in client coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub x: f64,
    pub y: f64,
}

impl Contact {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Normalize a contact to `[-1, 1]` on both axes, y pointing up.
pub fn normalize(contact: Contact, rect: &SurfaceRect) -> Option<(f64, f64)> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let x = (contact.x - rect.left) / rect.width * 2.0 - 1.0;
    let y = -((contact.y - rect.top) / rect.height * 2.0 - 1.0);
    let inside = |v: f64| (-1.0..=1.0).contains(&v);
    (inside(x) && inside(y)).then_some((x, y))
}

/// Map a contact to its grid cell; `None` when it falls outside the surface.
pub fn map_contact(contact: Contact, rect: &SurfaceRect) -> Option<GridCell> {
    let (x, y) = normalize(contact, rect)?;
    let band = axis_index(x, NUM_BANDS);
    let row = axis_index(y, NUM_ROWS);
    GridCell::new(band, row)
}

/// Map every contact independently, dropping the ones off the surface.
pub fn map_contacts(contacts: &[Contact], rect: &SurfaceRect) -> Vec<GridCell> {
    contacts
        .iter()
        .filter_map(|c| map_contact(*c, rect))
        .collect()
}

fn axis_index(normalized: f64, steps: usize) -> usize {
    // The far edge (exactly 1.0) belongs to the last cell.
    let index = ((normalized + 1.0) / 2.0 * steps as f64).floor() as usize;
    index.min(steps - 1)
}
