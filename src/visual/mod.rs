//! Visualization Grid
//!
//! Mirrors the EQ state into a 3D scene: lazily created cell columns, spark
//! particles and the closing ribbon. The scene is pure data; `snapshot`
//! rasterizes it for the artifact.

mod cells;
mod particles;
mod resources;
mod ribbon;
mod snapshot;

pub use cells::{band_color, base_opacity, cell_position, Cell, Column, Rgb, CELL_SIZE, PALETTE};
pub use particles::{ParticleSystem, Spark, SPARK_INITIAL_OPACITY};
pub use resources::{ResourceHandle, ResourceKind, ResourcePool};
pub use ribbon::Ribbon;

use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::grid::{FinalEqState, GridCell, NUM_BANDS};

/// What one accepted interaction did to the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub previous_row: Option<usize>,
    pub column_created: bool,
    pub spark_spawned: bool,
}

/// Per-frame bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub live_sparks: usize,
    pub expired_sparks: usize,
    pub ribbon_animated: bool,
}

pub struct VisualGrid {
    columns: Vec<Option<Column>>,
    particles: ParticleSystem,
    ribbon: Option<Ribbon>,
    pool: ResourcePool,
    frames: u64,
}

impl VisualGrid {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            columns: (0..NUM_BANDS).map(|_| None).collect(),
            particles: ParticleSystem::new(
                config.max_particles,
                config.spark_probability,
                config.spark_lifetime_secs,
                config.rng_seed,
            ),
            ribbon: None,
            pool: ResourcePool::new(),
            frames: 0,
        }
    }

    /// Highlight `cell`, creating its column on first touch, and roll for a spark.
    pub fn activate(&mut self, cell: GridCell) -> Activation {
        let slot = &mut self.columns[cell.band];
        let column_created = slot.is_none();
        let column = slot.get_or_insert_with(|| Column::new(cell.band, &mut self.pool));
        let previous_row = column.activate(cell.row);

        if column_created {
            debug!("[GRID] Column {} instantiated", cell.band);
        }

        let origin = cell_position(cell.band, cell.row);
        let spark_spawned = self.particles.try_spawn(origin, &mut self.pool);

        Activation {
            previous_row,
            column_created,
            spark_spawned,
        }
    }

    /// Build the ribbon from the final-window snapshot, replacing any earlier one.
    pub fn build_ribbon(&mut self, final_eq: &FinalEqState) {
        if let Some(old) = self.ribbon.take() {
            old.release(&mut self.pool);
        }
        self.ribbon = Some(Ribbon::build(final_eq, &mut self.pool));
        debug!("[GRID] Ribbon built from {} final bands", final_eq.len());
    }

    /// One render-loop frame. Runs in every session state.
    pub fn render_frame(&mut self, dt: f32, session_active: bool) -> FrameStats {
        self.frames += 1;
        let expired_sparks = self.particles.update(dt, &mut self.pool);

        let mut ribbon_animated = false;
        if !session_active {
            if let Some(ribbon) = self.ribbon.as_mut() {
                ribbon.animate(dt);
                ribbon_animated = true;
            }
        }

        FrameStats {
            live_sparks: self.particles.len(),
            expired_sparks,
            ribbon_animated,
        }
    }

    /// PNG snapshot of the current scene
    pub fn snapshot(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        snapshot::capture_png(self, width, height)
    }

    /// Instantiated columns, low band first
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().flatten()
    }

    pub fn column(&self, band: usize) -> Option<&Column> {
        self.columns.get(band).and_then(|c| c.as_ref())
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn ribbon(&self) -> Option<&Ribbon> {
        self.ribbon.as_ref()
    }

    pub fn live_resources(&self) -> usize {
        self.pool.live()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Remove every object from the scene and release its resources. Idempotent.
    pub fn clear(&mut self) {
        for column in self.columns.iter_mut().filter_map(Option::take) {
            column.release(&mut self.pool);
        }
        self.particles.clear(&mut self.pool);
        if let Some(ribbon) = self.ribbon.take() {
            ribbon.release(&mut self.pool);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NUM_ROWS;

    fn grid_with(probability: f64) -> VisualGrid {
        let mut config = SessionConfig::default();
        config.spark_probability = probability;
        config.rng_seed = Some(9);
        VisualGrid::new(&config)
    }

    #[test]
    fn test_columns_are_lazy() {
        let mut grid = grid_with(0.0);
        assert_eq!(grid.columns().count(), 0);
        assert_eq!(grid.live_resources(), 0);

        let first = grid.activate(GridCell { band: 7, row: 3 });
        assert!(first.column_created);
        let second = grid.activate(GridCell { band: 7, row: 9 });
        assert!(!second.column_created);
        assert_eq!(second.previous_row, Some(3));

        assert_eq!(grid.columns().count(), 1);
        assert_eq!(grid.live_resources(), NUM_ROWS);
        assert!(grid.column(6).is_none());
    }

    #[test]
    fn test_ribbon_animates_only_when_inactive() {
        let mut grid = grid_with(0.0);
        grid.build_ribbon(&FinalEqState::new());

        assert!(!grid.render_frame(0.016, true).ribbon_animated);
        let before = grid.ribbon().unwrap().color();
        assert!(grid.render_frame(0.5, false).ribbon_animated);
        assert_ne!(grid.ribbon().unwrap().color(), before);
    }

    #[test]
    fn test_sparks_expire_and_release() {
        let mut grid = grid_with(1.0);
        grid.activate(GridCell { band: 0, row: 0 });
        assert_eq!(grid.particles().len(), 1);

        let stats = grid.render_frame(5.0, true);
        assert_eq!(stats.expired_sparks, 1);
        assert_eq!(grid.live_resources(), NUM_ROWS);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut grid = grid_with(1.0);
        for band in 0..NUM_BANDS {
            grid.activate(GridCell { band, row: band });
        }
        grid.build_ribbon(&FinalEqState::new());
        assert!(grid.live_resources() > 0);

        grid.clear();
        grid.clear();
        assert_eq!(grid.live_resources(), 0);
    }

    #[test]
    fn test_snapshot_is_png() {
        let mut grid = grid_with(1.0);
        grid.activate(GridCell { band: 12, row: 20 });
        grid.build_ribbon(&FinalEqState::new());

        let png = grid.snapshot(128, 128).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
