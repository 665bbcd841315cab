//! Closing ribbon
//!
//! A Catmull-Rom curve through one control point per band at the band's final
//! row. After the session stops being active its color cycles through three
//! phase-offset sine oscillators.

use std::f32::consts::TAU;

use glam::Vec3;

use super::cells::{cell_position, Rgb};
use super::resources::{ResourceHandle, ResourceKind, ResourcePool};
use crate::grid::{FinalEqState, NUM_BANDS};

/// Curve samples between consecutive control points
const SAMPLES_PER_SEGMENT: usize = 12;
/// Hue cycle speed in radians per second
const COLOR_SPEED: f32 = 0.8;
/// Ribbon floats slightly in front of the cells
const RIBBON_DEPTH: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct Ribbon {
    control_points: Vec<Vec3>,
    points: Vec<Vec3>,
    color: Rgb,
    phase: f32,
    handle: ResourceHandle,
}

impl Ribbon {
    /// Build from the final-window snapshot; untouched bands sit on row 0.
    pub fn build(final_eq: &FinalEqState, pool: &mut ResourcePool) -> Self {
        let control_points: Vec<Vec3> = (0..NUM_BANDS)
            .map(|band| cell_position(band, final_eq.row_or_floor(band)) + Vec3::Z * RIBBON_DEPTH)
            .collect();
        let points = catmull_rom(&control_points, SAMPLES_PER_SEGMENT);

        Self {
            control_points,
            points,
            color: oscillator_color(0.0),
            phase: 0.0,
            handle: pool.allocate(ResourceKind::Ribbon),
        }
    }

    /// Advance the hue cycle
    pub fn animate(&mut self, dt: f32) {
        self.phase = (self.phase + dt * COLOR_SPEED) % TAU;
        self.color = oscillator_color(self.phase);
    }

    pub fn control_points(&self) -> &[Vec3] {
        &self.control_points
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn release(self, pool: &mut ResourcePool) {
        pool.release(self.handle);
    }
}

fn oscillator_color(phase: f32) -> Rgb {
    let channel = |offset: f32| 0.5 + 0.5 * (phase + offset).sin();
    [channel(0.0), channel(TAU / 3.0), channel(2.0 * TAU / 3.0)]
}

/// Uniform Catmull-Rom through every control point, ends clamped
fn catmull_rom(control: &[Vec3], samples_per_segment: usize) -> Vec<Vec3> {
    if control.len() < 2 {
        return control.to_vec();
    }

    let last = control.len() - 1;
    let mut points = Vec::with_capacity(last * samples_per_segment + 1);

    for i in 0..last {
        let p0 = control[i.saturating_sub(1)];
        let p1 = control[i];
        let p2 = control[i + 1];
        let p3 = control[(i + 2).min(last)];

        for s in 0..samples_per_segment {
            let t = s as f32 / samples_per_segment as f32;
            let t2 = t * t;
            let t3 = t2 * t;
            let point = 0.5
                * ((2.0 * p1)
                    + (p2 - p0) * t
                    + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                    + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3);
            points.push(point);
        }
    }
    points.push(control[last]);
    points
}
