//! Still-image capture of the visual surface
//!
//! Software raster of the current scene, front-on orthographic, encoded PNG.

use std::io::Cursor;

use glam::Vec3;
use image::{ImageFormat, Rgba, RgbaImage};

use super::cells::{Rgb, CELL_SIZE, GRID_HALF_EXTENT};
use super::VisualGrid;
use crate::error::{Result, RitualError};

const BACKGROUND: [u8; 3] = [8, 8, 14];
const SPARK_RADIUS_PX: i64 = 2;
const RIBBON_RADIUS_PX: i64 = 3;

struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        let [r, g, b] = BACKGROUND;
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])),
        }
    }

    fn to_pixel(&self, p: Vec3) -> (i64, i64) {
        let span = 2.0 * GRID_HALF_EXTENT;
        let x = (p.x + GRID_HALF_EXTENT) / span * self.image.width() as f32;
        let y = (GRID_HALF_EXTENT - p.y) / span * self.image.height() as f32;
        (x.floor() as i64, y.floor() as i64)
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for (channel, value) in pixel.0.iter_mut().take(3).zip(color) {
            let src = value.clamp(0.0, 1.0) * 255.0;
            *channel = (*channel as f32 * (1.0 - alpha) + src * alpha).round() as u8;
        }
    }

    fn fill_square(&mut self, center: Vec3, half: f32, color: Rgb, alpha: f32) {
        let (x0, y0) = self.to_pixel(center + Vec3::new(-half, half, 0.0));
        let (x1, y1) = self.to_pixel(center + Vec3::new(half, -half, 0.0));
        for y in y0..y1.max(y0 + 1) {
            for x in x0..x1.max(x0 + 1) {
                self.blend(x, y, color, alpha);
            }
        }
    }

    fn dot(&mut self, center: Vec3, radius: i64, color: Rgb, alpha: f32) {
        let (cx, cy) = self.to_pixel(center);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.blend(cx + dx, cy + dy, color, alpha);
                }
            }
        }
    }

    fn encode_png(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RitualError::ImageEncode {
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }
}

/// Rasterize `grid` into a `width`×`height` PNG
pub fn capture_png(grid: &VisualGrid, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut canvas = Canvas::new(width.max(1), height.max(1));
    let half = CELL_SIZE * 0.45;

    for column in grid.columns() {
        for cell in column.cells() {
            canvas.fill_square(cell.position, half, cell.color, cell.opacity);
            if cell.emissive > 0.0 {
                canvas.fill_square(cell.position, half, [1.0, 1.0, 1.0], 0.35 * cell.emissive);
                canvas.fill_square(cell.position, half * 0.7, cell.color, cell.emissive);
            }
        }
    }

    for spark in grid.particles().sparks() {
        canvas.dot(spark.position, SPARK_RADIUS_PX, [1.0, 1.0, 0.9], spark.opacity());
    }

    if let Some(ribbon) = grid.ribbon() {
        let color = ribbon.color();
        for point in ribbon.points() {
            canvas.dot(*point, RIBBON_RADIUS_PX, color, 0.9);
        }
    }

    canvas.encode_png()
}
