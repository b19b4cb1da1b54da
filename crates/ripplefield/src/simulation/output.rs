//! Greyscale intensity mapping of the published field.

use super::Field;
use ripplefield_core::params::Resolution;

/// Field mapped to `[0, 1]` display intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityImage {
    resolution: Resolution,
    pixels: Vec<f32>,
}

impl IntensityImage {
    /// `pixel = clamp(value · color_intensity + 0.5, 0, 1)`.
    pub fn from_field(field: &Field, color_intensity: f32) -> Self {
        let pixels = field
            .as_slice()
            .iter()
            .map(|v| (v * color_intensity + 0.5).clamp(0.0, 1.0))
            .collect();
        Self {
            resolution: field.resolution(),
            pixels,
        }
    }

    /// Image resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Row-major intensities.
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    /// Intensity at `(i, j)`.
    pub fn get(&self, i: u32, j: u32) -> f32 {
        self.pixels[self.resolution.index(i, j)]
    }

    /// Opaque grey RGBA8, row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| {
                let grey = (p * 255.0).round() as u8;
                [grey, grey, grey, 255]
            })
            .collect()
    }
}
