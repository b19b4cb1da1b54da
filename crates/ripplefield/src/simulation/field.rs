//! Scalar grid storage shared by the wave state, the trail and the obstacle
//! mask.
//!
//! Uses a flat row-major `Vec<f32>` (`index = j * nx + i`) so rows can be
//! handed to rayon as independent chunks and uploaded to the GPU with a
//! single `bytemuck::cast_slice`.

use ripplefield_core::error::{Result, RippleError};
use ripplefield_core::params::Resolution;

/// A 2D scalar field at fixed resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    resolution: Resolution,
    data: Vec<f32>,
}

impl Field {
    /// Zero-initialised field.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            data: vec![0.0; resolution.cell_count()],
        }
    }

    /// Wrap existing row-major data.
    pub fn from_vec(resolution: Resolution, data: Vec<f32>) -> Result<Self> {
        if data.len() != resolution.cell_count() {
            return Err(RippleError::config(
                "field",
                format!(
                    "expected {} values for {}, got {}",
                    resolution.cell_count(),
                    resolution,
                    data.len()
                ),
            ));
        }
        Ok(Self { resolution, data })
    }

    /// Grid resolution.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Cells along x.
    #[inline]
    pub fn nx(&self) -> usize {
        self.resolution.nx as usize
    }

    /// Cells along y.
    #[inline]
    pub fn ny(&self) -> usize {
        self.resolution.ny as usize
    }

    /// Value at `(i, j)`.
    #[inline(always)]
    pub fn get(&self, i: u32, j: u32) -> f32 {
        self.data[self.resolution.index(i, j)]
    }

    /// Set the value at `(i, j)`.
    #[inline(always)]
    pub fn set(&mut self, i: u32, j: u32, value: f32) {
        let idx = self.resolution.index(i, j);
        self.data[idx] = value;
    }

    /// Flat row-major view.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat row-major view.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Reset to zero.
    pub fn clear(&mut self) {
        self.fill(0.0);
    }

    /// Copy all values from another field of the same resolution.
    pub fn copy_from(&mut self, other: &Field) {
        debug_assert_eq!(self.resolution, other.resolution);
        self.data.copy_from_slice(&other.data);
    }

    /// Largest absolute value; NaN if any cell is NaN.
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0_f32, |acc, v| {
            if v.is_nan() || acc.is_nan() {
                f32::NAN
            } else {
                acc.max(v.abs())
            }
        })
    }

    /// Sum of squared values.
    pub fn energy(&self) -> f32 {
        self.data.iter().map(|v| v * v).sum()
    }

    /// Whether every cell holds a finite value.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Fail unless `other` has the same resolution.
    pub fn ensure_resolution(&self, parameter: &'static str, other: Resolution) -> Result<()> {
        if self.resolution != other {
            return Err(RippleError::config(
                parameter,
                format!("buffer is {} but the field is {}", self.resolution, other),
            ));
        }
        Ok(())
    }

    /// Copy `src` shifted by a whole number of cells into `self`.
    ///
    /// `self[i][j] = src[i + dx][j + dy]`; cells sampled from outside the
    /// grid become zero. A zero shift is an exact copy.
    pub fn shift_from(&mut self, src: &Field, dx: i32, dy: i32) {
        debug_assert_eq!(self.resolution, src.resolution);
        if dx == 0 && dy == 0 {
            self.copy_from(src);
            return;
        }
        let nx = self.nx() as i64;
        let ny = self.ny() as i64;
        for j in 0..ny {
            let sj = j + dy as i64;
            let row = &mut self.data[(j * nx) as usize..((j + 1) * nx) as usize];
            if sj < 0 || sj >= ny {
                row.fill(0.0);
                continue;
            }
            for (i, cell) in row.iter_mut().enumerate() {
                let si = i as i64 + dx as i64;
                *cell = if si < 0 || si >= nx {
                    0.0
                } else {
                    src.data[(sj * nx + si) as usize]
                };
            }
        }
    }

    /// Bilinear sample at fractional cell coordinates, zero outside the grid.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        // Also rejects NaN, and keeps the corner arithmetic below in range
        if !(x > -1.0 && y > -1.0 && x < self.nx() as f32 && y < self.ny() as f32) {
            return 0.0;
        }
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let at = |i: i64, j: i64| -> f32 {
            if i < 0 || j < 0 || i >= self.nx() as i64 || j >= self.ny() as i64 {
                0.0
            } else {
                self.data[j as usize * self.nx() + i as usize]
            }
        };

        let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
        let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}
