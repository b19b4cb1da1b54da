//! Wave solver parameters, grid geometry and the numeric constants shared by
//! every execution backend.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RippleError};

/// Scale applied to the point forcing, calibrated against `dt²`.
pub const PULSE_SCALE: f32 = 20.0;

/// Displacement (world units) below which an object counts as stationary.
pub const MOTION_EPSILON: f32 = 0.01;

/// Width of the soft footprint edge as a fraction of the footprint radius.
pub const FOOTPRINT_FEATHER: f32 = 0.25;

/// Upper bound on per-frame trail retention.
pub const MAX_TRAIL_RETENTION: f32 = 0.995;

/// Smallest grid side: one rim cell on each side plus one interior cell.
pub const MIN_RESOLUTION: u32 = 3;

/// Side of the square workgroup tile used by the GPU kernels.
pub const TILE_SIZE: u32 = 8;

/// Grid resolution in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Cells along x.
    pub nx: u32,
    /// Cells along y.
    pub ny: u32,
}

/// Integer cell coordinate, always inside the grid it was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Resolution {
    /// Create a validated resolution.
    pub fn new(nx: u32, ny: u32) -> Result<Self> {
        if nx < MIN_RESOLUTION || ny < MIN_RESOLUTION {
            return Err(RippleError::config(
                "resolution",
                format!("grid must be at least {MIN_RESOLUTION}x{MIN_RESOLUTION}, got {nx}x{ny}"),
            ));
        }
        Ok(Self { nx, ny })
    }

    /// Resolution covering a physical extent with uniform spacing `dx`.
    ///
    /// `nx = floor(lx / dx)`, snapping to the nearest integer when the
    /// quotient is within f32 noise of it, so `10.0 / 0.1` lands on 100.
    pub fn from_extent(lx: f32, ly: f32, dx: f32) -> Result<Self> {
        if !(dx.is_finite() && dx > 0.0) {
            return Err(RippleError::config("domain.dx", format!("must be positive, got {dx}")));
        }
        if !(lx.is_finite() && lx > 0.0) || !(ly.is_finite() && ly > 0.0) {
            return Err(RippleError::config(
                "domain.extent",
                format!("extent must be positive (lx={lx}, ly={ly})"),
            ));
        }
        let cells = |len: f32| {
            let exact = len as f64 / dx as f64;
            let nearest = exact.round();
            if (exact - nearest).abs() < 1e-4 {
                nearest as u32
            } else {
                exact.floor() as u32
            }
        };
        Self::new(cells(lx), cells(ly))
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx as usize * self.ny as usize
    }

    /// Linear (row-major) index of cell `(i, j)`.
    #[inline(always)]
    pub fn index(&self, i: u32, j: u32) -> usize {
        j as usize * self.nx as usize + i as usize
    }

    /// Whether `(x, y)` lies inside the grid.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.nx as i64 && y < self.ny as i64
    }

    /// Clamp an arbitrary coordinate into the grid.
    ///
    /// Returns the clamped cell and whether clamping was needed.
    pub fn clamp_cell(&self, x: i64, y: i64) -> (GridCoord, bool) {
        let cx = x.clamp(0, self.nx as i64 - 1);
        let cy = y.clamp(0, self.ny as i64 - 1);
        (
            GridCoord {
                x: cx as u32,
                y: cy as u32,
            },
            cx != x || cy != y,
        )
    }

    /// Strict lookup that rejects coordinates outside the grid.
    pub fn checked_cell(&self, x: i64, y: i64) -> Result<GridCoord> {
        if !self.contains(x, y) {
            return Err(RippleError::DisturbanceOutOfBounds {
                x,
                y,
                nx: self.nx,
                ny: self.ny,
            });
        }
        Ok(GridCoord {
            x: x as u32,
            y: y as u32,
        })
    }

    /// Workgroup counts covering the grid with `TILE_SIZE` square tiles.
    pub fn workgroups(&self) -> (u32, u32) {
        (self.nx.div_ceil(TILE_SIZE), self.ny.div_ceil(TILE_SIZE))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.nx, self.ny)
    }
}

/// Rim treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum BoundaryPolicy {
    /// One-way outgoing (Mur) update on the rim of `next`.
    #[default]
    Absorptive = 0,
    /// Rim of `curr` held at zero, waves bounce back.
    Reflective = 1,
}

/// How simulation time advances after each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeAccumulation {
    /// `t += dx`. Matches the established visuals of the reference solver.
    #[default]
    SpatialStep,
    /// `t += dt`.
    TimeStep,
}

/// Parameters for the leapfrog wave solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveParams {
    /// Courant number (`c · dt / dx`).
    pub cfl: f32,
    /// Wave propagation speed.
    pub wave_speed: f32,
    /// Spatial step (dx = dy).
    pub dx: f32,
    /// Per-step multiplier on the updated field (1 = lossless).
    pub elasticity: f32,
    /// Fraction of the wave removed under a fully covered trail cell.
    pub dispersion: f32,
    /// Strength of the wake raised under a moving object's footprint, per
    /// unit of object speed.
    pub wake_gain: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            cfl: 0.5,
            wave_speed: 1.0,
            dx: 0.1,
            elasticity: 0.98,
            dispersion: 0.98,
            wake_gain: 1.0,
        }
    }
}

impl WaveParams {
    /// Create validated parameters with no trail damping and no wake.
    pub fn new(cfl: f32, wave_speed: f32, dx: f32, elasticity: f32) -> Result<Self> {
        let params = Self {
            cfl,
            wave_speed,
            dx,
            elasticity,
            dispersion: 0.0,
            wake_gain: 0.0,
        };
        params.validate()?;
        Ok(params)
    }

    /// Set the trail damping strength.
    pub fn with_dispersion(mut self, dispersion: f32) -> Self {
        self.dispersion = dispersion;
        self
    }

    /// Set the wake strength of moving objects.
    pub fn with_wake_gain(mut self, wake_gain: f32) -> Self {
        self.wake_gain = wake_gain;
        self
    }

    /// Reject parameters that would make the scheme meaningless.
    ///
    /// CFL must lie in `[0, 1]`; values above 1 are rejected rather than
    /// clamped.
    pub fn validate(&self) -> Result<()> {
        if !self.cfl.is_finite() || !(0.0..=1.0).contains(&self.cfl) {
            return Err(RippleError::config(
                "solver.cfl",
                format!("must be in [0, 1], got {}", self.cfl),
            ));
        }
        if !(self.wave_speed.is_finite() && self.wave_speed > 0.0) {
            return Err(RippleError::config(
                "solver.wave_speed",
                format!("must be positive, got {}", self.wave_speed),
            ));
        }
        if !(self.dx.is_finite() && self.dx > 0.0) {
            return Err(RippleError::config(
                "domain.dx",
                format!("must be positive, got {}", self.dx),
            ));
        }
        if !self.elasticity.is_finite() || !(0.0..=1.0).contains(&self.elasticity) {
            return Err(RippleError::config(
                "solver.elasticity",
                format!("must be in [0, 1], got {}", self.elasticity),
            ));
        }
        if !self.dispersion.is_finite() || !(0.0..=1.0).contains(&self.dispersion) {
            return Err(RippleError::config(
                "solver.dispersion",
                format!("must be in [0, 1], got {}", self.dispersion),
            ));
        }
        if !self.wake_gain.is_finite() || self.wake_gain < 0.0 {
            return Err(RippleError::config(
                "solver.wake_gain",
                format!("must be finite and non-negative, got {}", self.wake_gain),
            ));
        }
        Ok(())
    }

    /// Time step `dt = CFL · dx / c`.
    #[inline]
    pub fn dt(&self) -> f32 {
        self.cfl * self.dx / self.wave_speed
    }

    /// `CFL²`, the stencil coefficient.
    #[inline]
    pub fn cfl_squared(&self) -> f32 {
        self.cfl * self.cfl
    }

    /// Mur reflection coefficient `(CFL - 1) / (CFL + 1)`.
    #[inline]
    pub fn absorption_coefficient(&self) -> f32 {
        (self.cfl - 1.0) / (self.cfl + 1.0)
    }

    /// Whether CFL satisfies the von Neumann bound of the 2D 5-point
    /// stencil, `CFL <= 1/sqrt(2)`.
    pub fn is_stable(&self) -> bool {
        self.cfl <= std::f32::consts::FRAC_1_SQRT_2
    }

    /// Point forcing value `dt² · 20 · magnitude · cos(t · frequency)`.
    #[inline]
    pub fn forcing(&self, t: f32, magnitude: f32, frequency: f32) -> f32 {
        let dt = self.dt();
        dt * dt * PULSE_SCALE * magnitude * (t * frequency).cos()
    }

    /// Scale applied to a footprint's speed-weighted coverage to form the
    /// wake added to the next field: `dt² · 20 · wake_gain`.
    #[inline]
    pub fn wake_scale(&self) -> f32 {
        let dt = self.dt();
        dt * dt * PULSE_SCALE * self.wake_gain
    }

    /// Simulation time increment under the given accumulation mode.
    #[inline]
    pub fn time_increment(&self, mode: TimeAccumulation) -> f32 {
        match mode {
            TimeAccumulation::SpatialStep => self.dx,
            TimeAccumulation::TimeStep => self.dt(),
        }
    }
}
