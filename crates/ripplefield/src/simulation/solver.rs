//! Leapfrog wave solver numerics shared by the CPU backend and mirrored by
//! the WGSL kernels.
//!
//! The interior update is the explicit second-order 5-point scheme
//!
//! ```text
//! next = (2·curr − prev + CFL²·(W + E + S + N − 4·curr)) · elasticity
//! ```
//!
//! followed by the obstacle attenuation
//! `1 − max(clamp(trail, 0, 1) · dispersion, coverage)` and the wake
//! `dt² · 20 · wake_gain · max(coverage · speed)` of moving objects.

use glam::Vec2;
use rayon::prelude::*;

use super::buffers::StepViews;
use super::packer::PackedDisturbanceEntry;
use super::Field;
use ripplefield_core::params::{BoundaryPolicy, Resolution, WaveParams, FOOTPRINT_FEATHER};

/// How the CPU backend walks the interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Single-threaded row loop.
    #[default]
    Sequential,
    /// Rows distributed across the rayon pool.
    Parallel,
}

/// Geometry needed to evaluate object footprints on the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintParams {
    /// Window centre in world XZ.
    pub origin: Vec2,
    /// World units spanned by the window.
    pub tex_world_size: f32,
    /// Footprint radius in world units.
    pub radius: f32,
}

impl FootprintParams {
    /// World XZ position of the centre of cell `(i, j)`.
    #[inline]
    pub fn cell_world(&self, resolution: Resolution, i: u32, j: u32) -> Vec2 {
        let u = (i as f32 + 0.5) / resolution.nx as f32 - 0.5;
        let v = (j as f32 + 0.5) / resolution.ny as f32 - 0.5;
        self.origin + Vec2::new(u, v) * self.tex_world_size
    }

    /// Strongest footprint coverage of `entries` at world position `at`.
    pub fn coverage_at(&self, at: Vec2, entries: &[PackedDisturbanceEntry]) -> f32 {
        self.footprint_at(at, entries).0
    }

    /// Strongest coverage and strongest speed-weighted coverage (the wake
    /// drive) of `entries` at world position `at`.
    pub fn footprint_at(&self, at: Vec2, entries: &[PackedDisturbanceEntry]) -> (f32, f32) {
        entries
            .iter()
            .fold((0.0_f32, 0.0_f32), |(cover, drive), entry| {
                let centre = Vec2::new(entry.position[0], entry.position[2]);
                let coverage = footprint_coverage(at.distance(centre), self.radius);
                (cover.max(coverage), drive.max(coverage * entry.speed))
            })
    }
}

/// Soft disc: 1 inside, linear ramp over the outer feather band, 0 outside.
#[inline]
pub fn footprint_coverage(distance: f32, radius: f32) -> f32 {
    ((radius - distance) / (radius * FOOTPRINT_FEATHER)).clamp(0.0, 1.0)
}

/// Multiplier applied to the updated field at a cell.
#[inline]
pub fn attenuation(trail: f32, dispersion: f32, coverage: f32) -> f32 {
    1.0 - (trail.clamp(0.0, 1.0) * dispersion).max(coverage)
}

/// Reference 5-point leapfrog update for a single cell.
#[inline(always)]
#[allow(clippy::too_many_arguments)]
pub fn stencil(
    prev: f32,
    curr: f32,
    west: f32,
    east: f32,
    south: f32,
    north: f32,
    cfl2: f32,
    elasticity: f32,
) -> f32 {
    let laplacian = west + east + south + north - 4.0 * curr;
    (2.0 * curr - prev + cfl2 * laplacian) * elasticity
}

/// Per-step inputs besides the three state buffers.
#[derive(Debug, Clone, Copy)]
pub struct StencilInputs<'a> {
    /// Solver parameters.
    pub params: WaveParams,
    /// Trail or combined obstacle field, same resolution as the state.
    pub obstacle: &'a Field,
    /// Packed disturbance sources.
    pub entries: &'a [PackedDisturbanceEntry],
    /// Window geometry for footprint coverage.
    pub footprint: FootprintParams,
}

/// Apply the boundary policy before rotation.
///
/// Absorptive runs the Mur update on the rim of `next`: first the rows pass
/// (j = 0 and ny-1 over every i), then the columns pass (i = 0 and nx-1 over
/// every j), so corner cells end up with the columns value. Reflective
/// zeroes the rims of both `curr` and `next`.
pub fn apply_boundary(curr: &mut Field, next: &mut Field, policy: BoundaryPolicy, v: f32) {
    let nx = curr.resolution().nx;
    let ny = curr.resolution().ny;

    match policy {
        BoundaryPolicy::Absorptive => {
            for i in 0..nx {
                let bottom = curr.get(i, 1) + v * (next.get(i, 1) - curr.get(i, 0));
                let top = curr.get(i, ny - 2) + v * (next.get(i, ny - 2) - curr.get(i, ny - 1));
                next.set(i, 0, bottom);
                next.set(i, ny - 1, top);
            }
            for j in 0..ny {
                let left = curr.get(1, j) + v * (next.get(1, j) - curr.get(0, j));
                let right = curr.get(nx - 2, j) + v * (next.get(nx - 2, j) - curr.get(nx - 1, j));
                next.set(0, j, left);
                next.set(nx - 1, j, right);
            }
        }
        BoundaryPolicy::Reflective => {
            for field in [curr, next] {
                for i in 0..nx {
                    field.set(i, 0, 0.0);
                    field.set(i, ny - 1, 0.0);
                }
                for j in 0..ny {
                    field.set(0, j, 0.0);
                    field.set(nx - 1, j, 0.0);
                }
            }
        }
    }
}

/// Compute every interior cell of `next` from `prev` and `curr`.
///
/// The rim of `next` is left untouched; it is owned by [`apply_boundary`].
pub fn step_interior(views: StepViews<'_>, inputs: &StencilInputs<'_>, execution: Execution) {
    let StepViews { prev, curr, next } = views;
    let width = next.nx();
    let height = next.ny();

    // Skip the first and last rows, they belong to the rim
    let interior = &mut next.as_mut_slice()[width..(height - 1) * width];

    match execution {
        Execution::Sequential => {
            for (offset, row) in interior.chunks_mut(width).enumerate() {
                update_row(offset + 1, row, prev, curr, inputs);
            }
        }
        Execution::Parallel => {
            interior
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(offset, row)| update_row(offset + 1, row, prev, curr, inputs));
        }
    }
}

#[inline]
fn update_row(j: usize, row: &mut [f32], prev: &Field, curr: &Field, inputs: &StencilInputs<'_>) {
    let width = row.len();
    let resolution = curr.resolution();
    let p = prev.as_slice();
    let c = curr.as_slice();
    let trail = inputs.obstacle.as_slice();
    let cfl2 = inputs.params.cfl_squared();
    let elasticity = inputs.params.elasticity;
    let dispersion = inputs.params.dispersion;
    let wake_scale = inputs.params.wake_scale();

    for i in 1..width - 1 {
        let idx = j * width + i;
        let value = stencil(
            p[idx],
            c[idx],
            c[idx - 1],
            c[idx + 1],
            c[idx - width],
            c[idx + width],
            cfl2,
            elasticity,
        );
        let (coverage, drive) = if inputs.entries.is_empty() {
            (0.0, 0.0)
        } else {
            let at = inputs
                .footprint
                .cell_world(resolution, i as u32, j as u32);
            inputs.footprint.footprint_at(at, inputs.entries)
        };
        row[i] = value * attenuation(trail[idx], dispersion, coverage) + wake_scale * drive;
    }
}
