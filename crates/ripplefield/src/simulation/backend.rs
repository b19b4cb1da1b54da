//! Execution backend abstraction.
//!
//! A backend owns the temporal buffers for one fixed resolution and runs the
//! two halves of a frame the orchestrator sequences around tracking:
//!
//! 1. [`SolverBackend::rotate`]: commit staged scroll data, apply the
//!    boundary policy, rotate roles.
//! 2. [`SolverBackend::dispatch`]: inject the point forcing into `curr`, run
//!    the stencil into `next`, stage the scrolled copies.
//!
//! [`SolverBackend::read_current`] then returns `curr` for publishing.

use super::packer::PackedDisturbanceEntry;
use super::solver::{Execution, FootprintParams};
use super::Field;
use ripplefield_core::error::Result;
use ripplefield_core::params::{BoundaryPolicy, GridCoord, Resolution, WaveParams};

/// Backend implementation in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// CPU reference loop.
    Cpu(Execution),
    /// wgpu compute kernels.
    Wgpu,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Cpu(Execution::Sequential) => write!(f, "CPU (sequential)"),
            BackendKind::Cpu(Execution::Parallel) => write!(f, "CPU (rayon)"),
            BackendKind::Wgpu => write!(f, "wgpu"),
        }
    }
}

/// Per-frame inputs to the stencil dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    /// Solver parameters.
    pub params: WaveParams,
    /// Point forcing: cell and value written into `curr`.
    pub forcing: Option<(GridCoord, f32)>,
    /// Trail (combined with any static mask), same resolution as the state.
    pub obstacle: &'a Field,
    /// Packed disturbance sources in registry order.
    pub entries: &'a [PackedDisturbanceEntry],
    /// Window geometry for footprint coverage.
    pub footprint: FootprintParams,
    /// Whole-cell scroll offset applied after the stencil.
    pub scroll: (i32, i32),
}

/// A solver that can advance the wave state by one frame.
pub trait SolverBackend: Send {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Fixed resolution of the owned buffers.
    fn resolution(&self) -> Resolution;

    /// Commit staged data, apply the boundary policy and rotate roles.
    fn rotate(&mut self, boundary: BoundaryPolicy, params: &WaveParams) -> Result<()>;

    /// Inject forcing, compute `next` and stage the scroll.
    fn dispatch(&mut self, input: &DispatchInput<'_>) -> Result<()>;

    /// Copy of the current (`t`) field.
    fn read_current(&mut self) -> Result<Field>;

    /// Zero all state.
    fn reset(&mut self) -> Result<()>;
}
