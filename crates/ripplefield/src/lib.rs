//! # ripplefield
//!
//! Real-time 2D wave field perturbed by moving occluders.
//!
//! A leapfrog solver advances a scalar height field over a fixed grid. Moving
//! objects leave a decaying trail that damps the wave behind them, and the
//! field window can follow the first object, scrolling its contents by whole
//! cells as it moves. The same algorithm runs on the CPU (sequential or rayon
//! row-parallel) and as wgpu compute kernels.
//!
//! ## Features
//!
//! - Absorptive (Mur) and reflective boundaries
//! - Point forcing driven by a pointer or a fixed cell
//! - Per-object motion tracking with an explicit previous state
//! - Packed per-object storage buffer consumed by the kernels
//! - Staged, linear frame sequencing with divergence detection
//!
//! ## Run
//!
//! ```bash
//! cargo run -p ripplefield --bin ripplefield -- run --frames 600 --objects 2
//! ```

pub mod simulation;

pub use ripplefield_core::{
    BoundaryPolicy, GridCoord, Resolution, Result, RippleConfig, RippleError, StateError,
    TimeAccumulation, WaveParams,
};
pub use simulation::{
    CpuBackend, Execution, Field, FrameInput, FrameOrchestrator, FrameReport, FrameStage,
    IntensityImage, SolverBackend,
};

#[cfg(feature = "wgpu")]
pub use simulation::WgpuBackend;

/// Commonly used types.
pub mod prelude {
    pub use ripplefield_core::prelude::*;

    pub use crate::simulation::{
        BackendKind, CpuBackend, DisturbancePacker, Execution, Field, FrameInput,
        FrameOrchestrator, FrameReport, FrameStage, IntensityImage, ObjectId, ObjectRegistry,
        ObstacleTrailTracker, PackedDisturbanceEntry, SolverBackend,
    };

    #[cfg(feature = "wgpu")]
    pub use crate::simulation::WgpuBackend;
}
