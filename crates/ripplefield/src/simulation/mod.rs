//! Simulation core for the 2D wave field and its moving occluders.

mod buffers;
mod field;
pub mod output;
pub mod solver;

// Motion tracking, trail accumulation and the disturbance buffer
pub mod packer;
pub mod tracking;
pub mod trail;

// Backend abstraction and implementations
pub mod backend;
pub mod cpu_backend;

#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub mod orchestrator;

pub use buffers::{StateBufferSet, StepViews};
pub use field::Field;
pub use output::IntensityImage;
pub use solver::{Execution, FootprintParams, StencilInputs};

pub use packer::{DisturbancePacker, PackedDisturbanceEntry};
pub use tracking::{track_motion, MotionSample, ObjectId, ObjectRegistry, PreviousState};
pub use trail::{ObstacleTrailTracker, TrackedFrame, TrailParams, TrailWindow};

pub use backend::{BackendKind, DispatchInput, SolverBackend};
pub use cpu_backend::CpuBackend;

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuBackend;

pub use orchestrator::{FrameInput, FrameOrchestrator, FrameReport, FrameStage};
