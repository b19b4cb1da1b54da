//! # ripplefield core
//!
//! Types shared by every ripplefield execution backend: the error taxonomy,
//! solver parameters with their numeric constants, grid geometry and the
//! TOML run configuration.
//!
//! Keeping the constants here means the CPU reference loop and the GPU
//! kernels are always fed from the same values.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod params;

pub use config::RippleConfig;
pub use error::{Result, RippleError, StateError};
pub use params::{BoundaryPolicy, GridCoord, Resolution, TimeAccumulation, WaveParams};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RippleConfig;
    pub use crate::error::{Result, RippleError, StateError};
    pub use crate::params::{
        BoundaryPolicy, GridCoord, Resolution, TimeAccumulation, WaveParams, FOOTPRINT_FEATHER,
        MAX_TRAIL_RETENTION, MOTION_EPSILON, PULSE_SCALE, TILE_SIZE,
    };
}
