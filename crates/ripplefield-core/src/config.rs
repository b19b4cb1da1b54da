//! TOML configuration for a ripplefield run.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults of the interactive water scene.
//!
//! ```toml
//! [domain]
//! lx = 6.4
//! ly = 6.4
//! dx = 0.1
//!
//! [solver]
//! cfl = 0.5
//! boundary = "reflective"
//!
//! [pulse]
//! position = [32, 32]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, RippleError};
use crate::params::{BoundaryPolicy, GridCoord, Resolution, TimeAccumulation, WaveParams};

/// Physical domain covered by the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Width in world units.
    pub lx: f32,
    /// Height in world units.
    pub ly: f32,
    /// Spatial step (dx = dy).
    pub dx: f32,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            lx: 10.0,
            ly: 10.0,
            dx: 0.1,
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Courant number.
    pub cfl: f32,
    /// Wave propagation speed.
    pub wave_speed: f32,
    /// Per-step field multiplier.
    pub elasticity: f32,
    /// Trail damping strength.
    pub dispersion: f32,
    /// Rim treatment.
    pub boundary: BoundaryPolicy,
    /// Simulation clock increment.
    pub time_accumulation: TimeAccumulation,
    /// Largest absolute field value accepted when publishing a frame.
    pub divergence_limit: f32,
    /// Wake raised by moving objects, per unit of speed.
    pub wake_gain: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let params = WaveParams::default();
        Self {
            cfl: params.cfl,
            wave_speed: params.wave_speed,
            elasticity: params.elasticity,
            dispersion: params.dispersion,
            boundary: BoundaryPolicy::Absorptive,
            time_accumulation: TimeAccumulation::SpatialStep,
            divergence_limit: 1.0e3,
            wake_gain: params.wake_gain,
        }
    }
}

/// Point disturbance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Forcing magnitude.
    pub magnitude: f32,
    /// Forcing frequency.
    pub frequency: f32,
    /// Fixed cell to drive when no pointer input is supplied.
    pub position: Option<[i64; 2]>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            magnitude: 1.0,
            frequency: 1.0,
            position: None,
        }
    }
}

/// Obstacle trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// World units spanned by the field/trail window. Derived from the
    /// domain when absent; must equal `nx · dx` and `ny · dx` when given.
    pub tex_world_size: Option<f32>,
    /// Window centre in world XZ when it does not follow an object.
    pub origin: [f32; 2],
    /// Keep the window centred on the first tracked object.
    pub follow_primary: bool,
    /// Footprint radius in world units.
    pub footprint_radius: f32,
    /// Base per-frame trail retention.
    pub decay: f32,
    /// Extra retention per unit of object speed.
    pub speed_gain: f32,
    /// Explicit trail resolution; must match the field when given.
    pub resolution: Option<[u32; 2]>,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            tex_world_size: None,
            origin: [0.0, 0.0],
            follow_primary: true,
            footprint_radius: 0.5,
            decay: 0.9,
            speed_gain: 0.02,
            resolution: None,
        }
    }
}

/// Output mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Gain applied before the +0.5 bias.
    pub color_intensity: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color_intensity: 2.0,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RippleConfig {
    /// Physical domain.
    pub domain: DomainConfig,
    /// Solver settings.
    pub solver: SolverConfig,
    /// Point disturbance.
    pub pulse: PulseConfig,
    /// Obstacle trail.
    pub trail: TrailConfig,
    /// Output mapping.
    pub output: OutputConfig,
}

impl RippleConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RippleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Field resolution derived from the domain.
    pub fn resolution(&self) -> Result<Resolution> {
        Resolution::from_extent(self.domain.lx, self.domain.ly, self.domain.dx)
    }

    /// Solver parameters.
    pub fn wave_params(&self) -> Result<WaveParams> {
        let params = WaveParams {
            cfl: self.solver.cfl,
            wave_speed: self.solver.wave_speed,
            dx: self.domain.dx,
            elasticity: self.solver.elasticity,
            dispersion: self.solver.dispersion,
            wake_gain: self.solver.wake_gain,
        };
        params.validate()?;
        Ok(params)
    }

    /// Configured fixed pulse cell, if any, clamped into the grid.
    pub fn pulse_cell(&self) -> Result<Option<GridCoord>> {
        let resolution = self.resolution()?;
        Ok(self.pulse.position.map(|[x, y]| {
            let (cell, clamped) = resolution.clamp_cell(x, y);
            if clamped {
                tracing::debug!(
                    x,
                    y,
                    clamped_x = cell.x,
                    clamped_y = cell.y,
                    "pulse position clamped into the grid"
                );
            }
            cell
        }))
    }

    /// World units covered by the square field/trail window.
    ///
    /// The window spans exactly the field, so it is `nx · dx` on both axes.
    pub fn window_size(&self) -> Result<f32> {
        let resolution = self.resolution()?;
        let dx = self.domain.dx;
        let width = resolution.nx as f32 * dx;
        let height = resolution.ny as f32 * dx;
        let matches = |a: f32, b: f32| (a - b).abs() <= 1e-4 * a.abs().max(b.abs());

        match self.trail.tex_world_size {
            Some(size) if !(size.is_finite() && size > 0.0) => Err(RippleError::config(
                "trail.tex_world_size",
                format!("must be positive, got {size}"),
            )),
            Some(size) if !matches(size, width) || !matches(size, height) => {
                Err(RippleError::config(
                    "trail.tex_world_size",
                    format!(
                        "window of {size} world units does not cover the {width} x {height} field"
                    ),
                ))
            }
            Some(size) => Ok(size),
            None if !matches(width, height) => Err(RippleError::config(
                "trail.tex_world_size",
                format!("the trail window is square but the field is {width} x {height}"),
            )),
            None => Ok(width),
        }
    }

    /// Validate every section, reporting the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        let resolution = self.resolution()?;
        let params = self.wave_params()?;

        if !params.is_stable() {
            tracing::warn!(
                cfl = params.cfl,
                "CFL exceeds the 2D stability bound 1/sqrt(2); the field will diverge"
            );
        }
        if !(self.solver.divergence_limit > 0.0) {
            return Err(RippleError::config(
                "solver.divergence_limit",
                format!("must be positive, got {}", self.solver.divergence_limit),
            ));
        }
        if !self.pulse.magnitude.is_finite() || !self.pulse.frequency.is_finite() {
            return Err(RippleError::config(
                "pulse",
                format!(
                    "magnitude and frequency must be finite (magnitude={}, frequency={})",
                    self.pulse.magnitude, self.pulse.frequency
                ),
            ));
        }
        self.pulse_cell()?;

        let trail = &self.trail;
        self.window_size()?;
        if !trail.origin.iter().all(|v| v.is_finite()) {
            return Err(RippleError::config(
                "trail.origin",
                format!("must be finite, got {:?}", trail.origin),
            ));
        }
        if !(trail.footprint_radius.is_finite() && trail.footprint_radius > 0.0) {
            return Err(RippleError::config(
                "trail.footprint_radius",
                format!("must be positive, got {}", trail.footprint_radius),
            ));
        }
        if !(0.0..=1.0).contains(&trail.decay) {
            return Err(RippleError::config(
                "trail.decay",
                format!("must be in [0, 1], got {}", trail.decay),
            ));
        }
        if !(trail.speed_gain.is_finite() && trail.speed_gain >= 0.0) {
            return Err(RippleError::config(
                "trail.speed_gain",
                format!("must be non-negative, got {}", trail.speed_gain),
            ));
        }
        if let Some([tx, ty]) = trail.resolution {
            if tx != resolution.nx || ty != resolution.ny {
                return Err(RippleError::config(
                    "trail.resolution",
                    format!("trail buffer is {tx}x{ty} but the field is {resolution}"),
                ));
            }
        }
        if !self.output.color_intensity.is_finite() {
            return Err(RippleError::config(
                "output.color_intensity",
                format!("must be finite, got {}", self.output.color_intensity),
            ));
        }
        Ok(())
    }

    /// Print a configuration summary to stdout.
    pub fn print_summary(&self) {
        let resolution = self
            .resolution()
            .map(|r| r.to_string())
            .unwrap_or_else(|e| e.to_string());
        println!("=== ripplefield configuration ===");
        println!(
            "Domain: {} x {} (dx = {}) => {}",
            self.domain.lx, self.domain.ly, self.domain.dx, resolution
        );
        println!(
            "Solver: CFL={}, c={}, elasticity={}, dispersion={}, wake={}, boundary={:?}, time={:?}",
            self.solver.cfl,
            self.solver.wave_speed,
            self.solver.elasticity,
            self.solver.dispersion,
            self.solver.wake_gain,
            self.solver.boundary,
            self.solver.time_accumulation
        );
        println!(
            "Pulse: magnitude={}, frequency={}, position={:?}",
            self.pulse.magnitude, self.pulse.frequency, self.pulse.position
        );
        let window = self
            .window_size()
            .map(|w| w.to_string())
            .unwrap_or_else(|e| e.to_string());
        println!(
            "Trail: window={} (follow={}), radius={}, decay={}, speed_gain={}",
            window,
            self.trail.follow_primary,
            self.trail.footprint_radius,
            self.trail.decay,
            self.trail.speed_gain
        );
        println!("=================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RippleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution().unwrap(), Resolution { nx: 100, ny: 100 });
        assert_eq!(config.solver.boundary, BoundaryPolicy::Absorptive);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = RippleConfig::from_toml_str(
            r#"
            [domain]
            lx = 6.4
            ly = 6.4

            [solver]
            boundary = "reflective"
            time_accumulation = "time-step"

            [pulse]
            position = [32, 32]
            "#,
        )
        .unwrap();

        assert_eq!(config.resolution().unwrap(), Resolution { nx: 64, ny: 64 });
        assert_eq!(config.solver.boundary, BoundaryPolicy::Reflective);
        assert_eq!(config.solver.time_accumulation, TimeAccumulation::TimeStep);
        assert_eq!(config.solver.cfl, 0.5);
        assert_eq!(config.pulse_cell().unwrap(), Some(GridCoord { x: 32, y: 32 }));
    }

    #[test]
    fn test_invalid_cfl_names_parameter() {
        let err = RippleConfig::from_toml_str("[solver]\ncfl = 1.2\n").unwrap_err();
        assert!(matches!(
            err,
            RippleError::Configuration {
                parameter: "solver.cfl",
                ..
            }
        ));
    }

    #[test]
    fn test_trail_resolution_mismatch() {
        let mut config = RippleConfig::default();
        config.trail.resolution = Some([256, 256]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("trail.resolution"));

        config.trail.resolution = Some([100, 100]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pulse_outside_grid_clamped() {
        let mut config = RippleConfig::default();
        config.pulse.position = Some([100, 0]);
        assert!(config.validate().is_ok());
        assert_eq!(config.pulse_cell().unwrap(), Some(GridCoord { x: 99, y: 0 }));

        config.pulse.position = Some([-5, 250]);
        assert_eq!(config.pulse_cell().unwrap(), Some(GridCoord { x: 0, y: 99 }));
    }

    #[test]
    fn test_window_derived_from_domain() {
        let config = RippleConfig::from_toml_str("[domain]\nlx = 6.4\nly = 6.4\n").unwrap();
        assert!((config.window_size().unwrap() - 6.4).abs() < 1e-5);

        let config = RippleConfig::from_toml_str(
            "[domain]\nlx = 6.4\nly = 6.4\n\n[trail]\ntex_world_size = 6.4\n",
        )
        .unwrap();
        assert!((config.window_size().unwrap() - 6.4).abs() < 1e-5);
    }

    #[test]
    fn test_window_mismatch_rejected() {
        let mut config = RippleConfig::default();
        config.domain.lx = 6.4;
        config.domain.ly = 6.4;
        config.trail.tex_world_size = Some(10.0);
        assert!(matches!(
            config.validate(),
            Err(RippleError::Configuration {
                parameter: "trail.tex_world_size",
                ..
            })
        ));

        config.trail.tex_world_size = Some(-1.0);
        assert!(config.validate().is_err());

        config.trail.tex_world_size = None;
        config.domain.ly = 3.2;
        assert!(matches!(
            config.validate(),
            Err(RippleError::Configuration {
                parameter: "trail.tex_world_size",
                ..
            })
        ));
    }

    #[test]
    fn test_non_finite_origin_rejected() {
        let mut config = RippleConfig::default();
        config.trail.origin = [f32::NAN, 0.0];
        assert!(matches!(
            config.validate(),
            Err(RippleError::Configuration {
                parameter: "trail.origin",
                ..
            })
        ));

        config.trail.origin = [0.0, f32::INFINITY];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_wake_gain_rejected() {
        let err = RippleConfig::from_toml_str("[solver]\nwake_gain = -1.0\n").unwrap_err();
        assert!(matches!(
            err,
            RippleError::Configuration {
                parameter: "solver.wake_gain",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = RippleConfig::from_toml_str("[solver\ncfl = ").unwrap_err();
        assert!(matches!(err, RippleError::ConfigParse(_)));
    }
}
