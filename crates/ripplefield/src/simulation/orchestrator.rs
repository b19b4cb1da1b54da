//! Per-frame sequencing.
//!
//! Every tick walks the same linear sequence of stages:
//!
//! ```text
//! Idle -> Rotating -> Tracking -> Packing -> Dispatching -> Published
//! ```
//!
//! A tick may only start from `Idle` or `Published`. If a stage fails the
//! orchestrator stays in that stage and refuses further ticks until
//! [`FrameOrchestrator::reset`] is called, so a half-rotated buffer set is
//! never advanced.

use glam::Vec2;

use super::backend::{DispatchInput, SolverBackend};
use super::output::IntensityImage;
use super::packer::DisturbancePacker;
use super::trail::ObstacleTrailTracker;
use super::tracking::validate_frame_delta;
use super::Field;
use ripplefield_core::config::RippleConfig;
use ripplefield_core::error::{Result, RippleError, StateError};
use ripplefield_core::params::{
    BoundaryPolicy, GridCoord, Resolution, TimeAccumulation, WaveParams,
};

/// Position of the orchestrator within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    /// No frame has run since creation or reset.
    #[default]
    Idle,
    /// Committing staged data, applying the boundary, rotating roles.
    Rotating,
    /// Sampling object motion.
    Tracking,
    /// Packing disturbances and accumulating the trail.
    Packing,
    /// Running the stencil.
    Dispatching,
    /// Frame complete and readable.
    Published,
}

impl std::fmt::Display for FrameStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameStage::Idle => write!(f, "idle"),
            FrameStage::Rotating => write!(f, "rotating"),
            FrameStage::Tracking => write!(f, "tracking"),
            FrameStage::Packing => write!(f, "packing"),
            FrameStage::Dispatching => write!(f, "dispatching"),
            FrameStage::Published => write!(f, "published"),
        }
    }
}

impl FrameStage {
    /// Whether a new frame may begin from this stage.
    pub fn accepts_tick(&self) -> bool {
        matches!(self, FrameStage::Idle | FrameStage::Published)
    }
}

/// Host input for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Wall-clock frame delta in seconds.
    pub dt: f32,
    /// Pointer cell driving the point forcing; clamped into the grid.
    pub pointer: Option<[i64; 2]>,
}

impl FrameInput {
    /// Frame without pointer input.
    pub fn new(dt: f32) -> Self {
        Self { dt, pointer: None }
    }

    /// Attach a pointer cell.
    pub fn with_pointer(mut self, x: i64, y: i64) -> Self {
        self.pointer = Some([x, y]);
        self
    }
}

/// Summary of a published frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// 1-based frame number.
    pub frame: u64,
    /// Simulation time used for this frame's forcing.
    pub sim_time: f32,
    /// Largest absolute value in the published field.
    pub max_amplitude: f32,
    /// Sum of squares of the published field.
    pub energy: f32,
    /// Number of tracked objects.
    pub object_count: usize,
    /// Whole-cell scroll applied after the stencil.
    pub scroll: (i32, i32),
}

/// Point forcing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PulseSettings {
    magnitude: f32,
    frequency: f32,
    cell: Option<GridCoord>,
}

/// Drives one backend, the trail tracker and the packer through each frame.
pub struct FrameOrchestrator {
    backend: Option<Box<dyn SolverBackend>>,
    resolution: Resolution,
    params: WaveParams,
    boundary: BoundaryPolicy,
    time_accumulation: TimeAccumulation,
    divergence_limit: f32,
    color_intensity: f32,
    pulse: PulseSettings,
    tracker: ObstacleTrailTracker,
    packer: DisturbancePacker,
    stage: FrameStage,
    frame: u64,
    sim_time: f32,
    scroll_remainder: Vec2,
    published: Option<Field>,
}

impl FrameOrchestrator {
    /// Orchestrator without a backend; ticks fail until one is attached.
    pub fn new(config: &RippleConfig) -> Result<Self> {
        config.validate()?;
        let resolution = config.resolution()?;
        Ok(Self {
            backend: None,
            resolution,
            params: config.wave_params()?,
            boundary: config.solver.boundary,
            time_accumulation: config.solver.time_accumulation,
            divergence_limit: config.solver.divergence_limit,
            color_intensity: config.output.color_intensity,
            pulse: PulseSettings {
                magnitude: config.pulse.magnitude,
                frequency: config.pulse.frequency,
                cell: config.pulse_cell()?,
            },
            tracker: ObstacleTrailTracker::new(resolution, config.window_size()?, &config.trail)?,
            packer: DisturbancePacker::new(),
            stage: FrameStage::Idle,
            frame: 0,
            sim_time: 0.0,
            scroll_remainder: Vec2::ZERO,
            published: None,
        })
    }

    /// Orchestrator driving `backend`.
    pub fn with_backend(config: &RippleConfig, backend: Box<dyn SolverBackend>) -> Result<Self> {
        let mut orchestrator = Self::new(config)?;
        orchestrator.attach_backend(backend)?;
        Ok(orchestrator)
    }

    /// Install the backend. Its resolution must match the configuration.
    pub fn attach_backend(&mut self, backend: Box<dyn SolverBackend>) -> Result<()> {
        if backend.resolution() != self.resolution {
            return Err(RippleError::config(
                "backend",
                format!(
                    "backend is {} but the configured field is {}",
                    backend.resolution(),
                    self.resolution
                ),
            ));
        }
        tracing::info!(
            backend = %backend.kind(),
            resolution = %self.resolution,
            dt = self.params.dt(),
            "attached solver backend"
        );
        self.backend = Some(backend);
        Ok(())
    }

    /// Field resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Current stage.
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Number of completed frames.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulation clock.
    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    /// Solver parameters.
    pub fn params(&self) -> WaveParams {
        self.params
    }

    /// Trail tracker, for registering and moving objects.
    pub fn tracker(&self) -> &ObstacleTrailTracker {
        &self.tracker
    }

    /// Mutable trail tracker.
    pub fn tracker_mut(&mut self) -> &mut ObstacleTrailTracker {
        &mut self.tracker
    }

    /// Field published by the last completed frame.
    pub fn published(&self) -> Option<&Field> {
        self.published.as_ref()
    }

    /// Display mapping of the last published field.
    pub fn intensity(&self) -> Option<IntensityImage> {
        self.published
            .as_ref()
            .map(|field| IntensityImage::from_field(field, self.color_intensity))
    }

    /// Run one frame.
    pub fn tick(&mut self, input: &FrameInput) -> Result<FrameReport> {
        if !self.stage.accepts_tick() {
            return Err(StateError::FrameInProgress {
                frame: self.frame + 1,
                stage: self.stage.to_string(),
            }
            .into());
        }
        let backend = self.backend.as_deref_mut().ok_or(StateError::NotAllocated)?;
        validate_frame_delta(input.dt)?;

        let frame = self.frame + 1;
        let t = self.sim_time;

        self.stage = FrameStage::Rotating;
        backend.rotate(self.boundary, &self.params)?;

        self.stage = FrameStage::Tracking;
        let tracked = self.tracker.track(input.dt)?;

        self.stage = FrameStage::Packing;
        self.packer.pack(&tracked.samples);
        let max_speed = self.packer.max_speed();
        self.tracker.accumulate(self.packer.entries(), tracked.window_uv, max_speed);

        self.stage = FrameStage::Dispatching;
        let forcing = forcing_cell(self.resolution, self.pulse.cell, input.pointer).map(|cell| {
            let value = self.params.forcing(t, self.pulse.magnitude, self.pulse.frequency);
            (cell, value)
        });
        let scroll = scroll_cells(self.resolution, tracked.window_uv, &mut self.scroll_remainder);
        backend.dispatch(&DispatchInput {
            params: self.params,
            forcing,
            obstacle: self.tracker.obstacle(),
            entries: self.packer.entries(),
            footprint: self.tracker.footprint(),
            scroll,
        })?;
        self.sim_time += self.params.time_increment(self.time_accumulation);

        let field = backend.read_current()?;
        let max_amplitude = field.max_abs();
        if !max_amplitude.is_finite() || max_amplitude > self.divergence_limit {
            tracing::warn!(frame, max_amplitude, "wave field diverged");
            return Err(RippleError::Diverged {
                frame,
                max_abs: max_amplitude,
            });
        }

        let report = FrameReport {
            frame,
            sim_time: t,
            max_amplitude,
            energy: field.energy(),
            object_count: tracked.samples.len(),
            scroll,
        };
        self.published = Some(field);
        self.frame = frame;
        self.stage = FrameStage::Published;
        tracing::debug!(
            frame,
            sim_time = t,
            max_amplitude,
            energy = report.energy,
            objects = report.object_count,
            "frame published"
        );
        Ok(report)
    }

    /// Zero all state and return to `Idle`.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(backend) = self.backend.as_deref_mut() {
            backend.reset()?;
        }
        self.tracker.clear();
        self.stage = FrameStage::Idle;
        self.frame = 0;
        self.sim_time = 0.0;
        self.scroll_remainder = Vec2::ZERO;
        self.published = None;
        Ok(())
    }
}

/// Cell to force this frame: the clamped pointer, else the configured pulse.
fn forcing_cell(
    resolution: Resolution,
    configured: Option<GridCoord>,
    pointer: Option<[i64; 2]>,
) -> Option<GridCoord> {
    match pointer {
        Some([x, y]) => {
            let (cell, clamped) = resolution.clamp_cell(x, y);
            if clamped {
                tracing::debug!(
                    x,
                    y,
                    cell_x = cell.x,
                    cell_y = cell.y,
                    "pointer clamped into grid"
                );
            }
            Some(cell)
        }
        None => configured,
    }
}

/// Whole cells to scroll by, carrying the fractional part forward.
fn scroll_cells(resolution: Resolution, window_uv: Vec2, remainder: &mut Vec2) -> (i32, i32) {
    let offset = Vec2::new(
        window_uv.x * resolution.nx as f32,
        window_uv.y * resolution.ny as f32,
    ) + *remainder;
    let whole = offset.trunc();
    // A jump of a full window or more shifts everything out
    let limit = Vec2::new(resolution.nx as f32, resolution.ny as f32);
    let cells = whole.clamp(-limit, limit);
    *remainder = if cells == whole {
        offset - whole
    } else {
        Vec2::ZERO
    };
    (cells.x as i32, cells.y as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::backend::BackendKind;
    use crate::simulation::cpu_backend::CpuBackend;
    use crate::simulation::solver::Execution;
    use glam::Vec3;

    fn config() -> RippleConfig {
        let mut config = RippleConfig::default();
        config.domain.lx = 6.4;
        config.domain.ly = 6.4;
        config
    }

    fn orchestrator(config: &RippleConfig) -> FrameOrchestrator {
        let resolution = config.resolution().unwrap();
        FrameOrchestrator::with_backend(
            config,
            Box::new(CpuBackend::new(resolution, Execution::Sequential)),
        )
        .unwrap()
    }

    /// Backend that fails its dispatch on demand.
    struct FlakyBackend {
        inner: CpuBackend,
        fail_dispatch: bool,
    }

    impl SolverBackend for FlakyBackend {
        fn kind(&self) -> BackendKind {
            self.inner.kind()
        }
        fn resolution(&self) -> Resolution {
            self.inner.resolution()
        }
        fn rotate(&mut self, boundary: BoundaryPolicy, params: &WaveParams) -> Result<()> {
            self.inner.rotate(boundary, params)
        }
        fn dispatch(&mut self, input: &DispatchInput<'_>) -> Result<()> {
            if self.fail_dispatch {
                self.fail_dispatch = false;
                return Err(RippleError::Backend("device lost".into()));
            }
            self.inner.dispatch(input)
        }
        fn read_current(&mut self) -> Result<Field> {
            self.inner.read_current()
        }
        fn reset(&mut self) -> Result<()> {
            self.inner.reset()
        }
    }

    #[test]
    fn test_tick_without_backend() {
        let mut orchestrator = FrameOrchestrator::new(&config()).unwrap();
        let err = orchestrator.tick(&FrameInput::new(0.016)).unwrap_err();
        assert!(matches!(err, RippleError::State(StateError::NotAllocated)));
        assert_eq!(orchestrator.stage(), FrameStage::Idle);
    }

    #[test]
    fn test_backend_resolution_checked() {
        let config = config();
        let backend = CpuBackend::new(Resolution::new(32, 32).unwrap(), Execution::Sequential);
        let err = FrameOrchestrator::with_backend(&config, Box::new(backend))
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_first_tick_injects_pulse() {
        let mut orchestrator = orchestrator(&config());
        let report = orchestrator
            .tick(&FrameInput::new(0.016).with_pointer(32, 32))
            .unwrap();

        assert_eq!(orchestrator.stage(), FrameStage::Published);
        assert_eq!(report.frame, 1);
        assert_eq!(report.sim_time, 0.0);
        assert!((report.max_amplitude - 0.05).abs() < 1e-6);
        assert!((orchestrator.sim_time() - 0.1).abs() < 1e-7);

        let field = orchestrator.published().unwrap();
        assert!((field.get(32, 32) - 0.05).abs() < 1e-6);
        assert_eq!(field.get(31, 32), 0.0);
    }

    #[test]
    fn test_pointer_clamped_not_rejected() {
        let mut orchestrator = orchestrator(&config());
        orchestrator
            .tick(&FrameInput::new(0.016).with_pointer(1000, -5))
            .unwrap();
        let field = orchestrator.published().unwrap();
        assert!((field.get(63, 0) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_delta_keeps_stage() {
        let mut orchestrator = orchestrator(&config());
        let err = orchestrator.tick(&FrameInput::new(0.0)).unwrap_err();
        assert!(matches!(err, RippleError::InvalidFrameDelta(_)));
        assert_eq!(orchestrator.stage(), FrameStage::Idle);
        assert!(orchestrator.tick(&FrameInput::new(0.016)).is_ok());
    }

    #[test]
    fn test_failed_frame_blocks_until_reset() {
        let config = config();
        let resolution = config.resolution().unwrap();
        let backend = FlakyBackend {
            inner: CpuBackend::new(resolution, Execution::Sequential),
            fail_dispatch: true,
        };
        let mut orchestrator = FrameOrchestrator::with_backend(&config, Box::new(backend)).unwrap();

        let err = orchestrator.tick(&FrameInput::new(0.016)).unwrap_err();
        assert!(matches!(err, RippleError::Backend(_)));
        assert_eq!(orchestrator.stage(), FrameStage::Dispatching);

        let err = orchestrator.tick(&FrameInput::new(0.016)).unwrap_err();
        match err {
            RippleError::State(StateError::FrameInProgress { frame, stage }) => {
                assert_eq!(frame, 1);
                assert_eq!(stage, "dispatching");
            }
            other => panic!("unexpected error {other:?}"),
        }

        orchestrator.reset().unwrap();
        assert_eq!(orchestrator.stage(), FrameStage::Idle);
        assert_eq!(orchestrator.tick(&FrameInput::new(0.016)).unwrap().frame, 1);
    }

    #[test]
    fn test_divergence_surfaced() {
        let mut config = config();
        config.solver.divergence_limit = 0.01;
        let mut orchestrator = orchestrator(&config);
        let err = orchestrator
            .tick(&FrameInput::new(0.016).with_pointer(10, 10))
            .unwrap_err();
        assert!(matches!(err, RippleError::Diverged { frame: 1, .. }));
        assert!(!orchestrator.stage().accepts_tick());
    }

    #[test]
    fn test_time_step_accumulation() {
        let mut config = config();
        config.solver.time_accumulation = TimeAccumulation::TimeStep;
        let mut orchestrator = orchestrator(&config);
        for _ in 0..4 {
            orchestrator.tick(&FrameInput::new(0.016)).unwrap();
        }
        assert!((orchestrator.sim_time() - 0.2).abs() < 1e-6);
        assert_eq!(orchestrator.frame(), 4);
    }

    #[test]
    fn test_objects_counted_and_window_scrolls() {
        let mut orchestrator = orchestrator(&config());
        let id = orchestrator.tracker_mut().registry_mut().register(Vec3::ZERO);
        orchestrator.tracker_mut().registry_mut().register(Vec3::new(2.0, 0.0, 2.0));

        let report = orchestrator.tick(&FrameInput::new(0.1)).unwrap();
        assert_eq!(report.object_count, 2);
        assert_eq!(report.scroll, (0, 0));

        // 0.16 world units = 1.6 cells of the 6.4-unit window at 64 cells
        orchestrator
            .tracker_mut()
            .registry_mut()
            .set_position(id, Vec3::new(0.16, 0.0, 0.0));
        let report = orchestrator.tick(&FrameInput::new(0.1)).unwrap();
        assert_eq!(report.scroll, (1, 0));

        orchestrator
            .tracker_mut()
            .registry_mut()
            .set_position(id, Vec3::new(0.32, 0.0, 0.0));
        let report = orchestrator.tick(&FrameInput::new(0.1)).unwrap();
        // Carried remainder 0.6 + 1.6
        assert_eq!(report.scroll, (2, 0));
    }

    #[test]
    fn test_scroll_clamped_to_window() {
        let resolution = Resolution::new(64, 64).unwrap();
        let mut remainder = Vec2::new(0.5, 0.0);
        let cells = scroll_cells(resolution, Vec2::new(1.0e30, -3.0), &mut remainder);
        assert_eq!(cells, (64, -64));
        assert_eq!(remainder, Vec2::ZERO);

        let cells = scroll_cells(resolution, Vec2::new(0.5, 0.0), &mut remainder);
        assert_eq!(cells, (32, 0));
    }

    #[test]
    fn test_trail_drives_obstacle() {
        let mut orchestrator = orchestrator(&config());
        orchestrator.tracker_mut().registry_mut().register(Vec3::ZERO);
        orchestrator.tick(&FrameInput::new(0.1)).unwrap();
        // Cell (32, 32) centre lies inside the footprint of the object
        assert_eq!(orchestrator.tracker().obstacle().get(32, 32), 1.0);
        assert_eq!(orchestrator.tracker().obstacle().get(0, 0), 0.0);
    }

    #[test]
    fn test_reset_restarts_clock() {
        let mut orchestrator = orchestrator(&config());
        orchestrator
            .tick(&FrameInput::new(0.016).with_pointer(5, 5))
            .unwrap();
        orchestrator.reset().unwrap();
        assert_eq!(orchestrator.frame(), 0);
        assert_eq!(orchestrator.sim_time(), 0.0);
        assert!(orchestrator.published().is_none());
        let report = orchestrator.tick(&FrameInput::new(0.016)).unwrap();
        assert_eq!(report.max_amplitude, 0.0);
    }
}
