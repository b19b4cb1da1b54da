//! CPU reference backend.

use super::backend::{BackendKind, DispatchInput, SolverBackend};
use super::buffers::StateBufferSet;
use super::solver::{self, Execution, StencilInputs};
use super::Field;
use ripplefield_core::error::Result;
use ripplefield_core::params::{BoundaryPolicy, Resolution, WaveParams};

/// Wave solver running on the host, sequentially or across the rayon pool.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    buffers: StateBufferSet,
    execution: Execution,
}

impl CpuBackend {
    /// Allocate buffers for `resolution`.
    pub fn new(resolution: Resolution, execution: Execution) -> Self {
        tracing::info!(%resolution, ?execution, "created CPU solver backend");
        Self {
            buffers: StateBufferSet::new(resolution),
            execution,
        }
    }

    /// Direct access to the buffers.
    pub fn buffers(&self) -> &StateBufferSet {
        &self.buffers
    }
}

impl SolverBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu(self.execution)
    }

    fn resolution(&self) -> Resolution {
        self.buffers.resolution()
    }

    fn rotate(&mut self, boundary: BoundaryPolicy, params: &WaveParams) -> Result<()> {
        self.buffers.commit_staged();
        let (curr, next) = self.buffers.boundary_views();
        solver::apply_boundary(curr, next, boundary, params.absorption_coefficient());
        self.buffers.rotate();
        Ok(())
    }

    fn dispatch(&mut self, input: &DispatchInput<'_>) -> Result<()> {
        input.obstacle.ensure_resolution("obstacle", self.resolution())?;

        if let Some((cell, value)) = input.forcing {
            self.buffers.curr_mut().set(cell.x, cell.y, value);
        }

        let inputs = StencilInputs {
            params: input.params,
            obstacle: input.obstacle,
            entries: input.entries,
            footprint: input.footprint,
        };
        solver::step_interior(self.buffers.step_views(), &inputs, self.execution);

        let (dx, dy) = input.scroll;
        self.buffers.stage_scroll(dx, dy);
        Ok(())
    }

    fn read_current(&mut self) -> Result<Field> {
        Ok(self.buffers.curr().clone())
    }

    fn reset(&mut self) -> Result<()> {
        self.buffers.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::solver::FootprintParams;
    use glam::Vec2;
    use ripplefield_core::params::GridCoord;

    fn input<'a>(obstacle: &'a Field, forcing: Option<(GridCoord, f32)>) -> DispatchInput<'a> {
        DispatchInput {
            params: WaveParams::default(),
            forcing,
            obstacle,
            entries: &[],
            footprint: FootprintParams {
                origin: Vec2::ZERO,
                tex_world_size: 10.0,
                radius: 0.5,
            },
            scroll: (0, 0),
        }
    }

    #[test]
    fn test_forcing_lands_in_curr() {
        let r = Resolution::new(16, 16).unwrap();
        let mut backend = CpuBackend::new(r, Execution::Sequential);
        let obstacle = Field::new(r);

        backend.rotate(BoundaryPolicy::Absorptive, &WaveParams::default()).unwrap();
        backend
            .dispatch(&input(&obstacle, Some((GridCoord { x: 5, y: 6 }, 0.25))))
            .unwrap();

        let field = backend.read_current().unwrap();
        assert_eq!(field.get(5, 6), 0.25);
        assert_eq!(field.energy(), 0.0625);
        // The stencil spread it into next
        assert!(backend.buffers().next().get(5, 6) > 0.0);
        assert!(backend.buffers().next().get(4, 6) > 0.0);
    }

    #[test]
    fn test_obstacle_resolution_checked() {
        let mut backend = CpuBackend::new(Resolution::new(16, 16).unwrap(), Execution::Parallel);
        let obstacle = Field::new(Resolution::new(8, 8).unwrap());
        let err = backend.dispatch(&input(&obstacle, None)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_scroll_is_staged_then_committed() {
        let r = Resolution::new(16, 16).unwrap();
        let mut backend = CpuBackend::new(r, Execution::Sequential);
        let obstacle = Field::new(r);
        let params = WaveParams::default();

        backend.rotate(BoundaryPolicy::Reflective, &params).unwrap();
        let mut frame = input(&obstacle, Some((GridCoord { x: 8, y: 8 }, 1.0)));
        frame.scroll = (2, 0);
        backend.dispatch(&frame).unwrap();
        assert!(backend.buffers().has_staged());
        assert_eq!(backend.read_current().unwrap().get(8, 8), 1.0);

        backend.rotate(BoundaryPolicy::Reflective, &params).unwrap();
        // Old curr moved two cells towards -x and became prev
        assert_eq!(backend.buffers().prev().get(6, 8), 1.0);
        assert_eq!(backend.buffers().prev().get(8, 8), 0.0);
    }

    fn rim_max(field: &Field) -> f32 {
        let (nx, ny) = (field.nx() as u32, field.ny() as u32);
        let mut max = 0.0_f32;
        for i in 0..nx {
            max = max.max(field.get(i, 0).abs()).max(field.get(i, ny - 1).abs());
        }
        for j in 0..ny {
            max = max.max(field.get(0, j).abs()).max(field.get(nx - 1, j).abs());
        }
        max
    }

    #[test]
    fn test_reflective_rim_zero_after_scroll() {
        let r = Resolution::new(16, 16).unwrap();
        let mut backend = CpuBackend::new(r, Execution::Sequential);
        let obstacle = Field::new(r);
        let params = WaveParams::default();

        backend.rotate(BoundaryPolicy::Reflective, &params).unwrap();
        // Pulse next to the rim, then scroll it onto the rim of both staged fields
        let mut frame = input(&obstacle, Some((GridCoord { x: 1, y: 8 }, 1.0)));
        frame.scroll = (1, 0);
        backend.dispatch(&frame).unwrap();
        assert!(backend.buffers().next().get(1, 8) > 0.0);

        backend.rotate(BoundaryPolicy::Reflective, &params).unwrap();
        assert_eq!(rim_max(backend.buffers().prev()), 0.0);
        assert_eq!(rim_max(backend.buffers().curr()), 0.0);

        backend.dispatch(&input(&obstacle, None)).unwrap();
        let published = backend.read_current().unwrap();
        assert_eq!(rim_max(&published), 0.0);
        assert!(published.max_abs() > 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let r = Resolution::new(8, 8).unwrap();
        let mut backend = CpuBackend::new(r, Execution::Sequential);
        let obstacle = Field::new(r);
        backend
            .dispatch(&input(&obstacle, Some((GridCoord { x: 3, y: 3 }, 1.0))))
            .unwrap();
        backend.reset().unwrap();
        assert_eq!(backend.read_current().unwrap().max_abs(), 0.0);
        assert_eq!(backend.kind(), BackendKind::Cpu(Execution::Sequential));
    }
}
