//! Triple-buffered wave state with optional scroll staging.
//!
//! Three same-resolution fields hold the `prev` (t-1), `curr` (t) and `next`
//! (t+1) roles. Rotation is a pair of handle swaps:
//!
//! ```text
//! before:  prev=A  curr=B  next=C
//! after:   prev=B  curr=C  next=A
//! ```
//!
//! Two staging fields hold scrolled copies of `next` and `curr` produced after
//! a dispatch. Staged data is committed into the true slots at the start of
//! the following rotation, before any slot is written again.

use super::Field;
use ripplefield_core::params::Resolution;

/// Owner of the solver's temporal buffers.
#[derive(Debug, Clone)]
pub struct StateBufferSet {
    prev: Field,
    curr: Field,
    next: Field,
    staged_next: Field,
    staged_curr: Field,
    staged: bool,
    rotations: u64,
}

/// Split borrow used by the stencil: read-only inputs, exclusive output.
pub struct StepViews<'a> {
    /// Field at t-1.
    pub prev: &'a Field,
    /// Field at t.
    pub curr: &'a Field,
    /// Field at t+1 (write target).
    pub next: &'a mut Field,
}

impl StateBufferSet {
    /// Allocate all buffers, zero-initialised.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            prev: Field::new(resolution),
            curr: Field::new(resolution),
            next: Field::new(resolution),
            staged_next: Field::new(resolution),
            staged_curr: Field::new(resolution),
            staged: false,
            rotations: 0,
        }
    }

    /// Buffer resolution.
    pub fn resolution(&self) -> Resolution {
        self.curr.resolution()
    }

    /// Field at t-1.
    pub fn prev(&self) -> &Field {
        &self.prev
    }

    /// Field at t.
    pub fn curr(&self) -> &Field {
        &self.curr
    }

    /// Field at t+1.
    pub fn next(&self) -> &Field {
        &self.next
    }

    /// Mutable `curr`, used for disturbance injection.
    pub fn curr_mut(&mut self) -> &mut Field {
        &mut self.curr
    }

    /// Mutable `curr` and `next` for the boundary pass.
    pub fn boundary_views(&mut self) -> (&mut Field, &mut Field) {
        (&mut self.curr, &mut self.next)
    }

    /// Split borrow for the stencil update.
    pub fn step_views(&mut self) -> StepViews<'_> {
        StepViews {
            prev: &self.prev,
            curr: &self.curr,
            next: &mut self.next,
        }
    }

    /// Number of rotations performed since allocation or the last reset.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Whether scrolled copies are waiting to be committed.
    pub fn has_staged(&self) -> bool {
        self.staged
    }

    /// Stage `next` and `curr` shifted by `(dx, dy)` cells.
    ///
    /// A zero offset stages nothing.
    pub fn stage_scroll(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            self.staged = false;
            return;
        }
        self.staged_next.shift_from(&self.next, dx, dy);
        self.staged_curr.shift_from(&self.curr, dx, dy);
        self.staged = true;
    }

    /// Move staged copies into the `next` and `curr` slots.
    pub fn commit_staged(&mut self) {
        if self.staged {
            std::mem::swap(&mut self.next, &mut self.staged_next);
            std::mem::swap(&mut self.curr, &mut self.staged_curr);
            self.staged = false;
        }
    }

    /// Rotate roles: `prev <- curr`, `curr <- next`, old `prev` becomes `next`.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.prev, &mut self.curr);
        std::mem::swap(&mut self.curr, &mut self.next);
        self.rotations += 1;
    }

    /// Zero every buffer and drop any staged data.
    pub fn reset(&mut self) {
        self.prev.clear();
        self.curr.clear();
        self.next.clear();
        self.staged_next.clear();
        self.staged_curr.clear();
        self.staged = false;
        self.rotations = 0;
    }
}
