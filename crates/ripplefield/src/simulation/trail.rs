//! Obstacle trail accumulation.
//!
//! Moving objects stamp a soft footprint into a persistent ping-pong pair of
//! fields. Every frame the previous trail is advected with the window,
//! attenuated by a speed-dependent retention, and combined with the new
//! footprints by `max`:
//!
//! ```text
//! trail(t) = max(footprint(t), retention · advect(trail(t-1)))
//! ```
//!
//! The result (combined with an optional static mask) is the obstacle field
//! the solver attenuates the wave with.

use glam::Vec2;

use super::packer::PackedDisturbanceEntry;
use super::solver::FootprintParams;
use super::tracking::{MotionSample, ObjectRegistry};
use super::Field;
use ripplefield_core::config::TrailConfig;
use ripplefield_core::error::{Result, RippleError};
use ripplefield_core::params::{Resolution, MAX_TRAIL_RETENTION, MOTION_EPSILON};

/// World-space square covered by the wave field and the trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailWindow {
    /// Centre in world XZ.
    pub origin: Vec2,
    /// Side length in world units.
    pub tex_world_size: f32,
}

impl TrailWindow {
    /// Move the centre towards `target`.
    ///
    /// Moves of at most [`MOTION_EPSILON`] are ignored so the window only
    /// jumps once enough displacement has built up, as are non-finite
    /// targets. Returns the move as a fraction of the window.
    pub fn follow(&mut self, target: Vec2) -> Vec2 {
        if !target.is_finite() {
            return Vec2::ZERO;
        }
        let delta = target - self.origin;
        if delta.length() > MOTION_EPSILON {
            self.origin = target;
            delta / self.tex_world_size
        } else {
            Vec2::ZERO
        }
    }

    /// Footprint geometry for this window.
    pub fn footprint(&self, radius: f32) -> FootprintParams {
        FootprintParams {
            origin: self.origin,
            tex_world_size: self.tex_world_size,
            radius,
        }
    }
}

/// Shaping of the trail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailParams {
    /// Footprint radius in world units.
    pub footprint_radius: f32,
    /// Base per-frame retention.
    pub decay: f32,
    /// Extra retention per unit of speed of the fastest object.
    pub speed_gain: f32,
}

impl TrailParams {
    /// Retention for a frame whose fastest object moves at `max_speed`.
    pub fn retention(&self, max_speed: f32) -> f32 {
        (self.decay + self.speed_gain * max_speed).clamp(0.0, MAX_TRAIL_RETENTION)
    }
}

impl From<&TrailConfig> for TrailParams {
    fn from(config: &TrailConfig) -> Self {
        Self {
            footprint_radius: config.footprint_radius,
            decay: config.decay,
            speed_gain: config.speed_gain,
        }
    }
}

/// Outcome of the tracking half of a frame.
#[derive(Debug, Clone)]
pub struct TrackedFrame {
    /// Motion samples in registration order.
    pub samples: Vec<MotionSample>,
    /// How far the window moved this frame, as a fraction of its size.
    pub window_uv: Vec2,
}

/// Tracks moving objects and accumulates their trail.
#[derive(Debug, Clone)]
pub struct ObstacleTrailTracker {
    registry: ObjectRegistry,
    window: TrailWindow,
    follow_primary: bool,
    params: TrailParams,
    front: Field,
    back: Field,
    static_mask: Option<Field>,
    combined: Field,
}

impl ObstacleTrailTracker {
    /// Create a tracker whose trail matches the field `resolution` and whose
    /// window spans `window_size` world units.
    pub fn new(resolution: Resolution, window_size: f32, config: &TrailConfig) -> Result<Self> {
        if !(window_size.is_finite() && window_size > 0.0) {
            return Err(RippleError::config(
                "trail.tex_world_size",
                format!("must be positive, got {window_size}"),
            ));
        }
        if let Some([tx, ty]) = config.resolution {
            if tx != resolution.nx || ty != resolution.ny {
                return Err(RippleError::config(
                    "trail.resolution",
                    format!("trail buffer is {tx}x{ty} but the field is {resolution}"),
                ));
            }
        }
        Ok(Self {
            registry: ObjectRegistry::new(),
            window: TrailWindow {
                origin: Vec2::from(config.origin),
                tex_world_size: window_size,
            },
            follow_primary: config.follow_primary,
            params: TrailParams::from(config),
            front: Field::new(resolution),
            back: Field::new(resolution),
            static_mask: None,
            combined: Field::new(resolution),
        })
    }

    /// Tracked objects.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Tracked objects, for registering and moving.
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    /// Current window.
    pub fn window(&self) -> TrailWindow {
        self.window
    }

    /// Trail shaping parameters.
    pub fn params(&self) -> TrailParams {
        self.params
    }

    /// Footprint geometry for the current window.
    pub fn footprint(&self) -> FootprintParams {
        self.window.footprint(self.params.footprint_radius)
    }

    /// Accumulated trail without the static mask.
    pub fn trail(&self) -> &Field {
        &self.front
    }

    /// Install a static obstacle mask, combined with the trail by `max`.
    pub fn set_static_mask(&mut self, mask: Field) -> Result<()> {
        mask.ensure_resolution("obstacle", self.front.resolution())?;
        self.static_mask = Some(mask);
        self.refresh_combined();
        Ok(())
    }

    /// Remove the static mask.
    pub fn clear_static_mask(&mut self) {
        self.static_mask = None;
    }

    /// Obstacle field handed to the solver.
    pub fn obstacle(&self) -> &Field {
        if self.static_mask.is_some() {
            &self.combined
        } else {
            &self.front
        }
    }

    /// Forget the accumulated trail history.
    pub fn clear(&mut self) {
        self.front.clear();
        self.back.clear();
        self.refresh_combined();
    }

    /// Sample object motion and move the window.
    pub fn track(&mut self, dt: f32) -> Result<TrackedFrame> {
        let samples = self.registry.sample(dt, self.window.tex_world_size)?;
        let window_uv = match self.registry.primary_position() {
            Some(primary) if self.follow_primary => {
                self.window.follow(Vec2::new(primary.x, primary.z))
            }
            _ => Vec2::ZERO,
        };
        Ok(TrackedFrame { samples, window_uv })
    }

    /// Advance the trail by one frame.
    pub fn accumulate(
        &mut self,
        entries: &[PackedDisturbanceEntry],
        window_uv: Vec2,
        max_speed: f32,
    ) {
        let resolution = self.front.resolution();
        let footprint = self.footprint();
        let retention = self.params.retention(max_speed);
        let shift = Vec2::new(
            window_uv.x * resolution.nx as f32,
            window_uv.y * resolution.ny as f32,
        );

        for j in 0..resolution.ny {
            for i in 0..resolution.nx {
                let stamp = if entries.is_empty() {
                    0.0
                } else {
                    footprint.coverage_at(footprint.cell_world(resolution, i, j), entries)
                };
                let carried = if shift == Vec2::ZERO {
                    self.front.get(i, j)
                } else {
                    self.front.sample_bilinear(i as f32 + shift.x, j as f32 + shift.y)
                };
                self.back.set(i, j, stamp.max(retention * carried));
            }
        }

        std::mem::swap(&mut self.front, &mut self.back);
        self.refresh_combined();
    }

    fn refresh_combined(&mut self) {
        if let Some(mask) = &self.static_mask {
            for ((out, trail), fixed) in self
                .combined
                .as_mut_slice()
                .iter_mut()
                .zip(self.front.as_slice())
                .zip(mask.as_slice())
            {
                *out = trail.max(*fixed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn tracker(follow: bool) -> ObstacleTrailTracker {
        let config = TrailConfig {
            tex_world_size: None,
            origin: [0.0, 0.0],
            follow_primary: follow,
            footprint_radius: 0.5,
            decay: 0.5,
            speed_gain: 0.0,
            resolution: None,
        };
        ObstacleTrailTracker::new(Resolution::new(20, 20).unwrap(), 10.0, &config).unwrap()
    }

    fn entry(x: f32, z: f32) -> PackedDisturbanceEntry {
        PackedDisturbanceEntry {
            position: [x, 0.0, z],
            speed: 0.0,
            uv_offset: [0.0, 0.0],
        }
    }

    #[test]
    fn test_retention_clamped() {
        let params = TrailParams {
            footprint_radius: 0.5,
            decay: 0.9,
            speed_gain: 0.1,
        };
        assert_eq!(params.retention(0.0), 0.9);
        assert_eq!(params.retention(50.0), MAX_TRAIL_RETENTION);
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let config = TrailConfig {
            resolution: Some([32, 32]),
            ..TrailConfig::default()
        };
        let err = ObstacleTrailTracker::new(Resolution::new(64, 64).unwrap(), 6.4, &config)
            .unwrap_err();
        assert!(err.to_string().contains("trail.resolution"));

        let resolution = Resolution::new(64, 64).unwrap();
        let err = ObstacleTrailTracker::new(resolution, 0.0, &TrailConfig::default()).unwrap_err();
        assert!(err.to_string().contains("trail.tex_world_size"));
    }

    #[test]
    fn test_footprint_stamped_and_decays() {
        let mut tracker = tracker(false);
        // Cell (10, 10) centre is at world (0.25, 0.25)
        tracker.accumulate(&[entry(0.25, 0.25)], Vec2::ZERO, 0.0);
        assert_eq!(tracker.trail().get(10, 10), 1.0);
        assert_eq!(tracker.trail().get(0, 0), 0.0);

        tracker.accumulate(&[], Vec2::ZERO, 0.0);
        assert_eq!(tracker.trail().get(10, 10), 0.5);
        tracker.accumulate(&[], Vec2::ZERO, 0.0);
        assert_eq!(tracker.trail().get(10, 10), 0.25);

        tracker.clear();
        assert_eq!(tracker.trail().max_abs(), 0.0);
    }

    #[test]
    fn test_trail_advects_with_window() {
        let mut tracker = tracker(false);
        tracker.accumulate(&[entry(0.25, 0.25)], Vec2::ZERO, 0.0);
        // Window moved one cell (0.5 world units) towards +x
        tracker.accumulate(&[], Vec2::new(0.05, 0.0), 0.0);
        assert_eq!(tracker.trail().get(9, 10), 0.5);
        assert_eq!(tracker.trail().get(10, 10), 0.0);
    }

    #[test]
    fn test_window_follows_primary() {
        let mut tracker = tracker(true);
        let id = tracker.registry_mut().register(Vec3::ZERO);

        let frame = tracker.track(0.1).unwrap();
        assert_eq!(frame.window_uv, Vec2::ZERO);

        tracker.registry_mut().set_position(id, Vec3::new(1.0, 0.0, -0.5));
        let frame = tracker.track(0.1).unwrap();
        assert_eq!(frame.window_uv, Vec2::new(0.1, -0.05));
        assert_eq!(tracker.window().origin, Vec2::new(1.0, -0.5));
        assert_eq!(frame.samples[0].uv_offset, Vec2::new(0.1, -0.05));

        // Sub-threshold moves leave the window in place
        tracker.registry_mut().set_position(id, Vec3::new(1.005, 0.0, -0.5));
        let frame = tracker.track(0.1).unwrap();
        assert_eq!(frame.window_uv, Vec2::ZERO);
        assert_eq!(tracker.window().origin, Vec2::new(1.0, -0.5));
    }

    #[test]
    fn test_window_ignores_non_finite_target() {
        let mut window = TrailWindow {
            origin: Vec2::new(1.0, 2.0),
            tex_world_size: 10.0,
        };
        assert_eq!(window.follow(Vec2::new(f32::NAN, 0.0)), Vec2::ZERO);
        assert_eq!(window.follow(Vec2::new(0.0, f32::INFINITY)), Vec2::ZERO);
        assert_eq!(window.origin, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_huge_window_jump_clears_trail() {
        let mut tracker = tracker(false);
        tracker.accumulate(&[entry(0.25, 0.25)], Vec2::ZERO, 0.0);
        tracker.accumulate(&[], Vec2::new(1.0e30, -1.0e30), 0.0);
        assert_eq!(tracker.trail().max_abs(), 0.0);
    }

    #[test]
    fn test_static_mask_combined_by_max() {
        let mut tracker = tracker(false);
        let resolution = Resolution::new(20, 20).unwrap();
        let mut mask = Field::new(resolution);
        mask.set(2, 3, 0.75);
        mask.set(10, 10, 0.25);
        tracker.set_static_mask(mask).unwrap();
        tracker.accumulate(&[entry(0.25, 0.25)], Vec2::ZERO, 0.0);

        assert_eq!(tracker.obstacle().get(2, 3), 0.75);
        assert_eq!(tracker.obstacle().get(10, 10), 1.0);
        assert_eq!(tracker.trail().get(2, 3), 0.0);

        let wrong = Field::new(Resolution::new(10, 10).unwrap());
        assert!(tracker.set_static_mask(wrong).is_err());
    }
}
