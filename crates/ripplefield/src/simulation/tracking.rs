//! Per-object motion tracking.
//!
//! Each tracked object carries an explicit [`PreviousState`]. Sampling is a
//! pure function of `(current, previous, dt)` that returns the motion sample
//! together with the state to use on the next frame; the registry only
//! stores what comes back.

use glam::{Vec2, Vec3};
use ripplefield_core::error::{Result, RippleError};
use ripplefield_core::params::MOTION_EPSILON;

/// Stable handle for a registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Position recorded on the previous frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousState {
    /// World position at the end of the last sampled frame.
    pub position: Vec3,
}

impl PreviousState {
    /// Seed from a starting position so the first sample reports no motion.
    pub fn at(position: Vec3) -> Self {
        Self { position }
    }
}

/// Motion of one object over one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Object the sample belongs to.
    pub id: ObjectId,
    /// Current world position.
    pub position: Vec3,
    /// World-space velocity (zero when below the motion threshold).
    pub velocity: Vec3,
    /// Magnitude of `velocity`.
    pub speed: f32,
    /// XZ displacement as a fraction of the trail window.
    pub uv_offset: Vec2,
}

/// Fail unless `dt` is a usable frame delta.
pub fn validate_frame_delta(dt: f32) -> Result<()> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(RippleError::InvalidFrameDelta(dt));
    }
    Ok(())
}

/// Compute the motion sample for one object and its next previous-state.
///
/// Displacements up to [`MOTION_EPSILON`] count as stationary and yield an
/// exactly zero velocity and uv offset.
pub fn track_motion(
    id: ObjectId,
    current: Vec3,
    previous: PreviousState,
    dt: f32,
    tex_world_size: f32,
) -> Result<(MotionSample, PreviousState)> {
    validate_frame_delta(dt)?;

    let delta = current - previous.position;
    let (velocity, uv_offset) = if delta.length() > MOTION_EPSILON {
        (
            delta / dt,
            Vec2::new(delta.x, delta.z) / tex_world_size,
        )
    } else {
        (Vec3::ZERO, Vec2::ZERO)
    };

    let sample = MotionSample {
        id,
        position: current,
        velocity,
        speed: velocity.length(),
        uv_offset,
    };
    Ok((sample, PreviousState::at(current)))
}

#[derive(Debug, Clone)]
struct TrackedObject {
    id: ObjectId,
    position: Vec3,
    previous: PreviousState,
}

/// Insertion-ordered set of tracked objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    objects: Vec<TrackedObject>,
    next_id: u32,
}

impl ObjectRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an object at `position`.
    pub fn register(&mut self, position: Vec3) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(TrackedObject {
            id,
            position,
            previous: PreviousState::at(position),
        });
        tracing::debug!(%id, ?position, "registered object");
        id
    }

    /// Stop tracking an object. Returns false if it was unknown.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        before != self.objects.len()
    }

    /// Move an object. Returns false if it was unknown.
    pub fn set_position(&mut self, id: ObjectId, position: Vec3) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.position = position;
                true
            }
            None => false,
        }
    }

    /// Current position of an object.
    pub fn position(&self, id: ObjectId) -> Option<Vec3> {
        self.objects.iter().find(|o| o.id == id).map(|o| o.position)
    }

    /// Current position of the first registered object.
    pub fn primary_position(&self) -> Option<Vec3> {
        self.objects.first().map(|o| o.position)
    }

    /// Object ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().map(|o| o.id)
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sample every object's motion over `dt`, in registration order.
    pub fn sample(&mut self, dt: f32, tex_world_size: f32) -> Result<Vec<MotionSample>> {
        validate_frame_delta(dt)?;
        let mut samples = Vec::with_capacity(self.objects.len());
        for object in &mut self.objects {
            let (sample, previous) =
                track_motion(object.id, object.position, object.previous, dt, tex_world_size)?;
            object.previous = previous;
            samples.push(sample);
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_offset_exact() {
        let previous = PreviousState::at(Vec3::new(1.0, 0.0, 2.0));
        let current = Vec3::new(1.5, 0.0, 1.0);
        let (sample, next) = track_motion(ObjectId(0), current, previous, 0.5, 10.0).unwrap();

        assert_eq!(sample.uv_offset, Vec2::new(0.05, -0.1));
        assert_eq!(sample.velocity, Vec3::new(1.0, 0.0, -2.0));
        assert!((sample.speed - 5.0_f32.sqrt()).abs() < 1e-6);
        assert_eq!(next.position, current);
    }

    #[test]
    fn test_small_motion_is_zero() {
        let previous = PreviousState::at(Vec3::ZERO);
        let current = Vec3::new(0.005, 0.005, 0.0);
        let (sample, next) = track_motion(ObjectId(0), current, previous, 0.016, 10.0).unwrap();

        assert_eq!(sample.velocity, Vec3::ZERO);
        assert_eq!(sample.speed, 0.0);
        assert_eq!(sample.uv_offset, Vec2::ZERO);
        assert_eq!(next.position, current);
    }

    #[test]
    fn test_invalid_delta_rejected() {
        let previous = PreviousState::at(Vec3::ZERO);
        for dt in [0.0, -0.1, f32::NAN] {
            let err = track_motion(ObjectId(0), Vec3::X, previous, dt, 10.0).unwrap_err();
            assert!(matches!(err, RippleError::InvalidFrameDelta(_)));
        }
    }

    #[test]
    fn test_first_frame_has_no_spike() {
        let mut registry = ObjectRegistry::new();
        registry.register(Vec3::new(40.0, 0.0, -12.0));
        let samples = registry.sample(0.016, 10.0).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].speed, 0.0);
        assert_eq!(samples[0].uv_offset, Vec2::ZERO);
    }

    #[test]
    fn test_registry_order_and_previous_state() {
        let mut registry = ObjectRegistry::new();
        let a = registry.register(Vec3::ZERO);
        let b = registry.register(Vec3::ONE);
        let c = registry.register(Vec3::splat(2.0));
        assert!(registry.remove(b));
        assert!(!registry.remove(b));

        registry.set_position(a, Vec3::new(1.0, 0.0, 0.0));
        let samples = registry.sample(1.0, 10.0).unwrap();
        let ids: Vec<_> = samples.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(samples[0].speed, 1.0);
        assert_eq!(samples[1].speed, 0.0);

        // Without further movement the next sample is stationary
        let samples = registry.sample(1.0, 10.0).unwrap();
        assert_eq!(samples[0].speed, 0.0);
        assert_eq!(registry.primary_position(), Some(Vec3::new(1.0, 0.0, 0.0)));
    }
}
