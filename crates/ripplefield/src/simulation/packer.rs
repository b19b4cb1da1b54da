//! Structured per-object buffer fed to the wave kernels.

use bytemuck::{Pod, Zeroable};

use super::tracking::MotionSample;

/// One disturbance source as laid out in the GPU storage buffer.
///
/// 24 bytes, tightly packed, matching the WGSL `Entry` struct of six `f32`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PackedDisturbanceEntry {
    /// World position.
    pub position: [f32; 3],
    /// Speed in world units per second.
    pub speed: f32,
    /// XZ displacement as a fraction of the trail window.
    pub uv_offset: [f32; 2],
}

impl PackedDisturbanceEntry {
    /// Size of one entry in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl From<&MotionSample> for PackedDisturbanceEntry {
    fn from(sample: &MotionSample) -> Self {
        Self {
            position: sample.position.to_array(),
            speed: sample.speed,
            uv_offset: sample.uv_offset.to_array(),
        }
    }
}

/// Rebuilds the entry array every frame.
#[derive(Debug, Default)]
pub struct DisturbancePacker {
    entries: Vec<PackedDisturbanceEntry>,
}

impl DisturbancePacker {
    /// Empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the packed entries with one per sample, in sample order.
    ///
    /// Stationary objects are kept so indices stay stable across frames.
    pub fn pack(&mut self, samples: &[MotionSample]) -> &[PackedDisturbanceEntry] {
        self.entries.clear();
        self.entries.extend(samples.iter().map(PackedDisturbanceEntry::from));
        &self.entries
    }

    /// Entries from the last `pack`.
    pub fn entries(&self) -> &[PackedDisturbanceEntry] {
        &self.entries
    }

    /// Raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }

    /// Number of packed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was packed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fastest packed object, zero when empty.
    pub fn max_speed(&self) -> f32 {
        self.entries.iter().fold(0.0, |acc, e| acc.max(e.speed))
    }
}
