//! Blend weights and the morph material uniform layout.

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use smallvec::SmallVec;

/// Fixed-capacity weight vector of one material instance.
///
/// The length always equals the capacity; unused slots hold zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphWeights {
    values: SmallVec<[f32; 4]>,
}

impl MorphWeights {
    #[must_use]
    pub fn zeroed(capacity: usize) -> Self {
        Self {
            values: SmallVec::from_elem(0.0, capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Overwrites the weights in place.
    ///
    /// Weights past the capacity are ignored; slots not covered by `weights`
    /// are reset to zero.
    pub fn set(&mut self, weights: &[f32]) {
        debug_assert!(
            weights.len() <= self.capacity(),
            "{} weights exceed the material capacity of {}",
            weights.len(),
            self.capacity()
        );
        let n = weights.len().min(self.capacity());
        self.values[..n].copy_from_slice(&weights[..n]);
        self.values[n..].fill(0.0);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

// ============================================================================
// Uniform layout
// ============================================================================

/// Fixed head of the `MorphParams` uniform. The weight array follows it as
/// `array<vec4<f32>, N>`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable, PartialEq)]
pub struct MorphUniformHeader {
    pub base_color: [f32; 4],
    /// `{ width, layer_base, target_count, 0 }`
    pub dimensions: [i32; 4],
}

impl MorphUniformHeader {
    #[must_use]
    pub fn new(base_color: Vec3, dimensions: IVec3) -> Self {
        Self {
            base_color: base_color.extend(1.0).to_array(),
            dimensions: dimensions.extend(0).to_array(),
        }
    }
}

/// Byte size of the `MorphParams` uniform for a given weight capacity.
#[must_use]
pub fn uniform_size(weight_capacity: usize) -> usize {
    std::mem::size_of::<MorphUniformHeader>() + weight_capacity.div_ceil(4) * 16
}

/// Serializes the `MorphParams` uniform.
#[must_use]
pub fn uniform_bytes(header: &MorphUniformHeader, weights: &MorphWeights) -> Vec<u8> {
    let size = uniform_size(weights.capacity());
    let mut bytes = Vec::with_capacity(size);
    bytes.extend_from_slice(bytemuck::bytes_of(header));
    bytes.extend_from_slice(bytemuck::cast_slice(weights.as_slice()));
    bytes.resize(size, 0);
    bytes
}
