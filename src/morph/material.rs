//! Morph material instances.
//!
//! One instance exists per morphing primitive. Its `dimensions` address the
//! primitive's own layers of the shared texture, so every instance samples the
//! same texture with a different `layer_base`.

use glam::{IVec3, Vec3};

use super::weights::{MorphUniformHeader, MorphWeights, uniform_bytes};
use crate::asset::EntityId;
use crate::render::GpuMaterialState;

#[derive(Debug)]
pub struct MorphMaterialInstance {
    pub entity: EntityId,
    pub primitive_index: usize,
    pub base_color: Vec3,
    /// `{ width, layer_base, target_count }`
    pub dimensions: IVec3,
    weights: MorphWeights,
    /// Bumped on every parameter change; compared against the GPU copy.
    version: u64,
    pub(crate) gpu: Option<GpuMaterialState>,
}

impl MorphMaterialInstance {
    #[must_use]
    pub fn new(
        entity: EntityId,
        primitive_index: usize,
        base_color: Vec3,
        dimensions: IVec3,
        weight_capacity: usize,
    ) -> Self {
        Self {
            entity,
            primitive_index,
            base_color,
            dimensions,
            weights: MorphWeights::zeroed(weight_capacity),
            version: 0,
            gpu: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn weights(&self) -> &MorphWeights {
        &self.weights
    }

    pub fn set_weights(&mut self, weights: &[f32]) {
        self.weights.set(weights);
        self.version = self.version.wrapping_add(1);
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.dimensions.z as usize
    }

    /// Contents of the `MorphParams` uniform.
    #[must_use]
    pub fn uniform_bytes(&self) -> Vec<u8> {
        uniform_bytes(&MorphUniformHeader::new(self.base_color, self.dimensions), &self.weights)
    }

    /// Bind group of the uploaded material, `None` before upload.
    #[must_use]
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.gpu.as_ref().map(|gpu| &gpu.bind_group)
    }

    /// `true` when the GPU uniform lags behind the current parameters.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.gpu.as_ref().is_some_and(|gpu| gpu.version != self.version)
    }
}
