//! CPU mirror of the morph vertex shader.
//!
//! [`MorphSampler`] runs the exact loop of `apply_morph` in `morph.wgsl`
//! against a [`TexelImage`]. Tools use it to preview morphed meshes without a
//! GPU; the tests use it as the reference for the shader contract.

use glam::{IVec3, Vec3};

use super::layout::{morph_uv, uv_to_texel};
use super::tangents::frame_normal;
use super::texture::TexelImage;
use super::weights::MorphWeights;

pub struct MorphSampler<'a> {
    image: &'a TexelImage,
    capacity: usize,
}

impl<'a> MorphSampler<'a> {
    #[must_use]
    pub fn new(image: &'a TexelImage, capacity: usize) -> Self {
        Self { image, capacity }
    }

    fn active_targets(&self, dimensions: IVec3) -> i32 {
        dimensions.z.clamp(0, self.capacity as i32)
    }

    fn sample(&self, vertex_id: i32, target: i32, dimensions: IVec3) -> glam::Vec4 {
        let (x, layer) = uv_to_texel(morph_uv(vertex_id, target, dimensions), dimensions.x as u32);
        self.image.texel(x, layer)
    }

    /// Morphed position of vertex `vertex_id`.
    #[must_use]
    pub fn displace(&self, position: Vec3, vertex_id: u32, dimensions: IVec3, weights: &MorphWeights) -> Vec3 {
        let mut out = position;
        for i in 0..self.active_targets(dimensions) {
            let weight = weights.get(i as usize);
            out += weight * self.sample(vertex_id as i32, i, dimensions).truncate();
        }
        out
    }

    /// Morphed (unnormalized) normal of vertex `vertex_id`. Targets without a
    /// packed normal frame leave the normal untouched.
    #[must_use]
    pub fn displace_normal(&self, normal: Vec3, vertex_id: u32, dimensions: IVec3, weights: &MorphWeights) -> Vec3 {
        if !self.image.layout.has_normal_half() {
            return normal;
        }
        let mut out = normal;
        let normal_id = vertex_id as i32 + dimensions.x / 2;
        for i in 0..self.active_targets(dimensions) {
            let frame = self.sample(normal_id, i, dimensions);
            if frame != glam::Vec4::ZERO {
                out += weights.get(i as usize) * (frame_normal(frame) - normal);
            }
        }
        out
    }
}
