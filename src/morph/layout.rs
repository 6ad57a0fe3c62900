//! Texture layout and index arithmetic.
//!
//! Each morph target owns one layer of a 2-D array texture, one texel high:
//!
//! ```text
//! layer L:  [ pos v0 | pos v1 | ... | pos vN-1 | nrm v0 | nrm v1 | ... | nrm vN-1 ]
//!             \______ vertices_per_layer _____/ \______ vertices_per_layer _____/
//! ```
//!
//! With normals disabled the layer only holds the position half. A primitive's
//! targets occupy consecutive layers starting at its `layer_base`.
//!
//! The functions here are the CPU side of the sampling contract; the morph
//! shader performs the same arithmetic.

use glam::{IVec3, Vec3};

/// Bytes per texel of the uploaded texture (`Rgba32Float`).
pub const TEXEL_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureLayout {
    /// Texels per channel in a layer (largest primitive vertex count).
    pub vertices_per_layer: u32,
    /// 2 when the normal half is reserved, 1 otherwise.
    pub channel_slots: u32,
    /// One layer per morph target.
    pub layers: u32,
}

impl TextureLayout {
    #[must_use]
    pub fn new(vertices_per_layer: u32, channel_slots: u32, layers: u32) -> Self {
        Self {
            vertices_per_layer,
            channel_slots,
            layers,
        }
    }

    /// Texture width in texels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.channel_slots * self.vertices_per_layer
    }

    #[inline]
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.width() as usize * self.layers as usize
    }

    /// Size of the uploaded texel image in bytes.
    #[inline]
    #[must_use]
    pub fn image_byte_size(&self) -> usize {
        self.texel_count() * TEXEL_SIZE
    }

    #[inline]
    #[must_use]
    pub fn has_normal_half(&self) -> bool {
        self.channel_slots > 1
    }

    /// Column of a vertex's position delta.
    #[inline]
    #[must_use]
    pub fn position_texel(&self, vertex: u32) -> u32 {
        vertex
    }

    /// Column of a vertex's normal frame (only meaningful with a normal half).
    #[inline]
    #[must_use]
    pub fn normal_texel(&self, vertex: u32) -> u32 {
        self.width() / 2 + vertex
    }

    /// Linear texel index of column `x` in `layer`.
    #[inline]
    #[must_use]
    pub fn texel_index(&self, x: u32, layer: u32) -> usize {
        layer as usize * self.width() as usize + x as usize
    }

    /// Material `dimensions` for a primitive: `{ width, layer_base, target_count }`.
    #[must_use]
    pub fn dimensions(&self, layer_base: u32, target_count: usize) -> IVec3 {
        IVec3::new(self.width() as i32, layer_base as i32, target_count as i32)
    }
}

/// Normalized sample coordinate of `vertex_id` in target `target` of a primitive.
///
/// `uv.x = vertex_id / dimensions.x`, `uv.y = 0`, `uv.z = dimensions.y + target`.
#[inline]
#[must_use]
pub fn morph_uv(vertex_id: i32, target: i32, dimensions: IVec3) -> Vec3 {
    Vec3::new(
        vertex_id as f32 / dimensions.x as f32,
        0.0,
        (dimensions.y + target) as f32,
    )
}

/// Integer texel `(column, layer)` addressed by a normalized coordinate.
#[inline]
#[must_use]
pub fn uv_to_texel(uv: Vec3, width: u32) -> (u32, u32) {
    let x = (uv.x * width as f32).round();
    (x as u32, uv.z.round() as u32)
}
