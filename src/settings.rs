//! Morph Pipeline Configuration
//!
//! [`MorphSettings`] is consumed once by [`MorphHelper::build_with_settings`]
//! and by [`MorphPipeline::new`]; both sides must see the same values, since
//! the weight capacity and the normal half are baked into the texture layout
//! and the generated shader.
//!
//! ```rust,ignore
//! use myth_morph::{MorphHelper, MorphSettings};
//!
//! // Denser texture without the normal half, eight weights per material.
//! let settings = MorphSettings::default()
//!     .with_weight_capacity(8)
//!     .with_pack_normals(false);
//!
//! let helper = MorphHelper::build_with_settings(&asset, None, settings)?;
//! ```
//!
//! [`MorphHelper::build_with_settings`]: crate::MorphHelper::build_with_settings
//! [`MorphPipeline::new`]: crate::render::MorphPipeline::new

use std::borrow::Cow;

use glam::Vec3;

use crate::errors::{MorphError, Result};

/// Default size of the material weight array.
pub const DEFAULT_WEIGHT_CAPACITY: usize = 4;

/// Largest weight array the uniform layout accepts.
pub const MAX_WEIGHT_CAPACITY: usize = 256;

/// Global configuration for morph packing and the morph material.
///
/// | Field             | Description                                   | Default          |
/// |-------------------|-----------------------------------------------|------------------|
/// | `base_color`      | Material base color                           | `(0, 0, 1)`      |
/// | `weight_capacity` | Weights per material instance                 | `4`              |
/// | `pack_normals`    | Reserve and fill the normal half of each layer | `true`           |
/// | `label`           | Debug label for GPU resources                 | `"MorphTargets"` |
#[derive(Debug, Clone, PartialEq)]
pub struct MorphSettings {
    pub base_color: Vec3,

    /// Upper bound on morph targets per primitive.
    ///
    /// Primitives declaring more targets fail construction instead of being
    /// truncated.
    pub weight_capacity: usize,

    /// When `false`, normal targets are skipped and layers are half as wide.
    pub pack_normals: bool,

    pub label: Cow<'static, str>,
}

impl Default for MorphSettings {
    fn default() -> Self {
        Self {
            base_color: Vec3::new(0.0, 0.0, 1.0),
            weight_capacity: DEFAULT_WEIGHT_CAPACITY,
            pack_normals: true,
            label: Cow::Borrowed("MorphTargets"),
        }
    }
}

impl MorphSettings {
    #[must_use]
    pub fn with_base_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    #[must_use]
    pub fn with_weight_capacity(mut self, capacity: usize) -> Self {
        self.weight_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_pack_normals(mut self, enabled: bool) -> Self {
        self.pack_normals = enabled;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WEIGHT_CAPACITY).contains(&self.weight_capacity) {
            return Err(MorphError::InvalidWeightCapacity(self.weight_capacity));
        }
        Ok(())
    }

    /// Number of `vec4<f32>` slots backing the weight array in the uniform.
    #[inline]
    #[must_use]
    pub fn weight_vec4_count(&self) -> usize {
        self.weight_capacity.div_ceil(4)
    }

    /// Channel halves per texture layer.
    #[inline]
    #[must_use]
    pub fn channel_slots(&self) -> u32 {
        if self.pack_normals { 2 } else { 1 }
    }
}
