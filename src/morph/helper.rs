//! Morph Helper
//!
//! Owns everything built for one asset: the packed texture side table, the
//! host staging buffer until upload, the GPU texture after it, and one
//! material instance per morphing primitive.
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! let mut helper = MorphHelper::build(&asset, None)?;
//! let pipeline = MorphPipeline::new(&device, helper.settings(), format, None)?;
//! helper.upload(&device, &queue, &pipeline)?;
//! helper.bind(&mut renderables)?;
//!
//! // every frame
//! helper.apply_weights(entity, &[0.25, 1.0]);
//! helper.flush(&queue);
//! ```

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::material::MorphMaterialInstance;
use super::packer::MorphPacker;
use super::sampler::MorphSampler;
use super::texture::{PackedTexture, PixelBuffer, TexelImage, TextureBuilder};
use crate::asset::{EntityId, SceneAsset};
use crate::errors::{MorphError, Result};
use crate::morph::TextureLayout;
use crate::render::{GpuMorphTexture, MorphPipeline, RenderableManager};
use crate::settings::MorphSettings;

/// Totals of one build, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MorphStats {
    pub entities: usize,
    pub primitives: usize,
    pub targets: u32,
    /// Σ vertex counts of the morphing primitives.
    pub vertices: u32,
    pub texture_byte_size: usize,
}

pub struct MorphHelper {
    settings: MorphSettings,
    packed: PackedTexture,
    image: TexelImage,
    /// Present until the texture is uploaded.
    staging: Option<PixelBuffer>,
    texture: Option<GpuMorphTexture>,
    materials: Vec<MorphMaterialInstance>,
    by_entity: FxHashMap<EntityId, SmallVec<[usize; 2]>>,
    stats: MorphStats,
}

impl MorphHelper {
    /// Builds with [`MorphSettings::default`].
    ///
    /// Morph data is read from the asset's source nodes. With `instance` set,
    /// materials are created for that instance's entities instead.
    pub fn build(asset: &SceneAsset, instance: Option<usize>) -> Result<Self> {
        Self::build_with_settings(asset, instance, MorphSettings::default())
    }

    pub fn build_with_settings(asset: &SceneAsset, instance: Option<usize>, settings: MorphSettings) -> Result<Self> {
        settings.validate()?;
        if let Some(index) = instance {
            if index >= asset.instances().len() {
                return Err(MorphError::AssetIndexOutOfBounds {
                    context: "asset instance".to_string(),
                    index,
                });
            }
        }

        let table = MorphPacker::new(asset, &settings).pack()?;
        let (packed, staging) = TextureBuilder::build(&table, &settings)?;
        let image = TexelImage::expand(&packed, &staging)?;

        let mut materials = Vec::new();
        let mut by_entity: FxHashMap<EntityId, SmallVec<[usize; 2]>> = FxHashMap::default();

        for entry in table.entries() {
            let entity = match instance {
                Some(index) => resolve_instance_entity(asset, index, entry.entity)?,
                None => entry.entity,
            };

            for prim in &entry.primitives {
                let mut material = MorphMaterialInstance::new(
                    entity,
                    prim.primitive_index,
                    settings.base_color,
                    packed.layout.dimensions(prim.layer_base, prim.target_count),
                    settings.weight_capacity,
                );
                let seeded = entry.default_weights.len().min(settings.weight_capacity);
                material.set_weights(&entry.default_weights[..seeded]);

                by_entity.entry(entity).or_default().push(materials.len());
                materials.push(material);
            }
        }

        let stats = MorphStats {
            entities: table.entries().len(),
            primitives: materials.len(),
            targets: table.num_targets,
            vertices: table.num_vertices,
            texture_byte_size: table.texture_byte_size,
        };

        log::info!(
            "Morph helper ready: {} materials, texture {}x1x{}",
            materials.len(),
            packed.layout.width(),
            packed.layout.layers
        );

        Ok(Self {
            settings,
            packed,
            image,
            staging: Some(staging),
            texture: None,
            materials,
            by_entity,
            stats,
        })
    }

    /// Registers a hook fired once the host staging buffer is released.
    #[must_use]
    pub fn with_staging_release(mut self, hook: impl FnOnce(usize) + Send + 'static) -> Self {
        self.staging = self.staging.take().map(|s| s.with_release(hook));
        self
    }

    // ========================================================================
    // Runtime
    // ========================================================================

    /// Overwrites the weights of every material of `entity`.
    ///
    /// Returns `false` when the entity has no morph materials. Changes reach
    /// the GPU on the next [`flush`](Self::flush).
    pub fn apply_weights(&mut self, entity: EntityId, weights: &[f32]) -> bool {
        let Some(indices) = self.by_entity.get(&entity) else {
            log::debug!("apply_weights: entity {entity:?} has no morph materials");
            return false;
        };
        for &i in indices {
            self.materials[i].set_weights(weights);
        }
        true
    }

    /// Writes the uniforms of materials changed since the last flush.
    /// Returns the number of buffers written.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> usize {
        let mut written = 0;
        for material in &mut self.materials {
            if !material.is_dirty() {
                continue;
            }
            let bytes = material.uniform_bytes();
            let version = material.version();
            if let Some(gpu) = material.gpu.as_mut() {
                queue.write_buffer(&gpu.uniform_buffer, 0, &bytes);
                gpu.version = version;
                written += 1;
            }
        }
        if written > 0 {
            log::trace!("Flushed {written} morph material uniforms");
        }
        written
    }

    // ========================================================================
    // GPU
    // ========================================================================

    /// Uploads the texture and creates every material's GPU state.
    ///
    /// Pipeline and device limit checks run first and leave the helper
    /// untouched on failure. Past them the staging buffer is consumed; a
    /// second call fails with [`MorphError::AlreadyUploaded`].
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, pipeline: &MorphPipeline) -> Result<()> {
        if self.staging.is_none() {
            return Err(MorphError::AlreadyUploaded);
        }
        pipeline.check_compatible(&self.settings)?;
        GpuMorphTexture::check_limits(&self.image.layout, &device.limits())?;

        let staging = self.staging.take().ok_or(MorphError::AlreadyUploaded)?;
        if self.image.layout.texel_count() == 0 {
            // Zero-width layers: no texture, and materials stay without GPU state.
            log::debug!("No morph texels to upload");
            return Ok(());
        }

        let texture = GpuMorphTexture::create(device, queue, &self.image, &self.settings.label)?;
        for material in &mut self.materials {
            material.gpu = Some(pipeline.create_material_state(device, &texture, material));
        }
        self.texture = Some(texture);

        drop(staging);
        Ok(())
    }

    /// Assigns every material instance to its renderable primitive.
    ///
    /// Fails with [`MorphError::NotUploaded`] while any material lacks GPU
    /// state, which includes an upload of an empty layout.
    pub fn bind<R: RenderableManager>(&self, renderables: &mut R) -> Result<()> {
        if !self.is_uploaded() || self.materials.iter().any(|m| m.gpu.is_none()) {
            return Err(MorphError::NotUploaded);
        }
        for material in &self.materials {
            renderables.set_material_instance_at(material.entity, material.primitive_index, material);
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.staging.is_none()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn settings(&self) -> &MorphSettings {
        &self.settings
    }

    #[must_use]
    pub fn layout(&self) -> &TextureLayout {
        &self.packed.layout
    }

    #[must_use]
    pub fn packed(&self) -> &PackedTexture {
        &self.packed
    }

    #[must_use]
    pub fn texel_image(&self) -> &TexelImage {
        &self.image
    }

    /// Host staging bytes, `None` once uploaded.
    #[must_use]
    pub fn staging_bytes(&self) -> Option<&[u8]> {
        self.staging.as_ref().map(PixelBuffer::as_bytes)
    }

    #[must_use]
    pub fn texture(&self) -> Option<&GpuMorphTexture> {
        self.texture.as_ref()
    }

    #[must_use]
    pub fn materials(&self) -> &[MorphMaterialInstance] {
        &self.materials
    }

    pub fn materials_for(&self, entity: EntityId) -> impl Iterator<Item = &MorphMaterialInstance> {
        self.by_entity
            .get(&entity)
            .into_iter()
            .flatten()
            .map(|&i| &self.materials[i])
    }

    /// CPU evaluation of the morph shader over this helper's texture.
    #[must_use]
    pub fn sampler(&self) -> MorphSampler<'_> {
        MorphSampler::new(&self.image, self.settings.weight_capacity)
    }

    #[must_use]
    pub fn stats(&self) -> MorphStats {
        self.stats
    }
}

fn resolve_instance_entity(asset: &SceneAsset, instance: usize, source: EntityId) -> Result<EntityId> {
    let node = asset.node_of(source).ok_or_else(|| MorphError::AssetIndexOutOfBounds {
        context: "node of morph entity".to_string(),
        index: instance,
    })?;
    asset
        .instance_entity(instance, node)
        .ok_or_else(|| MorphError::AssetIndexOutOfBounds {
            context: format!("node {node} in asset instance"),
            index: instance,
        })
}
