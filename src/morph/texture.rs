//! Texture Builder
//!
//! Serializes a [`MorphTable`] into one contiguous host buffer and records
//! where every target landed. The host buffer is then expanded into the
//! layered texel image the GPU samples.

use glam::Vec4;

use super::layout::{TEXEL_SIZE, TextureLayout};
use super::table::{MorphTable, TargetChannel};
use super::tangents::{frame_normal, unpack_snorm16x4};
use crate::asset::{ElementFormat, EntityId, decode_vec3};
use crate::errors::{MorphError, Result};
use crate::settings::MorphSettings;

/// GPU format of the packed texture. Positions use `xyz`, `w` is zero.
pub const MORPH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

// ============================================================================
// PixelBuffer
// ============================================================================

type ReleaseHook = Box<dyn FnOnce(usize) + Send>;

/// Owned host staging memory.
///
/// Ownership moves into the upload; the release hook fires exactly once,
/// when the buffer is dropped, whatever happened to the upload.
pub struct PixelBuffer {
    bytes: Vec<u8>,
    on_release: Option<ReleaseHook>,
}

impl PixelBuffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            on_release: None,
        }
    }

    /// Registers a hook receiving the buffer size on release.
    #[must_use]
    pub fn with_release(mut self, hook: impl FnOnce(usize) + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("len", &self.bytes.len())
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        let size = self.bytes.len();
        log::trace!("Morph staging buffer of {size} bytes released");
        if let Some(hook) = self.on_release.take() {
            hook(size);
        }
    }
}

// ============================================================================
// PackedTexture
// ============================================================================

/// Where one packed target lives, both in the host buffer and in the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedSlot {
    pub entity: EntityId,
    pub primitive_index: usize,
    pub target_index: usize,
    pub channel: TargetChannel,
    pub format: ElementFormat,
    pub vertex_count: u32,
    pub layer: u32,
    /// Write offset in the host buffer.
    pub byte_offset: usize,
    pub byte_len: usize,
}

/// Owned side table describing a built morph texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTexture {
    pub layout: TextureLayout,
    pub slots: Vec<PackedSlot>,
    /// Σ `byte_len` of every slot; equals the host buffer size.
    pub byte_size: usize,
}

impl PackedTexture {
    /// Slots of one primitive, in layout order.
    pub fn slots_of(&self, entity: EntityId, primitive_index: usize) -> impl Iterator<Item = &PackedSlot> {
        self.slots
            .iter()
            .filter(move |s| s.entity == entity && s.primitive_index == primitive_index)
    }
}

pub struct TextureBuilder;

impl TextureBuilder {
    /// Copies every packed target into one host buffer, in entry → primitive →
    /// target order.
    pub fn build(table: &MorphTable, settings: &MorphSettings) -> Result<(PackedTexture, PixelBuffer)> {
        let layout = TextureLayout::new(table.max_vertices, settings.channel_slots(), table.num_targets);

        let mut bytes = Vec::with_capacity(table.texture_byte_size);
        let mut slots = Vec::new();

        for (entry, prim, target) in table.targets() {
            slots.push(PackedSlot {
                entity: entry.entity,
                primitive_index: prim.primitive_index,
                target_index: target.target_index,
                channel: target.channel,
                format: target.format,
                vertex_count: prim.vertex_count,
                layer: prim.layer_base + target.target_index as u32,
                byte_offset: bytes.len(),
                byte_len: target.byte_len(),
            });
            bytes.extend_from_slice(&target.data);
        }

        if bytes.len() != table.texture_byte_size {
            return Err(MorphError::LayoutDrift {
                expected: table.texture_byte_size,
                written: bytes.len(),
            });
        }

        let packed = PackedTexture {
            layout,
            slots,
            byte_size: bytes.len(),
        };
        Ok((packed, PixelBuffer::new(bytes)))
    }
}

// ============================================================================
// TexelImage
// ============================================================================

/// The layered `Rgba32Float` image uploaded to the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct TexelImage {
    pub layout: TextureLayout,
    texels: Vec<[f32; 4]>,
}

impl TexelImage {
    /// Scatters the host buffer into texture layers: position deltas at
    /// columns `[0, V)`, tangent frames at `[width / 2, width / 2 + V)`.
    pub fn expand(packed: &PackedTexture, staging: &PixelBuffer) -> Result<Self> {
        let layout = packed.layout;
        let mut texels = vec![[0.0_f32; 4]; layout.texel_count()];

        if staging.len() != packed.byte_size {
            return Err(MorphError::LayoutDrift {
                expected: packed.byte_size,
                written: staging.len(),
            });
        }

        for slot in &packed.slots {
            let bytes = staging
                .as_bytes()
                .get(slot.byte_offset..slot.byte_offset + slot.byte_len)
                .ok_or(MorphError::AccessorOutOfBounds {
                    context: "staging buffer",
                    offset: slot.byte_offset,
                    end: slot.byte_offset + slot.byte_len,
                    len: staging.len(),
                })?;

            match slot.channel {
                TargetChannel::Position => {
                    let deltas = decode_vec3(bytes, slot.format).ok_or(MorphError::UnsupportedPositionFormat {
                        component: slot.format.component_type,
                        accessor_type: slot.format.accessor_type,
                        normalized: slot.format.normalized,
                    })?;
                    for (vertex, delta) in deltas.iter().enumerate() {
                        let i = layout.texel_index(layout.position_texel(vertex as u32), slot.layer);
                        texels[i] = [delta.x, delta.y, delta.z, 0.0];
                    }
                }
                TargetChannel::Normal => {
                    if !layout.has_normal_half() {
                        continue;
                    }
                    let frames: Vec<[i16; 4]> = bytes
                        .chunks_exact(8)
                        .map(bytemuck::pod_read_unaligned)
                        .collect();
                    for (vertex, frame) in frames.into_iter().enumerate() {
                        let i = layout.texel_index(layout.normal_texel(vertex as u32), slot.layer);
                        texels[i] = unpack_snorm16x4(frame).to_array();
                    }
                }
            }
        }

        Ok(Self { layout, texels })
    }

    /// Texel at column `x` of `layer`, zero outside the image.
    #[must_use]
    pub fn texel(&self, x: u32, layer: u32) -> Vec4 {
        if x >= self.layout.width() || layer >= self.layout.layers {
            return Vec4::ZERO;
        }
        Vec4::from_array(self.texels[self.layout.texel_index(x, layer)])
    }

    /// Normal stored in the normal half for `vertex` of `layer`, if any.
    #[must_use]
    pub fn normal(&self, vertex: u32, layer: u32) -> Option<glam::Vec3> {
        let frame = self.texel(self.layout.normal_texel(vertex), layer);
        (frame != Vec4::ZERO).then(|| frame_normal(frame))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    #[inline]
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.texels.len() * TEXEL_SIZE
    }
}
