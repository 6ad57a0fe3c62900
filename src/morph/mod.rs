//! Morph-target packing.
//!
//! [`MorphPacker`] collects the targets of an asset into a [`MorphTable`],
//! [`TextureBuilder`] serializes the table into one host buffer laid out as a
//! layered texture, and [`MorphHelper`] ties both to the material instances
//! that sample the texture at render time.

mod helper;
mod layout;
mod material;
mod packer;
mod sampler;
mod table;
pub mod tangents;
mod texture;
mod weights;

pub use helper::{MorphHelper, MorphStats};
pub use layout::{TEXEL_SIZE, TextureLayout, morph_uv, uv_to_texel};
pub use material::MorphMaterialInstance;
pub use packer::MorphPacker;
pub use sampler::MorphSampler;
pub use table::{MAX_MORPH_TARGETS, MorphPrimitive, MorphTable, PackedTarget, TableEntry, TargetChannel};
pub use texture::{MORPH_TEXTURE_FORMAT, PackedSlot, PackedTexture, PixelBuffer, TexelImage, TextureBuilder};
pub use weights::{MorphUniformHeader, MorphWeights, uniform_bytes, uniform_size};
