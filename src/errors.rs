//! Error Types
//!
//! This module defines the error types used by the morph-target pipeline.
//!
//! # Overview
//!
//! [`MorphError`] groups failures by where they are detected:
//! - Asset access errors (missing buffers, out-of-bounds buffer views)
//! - Layout invariant violations (mismatched accessors, size drift)
//! - Capacity overflow (too many targets for the texture or the weight array)
//! - GPU and shader generation errors
//!
//! Malformed-input skips (a target accessor without a buffer view) are *not*
//! errors: they are logged and packing continues.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_morph::errors::{MorphError, Result};
//!
//! fn load() -> Result<()> {
//!     let helper = MorphHelper::build(&asset, None)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::asset::{AccessorType, ComponentType};

/// The main error type for morph-target packing and upload.
#[derive(Error, Debug)]
pub enum MorphError {
    // ========================================================================
    // Asset Access Errors
    // ========================================================================
    /// A buffer view points at a buffer index the asset does not have.
    #[error("Buffer {index} referenced by a buffer view does not exist")]
    MissingBuffer {
        /// The missing buffer index
        index: usize,
    },

    /// An accessor reads past the end of its buffer view or buffer.
    #[error("Accessor range {offset}..{end} exceeds {context} of {len} bytes")]
    AccessorOutOfBounds {
        /// What was being read ("buffer view", "buffer")
        context: &'static str,
        /// First byte of the read
        offset: usize,
        /// One past the last byte of the read
        end: usize,
        /// Length of the region being read from
        len: usize,
    },

    /// A mesh index in the node table has no mesh behind it.
    #[error("Asset index out of bounds: {context} (index: {index})")]
    AssetIndexOutOfBounds {
        /// Description of what was being accessed
        context: String,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // Layout Invariant Violations
    // ========================================================================
    /// Position accessors of one primitive disagree on their element format.
    #[error(
        "Morph position format mismatch on target {target}: expected {expected_component:?} {expected_type:?}, found {found_component:?} {found_type:?}"
    )]
    PositionFormatMismatch {
        /// Target index within the primitive
        target: usize,
        /// Component type of the first position accessor
        expected_component: ComponentType,
        /// Shape of the first position accessor
        expected_type: AccessorType,
        /// Component type of the offending accessor
        found_component: ComponentType,
        /// Shape of the offending accessor
        found_type: AccessorType,
    },

    /// A morph target accessor does not cover exactly the primitive's vertices.
    #[error("Morph target {target} has {found} vertices, primitive has {expected}")]
    VertexCountMismatch {
        /// Target index within the primitive
        target: usize,
        /// Primitive vertex count
        expected: u32,
        /// Accessor element count
        found: u32,
    },

    /// The position delta format cannot be expanded into float texels.
    #[error("Unsupported morph position format: {component:?} {accessor_type:?} (normalized: {normalized})")]
    UnsupportedPositionFormat {
        /// Component type
        component: ComponentType,
        /// Accessor shape
        accessor_type: AccessorType,
        /// Normalized flag
        normalized: bool,
    },

    /// The builder wrote a different number of bytes than the packer counted.
    #[error("Morph texture layout drift: packer counted {expected} bytes, builder wrote {written}")]
    LayoutDrift {
        /// Total computed by the packer
        expected: usize,
        /// Total written by the texture builder
        written: usize,
    },

    // ========================================================================
    // Capacity Errors
    // ========================================================================
    /// A primitive declares more morph targets than the packed layout supports.
    #[error("Primitive has {count} morph targets, at most {max} are supported")]
    TooManyTargets {
        /// Declared target count
        count: usize,
        /// Maximum supported
        max: usize,
    },

    /// A primitive declares more targets than the material's weight array holds.
    #[error("Primitive has {count} morph targets, the material weight capacity is {capacity}")]
    WeightCapacityExceeded {
        /// Declared target count
        count: usize,
        /// Configured weight capacity
        capacity: usize,
    },

    /// The configured weight capacity is outside the supported range.
    #[error("Invalid morph weight capacity {0} (expected 1..=256)")]
    InvalidWeightCapacity(usize),

    /// The packed texture exceeds what the device supports.
    #[error("Morph texture {what} of {value} exceeds the device limit of {limit}")]
    TextureLimitExceeded {
        /// Which dimension overflowed ("width", "layer count")
        what: &'static str,
        /// Requested size
        value: u32,
        /// Device limit
        limit: u32,
    },

    // ========================================================================
    // GPU & Shader Errors
    // ========================================================================
    /// The host staging buffer was already handed to the GPU.
    #[error("Morph texture has already been uploaded")]
    AlreadyUploaded,

    /// GPU resources were requested before `upload` was called.
    #[error("Morph texture has not been uploaded yet")]
    NotUploaded,

    /// The pipeline was generated for other settings than the packed texture.
    #[error("Morph pipeline does not match the packed texture: {0}")]
    PipelineMismatch(String),

    /// Shader template rendering failed.
    #[error("Shader template error: {0}")]
    ShaderTemplate(#[from] minijinja::Error),

    /// A shader template could not be found in the embedded assets.
    #[error("Shader template not found: {0}")]
    ShaderNotFound(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[cfg(feature = "gltf")]
    #[error("glTF error: {0}")]
    GltfError(String),

    /// A glTF buffer could not be resolved.
    #[cfg(feature = "gltf")]
    #[error("Failed to load glTF buffer {index}: {reason}")]
    BufferLoad {
        /// Index of the buffer in the document
        index: usize,
        /// What went wrong
        reason: String,
    },
}

#[cfg(feature = "gltf")]
impl From<gltf::Error> for MorphError {
    fn from(err: gltf::Error) -> Self {
        MorphError::GltfError(err.to_string())
    }
}

/// Alias for `Result<T, MorphError>`.
pub type Result<T> = std::result::Result<T, MorphError>;
