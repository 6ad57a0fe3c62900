#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! GPU morph targets for glTF assets.
//!
//! Morph target deltas of an asset are packed into one layered texture, one
//! layer per target. A generated material samples that texture in the vertex
//! stage and blends the deltas by per-material weights, so animating a mesh
//! only updates a small uniform each frame.

pub mod asset;
pub mod errors;
pub mod morph;
pub mod render;
pub mod settings;

pub use asset::{EntityId, SceneAsset};
pub use errors::{MorphError, Result};
pub use morph::{MorphHelper, MorphMaterialInstance, MorphSampler, MorphStats, MorphWeights, TextureLayout};
pub use render::{MorphPipeline, RenderableManager};
pub use settings::MorphSettings;
