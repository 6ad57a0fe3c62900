//! GPU side of the morph material: shader generation, the uploaded texture,
//! per-material uniform state and the renderable binding seam.

pub mod gpu;
pub mod renderable;
pub mod shader;

pub use gpu::{GpuMaterialState, GpuMorphTexture, MorphPipeline, TransformsUniform};
pub use renderable::RenderableManager;
pub use shader::generate_morph_shader;
