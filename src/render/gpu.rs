//! GPU Resources
//!
//! The uploaded morph texture, per-material uniform state and the render
//! pipeline drawing morphing primitives.
//!
//! Bind groups:
//!
//! | Group | Binding | Resource                                   |
//! |-------|---------|--------------------------------------------|
//! | 0     | 0       | `Transforms` uniform (caller owned)        |
//! | 1     | 0       | `MorphParams` uniform (one per material)   |
//! | 1     | 1       | morph texture, `texture_2d_array<f32>`     |
//!
//! Vertex buffers: slot 0 holds positions, slot 1 normals, both `Float32x3`.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use super::shader::generate_morph_shader;
use crate::errors::{MorphError, Result};
use crate::morph::{MORPH_TEXTURE_FORMAT, MorphMaterialInstance, TexelImage, TextureLayout, uniform_size};
use crate::settings::MorphSettings;

// ============================================================================
// Morph Texture
// ============================================================================

/// The packed morph texture on the GPU, destroyed on drop.
#[derive(Debug)]
pub struct GpuMorphTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub layout: TextureLayout,
}

impl GpuMorphTexture {
    /// Rejects layouts the device cannot hold.
    pub fn check_limits(layout: &TextureLayout, limits: &wgpu::Limits) -> Result<()> {
        if layout.width() > limits.max_texture_dimension_2d {
            return Err(MorphError::TextureLimitExceeded {
                what: "width",
                value: layout.width(),
                limit: limits.max_texture_dimension_2d,
            });
        }
        if layout.layers > limits.max_texture_array_layers {
            return Err(MorphError::TextureLimitExceeded {
                what: "layer count",
                value: layout.layers,
                limit: limits.max_texture_array_layers,
            });
        }
        Ok(())
    }

    /// Creates the array texture and queues the upload of `image`.
    pub fn create(device: &wgpu::Device, queue: &wgpu::Queue, image: &TexelImage, label: &str) -> Result<Self> {
        let layout = image.layout;
        Self::check_limits(&layout, &device.limits())?;

        let size = wgpu::Extent3d {
            width: layout.width(),
            height: 1,
            depth_or_array_layers: layout.layers,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: MORPH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.width() * crate::morph::TEXEL_SIZE as u32),
                rows_per_image: Some(1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        log::info!(
            "Uploaded morph texture '{label}': {}x1, {} layers, {} bytes",
            layout.width(),
            layout.layers,
            image.byte_size()
        );

        Ok(Self { texture, view, layout })
    }
}

impl Drop for GpuMorphTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

// ============================================================================
// Material State
// ============================================================================

/// Uniform buffer and bind group backing one material instance.
#[derive(Debug)]
pub struct GpuMaterialState {
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    /// Material version last written to `uniform_buffer`.
    pub version: u64,
}

/// Contents of the caller-owned group 0 uniform.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct TransformsUniform {
    pub view_projection: Mat4,
    pub world: Mat4,
}

impl Default for TransformsUniform {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct MorphPipeline {
    pub transforms_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::RenderPipeline,
    weight_capacity: usize,
    pack_normals: bool,
}

impl MorphPipeline {
    pub fn new(
        device: &wgpu::Device,
        settings: &MorphSettings,
        color_format: wgpu::TextureFormat,
        depth_stencil: Option<wgpu::DepthStencilState>,
    ) -> Result<Self> {
        let shader_code = generate_morph_shader(settings)?;

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} Shader", settings.label)),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader_code)),
        });

        let transforms_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Morph Transforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Morph Material Layout"),
            entries: &[
                // Binding 0: MorphParams
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Binding 1: morph texture, read with textureLoad
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Morph Pipeline Layout"),
            bind_group_layouts: &[Some(&transforms_layout), Some(&material_layout)],
            immediate_size: 0,
        });

        let vertex_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 0,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x3,
                    offset: 0,
                    shader_location: 1,
                }],
            },
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", settings.label)),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "Created morph pipeline: capacity={}, normals={}, format={color_format:?}",
            settings.weight_capacity,
            settings.pack_normals
        );

        Ok(Self {
            transforms_layout,
            material_layout,
            pipeline,
            weight_capacity: settings.weight_capacity,
            pack_normals: settings.pack_normals,
        })
    }

    #[inline]
    #[must_use]
    pub fn weight_capacity(&self) -> usize {
        self.weight_capacity
    }

    /// Fails when this pipeline was generated for other settings.
    pub fn check_compatible(&self, settings: &MorphSettings) -> Result<()> {
        if self.weight_capacity != settings.weight_capacity {
            return Err(MorphError::PipelineMismatch(format!(
                "weight capacity {} vs {}",
                self.weight_capacity, settings.weight_capacity
            )));
        }
        if self.pack_normals != settings.pack_normals {
            return Err(MorphError::PipelineMismatch(format!(
                "normal half {} vs {}",
                self.pack_normals, settings.pack_normals
            )));
        }
        Ok(())
    }

    /// Creates a group 0 uniform buffer and bind group.
    #[must_use]
    pub fn create_transforms(
        &self,
        device: &wgpu::Device,
        transforms: &TransformsUniform,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Morph Transforms"),
            contents: bytemuck::bytes_of(transforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Morph Transforms BindGroup"),
            layout: &self.transforms_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    /// Creates the uniform buffer and bind group of one material instance.
    #[must_use]
    pub fn create_material_state(
        &self,
        device: &wgpu::Device,
        texture: &GpuMorphTexture,
        material: &MorphMaterialInstance,
    ) -> GpuMaterialState {
        let contents = material.uniform_bytes();
        debug_assert_eq!(contents.len(), uniform_size(self.weight_capacity));

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MorphParams"),
            contents: &contents,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Morph Material BindGroup"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
            ],
        });

        GpuMaterialState {
            uniform_buffer,
            bind_group,
            version: material.version(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_reject_wide_layouts() {
        let limits = wgpu::Limits::downlevel_defaults();
        let ok = TextureLayout::new(1024, 2, 16);
        assert!(GpuMorphTexture::check_limits(&ok, &limits).is_ok());

        let wide = TextureLayout::new(limits.max_texture_dimension_2d, 2, 1);
        assert!(matches!(
            GpuMorphTexture::check_limits(&wide, &limits),
            Err(MorphError::TextureLimitExceeded { what: "width", .. })
        ));

        let deep = TextureLayout::new(4, 2, limits.max_texture_array_layers + 1);
        assert!(matches!(
            GpuMorphTexture::check_limits(&deep, &limits),
            Err(MorphError::TextureLimitExceeded { what: "layer count", .. })
        ));
    }
}
