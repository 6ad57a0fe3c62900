//! glTF → [`SceneAsset`] conversion.
//!
//! Only the data the morph packer reads is carried over: buffers, mesh
//! primitives with their morph target accessors, base normals, default mesh
//! weights, and one entity per node.

use std::path::Path;

use base64::Engine;

use super::{
    Accessor, AccessorType, AttributeSemantic, BufferView, ComponentType, ElementFormat,
    SceneAsset, SourceMesh, SourcePrimitive, SourceTarget,
};
use crate::errors::{MorphError, Result};

impl SceneAsset {
    /// Imports a `.gltf` / `.glb` file, resolving external buffers next to it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let gltf = gltf::Gltf::from_slice_without_validation(&bytes)?;
        let base_path = path.parent().unwrap_or(Path::new("./"));
        let buffers = load_buffers(&gltf, Some(base_path))?;
        Ok(Self::from_gltf(&gltf.document, buffers))
    }

    /// Imports a `.gltf` / `.glb` file held in memory. Only embedded buffers
    /// (GLB chunk or `data:` URI) can be resolved.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let gltf = gltf::Gltf::from_slice_without_validation(bytes)?;
        let buffers = load_buffers(&gltf, None)?;
        Ok(Self::from_gltf(&gltf.document, buffers))
    }

    /// Builds the asset model from an already parsed document and its buffers.
    #[must_use]
    pub fn from_gltf(document: &gltf::Document, buffers: Vec<Vec<u8>>) -> Self {
        let mut asset = SceneAsset::new();
        asset.buffers = buffers;

        for mesh in document.meshes() {
            let primitives = mesh.primitives().map(|p| convert_primitive(&p)).collect();
            asset.add_mesh(SourceMesh {
                name: mesh.name().map(str::to_string),
                primitives,
                weights: mesh.weights().map(<[f32]>::to_vec).unwrap_or_default(),
            });
        }

        for node in document.nodes() {
            asset.add_node(node.name(), node.mesh().map(|m| m.index()));
        }

        log::debug!(
            "Converted glTF document: {} meshes, {} nodes, {} buffers",
            asset.meshes.len(),
            asset.nodes.len(),
            asset.buffers.len()
        );

        asset
    }
}

fn load_buffers(gltf: &gltf::Gltf, base_path: Option<&Path>) -> Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let index = buffer.index();
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf.blob.as_deref().map(<[u8]>::to_vec).ok_or_else(|| {
                MorphError::BufferLoad {
                    index,
                    reason: "missing GLB binary chunk".to_string(),
                }
            })?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => decode_data_uri(index, uri)?,
            gltf::buffer::Source::Uri(uri) => {
                let Some(base_path) = base_path else {
                    return Err(MorphError::BufferLoad {
                        index,
                        reason: format!("external buffer '{uri}' needs a file path"),
                    });
                };
                std::fs::read(base_path.join(uri))?
            }
        };

        if data.len() < buffer.length() {
            return Err(MorphError::BufferLoad {
                index,
                reason: format!("{} bytes declared, {} available", buffer.length(), data.len()),
            });
        }
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

fn decode_data_uri(index: usize, uri: &str) -> Result<Vec<u8>> {
    let Some((_, payload)) = uri.split_once(";base64,") else {
        return Err(MorphError::BufferLoad {
            index,
            reason: "only base64 data URIs are supported".to_string(),
        });
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| MorphError::BufferLoad {
            index,
            reason: e.to_string(),
        })
}

fn convert_primitive(primitive: &gltf::Primitive) -> SourcePrimitive {
    let vertex_count = primitive
        .get(&gltf::Semantic::Positions)
        .map_or(0, |a| a.count() as u32);

    let targets = primitive
        .morph_targets()
        .map(|target| {
            let mut source = SourceTarget::default();
            if let Some(a) = target.positions() {
                source = source.with(AttributeSemantic::Position, convert_accessor(&a));
            }
            if let Some(a) = target.normals() {
                source = source.with(AttributeSemantic::Normal, convert_accessor(&a));
            }
            if let Some(a) = target.tangents() {
                source = source.with(AttributeSemantic::Tangent, convert_accessor(&a));
            }
            source
        })
        .collect();

    SourcePrimitive {
        vertex_count,
        normals: primitive
            .get(&gltf::Semantic::Normals)
            .map(|a| convert_accessor(&a)),
        targets,
    }
}

fn convert_accessor(accessor: &gltf::Accessor) -> Accessor {
    use gltf::accessor::{DataType, Dimensions};

    let component_type = match accessor.data_type() {
        DataType::I8 => ComponentType::I8,
        DataType::U8 => ComponentType::U8,
        DataType::I16 => ComponentType::I16,
        DataType::U16 => ComponentType::U16,
        DataType::U32 => ComponentType::U32,
        DataType::F32 => ComponentType::F32,
    };
    let accessor_type = match accessor.dimensions() {
        Dimensions::Scalar => AccessorType::Scalar,
        Dimensions::Vec2 => AccessorType::Vec2,
        Dimensions::Vec3 => AccessorType::Vec3,
        Dimensions::Vec4 => AccessorType::Vec4,
        Dimensions::Mat2 => AccessorType::Mat2,
        Dimensions::Mat3 => AccessorType::Mat3,
        Dimensions::Mat4 => AccessorType::Mat4,
    };

    Accessor {
        format: ElementFormat {
            component_type,
            accessor_type,
            normalized: accessor.normalized(),
        },
        count: accessor.count() as u32,
        byte_offset: accessor.offset(),
        view: accessor.view().map(|view| BufferView {
            buffer: view.buffer().index(),
            byte_offset: view.offset(),
            byte_length: view.length(),
            byte_stride: view.stride(),
        }),
    }
}
