//! Source Asset Model
//!
//! The morph pipeline does not load files itself; it reads a [`SceneAsset`]
//! that mirrors the parts of a glTF document packing needs:
//!
//! - binary buffers and the buffer views / accessors that address them
//! - meshes, their primitives and each primitive's morph targets
//! - a node → entity map (and one per instance for instanced assets)
//!
//! Entities are stable [`EntityId`] keys owned by the asset, so the morph
//! table never aliases into the host's node storage.

mod accessor;
#[cfg(feature = "gltf")]
mod gltf_import;

use glam::Vec3;
use slotmap::{SlotMap, new_key_type};

pub use accessor::decode_vec3;

new_key_type! {
    /// Stable handle for a renderable entity created from an asset node.
    pub struct EntityId;
}

// ============================================================================
// Element formats
// ============================================================================

/// Scalar component type of an accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    #[inline]
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
        }
    }
}

/// Shape of an accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AccessorType {
    #[inline]
    #[must_use]
    pub fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// Full description of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementFormat {
    pub component_type: ComponentType,
    pub accessor_type: AccessorType,
    pub normalized: bool,
}

impl ElementFormat {
    /// Tightly packed `f32 × 3`, the common morph delta format.
    pub const FLOAT3: Self = Self {
        component_type: ComponentType::F32,
        accessor_type: AccessorType::Vec3,
        normalized: false,
    };

    /// Size in bytes of one element.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.component_type.size() * self.accessor_type.components()
    }

    /// Returns `true` if elements of this format can be expanded to `Vec3`.
    #[must_use]
    pub fn is_vec3_decodable(&self) -> bool {
        self.accessor_type == AccessorType::Vec3
            && match self.component_type {
                ComponentType::F32 => !self.normalized,
                ComponentType::I8 | ComponentType::I16 | ComponentType::U8 | ComponentType::U16 => {
                    true
                }
                ComponentType::U32 => false,
            }
    }
}

// ============================================================================
// Buffer views & accessors
// ============================================================================

/// A byte range of one binary buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Distance between elements; `None` means tightly packed.
    pub byte_stride: Option<usize>,
}

/// Typed view over a [`BufferView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor {
    pub format: ElementFormat,
    pub count: u32,
    /// Offset relative to the start of the buffer view.
    pub byte_offset: usize,
    /// `None` for accessors without backing data (e.g. malformed or sparse-only).
    pub view: Option<BufferView>,
}

impl Accessor {
    /// Tightly packed accessor over a whole view.
    #[must_use]
    pub fn packed(format: ElementFormat, count: u32, view: BufferView) -> Self {
        Self {
            format,
            count,
            byte_offset: 0,
            view: Some(view),
        }
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// The attribute a morph target displaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphAttribute {
    pub semantic: AttributeSemantic,
    pub accessor: Accessor,
}

/// One morph target of a primitive, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTarget {
    pub attributes: Vec<MorphAttribute>,
}

impl SourceTarget {
    #[must_use]
    pub fn with(mut self, semantic: AttributeSemantic, accessor: Accessor) -> Self {
        self.attributes.push(MorphAttribute { semantic, accessor });
        self
    }
}

/// One drawable vertex range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePrimitive {
    pub vertex_count: u32,
    /// Base `NORMAL` accessor, needed to derive morphed tangent frames.
    pub normals: Option<Accessor>,
    pub targets: Vec<SourceTarget>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMesh {
    pub name: Option<String>,
    pub primitives: Vec<SourcePrimitive>,
    /// Default morph weights declared on the mesh.
    pub weights: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceNode {
    pub name: Option<String>,
    pub mesh: Option<usize>,
}

/// Node → entity map of one instance of an instanced asset.
#[derive(Debug, Clone, Default)]
pub struct AssetInstance {
    pub node_map: Vec<(usize, EntityId)>,
}

// ============================================================================
// SceneAsset
// ============================================================================

/// An asset as seen by the morph pipeline.
#[derive(Debug, Default)]
pub struct SceneAsset {
    pub buffers: Vec<Vec<u8>>,
    pub meshes: Vec<SourceMesh>,
    pub nodes: Vec<SourceNode>,
    entities: SlotMap<EntityId, usize>,
    node_map: Vec<(usize, EntityId)>,
    instances: Vec<AssetInstance>,
}

impl SceneAsset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_buffer(&mut self, bytes: Vec<u8>) -> usize {
        self.buffers.push(bytes);
        self.buffers.len() - 1
    }

    /// Appends `values` to a new buffer and returns a tightly packed `f32 × 3` accessor.
    pub fn add_vec3_accessor(&mut self, values: &[Vec3]) -> Accessor {
        let raw: Vec<[f32; 3]> = values.iter().map(|v| v.to_array()).collect();
        let bytes = bytemuck::cast_slice(&raw).to_vec();
        let byte_length = bytes.len();
        let buffer = self.add_buffer(bytes);
        Accessor::packed(
            ElementFormat::FLOAT3,
            values.len() as u32,
            BufferView {
                buffer,
                byte_offset: 0,
                byte_length,
                byte_stride: None,
            },
        )
    }

    pub fn add_mesh(&mut self, mesh: SourceMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Adds a node and creates its entity in the asset's own node map.
    pub fn add_node(&mut self, name: Option<&str>, mesh: Option<usize>) -> EntityId {
        self.nodes.push(SourceNode {
            name: name.map(str::to_string),
            mesh,
        });
        let node = self.nodes.len() - 1;
        let entity = self.entities.insert(node);
        self.node_map.push((node, entity));
        entity
    }

    /// Creates a new instance with one fresh entity per node.
    pub fn add_instance(&mut self) -> usize {
        let node_map = (0..self.nodes.len())
            .map(|node| (node, self.entities.insert(node)))
            .collect();
        self.instances.push(AssetInstance { node_map });
        self.instances.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn is_instanced(&self) -> bool {
        !self.instances.is_empty()
    }

    #[must_use]
    pub fn instances(&self) -> &[AssetInstance] {
        &self.instances
    }

    /// The node map morph data is read from: the zeroth instance's map when
    /// the asset is instanced, the asset's own map otherwise.
    #[must_use]
    pub fn source_nodes(&self) -> &[(usize, EntityId)] {
        match self.instances.first() {
            Some(instance) => &instance.node_map,
            None => &self.node_map,
        }
    }

    /// Entity created for `node` by instance `instance`.
    #[must_use]
    pub fn instance_entity(&self, instance: usize, node: usize) -> Option<EntityId> {
        self.instances
            .get(instance)?
            .node_map
            .iter()
            .find(|(n, _)| *n == node)
            .map(|(_, entity)| *entity)
    }

    #[must_use]
    pub fn node_of(&self, entity: EntityId) -> Option<usize> {
        self.entities.get(entity).copied()
    }

    #[must_use]
    pub fn mesh_of_node(&self, node: usize) -> Option<(usize, &SourceMesh)> {
        let mesh = self.nodes.get(node)?.mesh?;
        self.meshes.get(mesh).map(|m| (mesh, m))
    }

    /// First entity of the source node map whose node carries `name`.
    #[must_use]
    pub fn first_entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.source_nodes()
            .iter()
            .find(|(node, _)| self.nodes[*node].name.as_deref() == Some(name))
            .map(|(_, entity)| *entity)
    }
}
