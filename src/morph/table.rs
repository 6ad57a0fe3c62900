//! Morph Table
//!
//! The packer's output: one [`TableEntry`] per morphing entity, each holding
//! the entity's primitives and their packed targets in declaration order.
//!
//! Entry → primitive → target iteration order is the layout contract shared
//! with the texture builder and the shader, so entries live in a `Vec` and
//! the hash map only indexes into it.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::asset::{ElementFormat, EntityId};

/// Maximum number of morph targets a single primitive may declare.
pub const MAX_MORPH_TARGETS: usize = 255;

/// Which half of a texture layer a target's data lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetChannel {
    Position,
    Normal,
}

/// One packed displacement set.
///
/// Position data borrows from the asset's buffers when the source view is
/// tightly packed; normal data is owned output of the tangents job.
#[derive(Debug, Clone)]
pub struct PackedTarget<'a> {
    /// Index of the target within its primitive.
    pub target_index: usize,
    pub channel: TargetChannel,
    pub format: ElementFormat,
    pub data: Cow<'a, [u8]>,
}

impl PackedTarget<'_> {
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone)]
pub struct MorphPrimitive<'a> {
    /// Index of the primitive within its mesh.
    pub primitive_index: usize,
    pub vertex_count: u32,
    /// Number of targets declared by the primitive, packed or not.
    pub target_count: usize,
    /// Texture layer of target 0; target `t` lives in layer `layer_base + t`.
    pub layer_base: u32,
    pub targets: Vec<PackedTarget<'a>>,
}

#[derive(Debug, Clone)]
pub struct TableEntry<'a> {
    pub entity: EntityId,
    pub mesh: usize,
    /// Default weights declared on the mesh.
    pub default_weights: Vec<f32>,
    pub primitives: Vec<MorphPrimitive<'a>>,
}

/// Entity → primitives map with the packer's running totals.
#[derive(Debug, Default)]
pub struct MorphTable<'a> {
    entries: Vec<TableEntry<'a>>,
    index: FxHashMap<EntityId, usize>,

    /// Σ target counts, i.e. the number of texture layers.
    pub num_targets: u32,
    /// Σ primitive vertex counts.
    pub num_vertices: u32,
    /// Largest primitive vertex count, i.e. the texels per channel in a layer.
    pub max_vertices: u32,
    /// Σ byte length of every packed target.
    pub texture_byte_size: usize,
}

impl<'a> MorphTable<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Entries are never removed or reordered.
    pub fn push(&mut self, entry: TableEntry<'a>) {
        self.index.insert(entry.entity, self.entries.len());
        self.entries.push(entry);
    }

    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&TableEntry<'a>> {
        self.index.get(&entity).map(|&i| &self.entries[i])
    }

    #[must_use]
    pub fn entries(&self) -> &[TableEntry<'a>] {
        &self.entries
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Packed targets in layout order, with the primitive that owns them.
    pub fn targets(&self) -> impl Iterator<Item = (&TableEntry<'a>, &MorphPrimitive<'a>, &PackedTarget<'a>)> {
        self.entries.iter().flat_map(|entry| {
            entry.primitives.iter().flat_map(move |prim| {
                prim.targets.iter().map(move |target| (entry, prim, target))
            })
        })
    }
}
