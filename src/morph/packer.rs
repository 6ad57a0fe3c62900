//! Morph-Data Packer
//!
//! Walks the node → entity map of an asset and collects every primitive's
//! morph targets into a [`MorphTable`], validating the layout invariants on
//! the way.

use std::borrow::Cow;

use glam::Vec3;

use super::table::{
    MAX_MORPH_TARGETS, MorphPrimitive, MorphTable, PackedTarget, TableEntry, TargetChannel,
};
use super::tangents::{TANGENT_FRAME_FORMAT, TangentsJob, TangentsParams};
use crate::asset::{
    Accessor, AttributeSemantic, ElementFormat, EntityId, SceneAsset, SourceMesh, SourcePrimitive,
};
use crate::errors::{MorphError, Result};
use crate::settings::MorphSettings;

/// Borrows the asset for as long as the packed table lives; the settings only
/// for the duration of packing.
pub struct MorphPacker<'a, 's> {
    asset: &'a SceneAsset,
    settings: &'s MorphSettings,
}

impl<'a, 's> MorphPacker<'a, 's> {
    #[must_use]
    pub fn new(asset: &'a SceneAsset, settings: &'s MorphSettings) -> Self {
        Self { asset, settings }
    }

    /// Packs every mesh-carrying node of the asset (of its zeroth instance when
    /// instanced). Entities whose primitives declare no targets get no entry.
    pub fn pack(&self) -> Result<MorphTable<'a>> {
        let mut table = MorphTable::new();

        for &(node, entity) in self.asset.source_nodes() {
            let Some((mesh_index, mesh)) = self.asset.mesh_of_node(node) else {
                if let Some(mesh) = self.asset.nodes.get(node).and_then(|n| n.mesh) {
                    return Err(MorphError::AssetIndexOutOfBounds {
                        context: format!("mesh of node {node}"),
                        index: mesh,
                    });
                }
                continue;
            };

            if let Some(entry) = self.pack_mesh(entity, mesh_index, mesh, &mut table)? {
                table.push(entry);
            }
        }

        log::info!(
            "Packed morph targets: {} entities, {} targets, {} vertices, {} bytes",
            table.entries().len(),
            table.num_targets,
            table.num_vertices,
            table.texture_byte_size
        );

        Ok(table)
    }

    fn pack_mesh(
        &self,
        entity: EntityId,
        mesh_index: usize,
        mesh: &'a SourceMesh,
        table: &mut MorphTable<'a>,
    ) -> Result<Option<TableEntry<'a>>> {
        let mut entry = TableEntry {
            entity,
            mesh: mesh_index,
            default_weights: mesh.weights.clone(),
            primitives: Vec::new(),
        };

        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            if primitive.targets.is_empty() {
                continue;
            }
            let packed = self.add_primitive(primitive_index, primitive, table)?;
            entry.primitives.push(packed);
        }

        Ok((!entry.primitives.is_empty()).then_some(entry))
    }

    fn add_primitive(
        &self,
        primitive_index: usize,
        primitive: &'a SourcePrimitive,
        table: &mut MorphTable<'a>,
    ) -> Result<MorphPrimitive<'a>> {
        let target_count = primitive.targets.len();
        if target_count > MAX_MORPH_TARGETS {
            return Err(MorphError::TooManyTargets {
                count: target_count,
                max: MAX_MORPH_TARGETS,
            });
        }
        if target_count > self.settings.weight_capacity {
            return Err(MorphError::WeightCapacityExceeded {
                count: target_count,
                capacity: self.settings.weight_capacity,
            });
        }

        let mut packed = MorphPrimitive {
            primitive_index,
            vertex_count: primitive.vertex_count,
            target_count,
            layer_base: table.num_targets,
            targets: Vec::new(),
        };

        let buffers: &'a [Vec<u8>] = &self.asset.buffers;

        // Read lazily: only primitives with normal targets need the base normals.
        let mut base_normals: Option<Vec<Vec3>> = None;
        let mut previous: Option<ElementFormat> = None;

        for (target_index, target) in primitive.targets.iter().enumerate() {
            for attribute in &target.attributes {
                let accessor = &attribute.accessor;
                match attribute.semantic {
                    AttributeSemantic::Tangent => {}
                    AttributeSemantic::Normal => {
                        if !self.settings.pack_normals {
                            continue;
                        }
                        check_vertex_count(target_index, primitive.vertex_count, accessor)?;

                        if base_normals.is_none() {
                            base_normals = Some(self.read_base_normals(primitive)?);
                        }
                        let Some(deltas) = accessor.read_vec3(buffers)? else {
                            log::warn!(
                                "Skipping normal target {target_index} of primitive {primitive_index}: no readable buffer view"
                            );
                            continue;
                        };

                        let frames = TangentsJob::run(&TangentsParams {
                            base_normals: base_normals.as_deref().unwrap_or_default(),
                            normal_deltas: &deltas,
                        });

                        if let Some(frames) = frames {
                            let data: Vec<u8> = bytemuck::cast_slice(&frames).to_vec();
                            log::debug!(
                                "Packed normal target {target_index} of primitive {primitive_index} ({} bytes)",
                                data.len()
                            );
                            table.texture_byte_size += data.len();
                            packed.targets.push(PackedTarget {
                                target_index,
                                channel: TargetChannel::Normal,
                                format: TANGENT_FRAME_FORMAT,
                                data: Cow::Owned(data),
                            });
                        }
                    }
                    AttributeSemantic::Position => {
                        // All position attributes of a primitive must share one format.
                        let format = accessor.format;
                        if let Some(expected) = previous {
                            if expected.component_type != format.component_type
                                || expected.accessor_type != format.accessor_type
                            {
                                return Err(MorphError::PositionFormatMismatch {
                                    target: target_index,
                                    expected_component: expected.component_type,
                                    expected_type: expected.accessor_type,
                                    found_component: format.component_type,
                                    found_type: format.accessor_type,
                                });
                            }
                        }
                        previous = Some(format);

                        if !format.is_vec3_decodable() {
                            return Err(MorphError::UnsupportedPositionFormat {
                                component: format.component_type,
                                accessor_type: format.accessor_type,
                                normalized: format.normalized,
                            });
                        }
                        check_vertex_count(target_index, primitive.vertex_count, accessor)?;

                        // This should always be present, but don't fail on malformed input.
                        let Some(data) = accessor.read_bytes(buffers)? else {
                            log::warn!(
                                "Skipping position target {target_index} of primitive {primitive_index}: accessor has no buffer view"
                            );
                            continue;
                        };

                        log::debug!(
                            "Packed position target {target_index} of primitive {primitive_index} ({} bytes)",
                            data.len()
                        );
                        table.texture_byte_size += data.len();
                        packed.targets.push(PackedTarget {
                            target_index,
                            channel: TargetChannel::Position,
                            format,
                            data,
                        });
                    }
                }
            }
        }

        table.num_targets += target_count as u32;
        table.num_vertices += primitive.vertex_count;
        table.max_vertices = table.max_vertices.max(primitive.vertex_count);

        Ok(packed)
    }

    fn read_base_normals(&self, primitive: &SourcePrimitive) -> Result<Vec<Vec3>> {
        let Some(accessor) = &primitive.normals else {
            return Ok(Vec::new());
        };
        Ok(accessor.read_vec3(&self.asset.buffers)?.unwrap_or_default())
    }
}

fn check_vertex_count(target: usize, expected: u32, accessor: &Accessor) -> Result<()> {
    if accessor.count == expected {
        Ok(())
    } else {
        Err(MorphError::VertexCountMismatch {
            target,
            expected,
            found: accessor.count,
        })
    }
}
