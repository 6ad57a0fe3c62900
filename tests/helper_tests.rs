//! Morph Helper Tests
//!
//! Tests for:
//! - Material instances (dimensions, default weights, instancing)
//! - apply_weights semantics
//! - The CPU sampler as reference for the vertex shader
//! - GPU-facing state before upload

use glam::{IVec3, Vec3};

use myth_morph::asset::{AttributeSemantic, EntityId, SceneAsset, SourceMesh, SourcePrimitive, SourceTarget};
use myth_morph::morph::MorphWeights;
use myth_morph::{MorphError, MorphHelper, MorphMaterialInstance, MorphSettings, RenderableManager};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn base_positions(vertex_count: usize) -> Vec<Vec3> {
    (0..vertex_count)
        .map(|v| Vec3::new(v as f32, (v * v) as f32 * 0.1, 1.0))
        .collect()
}

fn target_deltas(vertex_count: usize, target: usize) -> Vec<Vec3> {
    (0..vertex_count)
        .map(|v| Vec3::new(0.3 + target as f32, -0.7 * v as f32, 0.125 * (target + v) as f32))
        .collect()
}

fn primitive(asset: &mut SceneAsset, vertex_count: usize, target_count: usize) -> SourcePrimitive {
    let targets = (0..target_count)
        .map(|t| {
            let accessor = asset.add_vec3_accessor(&target_deltas(vertex_count, t));
            SourceTarget::default().with(AttributeSemantic::Position, accessor)
        })
        .collect();
    SourcePrimitive {
        vertex_count: vertex_count as u32,
        normals: None,
        targets,
    }
}

/// One "Cube" entity with two primitives (24 vertices / 2 targets, 8 / 1).
fn cube_asset() -> (SceneAsset, EntityId) {
    let mut asset = SceneAsset::new();
    let primitives = vec![primitive(&mut asset, 24, 2), primitive(&mut asset, 8, 1)];
    let mesh = asset.add_mesh(SourceMesh {
        name: Some("Cube".to_string()),
        primitives,
        weights: vec![0.5, 0.25],
    });
    let entity = asset.add_node(Some("Cube"), Some(mesh));
    (asset, entity)
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn one_material_per_morphing_primitive() {
    init_logging();
    let (asset, entity) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();

    let materials: Vec<&MorphMaterialInstance> = helper.materials_for(entity).collect();
    assert_eq!(materials.len(), 2);

    assert_eq!(materials[0].primitive_index, 0);
    assert_eq!(materials[0].dimensions, IVec3::new(48, 0, 2));
    assert_eq!(materials[1].primitive_index, 1);
    assert_eq!(materials[1].dimensions, IVec3::new(48, 2, 1));
    assert_eq!(materials[0].base_color, Vec3::new(0.0, 0.0, 1.0));

    let stats = helper.stats();
    assert_eq!(stats.entities, 1);
    assert_eq!(stats.primitives, 2);
    assert_eq!(stats.targets, 3);
    assert_eq!(stats.vertices, 32);
    assert_eq!(stats.texture_byte_size, (2 * 24 + 8) * 12);
    assert_eq!(helper.layout().width(), 48);
}

#[test]
fn single_primitive_dimensions_match_classic_layout() {
    let mut asset = SceneAsset::new();
    let prim = primitive(&mut asset, 24, 3);
    let mesh = asset.add_mesh(SourceMesh {
        name: None,
        primitives: vec![prim],
        weights: Vec::new(),
    });
    let entity = asset.add_node(None, Some(mesh));

    let helper = MorphHelper::build(&asset, None).unwrap();
    let material = helper.materials_for(entity).next().unwrap();
    // { 2 × vertex count, 0, target count }
    assert_eq!(material.dimensions, IVec3::new(48, 0, 3));
}

#[test]
fn default_weights_seed_materials() {
    let (asset, entity) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();

    for material in helper.materials_for(entity) {
        assert_eq!(material.weights().as_slice(), &[0.5, 0.25, 0.0, 0.0]);
    }
}

#[test]
fn base_color_comes_from_settings() {
    let (asset, entity) = cube_asset();
    let settings = MorphSettings::default().with_base_color(Vec3::new(1.0, 0.5, 0.0));
    let helper = MorphHelper::build_with_settings(&asset, None, settings).unwrap();

    let material = helper.materials_for(entity).next().unwrap();
    assert_eq!(material.base_color, Vec3::new(1.0, 0.5, 0.0));
    let bytes = material.uniform_bytes();
    assert_eq!(bytes.len(), 48);
}

#[test]
fn invalid_capacity_fails_build() {
    let (asset, _) = cube_asset();
    let settings = MorphSettings::default().with_weight_capacity(0);
    assert!(matches!(
        MorphHelper::build_with_settings(&asset, None, settings),
        Err(MorphError::InvalidWeightCapacity(0))
    ));
}

#[test]
fn instance_materials_target_instance_entities() {
    let (mut asset, source) = cube_asset();
    let first = asset.add_instance();
    let second = asset.add_instance();

    let helper = MorphHelper::build(&asset, Some(second)).unwrap();
    let target = asset.instance_entity(second, 0).unwrap();
    let zeroth = asset.instance_entity(first, 0).unwrap();

    assert_eq!(helper.materials_for(target).count(), 2);
    assert_eq!(helper.materials_for(zeroth).count(), 0);
    assert_eq!(helper.materials_for(source).count(), 0);

    assert!(matches!(
        MorphHelper::build(&asset, Some(5)),
        Err(MorphError::AssetIndexOutOfBounds { index: 5, .. })
    ));
}

// ============================================================================
// apply_weights
// ============================================================================

#[test]
fn apply_weights_overwrites_every_material_of_entity() {
    let (asset, entity) = cube_asset();
    let mut helper = MorphHelper::build(&asset, None).unwrap();
    let versions: Vec<u64> = helper.materials_for(entity).map(MorphMaterialInstance::version).collect();

    assert!(helper.apply_weights(entity, &[0.75]));

    for (material, before) in helper.materials_for(entity).zip(versions) {
        assert_eq!(material.weights().as_slice(), &[0.75, 0.0, 0.0, 0.0]);
        assert!(material.version() > before);
    }
}

#[test]
fn apply_weights_ignores_unknown_entity() {
    init_logging();
    let (mut asset, entity) = cube_asset();
    let mut helper = MorphHelper::build(&asset, None).unwrap();
    let unknown = asset.add_node(Some("Late"), None);
    assert_eq!(asset.first_entity_by_name("Cube"), Some(entity));
    assert_eq!(asset.first_entity_by_name("Late"), Some(unknown));
    assert_eq!(asset.first_entity_by_name("Missing"), None);

    let before = helper.materials_for(entity).next().unwrap().weights().clone();
    assert!(!helper.apply_weights(unknown, &[1.0]));
    assert_eq!(helper.materials_for(entity).next().unwrap().weights(), &before);
}

// ============================================================================
// CPU Sampler
// ============================================================================

#[test]
fn zero_weights_reproduce_base_mesh() {
    let (asset, entity) = cube_asset();
    let mut helper = MorphHelper::build(&asset, None).unwrap();
    helper.apply_weights(entity, &[0.0, 0.0]);

    let sampler = helper.sampler();
    for material in helper.materials_for(entity) {
        let count = asset.meshes[0].primitives[material.primitive_index].vertex_count as usize;
        for (v, base) in base_positions(count).into_iter().enumerate() {
            let out = sampler.displace(base, v as u32, material.dimensions, material.weights());
            assert_eq!(out, base);
        }
    }
}

#[test]
fn single_unit_weight_reproduces_delta_exactly() {
    let (asset, entity) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();
    let sampler = helper.sampler();
    let material = helper.materials_for(entity).next().unwrap();

    for target in 0..2 {
        let mut weights = MorphWeights::zeroed(4);
        let mut raw = [0.0; 2];
        raw[target] = 1.0;
        weights.set(&raw);

        for (v, delta) in target_deltas(24, target).into_iter().enumerate() {
            let out = sampler.displace(Vec3::ZERO, v as u32, material.dimensions, &weights);
            assert_eq!(out, delta, "target {target}, vertex {v}");
        }
    }
}

#[test]
fn weights_blend_linearly() {
    let (asset, entity) = cube_asset();
    let mut helper = MorphHelper::build(&asset, None).unwrap();
    helper.apply_weights(entity, &[0.5, 0.25]);

    let sampler = helper.sampler();
    let material = helper.materials_for(entity).next().unwrap();
    let d0 = target_deltas(24, 0);
    let d1 = target_deltas(24, 1);
    for (v, base) in base_positions(24).into_iter().enumerate() {
        let out = sampler.displace(base, v as u32, material.dimensions, material.weights());
        let expected = base + 0.5 * d0[v] + 0.25 * d1[v];
        assert!(approx(out.x, expected.x) && approx(out.y, expected.y) && approx(out.z, expected.z));
    }
}

#[test]
fn second_primitive_reads_its_own_layers() {
    let (asset, entity) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();
    let sampler = helper.sampler();
    let material = helper.materials_for(entity).nth(1).unwrap();

    let mut weights = MorphWeights::zeroed(4);
    weights.set(&[1.0]);
    for (v, delta) in target_deltas(8, 0).into_iter().enumerate() {
        assert_eq!(sampler.displace(Vec3::ZERO, v as u32, material.dimensions, &weights), delta);
    }
}

#[test]
fn loop_is_clamped_to_capacity() {
    let (asset, entity) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();
    let material = helper.materials_for(entity).next().unwrap();

    let mut weights = MorphWeights::zeroed(4);
    weights.set(&[1.0, 1.0, 1.0, 1.0]);
    // A bogus target count reads at most `capacity` layers and never panics.
    let bogus = IVec3::new(material.dimensions.x, 0, 1000);
    let out = helper.sampler().displace(Vec3::ZERO, 3, bogus, &weights);
    assert!(out.is_finite());
}

#[test]
fn morphed_normals_follow_normal_targets() {
    let mut asset = SceneAsset::new();
    let normals = asset.add_vec3_accessor(&[Vec3::Z; 4]);
    let position = asset.add_vec3_accessor(&target_deltas(4, 0));
    let normal_delta = asset.add_vec3_accessor(&[Vec3::new(1.0, 0.0, -1.0); 4]);
    let mesh = asset.add_mesh(SourceMesh {
        name: None,
        primitives: vec![SourcePrimitive {
            vertex_count: 4,
            normals: Some(normals),
            targets: vec![SourceTarget::default()
                .with(AttributeSemantic::Position, position)
                .with(AttributeSemantic::Normal, normal_delta)],
        }],
        weights: vec![1.0],
    });
    let entity = asset.add_node(None, Some(mesh));

    let helper = MorphHelper::build(&asset, None).unwrap();
    let material = helper.materials_for(entity).next().unwrap();
    let sampler = helper.sampler();

    let full = sampler.displace_normal(Vec3::Z, 2, material.dimensions, material.weights());
    assert!((full - Vec3::X).length() < 1e-3, "{full}");

    let mut half = MorphWeights::zeroed(4);
    half.set(&[0.5]);
    let blended = sampler.displace_normal(Vec3::Z, 2, material.dimensions, &half);
    assert!((blended - Vec3::new(0.5, 0.0, 0.5)).length() < 1e-3, "{blended}");
}

// ============================================================================
// GPU State
// ============================================================================

#[derive(Default)]
struct RecordingRenderables {
    assigned: Vec<(EntityId, usize, IVec3)>,
}

impl RenderableManager for RecordingRenderables {
    fn set_material_instance_at(&mut self, entity: EntityId, primitive_index: usize, material: &MorphMaterialInstance) {
        self.assigned.push((entity, primitive_index, material.dimensions));
    }
}

#[test]
fn bind_requires_upload() {
    let (asset, _) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();
    let mut renderables = RecordingRenderables::default();

    assert!(matches!(helper.bind(&mut renderables), Err(MorphError::NotUploaded)));
    assert!(renderables.assigned.is_empty());
    assert!(helper.texture().is_none());
    assert!(helper.materials().iter().all(|m| m.bind_group().is_none() && !m.is_dirty()));
}

#[test]
fn staging_matches_packed_size_before_upload() {
    let (asset, _) = cube_asset();
    let helper = MorphHelper::build(&asset, None).unwrap();
    assert_eq!(helper.staging_bytes().map(<[u8]>::len), Some(helper.packed().byte_size));
    assert_eq!(helper.texel_image().byte_size(), helper.layout().image_byte_size());
}
