use crate::asset::EntityId;
use crate::morph::MorphMaterialInstance;

/// Host-side registry of drawable primitives.
///
/// The morph helper never owns renderables; it only tells the host which
/// material instance draws which primitive of an entity.
pub trait RenderableManager {
    fn set_material_instance_at(&mut self, entity: EntityId, primitive_index: usize, material: &MorphMaterialInstance);
}
