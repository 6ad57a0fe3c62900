//! Morphed tangent frames.
//!
//! Normal deltas are not packed raw. For each vertex the job computes the
//! morphed normal `normalize(n + Δn)`, encodes it as the quaternion rotating
//! +Z onto that normal (with `w >= 0`), and stores it as four snorm16 values.

use glam::{Quat, Vec3, Vec4};

use crate::asset::{AccessorType, ComponentType, ElementFormat};

/// Element format of the job's output.
pub const TANGENT_FRAME_FORMAT: ElementFormat = ElementFormat {
    component_type: ComponentType::I16,
    accessor_type: AccessorType::Vec4,
    normalized: true,
};

pub struct TangentsParams<'a> {
    /// Base `NORMAL` attribute of the primitive.
    pub base_normals: &'a [Vec3],
    /// Normal deltas of one morph target.
    pub normal_deltas: &'a [Vec3],
}

pub struct TangentsJob;

impl TangentsJob {
    /// Returns `None` when there is nothing to compute or the inputs disagree
    /// on vertex count.
    #[must_use]
    pub fn run(params: &TangentsParams) -> Option<Vec<[i16; 4]>> {
        if params.base_normals.is_empty() || params.base_normals.len() != params.normal_deltas.len() {
            return None;
        }

        let frames = params
            .base_normals
            .iter()
            .zip(params.normal_deltas)
            .map(|(n, d)| pack_snorm16x4(tangent_frame(*n + *d)))
            .collect();
        Some(frames)
    }
}

/// Quaternion rotating +Z onto `normal`, canonicalized to `w >= 0`.
#[must_use]
pub fn tangent_frame(normal: Vec3) -> Quat {
    let n = normal.try_normalize().unwrap_or(Vec3::Z);
    let q = Quat::from_rotation_arc(Vec3::Z, n);
    if q.w < 0.0 { -q } else { q }
}

#[must_use]
pub fn pack_snorm16x4(q: Quat) -> [i16; 4] {
    let pack = |c: f32| (c.clamp(-1.0, 1.0) * 32767.0).round() as i16;
    [pack(q.x), pack(q.y), pack(q.z), pack(q.w)]
}

#[must_use]
pub fn unpack_snorm16x4(v: [i16; 4]) -> Vec4 {
    let unpack = |c: i16| (f32::from(c) / 32767.0).max(-1.0);
    Vec4::new(unpack(v[0]), unpack(v[1]), unpack(v[2]), unpack(v[3]))
}

/// Normal encoded by a (possibly unnormalized) tangent-frame quaternion.
///
/// Same arithmetic as `frame_normal` in the morph shader.
#[must_use]
pub fn frame_normal(frame: Vec4) -> Vec3 {
    let q = frame.normalize();
    let axis = q.truncate();
    let t = 2.0 * axis.cross(Vec3::Z);
    Vec3::Z + q.w * t + axis.cross(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn frame_round_trips_normal() {
        for n in [Vec3::Z, Vec3::X, Vec3::new(0.3, -0.5, 0.8), -Vec3::Y] {
            let packed = pack_snorm16x4(tangent_frame(n));
            let decoded = frame_normal(unpack_snorm16x4(packed));
            assert!(approx_vec3(decoded, n.normalize()), "{n} decoded as {decoded}");
        }
    }

    #[test]
    fn frame_is_canonical() {
        let q = tangent_frame(Vec3::new(0.2, 0.9, -0.4));
        assert!(q.w >= 0.0);
    }

    #[test]
    fn job_applies_deltas() {
        let base = [Vec3::Z, Vec3::Z];
        let deltas = [Vec3::ZERO, Vec3::new(1.0, 0.0, -1.0)];
        let out = TangentsJob::run(&TangentsParams {
            base_normals: &base,
            normal_deltas: &deltas,
        })
        .unwrap();

        assert!(approx_vec3(frame_normal(unpack_snorm16x4(out[0])), Vec3::Z));
        assert!(approx_vec3(frame_normal(unpack_snorm16x4(out[1])), Vec3::X));
    }

    #[test]
    fn job_without_normals_produces_nothing() {
        let deltas = [Vec3::X];
        assert!(
            TangentsJob::run(&TangentsParams {
                base_normals: &[],
                normal_deltas: &deltas,
            })
            .is_none()
        );
    }
}
