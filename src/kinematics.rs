// src/kinematics.rs - Joints computed from other joints instead of the network
use crate::joints::{JointIndex, Skeleton};
use nalgebra::Vector3;

// Below this length the neck-to-ear direction is treated as undefined.
const MIN_DIRECTION_NORM: f32 = 1e-5;

fn midpoint(a: Vector3<f32>, b: Vector3<f32>) -> Vector3<f32> {
    (a + b) / 2.0
}

/// Point on the ray from `neck` through `ear_center` closest to `nose`.
pub fn head_anchor(
    neck: Vector3<f32>,
    ear_center: Vector3<f32>,
    nose: Vector3<f32>,
) -> Vector3<f32> {
    match (ear_center - neck).try_normalize(MIN_DIRECTION_NORM) {
        Some(dir) => neck + dir * dir.dot(&(nose - neck)),
        None => neck,
    }
}

/// Overwrites the raw positions of hip, neck, head and spine. Runs after
/// decoding and before filtering; the order below matters since head reads
/// the freshly derived neck.
pub fn derive_joints(skeleton: &mut Skeleton) {
    use JointIndex::*;

    let thigh_center = midpoint(skeleton.raw(RightThigh), skeleton.raw(LeftThigh));
    let hip = midpoint(skeleton.raw(AbdomenUpper), thigh_center);
    skeleton.set_raw(Hip, hip);

    let neck = midpoint(skeleton.raw(RightShoulder), skeleton.raw(LeftShoulder));
    skeleton.set_raw(Neck, neck);

    let ear_center = midpoint(skeleton.raw(RightEar), skeleton.raw(LeftEar));
    skeleton.set_raw(Head, head_anchor(neck, ear_center, skeleton.raw(Nose)));

    skeleton.set_raw(Spine, skeleton.raw(AbdomenUpper));
}
