use std::f32::consts::PI;

use strum::IntoEnumIterator;

use super::math::{self, Quat, Vec3};
use crate::landmark::PointSet;
use crate::skeleton::{Bone, Finger, Rig, Side, Space};

/// 通常関節の最大曲げ角
pub const MAX_BEND: f32 = PI / 2.5;
/// 指先関節の最大曲げ角
pub const MAX_END_BEND: f32 = PI * 2.0 / 3.0;

/// 指節の基準方向（左は -X 側）
fn segment_default(side: Side, finger: Finger) -> Vec3 {
    let x = side.sign();
    if finger.is_thumb() {
        Vec3::new(x, 1.0, 0.0)
    } else {
        Vec3::new(x, -1.0, 0.0)
    }
}

/// 曲げ回転の軸
fn bend_axis(side: Side, finger: Finger) -> Vec3 {
    if finger.is_thumb() {
        Vec3::new(-1.0, side.sign(), 0.0).normalize()
    } else {
        Vec3::new(0.0, 0.0, side.sign())
    }
}

/// 1 関節の曲げ角。指先は MAX_END_BEND まで許すが MAX_BEND を超えたら伸ばす。
pub fn bend_angle(segment: Vec3, side: Side, finger: Finger, joint: u8) -> f32 {
    let angle = math::signed_angle(segment, segment_default(side, finger), math::right());
    let terminal = joint as usize == Finger::JOINTS - 1;
    let max = if terminal { MAX_END_BEND } else { MAX_BEND };
    let angle = angle.clamp(0.0, max);
    if terminal && angle > MAX_BEND {
        0.0
    } else {
        angle
    }
}

/// 片手分の指回転。手が無ければ空。
///
/// 関節 j の指節は landmark[base + j] → landmark[base + j + 1]。
/// 点が欠けた関節は曲げ 0 として扱う。
pub fn finger_rotations(hand: &PointSet, side: Side) -> Vec<(Bone, Quat)> {
    if hand.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(5 * Finger::JOINTS);
    for finger in Finger::iter() {
        let base = finger.landmark_base();
        for joint in 0..Finger::JOINTS as u8 {
            let start = base + joint as usize;
            let angle = match (hand.get(start), hand.get(start + 1)) {
                (Some(a), Some(b)) => bend_angle(b - a, side, finger, joint),
                _ => 0.0,
            };
            let rotation = math::from_euler_vec(bend_axis(side, finger) * angle);
            out.push((Bone::Finger(side, finger, joint), rotation));
        }
    }
    out
}

pub fn apply_fingers(rig: &mut Rig<'_>, hand: &PointSet, side: Side, factor: f32) {
    for (bone, rotation) in finger_rotations(hand, side) {
        rig.set_rotation(bone, rotation, factor, Space::Local);
    }
}
