use std::f32::consts::PI;

use super::{angle_between_3d, plane_rotation};
use crate::landmark::{HandLandmark, PointSet};
use crate::retarget::math::Vec3;
use crate::skeleton::{Finger, Side};

/// 1 本の指の 3 関節
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FingerRig {
    pub proximal: Vec3,
    pub intermediate: Vec3,
    pub distal: Vec3,
}

impl FingerRig {
    fn segment_mut(&mut self, segment: usize) -> &mut Vec3 {
        match segment {
            0 => &mut self.proximal,
            1 => &mut self.intermediate,
            _ => &mut self.distal,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandRig {
    pub wrist: Vec3,
    /// Finger の並び順（親指〜小指）
    pub fingers: [FingerRig; 5],
}

impl HandRig {
    pub fn finger(&self, finger: Finger) -> &FingerRig {
        &self.fingers[finger as usize]
    }
}

/// 関節の曲がり具合。伸びていれば 0、折り返すと 1。
fn curl(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (PI - angle_between_3d(a, b, c)) / PI
}

/// 親指は 3 軸とも曲げ量に応じて開く。付け根だけ可動域を絞る。
fn rig_thumb(curl: f32, segment: usize, side: Side) -> Vec3 {
    let invert = side.sign();
    let k = if segment == 0 {
        Vec3::new(1.2, 1.1, 0.2)
    } else {
        Vec3::new(-0.2, 0.1, 0.2)
    };
    let t = curl * -PI;
    let x = k.x * (1.0 + t);
    let y = k.y * (invert + t);
    let z = k.z * (invert + t);

    if segment == 0 {
        let (z_min, z_max, y_min, y_max) = match side {
            Side::Right => (-0.6, 0.3, -1.0, 0.3),
            Side::Left => (-0.3, 0.6, -0.3, 1.0),
        };
        Vec3::new(x.clamp(-0.6, 0.3), y.clamp(y_min, y_max), z.clamp(z_min, z_max))
    } else {
        Vec3::new(x.clamp(-2.0, 2.0), y.clamp(-2.0, 2.0), z.clamp(-2.0, 2.0))
    }
}

fn rig_finger(curl: f32, side: Side) -> Vec3 {
    let z = match side {
        Side::Right => (curl * -PI).clamp(-PI, 0.0),
        Side::Left => (curl * PI).clamp(0.0, PI),
    };
    Vec3::new(0.0, 0.0, z)
}

/// 手のひらの向きと各指の曲げを解く。21 点そろっていなければ None。
pub fn solve_hand(hand: &PointSet, side: Side) -> Option<HandRig> {
    if hand.len() < HandLandmark::COUNT {
        return None;
    }
    let point = |i: usize| hand.get(i);
    let invert = side.sign();

    let wrist_point = point(HandLandmark::Wrist.index())?;
    let (first, second) = match side {
        Side::Right => (HandLandmark::PinkyMcp, HandLandmark::IndexMcp),
        Side::Left => (HandLandmark::IndexMcp, HandLandmark::PinkyMcp),
    };
    let mut wrist = plane_rotation(wrist_point, point(first.index())?, point(second.index())?);
    wrist.y = wrist.z - 0.4;

    let (y_min, y_max) = match side {
        Side::Right => (-1.2, 0.6),
        Side::Left => (-0.6, 1.6),
    };
    wrist.x = (wrist.x * 2.0 * invert).clamp(-0.3, 0.3);
    wrist.y = (wrist.y * 2.3).clamp(y_min, y_max);
    wrist.z *= -2.3 * invert;

    let mut fingers = [FingerRig::default(); 5];
    for (i, rig) in fingers.iter_mut().enumerate() {
        let base = HandLandmark::FINGER_BASES[i];
        let chain = [
            wrist_point,
            point(base)?,
            point(base + 1)?,
            point(base + 2)?,
            point(base + 3)?,
        ];
        for segment in 0..3 {
            let c = curl(chain[segment], chain[segment + 1], chain[segment + 2]);
            *rig.segment_mut(segment) = if i == 0 {
                rig_thumb(c, segment, side)
            } else {
                rig_finger(c, side)
            };
        }
    }

    Some(HandRig { wrist, fingers })
}
