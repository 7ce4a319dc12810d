use std::f32::consts::PI;

use super::{angle_between_3d, find_rotation, remap, roll_pitch_yaw};
use crate::landmark::{PointSet, PoseLandmark};
use crate::retarget::math::{self, Vec3};
use crate::skeleton::Side;

/// 片腕分のオイラー角
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmRig {
    pub upper: Vec3,
    pub lower: Vec3,
    pub hand: Vec3,
}

/// 体のオイラー角リグ
///
/// 腕の左右は画面基準で、right_arm は被写体の左腕（landmark 11/13/15）から解く。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseRig {
    pub hips_rotation: Vec3,
    pub hips_position: Vec3,
    pub spine: Vec3,
    pub right_arm: ArmRig,
    pub left_arm: ArmRig,
}

impl PoseRig {
    pub fn arm(&self, side: Side) -> &ArmRig {
        match side {
            Side::Left => &self.left_arm,
            Side::Right => &self.right_arm,
        }
    }

    pub fn hand(&self, side: Side) -> Vec3 {
        self.arm(side).hand
    }
}

struct ArmLandmarks {
    shoulder: PoseLandmark,
    other_shoulder: PoseLandmark,
    elbow: PoseLandmark,
    wrist: PoseLandmark,
    pinky: PoseLandmark,
    index: PoseLandmark,
}

fn arm_landmarks(side: Side) -> ArmLandmarks {
    use PoseLandmark::*;
    match side {
        Side::Right => ArmLandmarks {
            shoulder: LeftShoulder,
            other_shoulder: RightShoulder,
            elbow: LeftElbow,
            wrist: LeftWrist,
            pinky: LeftPinky,
            index: LeftIndex,
        },
        Side::Left => ArmLandmarks {
            shoulder: RightShoulder,
            other_shoulder: LeftShoulder,
            elbow: RightElbow,
            wrist: RightWrist,
            pinky: RightPinky,
            index: RightIndex,
        },
    }
}

fn solve_arm(pose_3d: &PointSet, side: Side) -> Option<ArmRig> {
    let lm = arm_landmarks(side);
    let shoulder = pose_3d.pose(lm.shoulder)?;
    let other = pose_3d.pose(lm.other_shoulder)?;
    let elbow = pose_3d.pose(lm.elbow)?;
    let wrist = pose_3d.pose(lm.wrist)?;
    let palm = math::lerp(pose_3d.pose(lm.pinky)?, pose_3d.pose(lm.index)?, 0.5);

    let mut upper = find_rotation(shoulder, elbow);
    upper.y = angle_between_3d(other, shoulder, elbow);
    let mut lower = find_rotation(elbow, wrist);
    lower.y = angle_between_3d(shoulder, elbow, wrist);
    lower.z = lower.z.clamp(-2.14, 0.0);
    let hand = find_rotation(wrist, palm);

    Some(rig_arm(upper, lower, hand, side))
}

/// 正規化角をボーン用の角度へ広げる
fn rig_arm(mut upper: Vec3, mut lower: Vec3, mut hand: Vec3, side: Side) -> ArmRig {
    let invert = match side {
        Side::Right => 1.0,
        Side::Left => -1.0,
    };

    upper.z *= -2.3 * invert;
    upper.y *= PI * invert;
    upper.y -= lower.x;
    upper.y -= -invert * lower.z.max(0.0);
    upper.x -= 0.3 * invert;

    lower.z *= -2.14 * invert;
    lower.y *= 2.14 * invert;
    lower.x *= 2.14 * invert;

    upper.x = upper.x.clamp(-0.5, PI);
    lower.x = lower.x.clamp(-0.3, 0.3);

    hand.y = (hand.z * 2.0).clamp(-0.6, 0.6);
    hand.z *= -2.3 * invert;

    ArmRig { upper, lower, hand }
}

/// 左右 2 点の向きから、振り返り量に応じてロールを弱める
fn torso_rotation(a: Vec3, b: Vec3) -> Vec3 {
    let mut r = roll_pitch_yaw(a, b);
    if r.y > 0.5 {
        r.y -= 2.0;
    }
    r.y += 0.5;
    if r.z > 0.0 {
        r.z = 1.0 - r.z;
    } else if r.z < 0.0 {
        r.z = -1.0 - r.z;
    }
    let turn = remap(r.y.abs(), 0.2, 0.4);
    r.z *= 1.0 - turn;
    r.x = 0.0;
    r * PI
}

/// 画面上の腰中心と背骨長からの腰のワールド位置
fn hips_position(pose_2d: &PointSet) -> Option<Vec3> {
    use PoseLandmark::*;
    let hip_center = (pose_2d.pose(LeftHip)? + pose_2d.pose(RightHip)?) * 0.5;
    let shoulder_center = (pose_2d.pose(LeftShoulder)? + pose_2d.pose(RightShoulder)?) * 0.5;
    let spine_length = (hip_center - shoulder_center).norm();

    let x = (hip_center.x - 0.4).clamp(-1.0, 1.0);
    let z = (spine_length - 1.0).clamp(-2.0, 0.0);
    let world_z = z * (z * -2.0).powi(2);
    Some(Vec3::new(x * world_z, 0.0, world_z))
}

/// 3D ポーズ（腰中心）と 2D ポーズ（画面正規化）から体のリグを解く
pub fn solve_pose(pose_3d: &PointSet, pose_2d: &PointSet) -> Option<PoseRig> {
    use PoseLandmark::*;
    if pose_3d.is_empty() || pose_2d.is_empty() {
        return None;
    }

    let hips_rotation = torso_rotation(pose_3d.pose(LeftHip)?, pose_3d.pose(RightHip)?);
    let spine = torso_rotation(pose_3d.pose(LeftShoulder)?, pose_3d.pose(RightShoulder)?);

    Some(PoseRig {
        hips_rotation,
        hips_position: hips_position(pose_2d)?,
        spine,
        right_arm: solve_arm(pose_3d, Side::Right)?,
        left_arm: solve_arm(pose_3d, Side::Left)?,
    })
}
