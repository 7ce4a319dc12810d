//! 2D + 3D ポーズ対を入力とする旧ソルバー
//!
//! 体・手・顔をそれぞれオイラー角のリグに解いてから、旧来の軸符号の
//! 取り決めでボーンに書き込む。手は左右が入れ替わって届くので、
//! 左のボーンは検出器の right_hand から駆動する。

pub mod face;
pub mod hand;
pub mod pose;

use std::f32::consts::PI;

use strum::IntoEnumIterator;
use tracing::trace;

use super::math::{self, Quat, Vec3};
use crate::config::{MotionSettings, RetargetConfig};
use crate::landmark::{LegacyResult, PointSet};
use crate::skeleton::{Bone, Finger, Rig, Side, Space};

pub use face::{solve_face, FaceRig, MouthShape};
pub use hand::{solve_hand, FingerRig, HandRig};
pub use pose::{solve_pose, ArmRig, PoseRig};

/// 旧表情モーフのローパス係数
pub const MORPH_LERP: f32 = 0.3;

/// (cx, cy) から (ex, ey) への 2D 角度
pub fn find_2d_angle(cx: f32, cy: f32, ex: f32, ey: f32) -> f32 {
    (ey - cy).atan2(ex - cx)
}

/// [-π, π] に折り返して π で割る
pub fn normalize_angle(radians: f32) -> f32 {
    let mut r = radians % (2.0 * PI);
    if r > PI {
        r -= 2.0 * PI;
    } else if r < -PI {
        r += 2.0 * PI;
    }
    r / PI
}

/// a → b の向きを 3 平面への射影角で表す（正規化済み）
pub fn find_rotation(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        normalize_angle(find_2d_angle(a.z, a.x, b.z, b.x)),
        normalize_angle(find_2d_angle(a.z, a.y, b.z, b.y)),
        normalize_angle(find_2d_angle(a.x, a.y, b.x, b.y)),
    )
}

/// 2 点を結ぶ線のロール・ピッチ・ヨー（正規化済み）
pub fn roll_pitch_yaw(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        normalize_angle(find_2d_angle(a.z, a.y, b.z, b.y)),
        normalize_angle(find_2d_angle(a.z, a.x, b.z, b.x)),
        normalize_angle(find_2d_angle(a.x, a.y, b.x, b.y)),
    )
}

/// 3 点が張る平面の向き（正規化済み）
pub fn plane_rotation(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let qb = b - a;
    let qc = c - a;
    let (Some(unit_z), Some(unit_x)) = (math::try_normalize(qb.cross(&qc)), math::try_normalize(qb)) else {
        return Vec3::zeros();
    };
    let unit_y = unit_z.cross(&unit_x);
    let beta = unit_z.x.clamp(-1.0, 1.0).asin();
    let alpha = (-unit_z.y).atan2(unit_z.z);
    let gamma = (-unit_y.x).atan2(unit_x.x);
    Vec3::new(normalize_angle(alpha), normalize_angle(beta), normalize_angle(gamma))
}

/// b を頂点とする a-b-c の角度
pub fn angle_between_3d(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    match (math::try_normalize(a - b), math::try_normalize(c - b)) {
        (Some(v1), Some(v2)) => v1.dot(&v2).clamp(-1.0, 1.0).acos(),
        _ => PI,
    }
}

/// [min, max] を [0, 1] に写してクランプ
pub fn remap(value: f32, min: f32, max: f32) -> f32 {
    if (max - min).abs() < f32::EPSILON {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

fn negate(q: Quat) -> Quat {
    Quat::new_unchecked(-q.into_inner())
}

#[derive(Debug, Clone, Default)]
pub struct LegacySolver {
    config: RetargetConfig,
}

impl LegacySolver {
    pub fn new(config: RetargetConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(*config)
    }

    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    /// 旧形式の 1 フレームをスケルトンに書き込む。
    /// 2D か 3D のポーズが欠けていれば何もせず false を返す。
    pub fn apply(&self, rig: &mut Rig<'_>, result: &LegacyResult, settings: &MotionSettings) -> bool {
        let pose_2d = PointSet::new(result.pose_2d.clone());
        let pose_3d = PointSet::new(result.pose_3d.clone());
        let Some(pose) = solve_pose(&pose_3d, &pose_2d) else {
            trace!("legacy frame without 2D/3D pose, skipped");
            return false;
        };
        let lerp = self.config.lerp_factor;

        if settings.arms {
            // 左右反転: 左ボーンは right_hand の点で駆動する
            for side in Side::iter() {
                let points = match side {
                    Side::Left => PointSet::new(result.right_hand.clone()),
                    Side::Right => PointSet::new(result.left_hand.clone()),
                };
                if let Some(hand) = solve_hand(&points, side) {
                    self.apply_hand(rig, &hand, pose.hand(side).z, side, lerp);
                }
            }
        }

        if settings.body {
            let hips = pose.hips_position;
            let target = Vec3::new(-hips.x * 25.0, hips.y, hips.z * 0.8);
            rig.lerp_position(Bone::Root, target, self.config.root_lerp());
            let r = pose.hips_rotation;
            rig.set_rotation(Bone::LowerBody, math::from_euler(r.x, -r.y, -r.z), lerp, Space::Local);
            let s = pose.spine;
            rig.set_rotation(Bone::UpperBody, math::from_euler(s.x, -s.y, -s.z), lerp, Space::Local);
        }

        let face = PointSet::new(result.face.clone());
        if let Some(face_rig) = solve_face(&face) {
            if settings.head {
                let h = face_rig.head;
                rig.set_rotation(Bone::Head, math::from_euler(h.x, -h.y, -h.z), lerp, Space::Local);
            }
            if settings.face {
                for (name, target) in face_rig.morph_targets() {
                    rig.blend_morph(name, target, MORPH_LERP);
                }
            }
        }

        if settings.arms {
            // 腕は反対側の解から取る
            for side in Side::iter() {
                let arm = pose.arm(side.opposite());
                let upper = arm.upper;
                let shoulder = math::from_euler(upper.x * 1.2, -upper.y * 1.5, upper.z);
                let lower = arm.lower;
                let elbow = negate(math::from_euler(lower.x, lower.y * 1.5, lower.z * 1.5));
                rig.set_rotation(Bone::Arm(side), shoulder, lerp, Space::Local);
                rig.set_rotation(Bone::Elbow(side), elbow, lerp, Space::Local);
            }
        }

        true
    }

    fn apply_hand(&self, rig: &mut Rig<'_>, hand: &HandRig, pose_hand_z: f32, side: Side, lerp: f32) {
        let w = hand.wrist;
        rig.set_rotation(Bone::Wrist(side), math::from_euler(w.x, -w.y, -pose_hand_z), lerp, Space::Local);

        for finger in Finger::iter() {
            let rig_finger = hand.finger(finger);
            // 付け根の関節に Distal を入れる並び
            let segments = [rig_finger.distal, rig_finger.intermediate, rig_finger.proximal];
            for (joint, r) in segments.into_iter().enumerate() {
                let q = math::from_euler(r.x, -r.y, -r.z * 2.0);
                rig.set_rotation(Bone::Finger(side, finger, joint as u8), q, lerp, Space::Local);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmark::{Landmark, PoseLandmark};
    use crate::skeleton::{BoneMap, MemorySkeleton, Skeleton};

    /// 正面立ち姿勢の 3D（腰中心）と 2D（画面正規化）
    pub(crate) fn legacy_frame() -> LegacyResult {
        use PoseLandmark::*;
        let mut pose_3d = vec![Landmark::default(); PoseLandmark::COUNT];
        let mut pose_2d = vec![Landmark::default(); PoseLandmark::COUNT];
        let joints = [
            (LeftShoulder, 0.18, -0.5),
            (RightShoulder, -0.18, -0.5),
            (LeftElbow, 0.22, -0.25),
            (RightElbow, -0.22, -0.25),
            (LeftWrist, 0.24, 0.0),
            (RightWrist, -0.24, 0.0),
            (LeftPinky, 0.25, 0.05),
            (RightPinky, -0.25, 0.05),
            (LeftIndex, 0.23, 0.06),
            (RightIndex, -0.23, 0.06),
            (LeftHip, 0.1, 0.0),
            (RightHip, -0.1, 0.0),
        ];
        for (lm, x, y) in joints {
            pose_3d[lm.index()] = Landmark::new(x, y, 0.0);
            pose_2d[lm.index()] = Landmark::new(0.5 + x * 0.5, 0.6 + y * 0.5, 0.0);
        }
        LegacyResult {
            timestamp: 0.0,
            pose_2d,
            pose_3d,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_angle_range() {
        for r in [-7.0f32, -PI, -1.0, 0.0, 1.0, PI, 7.0] {
            let n = normalize_angle(r);
            assert!((-1.0..=1.0).contains(&n), "{} -> {}", r, n);
        }
        assert!((normalize_angle(PI / 2.0) - 0.5).abs() < 1e-6);
        assert!((normalize_angle(2.0 * PI + 0.5) - 0.5 / PI).abs() < 1e-5);
    }

    #[test]
    fn test_angle_between_straight_and_right() {
        let a = Vec3::new(-1.0, 0.0, 0.0);
        let b = Vec3::zeros();
        assert!((angle_between_3d(a, b, Vec3::new(1.0, 0.0, 0.0)) - PI).abs() < 1e-5);
        assert!((angle_between_3d(a, b, Vec3::new(0.0, 1.0, 0.0)) - PI / 2.0).abs() < 1e-5);
        // 長さ 0 はまっすぐ扱い
        assert_eq!(angle_between_3d(b, b, a), PI);
    }

    #[test]
    fn test_remap() {
        assert_eq!(remap(0.5, 0.0, 1.0), 0.5);
        assert_eq!(remap(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(remap(3.0, 0.0, 1.0), 1.0);
        assert_eq!(remap(1.0, 2.0, 2.0), 0.0);
    }

    #[test]
    fn test_find_rotation_horizontal() {
        let r = find_rotation(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0));
        // x-y 平面で +X 向きは 0
        assert!(r.z.abs() < 1e-6);
        assert!((r.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_apply_skips_without_pose() {
        let mut skeleton = MemorySkeleton::humanoid();
        let map = BoneMap::bind(&skeleton).unwrap();
        let before = skeleton.clone();
        let solver = LegacySolver::default();
        let mut rig = Rig::new(&mut skeleton, &map);
        let applied = solver.apply(&mut rig, &LegacyResult::default(), &MotionSettings::default());
        assert!(!applied);
        assert_eq!(before, skeleton);
    }

    #[test]
    fn test_apply_moves_arms_and_root() {
        let mut skeleton = MemorySkeleton::humanoid();
        let map = BoneMap::bind(&skeleton).unwrap();
        let solver = LegacySolver::from_config(&RetargetConfig::default());
        {
            let mut rig = Rig::new(&mut skeleton, &map);
            assert!(solver.apply(&mut rig, &legacy_frame(), &MotionSettings::default()));
        }
        let left_arm = skeleton.find_joint("左腕").unwrap();
        let q = skeleton.rotation(left_arm, Space::Local).unwrap();
        assert!(q.angle() > 1e-3, "left arm did not move");
        for name in ["上半身", "下半身", "左ひじ", "右ひじ"] {
            let j = skeleton.find_joint(name).unwrap();
            let q = skeleton.rotation(j, Space::Local).unwrap();
            assert!(q.angle().is_finite(), "{}", name);
        }
    }

    #[test]
    fn test_apply_respects_disabled_arms() {
        let mut skeleton = MemorySkeleton::humanoid();
        let map = BoneMap::bind(&skeleton).unwrap();
        let settings = MotionSettings {
            arms: false,
            ..Default::default()
        };
        {
            let mut rig = Rig::new(&mut skeleton, &map);
            assert!(LegacySolver::default().apply(&mut rig, &legacy_frame(), &settings));
        }
        let left_arm = skeleton.find_joint("左腕").unwrap();
        assert!(skeleton.rotation(left_arm, Space::Local).unwrap().angle() < 1e-6);
    }
}
