use std::collections::HashMap;

use strum::IntoEnumIterator;

use super::limits::BiomechanicalLimits;
use super::math::{self, Quat, Vec3};
use super::{face, hand};
use crate::config::{MotionSettings, RetargetConfig};
use crate::filter::{Channel, FilterBank, StreamKey};
use crate::landmark::{HandLandmark, LandmarkSet, PoseLandmark};
use crate::skeleton::{Bone, Rig, Side, Space};

/// 片側の四肢ランドマーク
#[derive(Debug, Clone, Copy)]
struct LimbLandmarks {
    shoulder: PoseLandmark,
    elbow: PoseLandmark,
    wrist: PoseLandmark,
    hip: PoseLandmark,
    knee: PoseLandmark,
    ankle: PoseLandmark,
}

fn limb(side: Side) -> LimbLandmarks {
    use PoseLandmark::*;
    match side {
        Side::Left => LimbLandmarks {
            shoulder: LeftShoulder,
            elbow: LeftElbow,
            wrist: LeftWrist,
            hip: LeftHip,
            knee: LeftKnee,
            ankle: LeftAnkle,
        },
        Side::Right => LimbLandmarks {
            shoulder: RightShoulder,
            elbow: RightElbow,
            wrist: RightWrist,
            hip: RightHip,
            knee: RightKnee,
            ankle: RightAnkle,
        },
    }
}

/// フィルタ通過後のポーズ点
///
/// 1 ティックにつき各ストリームを 1 回だけサンプルする。
/// 入力に無い点はフィルタを進めずに欠損のまま残す。
#[derive(Debug, Clone, Default)]
pub struct FilteredPose {
    points: HashMap<StreamKey, Vec3>,
}

impl FilteredPose {
    pub fn sample(bank: &mut FilterBank, set: &LandmarkSet) -> Self {
        let mut points = HashMap::new();
        for key in StreamKey::all() {
            let source = match key.channel {
                Channel::Screen => &set.pose_normalized,
                _ => &set.main_body,
            };
            if let Some(p) = source.pose(key.landmark) {
                points.insert(key, bank.sample(key, set.timestamp, p));
            }
        }
        Self { points }
    }

    pub fn get(&self, landmark: PoseLandmark, channel: Channel) -> Option<Vec3> {
        self.points.get(&StreamKey::new(landmark, channel)).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmRotations {
    pub shoulder: Option<Quat>,
    pub elbow: Option<Quat>,
    pub wrist: Option<Quat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LegRotations {
    pub hip: Option<Quat>,
    /// ワールド空間で書き込む
    pub foot: Option<Quat>,
    /// 足IKターゲット
    pub ik_target: Option<Vec3>,
}

/// 1 ティック分の計算結果。入力が欠けた部位は None。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyRotations {
    pub root: Option<Vec3>,
    pub lower_body: Option<Quat>,
    pub upper_body: Option<Quat>,
    pub head: Option<Quat>,
    pub left_arm: ArmRotations,
    pub right_arm: ArmRotations,
    pub left_leg: LegRotations,
    pub right_leg: LegRotations,
}

impl BodyRotations {
    pub fn arm(&self, side: Side) -> &ArmRotations {
        match side {
            Side::Left => &self.left_arm,
            Side::Right => &self.right_arm,
        }
    }

    pub fn leg(&self, side: Side) -> &LegRotations {
        match side {
            Side::Left => &self.left_leg,
            Side::Right => &self.right_leg,
        }
    }
}

/// 腰の左右方向から下半身の回転
pub fn lower_body_rotation(left_hip: Vec3, right_hip: Vec3) -> Option<Quat> {
    let dir = math::flip_y(math::try_normalize(left_hip - right_hip)?);
    Some(math::shortest_arc(math::right(), dir))
}

/// 肩の左右方向と、腰中心（原点）から肩中心への前傾から上半身の回転
pub fn upper_body_rotation(left_shoulder: Vec3, right_shoulder: Vec3) -> Option<Quat> {
    let spine_dir = math::flip_y(math::try_normalize(left_shoulder - right_shoulder)?);
    let spine = math::shortest_arc(math::right(), spine_dir);

    let center = (left_shoulder + right_shoulder) * 0.5;
    let Some(bend_dir) = math::try_normalize(center).map(math::flip_y) else {
        return Some(spine);
    };
    let bend_angle = bend_dir.dot(&math::up()).clamp(-1.0, 1.0).acos();
    let bend = math::axis_angle(math::up().cross(&bend_dir), bend_angle);
    Some(spine * bend)
}

/// 首（肩中心）から鼻への向きを上半身ローカルで評価した頭の回転
pub fn head_rotation(nose: Vec3, left_shoulder: Vec3, right_shoulder: Vec3, upper_body: &Quat, tilt_offset: f32) -> Option<Quat> {
    let neck = (left_shoulder + right_shoulder) * 0.5;
    let dir = math::try_normalize(nose - neck)?;
    let local = math::to_local(upper_body, dir);

    let flat = Vec3::new(local.x, 0.0, local.z);
    let tilt = (-local.y).atan2(flat.norm()) + tilt_offset;
    let horizontal = math::look_horizontal(flat);
    Some(horizontal * math::axis_angle(math::right(), tilt))
}

/// 腕のデフォルト方向（左は +X 下向き、右は -X 下向き）
pub fn arm_default_direction(side: Side) -> Vec3 {
    let x = if side.is_left() { 1.0 } else { -1.0 };
    Vec3::new(x, -1.0, 0.0).normalize()
}

/// from→to の方向を frame のローカルに直し、デフォルト方向からの最短回転を返す
pub fn limb_rotation(from: Vec3, to: Vec3, frame: &Quat, side: Side) -> Option<Quat> {
    let dir = math::flip_y(math::try_normalize(to - from)?);
    let local = math::to_local(frame, dir);
    Some(math::shortest_arc(arm_default_direction(side), local))
}

/// 下半身ローカルの脚方向から股関節のオイラー角 (x, y, z)
pub fn hip_angles(local_leg_dir: Vec3, limits: &BiomechanicalLimits) -> (f32, f32, f32) {
    let d = local_leg_dir;
    let x = math::signed_angle(Vec3::new(d.x, 0.0, d.z), math::forward(), math::up());
    let y = d.x.atan2(d.z);
    let z = d.y.atan2((d.x * d.x + d.z * d.z).sqrt());
    limits.clamp_hip(x, y, z)
}

/// 股関節ローカルの足方向から膝の曲げ角
pub fn knee_angle(local_foot_dir: Vec3, limits: &BiomechanicalLimits) -> f32 {
    let d = local_foot_dir;
    let angle = math::signed_angle(Vec3::new(d.x, 0.0, d.z), math::forward(), math::up());
    limits.clamp_knee(angle)
}

pub fn hip_rotation(hip: Vec3, knee: Vec3, lower_body: &Quat, limits: &BiomechanicalLimits) -> Option<Quat> {
    let dir = math::flip_y(math::try_normalize(knee - hip)?);
    let (x, y, z) = hip_angles(math::to_local(lower_body, dir), limits);
    Some(math::yaw_pitch_roll(y, x, z))
}

pub fn foot_rotation(hip: Vec3, ankle: Vec3, hip_rot: &Quat, limits: &BiomechanicalLimits) -> Option<Quat> {
    let dir = math::flip_y(math::try_normalize(ankle - hip)?);
    let angle = knee_angle(math::to_local(hip_rot, dir), limits);
    Some(math::yaw_pitch_roll(0.0, angle, 0.0))
}

/// 正規化ポーズの腰・肩中心からルートの目標位置
///
/// 背骨が短く見える（カメラから遠い）ほど横移動を小さくする。
pub fn root_target(hip_center: Vec3, shoulder_center: Vec3, config: &RetargetConfig) -> Vec3 {
    let spine_length = (hip_center - shoulder_center).norm();
    let spine = (spine_length - 1.0).clamp(-2.0, 0.0);
    let z = spine * (spine * -2.0).powi(2);
    let x = (hip_center.x - 0.4).clamp(-1.0, 1.0) * config.horizontal_damping * z;
    Vec3::new(
        -x * config.root_horizontal_scale,
        hip_center.y + config.pose_y_scale,
        z * config.root_depth_scale,
    )
}

pub fn foot_target(ankle: Vec3, config: &RetargetConfig) -> Vec3 {
    let s = config.foot_scale;
    Vec3::new(ankle.x * s, -ankle.y * s + config.foot_y_offset, ankle.z * s)
}

/// ワールド座標ランドマークから直接ボーン回転を求めるソルバー
#[derive(Debug, Clone)]
pub struct HolisticSolver {
    config: RetargetConfig,
    limits: BiomechanicalLimits,
}

impl HolisticSolver {
    pub fn new(config: RetargetConfig, limits: BiomechanicalLimits) -> Self {
        Self { config, limits }
    }

    pub fn from_config(config: &RetargetConfig) -> Self {
        Self::new(*config, BiomechanicalLimits::default())
    }

    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    /// スケルトンに触れずに全部位の目標値を計算する
    pub fn solve(&self, set: &LandmarkSet, pose: &FilteredPose) -> BodyRotations {
        use PoseLandmark::*;
        let mut out = BodyRotations::default();

        let hips = (pose.get(LeftHip, Channel::Torso), pose.get(RightHip, Channel::Torso));
        let shoulders = (pose.get(LeftShoulder, Channel::Arm), pose.get(RightShoulder, Channel::Arm));

        if let (Some(l), Some(r)) = hips {
            out.lower_body = lower_body_rotation(l, r);
        }
        if let (Some(l), Some(r)) = shoulders {
            out.upper_body = upper_body_rotation(l, r);
        }
        let lower = out.lower_body.unwrap_or_else(Quat::identity);
        let upper = out.upper_body.unwrap_or_else(Quat::identity);

        if let (Some(nose), (Some(l), Some(r))) = (set.main_body.pose(Nose), shoulders) {
            let offset = self.config.head_tilt_offset_deg.to_radians();
            out.head = head_rotation(nose, l, r, &upper, offset);
        }

        let screen = (
            pose.get(LeftHip, Channel::Screen),
            pose.get(RightHip, Channel::Screen),
            pose.get(LeftShoulder, Channel::Screen),
            pose.get(RightShoulder, Channel::Screen),
        );
        if let (Some(lh), Some(rh), Some(ls), Some(rs)) = screen {
            out.root = Some(root_target((lh + rh) * 0.5, (ls + rs) * 0.5, &self.config));
        }

        for side in Side::iter() {
            let lm = limb(side);
            let shoulder = pose.get(lm.shoulder, Channel::Arm);
            let elbow = pose.get(lm.elbow, Channel::Arm);
            let wrist = pose.get(lm.wrist, Channel::Arm);
            let hand_ref = set.hand(side).hand(HandLandmark::ThumbMcp);

            let arm = ArmRotations {
                shoulder: shoulder
                    .zip(elbow)
                    .and_then(|(s, e)| limb_rotation(s, e, &upper, side)),
                elbow: elbow
                    .zip(wrist)
                    .and_then(|(e, w)| limb_rotation(e, w, &upper, side)),
                wrist: wrist
                    .zip(hand_ref)
                    .and_then(|(w, h)| limb_rotation(w, h, &lower, side)),
            };

            let hip = pose.get(lm.hip, Channel::Leg);
            let knee = pose.get(lm.knee, Channel::Leg);
            let ankle = pose.get(lm.ankle, Channel::Leg);
            let hip_rot = hip
                .zip(knee)
                .and_then(|(h, k)| hip_rotation(h, k, &lower, &self.limits));
            let leg = LegRotations {
                hip: hip_rot,
                foot: hip.zip(ankle).and_then(|(h, a)| {
                    foot_rotation(h, a, &hip_rot.unwrap_or_else(Quat::identity), &self.limits)
                }),
                ik_target: ankle.map(|a| foot_target(a, &self.config)),
            };

            match side {
                Side::Left => {
                    out.left_arm = arm;
                    out.left_leg = leg;
                }
                Side::Right => {
                    out.right_arm = arm;
                    out.right_leg = leg;
                }
            }
        }

        out
    }

    /// 計算結果を有効な部位だけスケルトンに書き込む
    pub fn apply(&self, rig: &mut Rig<'_>, set: &LandmarkSet, pose: &FilteredPose, settings: &MotionSettings) {
        let body = self.solve(set, pose);
        let lerp = self.config.lerp_factor;

        if settings.body {
            if let Some(root) = body.root {
                rig.lerp_position(Bone::Root, root, self.config.root_lerp());
            }
            if let Some(q) = body.lower_body {
                rig.set_rotation(Bone::LowerBody, q, lerp, Space::Local);
            }
            if let Some(q) = body.upper_body {
                rig.set_rotation(Bone::UpperBody, q, lerp, Space::Local);
            }
        }

        if settings.arms {
            for side in Side::iter() {
                let arm = body.arm(side);
                let targets = [
                    (Bone::Arm(side), arm.shoulder),
                    (Bone::Elbow(side), arm.elbow),
                    (Bone::Wrist(side), arm.wrist),
                ];
                for (bone, rotation) in targets {
                    if let Some(q) = rotation {
                        rig.set_rotation(bone, q, lerp, Space::Local);
                    }
                }
            }
        }

        if settings.legs {
            for side in Side::iter() {
                let leg = body.leg(side);
                if let Some(q) = leg.hip {
                    rig.set_rotation(Bone::Leg(side), q, lerp, Space::Local);
                }
                if let Some(q) = leg.foot {
                    rig.set_rotation(Bone::Ankle(side), q, lerp, Space::World);
                }
                if let Some(target) = leg.ik_target {
                    rig.lerp_position(Bone::FootIk(side), target, lerp);
                }
            }
        }

        if settings.head {
            if let Some(q) = body.head {
                rig.set_rotation(Bone::Head, q, lerp, Space::Local);
            }
        }

        if settings.face {
            face::apply_expressions(rig, &set.face, lerp);
            face::apply_gaze(rig, &set.face, self.config.eye_gaze_scale, lerp);
        }

        if settings.arms {
            for side in Side::iter() {
                hand::apply_fingers(rig, set.hand(side), side, lerp);
            }
        }
    }
}
