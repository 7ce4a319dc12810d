use serde::{Deserialize, Serialize};
use tracing::warn;

use super::bone::{Bone, Finger, Side};
use super::rig::{JointHandle, Skeleton, Space};
use crate::retarget::math::{Quat, Vec3};

/// 標準ヒューマノイドが持つ表情モーフ
pub const HUMANOID_MORPHS: [&str; 17] = [
    "まばたき",
    "まばたき右",
    "瞑り左",
    "瞑り右",
    "あ",
    "い",
    "う",
    "え",
    "お",
    "わ",
    "にやり",
    "∧",
    "笑い",
    "困る",
    "怒り",
    "首横",
    "首縦",
];

#[derive(Debug, Clone, PartialEq)]
struct MemoryJoint {
    name: String,
    parent: Option<usize>,
    position: Vec3,
    rotation: Quat,
}

/// リグ記述ファイル（JSON）の 1 関節
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescription {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigDescription {
    pub joints: Vec<JointDescription>,
    #[serde(default)]
    pub morphs: Vec<String>,
}

/// レンダラーを持たないメモリ上のスケルトン
///
/// 回転はローカルで保持し、ワールド回転は親チェーンを合成して求める。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySkeleton {
    joints: Vec<MemoryJoint>,
    morphs: Vec<(String, f32)>,
}

impl MemorySkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// 関節を追加する。親は先に追加しておくこと。
    pub fn add_joint(&mut self, name: &str, parent: Option<&str>, position: Vec3) -> JointHandle {
        let parent = parent.and_then(|p| self.find_joint(p)).map(|h| h.0);
        self.joints.push(MemoryJoint {
            name: name.to_string(),
            parent,
            position,
            rotation: Quat::identity(),
        });
        JointHandle(self.joints.len() - 1)
    }

    pub fn add_morph(&mut self, name: &str) {
        if self.morph_weight(name).is_none() {
            self.morphs.push((name.to_string(), 0.0));
        }
    }

    /// 全ボーンと標準モーフを持つ MMD 風ヒューマノイド
    pub fn humanoid() -> Self {
        let mut skeleton = Self::new();
        for bone in Bone::all() {
            let parent = bone.parent().map(|p| p.name());
            skeleton.add_joint(&bone.name(), parent.as_deref(), rest_offset(bone));
        }
        for morph in HUMANOID_MORPHS {
            skeleton.add_morph(morph);
        }
        skeleton
    }

    pub fn from_description(description: &RigDescription) -> Self {
        let mut skeleton = Self::new();
        for joint in &description.joints {
            if let Some(parent) = &joint.parent {
                if skeleton.find_joint(parent).is_none() {
                    warn!("joint {} refers to unknown parent {}; attached to scene root", joint.name, parent);
                }
            }
            let [x, y, z] = joint.position;
            skeleton.add_joint(&joint.name, joint.parent.as_deref(), Vec3::new(x, y, z));
        }
        for morph in &description.morphs {
            skeleton.add_morph(morph);
        }
        skeleton
    }

    /// 指定した関節を取り除いたコピー（子は親を失う）
    pub fn without_joint(&self, name: &str) -> Self {
        let mut skeleton = Self::new();
        for joint in &self.joints {
            if joint.name == name {
                continue;
            }
            let parent = joint
                .parent
                .map(|p| self.joints[p].name.as_str())
                .filter(|p| *p != name);
            let handle = skeleton.add_joint(&joint.name, parent, joint.position);
            skeleton.joints[handle.0].rotation = joint.rotation;
        }
        skeleton.morphs = self.morphs.clone();
        skeleton
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn parent_of(&self, joint: JointHandle) -> Option<JointHandle> {
        self.joints.get(joint.0)?.parent.map(JointHandle)
    }

    fn world_rotation(&self, index: usize) -> Quat {
        let mut rotation = Quat::identity();
        let mut current = Some(index);
        while let Some(i) = current {
            let joint = &self.joints[i];
            rotation = joint.rotation * rotation;
            current = joint.parent;
        }
        rotation
    }
}

/// ヒューマノイドの親相対のレスト位置
fn rest_offset(bone: Bone) -> Vec3 {
    // MMD モデルは +X が左
    let lx = |side: Side| if side.is_left() { 1.0 } else { -1.0 };
    match bone {
        Bone::Root => Vec3::zeros(),
        Bone::LowerBody => Vec3::new(0.0, 11.0, 0.0),
        Bone::UpperBody => Vec3::new(0.0, 0.5, 0.0),
        Bone::Neck => Vec3::new(0.0, 4.5, 0.0),
        Bone::Head => Vec3::new(0.0, 1.2, 0.0),
        Bone::Eye(s) => Vec3::new(lx(s) * 0.35, 1.0, -0.6),
        Bone::Arm(s) => Vec3::new(lx(s) * 1.5, 4.0, 0.0),
        Bone::Elbow(s) => Vec3::new(lx(s) * 2.3, -1.7, 0.0),
        Bone::Wrist(s) => Vec3::new(lx(s) * 2.1, -1.5, 0.0),
        Bone::Leg(s) => Vec3::new(lx(s) * 0.9, -0.6, 0.0),
        Bone::Knee(_) => Vec3::new(0.0, -4.6, -0.1),
        Bone::Ankle(_) => Vec3::new(0.0, -4.4, 0.2),
        Bone::FootIk(s) => Vec3::new(lx(s) * 0.9, 1.4, 0.1),
        Bone::Finger(s, finger, 0) => {
            let spread = finger as usize as f32 - 2.0;
            let z = if finger == Finger::Thumb { -0.35 } else { spread * 0.12 };
            Vec3::new(lx(s) * 0.45, -0.35, z)
        }
        Bone::Finger(s, _, _) => Vec3::new(lx(s) * 0.22, -0.18, 0.0),
    }
}

impl Skeleton for MemorySkeleton {
    fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }

    fn find_joint(&self, name: &str) -> Option<JointHandle> {
        self.joints.iter().position(|j| j.name == name).map(JointHandle)
    }

    fn position(&self, joint: JointHandle) -> Option<Vec3> {
        self.joints.get(joint.0).map(|j| j.position)
    }

    fn set_position(&mut self, joint: JointHandle, position: Vec3) {
        if let Some(j) = self.joints.get_mut(joint.0) {
            j.position = position;
        }
    }

    fn rotation(&self, joint: JointHandle, space: Space) -> Option<Quat> {
        let j = self.joints.get(joint.0)?;
        Some(match space {
            Space::Local => j.rotation,
            Space::World => self.world_rotation(joint.0),
        })
    }

    fn set_rotation(&mut self, joint: JointHandle, rotation: Quat, space: Space) {
        let Some(parent) = self.joints.get(joint.0).map(|j| j.parent) else {
            return;
        };
        let local = match (space, parent) {
            (Space::World, Some(p)) => self.world_rotation(p).inverse() * rotation,
            _ => rotation,
        };
        self.joints[joint.0].rotation = local;
    }

    fn morph_names(&self) -> Vec<String> {
        self.morphs.iter().map(|(n, _)| n.clone()).collect()
    }

    fn morph_weight(&self, name: &str) -> Option<f32> {
        self.morphs.iter().find(|(n, _)| n == name).map(|(_, w)| *w)
    }

    fn set_morph_weight(&mut self, name: &str, weight: f32) {
        if let Some((_, w)) = self.morphs.iter_mut().find(|(n, _)| n == name) {
            *w = weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retarget::math;

    #[test]
    fn test_humanoid_contents() {
        let skeleton = MemorySkeleton::humanoid();
        assert_eq!(skeleton.joint_count(), Bone::all().len());
        assert_eq!(skeleton.morph_names().len(), HUMANOID_MORPHS.len());
        let elbow = skeleton.find_joint("右ひじ").unwrap();
        let arm = skeleton.find_joint("右腕").unwrap();
        assert_eq!(skeleton.parent_of(elbow), Some(arm));
    }

    #[test]
    fn test_world_rotation_composes_parents() {
        let mut skeleton = MemorySkeleton::humanoid();
        let lower = skeleton.find_joint("下半身").unwrap();
        let upper = skeleton.find_joint("上半身").unwrap();
        let a = math::yaw_pitch_roll(0.5, 0.0, 0.0);
        let b = math::yaw_pitch_roll(0.25, 0.0, 0.0);
        skeleton.set_rotation(lower, a, Space::Local);
        skeleton.set_rotation(upper, b, Space::Local);
        let world = skeleton.rotation(upper, Space::World).unwrap();
        assert!(world.angle_to(&(a * b)) < 1e-5);
    }

    #[test]
    fn test_set_world_rotation_round_trip() {
        let mut skeleton = MemorySkeleton::humanoid();
        let knee = skeleton.find_joint("左ひざ").unwrap();
        let ankle = skeleton.find_joint("左足首").unwrap();
        skeleton.set_rotation(knee, math::yaw_pitch_roll(0.0, 0.8, 0.0), Space::Local);
        let target = math::yaw_pitch_roll(0.0, 0.3, 0.0);
        skeleton.set_rotation(ankle, target, Space::World);
        let world = skeleton.rotation(ankle, Space::World).unwrap();
        assert!(world.angle_to(&target) < 1e-5);
        let local = skeleton.rotation(ankle, Space::Local).unwrap();
        assert!((local.angle() - 0.5).abs() < 1e-4, "local angle {}", local.angle());
    }

    #[test]
    fn test_out_of_range_handle() {
        let mut skeleton = MemorySkeleton::humanoid();
        let bogus = JointHandle(10_000);
        assert_eq!(skeleton.position(bogus), None);
        skeleton.set_position(bogus, Vec3::new(1.0, 0.0, 0.0));
        skeleton.set_rotation(bogus, Quat::identity(), Space::World);
        assert_eq!(skeleton.rotation(bogus, Space::Local), None);
    }

    #[test]
    fn test_from_description() {
        let json = r#"{
            "joints": [
                {"name": "全ての親"},
                {"name": "下半身", "parent": "全ての親", "position": [0, 10, 0]},
                {"name": "浮遊", "parent": "存在しない"}
            ],
            "morphs": ["あ"]
        }"#;
        let description: RigDescription = serde_json::from_str(json).unwrap();
        let skeleton = MemorySkeleton::from_description(&description);
        let lower = skeleton.find_joint("下半身").unwrap();
        assert_eq!(skeleton.position(lower), Some(Vec3::new(0.0, 10.0, 0.0)));
        assert_eq!(skeleton.parent_of(JointHandle(2)), None);
        assert_eq!(skeleton.morph_weight("あ"), Some(0.0));
    }
}
