use nalgebra::Quaternion;
use strum::{EnumIter, IntoEnumIterator};
use tracing::debug;

use super::builder::{NodeId, SceneGraph};
use super::document::{Material, PbrMetallicRoughness};
use crate::retarget::math::{Quat, Vec3};
use crate::skeleton::{Bone, BoneMap, Skeleton, Space};

pub const SCENE_ROOT: &str = "AkiraRoot";

/// 線メッシュの色分け
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Region {
    Bone,
    Arm,
    Leg,
    Finger,
    Torso,
}

impl Region {
    pub fn of(bone: Bone) -> Region {
        match bone {
            Bone::Finger(..) => Region::Finger,
            Bone::Leg(_) | Bone::Knee(_) | Bone::Ankle(_) | Bone::FootIk(_) => Region::Leg,
            Bone::Arm(_) | Bone::Elbow(_) | Bone::Wrist(_) => Region::Arm,
            Bone::UpperBody | Bone::LowerBody => Region::Torso,
            Bone::Root | Bone::Neck | Bone::Head | Bone::Eye(_) => Region::Bone,
        }
    }

    /// materials 配列での番号
    pub fn index(self) -> usize {
        self as usize
    }

    fn material(self) -> Material {
        let (name, color) = match self {
            Region::Bone => ("BoneMaterial", [1.0, 0.0, 0.0, 1.0]),
            Region::Arm => ("ArmMaterial", [0.0, 0.7, 1.0, 1.0]),
            Region::Leg => ("LegMaterial", [0.0, 1.0, 0.3, 1.0]),
            Region::Finger => ("FingerMaterial", [1.0, 0.7, 0.0, 1.0]),
            Region::Torso => ("TorsoMaterial", [0.8, 0.2, 0.8, 1.0]),
        };
        Material {
            name: name.to_string(),
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: color,
                metallic_factor: 0.0,
                roughness_factor: 1.0,
            },
        }
    }

    pub fn materials() -> Vec<Material> {
        Region::iter().map(Region::material).collect()
    }
}

/// 表示用に末端を広げる。親の（上書き済みの）位置からの固定オフセットと、脚はレスト回転も返す。
pub fn spread(bone: Bone, parent_translation: Vec3) -> Option<(Vec3, Option<Quat>)> {
    let rotation = |x: f32, y: f32, z: f32, w: f32| Some(Quat::new_normalize(Quaternion::new(w, x, y, z)));
    // 左が -1
    let side = bone.side().map_or(1.0, |s| s.sign());
    let (offset, rest) = match bone {
        Bone::Finger(_, _, 0) => (Vec3::new(side * 6.0, 0.0, 2.0), None),
        Bone::Elbow(_) => (Vec3::new(side * 10.0, 1.0, 2.0), None),
        Bone::Knee(_) => (
            Vec3::new(side * 7.5, -12.0, 3.0),
            rotation(0.2, 0.15 * side, -0.1 * side, 0.96),
        ),
        Bone::Ankle(_) => (
            Vec3::new(side * 3.0, -5.0, 6.0),
            rotation(0.05 * side, 0.25, 0.15 * side, 0.95),
        ),
        Bone::Leg(_) => (
            Vec3::new(side * 8.0, -5.0, 1.5),
            rotation(0.15, 0.1 * side, -0.1 * side, 0.97),
        ),
        Bone::Wrist(_) => (Vec3::new(side * 8.0, -1.0, 3.0), None),
        Bone::Arm(_) => (Vec3::new(side * 8.0, 1.0, 1.0), None),
        _ => return None,
    };
    Some((parent_translation + offset, rest))
}

/// 階層表の子（親は Bone::parent が決める）
pub fn children(bone: Bone) -> Vec<Bone> {
    Bone::all().into_iter().filter(|c| c.parent() == Some(bone)).collect()
}

/// 現在のポーズから合成ルート付きのシーングラフを組む。
/// マップにないボーンはその子孫ごと落とす。
pub fn build_graph(skeleton: &dyn Skeleton, bones: &BoneMap) -> SceneGraph {
    let mut graph = SceneGraph::new();
    let root = graph.add(SCENE_ROOT, None, None, Vec3::zeros(), Quat::identity());

    let mut stack = vec![(Bone::Root, root)];
    while let Some((bone, parent)) = stack.pop() {
        let Some(joint) = bones.get(bone) else {
            debug!("glTF: {} is not mapped, skipping subtree", bone);
            continue;
        };
        let mut translation = skeleton.position(joint).unwrap_or_else(Vec3::zeros);
        let mut rotation = skeleton.rotation(joint, Space::Local).unwrap_or_else(Quat::identity);

        let parent_translation = graph.get(parent).map_or_else(Vec3::zeros, |n| n.translation);
        if let Some((t, r)) = spread(bone, parent_translation) {
            translation = t;
            if let Some(r) = r {
                rotation = r;
            }
        }

        let id: NodeId = graph.add(&bone.name(), Some(bone), Some(parent), translation, rotation);
        // 先頭の子から深さ優先で並べる
        for child in children(bone).into_iter().rev() {
            stack.push((child, id));
        }
    }
    graph
}
