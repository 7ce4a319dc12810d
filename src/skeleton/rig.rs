use std::collections::HashMap;

use thiserror::Error;
use tracing::{info, warn};

use super::bone::Bone;
use crate::retarget::math::{self, Quat, Vec3};

/// 回転を読み書きする座標系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    /// 親ボーン相対
    #[default]
    Local,
    World,
}

/// スケルトン側が発行する関節ハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointHandle(pub usize);

/// モデル読み込み側が実装する骨格
///
/// 範囲外のハンドルや未知のモーフ名は読み取りで None、書き込みで無視。
pub trait Skeleton {
    fn joint_names(&self) -> Vec<String>;
    fn find_joint(&self, name: &str) -> Option<JointHandle>;
    fn position(&self, joint: JointHandle) -> Option<Vec3>;
    fn set_position(&mut self, joint: JointHandle, position: Vec3);
    fn rotation(&self, joint: JointHandle, space: Space) -> Option<Quat>;
    fn set_rotation(&mut self, joint: JointHandle, rotation: Quat, space: Space);
    fn morph_names(&self) -> Vec<String>;
    fn morph_weight(&self, name: &str) -> Option<f32>;
    fn set_morph_weight(&mut self, name: &str, weight: f32);
}

#[derive(Debug, Error, PartialEq)]
pub enum BindError {
    #[error("skeleton is missing required joints: {}", .0.join(", "))]
    MissingJoints(Vec<String>),
}

/// Bone ↔ JointHandle の対応表。バインド時に一度だけ作る。
#[derive(Debug, Clone, Default)]
pub struct BoneMap {
    joints: HashMap<Bone, JointHandle>,
}

impl BoneMap {
    pub fn bind(skeleton: &dyn Skeleton) -> Result<Self, BindError> {
        let mut joints = HashMap::new();
        let mut missing = Vec::new();
        let mut optional_missing = 0;

        for bone in Bone::all() {
            match skeleton.find_joint(&bone.name()) {
                Some(handle) => {
                    joints.insert(bone, handle);
                }
                None if bone.is_required() => missing.push(bone.name()),
                None => optional_missing += 1,
            }
        }

        if !missing.is_empty() {
            return Err(BindError::MissingJoints(missing));
        }
        if optional_missing > 0 {
            warn!("{} optional joints (eyes/fingers) not found; they will be skipped", optional_missing);
        }
        info!("bound {} joints", joints.len());
        Ok(Self { joints })
    }

    pub fn get(&self, bone: Bone) -> Option<JointHandle> {
        self.joints.get(&bone).copied()
    }

    pub fn contains(&self, bone: Bone) -> bool {
        self.joints.contains_key(&bone)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// バインド済みスケルトンへの書き込み窓口
///
/// 回転はすべて現在の姿勢から目標へ slerp して書き込む。
pub struct Rig<'a> {
    skeleton: &'a mut dyn Skeleton,
    bones: &'a BoneMap,
}

impl<'a> Rig<'a> {
    pub fn new(skeleton: &'a mut dyn Skeleton, bones: &'a BoneMap) -> Self {
        Self { skeleton, bones }
    }

    pub fn has(&self, bone: Bone) -> bool {
        self.bones.contains(bone)
    }

    pub fn rotation(&self, bone: Bone, space: Space) -> Option<Quat> {
        self.skeleton.rotation(self.bones.get(bone)?, space)
    }

    pub fn position(&self, bone: Bone) -> Option<Vec3> {
        self.skeleton.position(self.bones.get(bone)?)
    }

    /// 現在の回転から target へ factor だけ近づける。未マップのボーンは無視。
    pub fn set_rotation(&mut self, bone: Bone, target: Quat, factor: f32, space: Space) {
        let Some(joint) = self.bones.get(bone) else {
            return;
        };
        let current = self
            .skeleton
            .rotation(joint, space)
            .unwrap_or_else(Quat::identity);
        let next = math::slerp(&current, &target, factor);
        self.skeleton.set_rotation(joint, next, space);
    }

    /// 補間なしで書き込む
    pub fn put_rotation(&mut self, bone: Bone, rotation: Quat, space: Space) {
        if let Some(joint) = self.bones.get(bone) {
            self.skeleton.set_rotation(joint, rotation, space);
        }
    }

    /// 現在位置から target へ線形補間
    pub fn lerp_position(&mut self, bone: Bone, target: Vec3, factor: f32) {
        let Some(joint) = self.bones.get(bone) else {
            return;
        };
        let current = self.skeleton.position(joint).unwrap_or_else(Vec3::zeros);
        self.skeleton
            .set_position(joint, math::lerp(current, target, factor));
    }

    /// 現在の重みから target へ一次ローパス。結果は [0, 1]。
    pub fn blend_morph(&mut self, name: &str, target: f32, factor: f32) {
        let Some(current) = self.skeleton.morph_weight(name) else {
            return;
        };
        let next = (current + (target - current) * factor).clamp(0.0, 1.0);
        self.skeleton.set_morph_weight(name, next);
    }

    pub fn skeleton(&self) -> &dyn Skeleton {
        &*self.skeleton
    }
}
