use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retarget::math::{quat_from_array, quat_to_array};
use crate::skeleton::{Bone, BoneMap, Skeleton, Space};

/// 1 ボーン分の記録（ローカル位置とローカル回転 x,y,z,w）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneKey {
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphKey {
    pub name: String,
    pub weight: f32,
}

/// 1 ティック分のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    /// 1 始まりの通し番号
    pub key_num: usize,
    pub bones: Vec<BoneKey>,
    pub morphs: Vec<MorphKey>,
}

impl KeyFrame {
    /// 現在のスケルトン状態を撮る（番号は store が振る）
    pub fn capture(skeleton: &dyn Skeleton, bones: &BoneMap) -> Self {
        let bone_keys = Bone::all()
            .into_iter()
            .filter_map(|bone| {
                let joint = bones.get(bone)?;
                let position = skeleton.position(joint)?;
                let rotation = skeleton.rotation(joint, Space::Local)?;
                Some(BoneKey {
                    name: bone.name(),
                    position: [position.x, position.y, position.z],
                    rotation: quat_to_array(&rotation),
                })
            })
            .collect();

        let morphs = skeleton
            .morph_names()
            .into_iter()
            .filter_map(|name| {
                let weight = skeleton.morph_weight(&name)?;
                Some(MorphKey { name, weight })
            })
            .collect();

        Self {
            key_num: 0,
            bones: bone_keys,
            morphs,
        }
    }

    pub fn bone(&self, name: &str) -> Option<&BoneKey> {
        self.bones.iter().find(|b| b.name == name)
    }

    pub fn morph(&self, name: &str) -> Option<f32> {
        self.morphs.iter().find(|m| m.name == name).map(|m| m.weight)
    }
}

/// 収録中のテイク。追記のみで、番号は 1 から連番。
#[derive(Debug, Clone, Default)]
pub struct KeyframeStore {
    frames: Vec<KeyFrame>,
}

impl KeyframeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の番号を振って追加し、その番号を返す
    pub fn append(&mut self, mut frame: KeyFrame) -> usize {
        frame.key_num = self.frames.len() + 1;
        let key_num = frame.key_num;
        self.frames.push(frame);
        key_num
    }

    pub fn record(&mut self, skeleton: &dyn Skeleton, bones: &BoneMap) -> usize {
        self.append(KeyFrame::capture(skeleton, bones))
    }

    pub fn get(&self, key_num: usize) -> Option<&KeyFrame> {
        // 番号は連番なので位置で引ける
        key_num
            .checked_sub(1)
            .and_then(|i| self.frames.get(i))
            .filter(|f| f.key_num == key_num)
    }

    /// 記録した値を補間なしで書き戻す。未知の番号は何もしない。
    pub fn apply(&self, key_num: usize, skeleton: &mut dyn Skeleton) -> bool {
        let Some(frame) = self.get(key_num) else {
            debug!("keyframe {} not found", key_num);
            return false;
        };

        for key in &frame.bones {
            if let Some(joint) = skeleton.find_joint(&key.name) {
                let [x, y, z] = key.position;
                skeleton.set_position(joint, nalgebra::Vector3::new(x, y, z));
                skeleton.set_rotation(joint, quat_from_array(key.rotation), Space::Local);
            }
        }
        for morph in &frame.morphs {
            skeleton.set_morph_weight(&morph.name, morph.weight);
        }
        true
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn frames(&self) -> &[KeyFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// テイクの長さ（秒）
    pub fn duration(&self, frame_rate: f32) -> f32 {
        if frame_rate <= 0.0 || self.frames.is_empty() {
            return 0.0;
        }
        (self.frames.len() - 1) as f32 / frame_rate
    }
}
