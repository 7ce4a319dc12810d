use super::record::{BoneRecord, MorphRecord};
use crate::config::ExportConfig;
use crate::keyframe::KeyFrame;
use crate::skeleton::Bone;

/// 書き出し用に整えた 1 フレーム（フレーム番号は書き込み時に振る）
#[derive(Debug, Clone, PartialEq)]
pub struct FrameData {
    pub bones: Vec<BoneRecord>,
    pub morphs: Vec<MorphRecord>,
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

impl FrameData {
    /// 位置を残すのはルート・足IK・腕だけ。他は回転のみ。
    pub fn from_keyframe(frame: &KeyFrame) -> Self {
        let bones = frame
            .bones
            .iter()
            .map(|key| {
                let keeps_position = Bone::from_name(&key.name).is_some_and(Bone::keeps_position);
                let position = if keeps_position {
                    key.position.map(|v| finite_or(v, 0.0))
                } else {
                    [0.0; 3]
                };
                let [x, y, z, w] = key.rotation;
                BoneRecord {
                    name: key.name.clone(),
                    frame: 0,
                    position,
                    rotation: [finite_or(x, 0.0), finite_or(y, 0.0), finite_or(z, 0.0), finite_or(w, 1.0)],
                }
            })
            .collect();
        let morphs = frame
            .morphs
            .iter()
            .map(|m| MorphRecord {
                name: m.name.clone(),
                frame: 0,
                weight: finite_or(m.weight, 0.0),
            })
            .collect();
        Self { bones, morphs }
    }
}

/// 全成分の差が閾値以内なら似たフレーム。ボーン数・モーフ数が違えば別物。
pub fn is_similar(a: &FrameData, b: &FrameData, threshold: f32, morph_scale: f32) -> bool {
    if a.bones.len() != b.bones.len() || a.morphs.len() != b.morphs.len() {
        return false;
    }
    let close = |x: &f32, y: &f32| (x - y).abs() <= threshold;
    let bones_close = a.bones.iter().zip(&b.bones).all(|(p, q)| {
        p.position.iter().zip(&q.position).all(|(x, y)| close(x, y))
            && p.rotation.iter().zip(&q.rotation).all(|(x, y)| close(x, y))
    });
    let morph_threshold = threshold * morph_scale;
    bones_close
        && a.morphs
            .iter()
            .zip(&b.morphs)
            .all(|(p, q)| (p.weight - q.weight).abs() <= morph_threshold)
}

/// max_frames を超えないよう等間隔に間引いたインデックス
pub fn sample_indices(len: usize, max_frames: usize) -> Vec<usize> {
    let step = len.div_ceil(max_frames.max(1)).max(1);
    (0..len).step_by(step).collect()
}

/// 間引きと類似フレーム除去の設定
///
/// `max_frames` は等間隔間引きの上限。`keep_last` で末尾を足すと `max_frames + 1` になりうる。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction {
    pub max_frames: usize,
    pub threshold: f32,
    pub morph_scale: f32,
    pub keep_last: bool,
}

impl Reduction {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            max_frames: config.max_frames,
            threshold: config.similarity_threshold,
            morph_scale: config.morph_threshold_scale,
            keep_last: config.keep_last_frame,
        }
    }
}

impl Default for Reduction {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// 間引き → 類似フレーム除去 → 最終フレームの保持。
/// 元の順序のインデックスを返す。
pub fn reduce(frames: &[FrameData], rule: &Reduction) -> Vec<usize> {
    let Some(last) = frames.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut kept: Vec<usize> = Vec::new();
    for i in sample_indices(frames.len(), rule.max_frames) {
        match kept.last() {
            Some(&prev) if is_similar(&frames[prev], &frames[i], rule.threshold, rule.morph_scale) => {}
            _ => kept.push(i),
        }
    }

    if rule.keep_last && kept.last() != Some(&last) {
        kept.push(last);
    }
    kept
}
