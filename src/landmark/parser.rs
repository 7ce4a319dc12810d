use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::keypoint::{FaceLandmark, HandLandmark, Landmark, PoseLandmark};

/// 1 フレーム分の点群。インデックス外の参照は None を返す。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Landmark>,
}

impl PointSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// 範囲チェック付き取得
    pub fn get(&self, index: usize) -> Option<Vector3<f32>> {
        self.points.get(index).map(|p| p.to_vector())
    }

    pub fn pose(&self, landmark: PoseLandmark) -> Option<Vector3<f32>> {
        self.get(landmark.index())
    }

    pub fn hand(&self, landmark: HandLandmark) -> Option<Vector3<f32>> {
        self.get(landmark.index())
    }

    pub fn face(&self, landmark: FaceLandmark) -> Option<Vector3<f32>> {
        self.get(landmark.index())
    }
}

impl From<Vec<Landmark>> for PointSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// Holistic 検出器の 1 フレーム分の出力
///
/// 各コレクションは欠けていてもよい（空配列として扱う）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolisticResult {
    /// タイムスタンプ（秒）
    #[serde(default)]
    pub timestamp: f64,
    /// 腰中心・メートル単位の 3D ポーズ
    #[serde(default)]
    pub pose_world: Vec<Landmark>,
    /// 画像正規化座標のポーズ
    #[serde(default)]
    pub pose: Vec<Landmark>,
    #[serde(default)]
    pub left_hand: Vec<Landmark>,
    #[serde(default)]
    pub right_hand: Vec<Landmark>,
    #[serde(default)]
    pub face: Vec<Landmark>,
}

/// 旧検出器の 1 フレーム分の出力（2D ポーズ + 3D ポーズ + 手の 2D 点）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyResult {
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub pose_2d: Vec<Landmark>,
    #[serde(default)]
    pub pose_3d: Vec<Landmark>,
    /// 検出器から見た左手（被写体の右手の場合がある）
    #[serde(default)]
    pub left_hand: Vec<Landmark>,
    #[serde(default)]
    pub right_hand: Vec<Landmark>,
    #[serde(default)]
    pub face: Vec<Landmark>,
}

/// 検出器からの入力。リクエスト形状ごとにタグ付けされる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionResult {
    Holistic(HolisticResult),
    Legacy(LegacyResult),
}

impl DetectionResult {
    pub fn timestamp(&self) -> f64 {
        match self {
            Self::Holistic(r) => r.timestamp,
            Self::Legacy(r) => r.timestamp,
        }
    }
}

/// リターゲットエンジンが使う 5 系統のストリーム
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    pub timestamp: f64,
    /// ワールド座標ポーズ（無ければ空）
    pub main_body: PointSet,
    /// 画面相対の移動量に使う正規化ポーズ
    pub pose_normalized: PointSet,
    pub left_hand: PointSet,
    pub right_hand: PointSet,
    pub face: PointSet,
}

impl LandmarkSet {
    pub fn parse(result: &HolisticResult) -> Self {
        Self {
            timestamp: result.timestamp,
            main_body: PointSet::new(result.pose_world.clone()),
            pose_normalized: PointSet::new(result.pose.clone()),
            left_hand: PointSet::new(result.left_hand.clone()),
            right_hand: PointSet::new(result.right_hand.clone()),
            face: PointSet::new(result.face.clone()),
        }
    }

    pub fn hand(&self, side: crate::skeleton::Side) -> &PointSet {
        match side {
            crate::skeleton::Side::Left => &self.left_hand,
            crate::skeleton::Side::Right => &self.right_hand,
        }
    }
}

impl From<&HolisticResult> for LandmarkSet {
    fn from(result: &HolisticResult) -> Self {
        Self::parse(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_set_bounds_checked() {
        let set = PointSet::new(vec![Landmark::new(1.0, 2.0, 3.0)]);
        assert_eq!(set.get(0), Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(set.get(1), None);
        assert_eq!(set.pose(PoseLandmark::RightAnkle), None);
    }

    #[test]
    fn test_parse_missing_streams_are_empty() {
        let result = HolisticResult {
            timestamp: 0.5,
            pose_world: vec![Landmark::default(); PoseLandmark::COUNT],
            ..Default::default()
        };
        let set = LandmarkSet::parse(&result);
        assert_eq!(set.timestamp, 0.5);
        assert_eq!(set.main_body.len(), PoseLandmark::COUNT);
        assert!(set.pose_normalized.is_empty());
        assert!(set.left_hand.is_empty());
        assert!(set.right_hand.is_empty());
        assert!(set.face.is_empty());
    }

    #[test]
    fn test_detection_result_tagged_json() {
        let json = r#"{"kind": "legacy", "timestamp": 1.0, "pose_2d": [{"x": 0.1, "y": 0.2}]}"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();
        match result {
            DetectionResult::Legacy(r) => {
                assert_eq!(r.pose_2d.len(), 1);
                assert!(r.pose_3d.is_empty());
            }
            other => panic!("unexpected shape: {:?}", other),
        }

        let json = r#"{"kind": "holistic", "timestamp": 2.0}"#;
        let result: DetectionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.timestamp(), 2.0);
    }
}
