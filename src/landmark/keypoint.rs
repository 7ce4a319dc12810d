use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// MediaPipe Pose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// MediaPipe Hands の 21 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub const COUNT: usize = 21;

    /// 各指の付け根インデックス（親指, 人差し指, 中指, 薬指, 小指）
    pub const FINGER_BASES: [usize; 5] = [1, 5, 9, 13, 17];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// 表情・視線計算で参照する Face Mesh のランドマーク
///
/// Face Mesh は 468 点（虹彩込みで 478 点）あるが、使うのはこのサブセットだけ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceLandmark {
    Nose,
    UpperLipTop,
    LowerLipBottom,
    MouthLeft,
    MouthRight,
    UpperLipCenter,
    LowerLipCenter,
    LeftCorner,
    RightCorner,
    LeftEyeUpper,
    LeftEyeLower,
    RightEyeUpper,
    RightEyeLower,
    LeftEyeOuter,
    LeftEyeInner,
    RightEyeOuter,
    RightEyeInner,
    LeftBrow,
    RightBrow,
    LeftEar,
    RightEar,
    Chin,
    Forehead,
    LeftIris,
    RightIris,
}

impl FaceLandmark {
    /// 虹彩ランドマークを含む Face Mesh の点数
    pub const COUNT_WITH_IRIS: usize = 478;

    pub fn index(self) -> usize {
        match self {
            Self::Nose => 1,
            Self::UpperLipTop => 0,
            Self::LowerLipBottom => 17,
            Self::MouthLeft => 61,
            Self::MouthRight => 291,
            Self::UpperLipCenter => 13,
            Self::LowerLipCenter => 14,
            Self::LeftCorner => 78,
            Self::RightCorner => 308,
            Self::LeftEyeUpper => 159,
            Self::LeftEyeLower => 145,
            Self::RightEyeUpper => 386,
            Self::RightEyeLower => 374,
            Self::LeftEyeOuter => 33,
            Self::LeftEyeInner => 133,
            Self::RightEyeOuter => 263,
            Self::RightEyeInner => 362,
            Self::LeftBrow => 105,
            Self::RightBrow => 334,
            Self::LeftEar => 234,
            Self::RightEar => 454,
            Self::Chin => 152,
            Self::Forehead => 10,
            Self::LeftIris => 468,
            Self::RightIris => 473,
        }
    }
}

/// 単一ランドマーク（検出器が定義する正規化座標またはワールド座標）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f32>> for Landmark {
    fn from(v: Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_landmark_indices() {
        assert_eq!(PoseLandmark::Nose.index(), 0);
        assert_eq!(PoseLandmark::LeftShoulder.index(), 11);
        assert_eq!(PoseLandmark::RightFootIndex.index(), PoseLandmark::COUNT - 1);
    }

    #[test]
    fn test_hand_finger_bases() {
        assert_eq!(HandLandmark::FINGER_BASES[0], HandLandmark::ThumbCmc.index());
        assert_eq!(HandLandmark::FINGER_BASES[4], HandLandmark::PinkyMcp.index());
        assert_eq!(HandLandmark::PinkyTip.index(), HandLandmark::COUNT - 1);
    }

    #[test]
    fn test_face_landmarks_within_mesh() {
        let all = [
            FaceLandmark::Nose,
            FaceLandmark::LowerLipBottom,
            FaceLandmark::RightEar,
            FaceLandmark::LeftIris,
            FaceLandmark::RightIris,
        ];
        for lm in all {
            assert!(lm.index() < FaceLandmark::COUNT_WITH_IRIS, "{:?}", lm);
        }
    }

    #[test]
    fn test_landmark_missing_z_defaults_to_zero() {
        let lm: Landmark = serde_json::from_str(r#"{"x": 0.5, "y": 0.25}"#).unwrap();
        assert_eq!(lm, Landmark::new(0.5, 0.25, 0.0));
    }
}
