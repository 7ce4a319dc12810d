use super::math::{self, Quat, Vec3};
use crate::landmark::{FaceLandmark, PointSet};
use crate::skeleton::{Bone, Rig, Side, Space};

/// Face Mesh 座標の軸ごとの倍率（奥行きは粗いので小さめ）
const FACE_SCALE: Vec3 = Vec3::new(10.0, 10.0, 5.0);

fn scaled(face: &PointSet, landmark: FaceLandmark) -> Option<Vec3> {
    face.face(landmark).map(|p| p.component_mul(&FACE_SCALE))
}

fn distance(a: Vec3, b: Vec3) -> f32 {
    (a - b).norm()
}

/// 顔ランドマークから測った表情パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMeasures {
    pub left_blink: f32,
    pub right_blink: f32,
    /// 口の開き [0, 0.7]
    pub openness: f32,
    /// 口の横幅（顔幅比）[-1, 1]
    pub width: f32,
    /// 口角の上がり [-1, 1]
    pub smile: f32,
    /// 眉の高さ（正規化 y の平均）
    pub brow: f32,
}

impl Default for FaceMeasures {
    fn default() -> Self {
        Self {
            left_blink: 0.0,
            right_blink: 0.0,
            openness: 0.0,
            width: 0.0,
            smile: 0.0,
            brow: 0.5,
        }
    }
}

fn blink(upper: Vec3, lower: Vec3) -> f32 {
    (1.0 - (distance(upper, lower) - 0.08) * 8.0).clamp(0.0, 1.0)
}

impl FaceMeasures {
    pub fn measure(face: &PointSet) -> Self {
        use FaceLandmark::*;
        let mut m = Self::default();
        let get = |lm| scaled(face, lm);

        if let (Some(lu), Some(ll), Some(ru), Some(rl)) =
            (get(LeftEyeUpper), get(LeftEyeLower), get(RightEyeUpper), get(RightEyeLower))
        {
            m.left_blink = blink(lu, ll);
            m.right_blink = blink(ru, rl);
        }

        let mouth = (
            get(UpperLipTop),
            get(LowerLipBottom),
            get(MouthLeft),
            get(MouthRight),
            get(UpperLipCenter),
            get(LowerLipCenter),
            get(LeftCorner),
            get(RightCorner),
        );
        if let (Some(top), Some(bottom), Some(left), Some(right), Some(uc), Some(lc), Some(lcorner), Some(rcorner)) = mouth {
            let mouth_height = distance(top, bottom);
            let mouth_width = distance(left, right);
            if mouth_width > f32::EPSILON {
                m.openness = ((mouth_height / mouth_width - 0.1) / 0.5).clamp(0.0, 0.7);

                if let (Some(le), Some(re)) = (get(LeftEar), get(RightEar)) {
                    let face_width = distance(le, re);
                    if face_width > f32::EPSILON {
                        m.width = ((mouth_width / face_width - 0.45) / 0.1).clamp(-1.0, 1.0);
                    }
                }

                let center = (uc + lc) * 0.5;
                let lift = (distance(lcorner, center) + distance(rcorner, center)) * 0.5;
                m.smile = ((lift - mouth_width * 0.3) / (mouth_width * 0.2)).clamp(-1.0, 1.0);
            }
        }

        if let (Some(lb), Some(rb)) = (face.face(LeftBrow), face.face(RightBrow)) {
            m.brow = (lb.y + rb.y) * 0.5;
        }

        m
    }

    /// モーフ名と目標重み
    pub fn morph_targets(&self) -> [(&'static str, f32); 11] {
        let open = self.openness;
        let smile = self.smile;
        [
            ("まばたき", self.left_blink),
            ("まばたき右", self.right_blink),
            ("あ", open.powf(1.5)),
            ("い", (-self.width).max(0.0) * 0.7),
            ("う", self.width.max(0.0) * 0.7),
            ("お", (open - 0.3).max(0.0) * 1.5),
            ("わ", smile.max(0.0) * (1.0 - open.min(1.0) * 0.7)),
            ("にやり", smile.max(0.0) * open.min(1.0) * 0.8),
            ("∧", (-smile).max(0.0) * 0.5),
            ("困る", (self.brow - 0.6).max(0.0) * 2.0),
            ("怒り", (0.5 - self.brow).max(0.0) * 2.0),
        ]
    }
}

/// 表情モーフを目標値へ一次ローパスで近づける。顔が無ければ何もしない。
pub fn apply_expressions(rig: &mut Rig<'_>, face: &PointSet, factor: f32) {
    if face.is_empty() {
        return;
    }
    for (name, target) in FaceMeasures::measure(face).morph_targets() {
        rig.blend_morph(name, target, factor);
    }
}

/// 虹彩と目の中心（上下まぶたの中点）から目ボーンの回転
pub fn eye_rotation(face: &PointSet, side: Side, gaze_scale: f32) -> Option<Quat> {
    use FaceLandmark::*;
    let (iris, upper, lower) = match side {
        Side::Left => (LeftIris, LeftEyeUpper, LeftEyeLower),
        Side::Right => (RightIris, RightEyeUpper, RightEyeLower),
    };
    let iris = scaled(face, iris)?;
    let center = (scaled(face, upper)? + scaled(face, lower)?) * 0.5;
    let dir = math::try_normalize(iris - center)?;
    Some(math::yaw_pitch_roll(dir.x * gaze_scale, dir.y * gaze_scale, 0.0))
}

pub fn apply_gaze(rig: &mut Rig<'_>, face: &PointSet, gaze_scale: f32, factor: f32) {
    // 両目そろっている時だけ動かす
    let (Some(left), Some(right)) = (
        eye_rotation(face, Side::Left, gaze_scale),
        eye_rotation(face, Side::Right, gaze_scale),
    ) else {
        return;
    };
    rig.set_rotation(Bone::Eye(Side::Left), left, factor, Space::Local);
    rig.set_rotation(Bone::Eye(Side::Right), right, factor, Space::Local);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Landmark;

    /// 目を開けて口を閉じた顔
    fn neutral_face() -> Vec<Landmark> {
        use FaceLandmark::*;
        let mut points = vec![Landmark::default(); FaceLandmark::COUNT_WITH_IRIS];
        let mut set = |lm: FaceLandmark, x: f32, y: f32| points[lm.index()] = Landmark::new(x, y, 0.0);
        set(LeftEyeUpper, 0.40, 0.40);
        set(LeftEyeLower, 0.40, 0.43);
        set(RightEyeUpper, 0.60, 0.40);
        set(RightEyeLower, 0.60, 0.43);
        set(LeftIris, 0.40, 0.415);
        set(RightIris, 0.60, 0.415);
        set(UpperLipTop, 0.50, 0.60);
        set(LowerLipBottom, 0.50, 0.62);
        set(MouthLeft, 0.45, 0.61);
        set(MouthRight, 0.55, 0.61);
        set(UpperLipCenter, 0.50, 0.605);
        set(LowerLipCenter, 0.50, 0.615);
        set(LeftCorner, 0.46, 0.61);
        set(RightCorner, 0.54, 0.61);
        set(LeftEar, 0.30, 0.45);
        set(RightEar, 0.70, 0.45);
        set(LeftBrow, 0.40, 0.55);
        set(RightBrow, 0.60, 0.55);
        points
    }

    #[test]
    fn test_neutral_measures() {
        let m = FaceMeasures::measure(&PointSet::new(neutral_face()));
        // まぶた間 0.3（倍率後）→ 開いている
        assert_eq!(m.left_blink, 0.0);
        assert_eq!(m.right_blink, 0.0);
        // 高さ/幅 = 0.2 → (0.2 - 0.1) / 0.5
        assert!((m.openness - 0.2).abs() < 1e-4, "openness={}", m.openness);
        // 口幅/顔幅 = 0.25 → -1 にクランプ
        assert_eq!(m.width, -1.0);
        assert!((m.brow - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_closed_eye_blinks() {
        let mut points = neutral_face();
        points[FaceLandmark::LeftEyeLower.index()] = Landmark::new(0.40, 0.405, 0.0);
        let m = FaceMeasures::measure(&PointSet::new(points));
        assert_eq!(m.left_blink, 1.0);
        assert_eq!(m.right_blink, 0.0);
    }

    #[test]
    fn test_morph_targets_bounded() {
        let m = FaceMeasures {
            left_blink: 1.0,
            right_blink: 0.0,
            openness: 0.7,
            width: 1.0,
            smile: 1.0,
            brow: 0.9,
        };
        for (name, w) in m.morph_targets() {
            assert!((0.0..=1.0).contains(&w), "{} = {}", name, w);
        }
        let targets = m.morph_targets();
        assert_eq!(targets[5].0, "お");
        assert!((targets[5].1 - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_missing_face_defaults() {
        let m = FaceMeasures::measure(&PointSet::default());
        assert_eq!(m, FaceMeasures::default());
        let targets = m.morph_targets();
        assert!(targets.iter().all(|(_, w)| *w == 0.0));
    }

    #[test]
    fn test_eye_rotation_needs_iris() {
        // 虹彩なしの 468 点メッシュ
        let mut points = neutral_face();
        points.truncate(468);
        assert!(eye_rotation(&PointSet::new(points), Side::Left, 0.5).is_none());

        let mut points = neutral_face();
        points[FaceLandmark::LeftIris.index()] = Landmark::new(0.41, 0.415, 0.0);
        let q = eye_rotation(&PointSet::new(points), Side::Left, 0.5).unwrap();
        assert!((q.angle() - 0.5).abs() < 1e-3, "angle={}", q.angle());
    }
}
