use super::remap;
use crate::landmark::{FaceLandmark, PointSet};
use crate::retarget::math::Vec3;

/// 母音の口形
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouthShape {
    pub a: f32,
    pub i: f32,
    pub u: f32,
    pub e: f32,
    pub o: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaceRig {
    /// 頭の回転（x: ピッチ, y: ヨー, z: ロール）ラジアン
    pub head: Vec3,
    pub head_degrees: Vec3,
    /// 目の開き 0..1（1 で全開）
    pub eye_left: f32,
    pub eye_right: f32,
    pub mouth: MouthShape,
    /// 眉の上がり 0..1
    pub brow: f32,
}

impl FaceRig {
    /// 旧表情モーフの目標値
    pub fn morph_targets(&self) -> [(&'static str, f32); 14] {
        let m = &self.mouth;
        [
            ("あ", m.a),
            ("い", m.i),
            ("う", m.u),
            ("え", m.e),
            ("お", m.o),
            ("困る", self.brow * 0.7),
            ("怒り", (1.0 - self.brow) * 0.8),
            ("瞑り右", 1.0 - self.eye_right),
            ("瞑り左", 1.0 - self.eye_left),
            ("首横", self.head_degrees.x * 0.02),
            ("首縦", self.head_degrees.y * 0.03),
            ("まばたき", 1.0 - self.eye_left),
            ("まばたき右", 1.0 - self.eye_right),
            ("笑い", (m.i + m.u) * 0.6 - 0.2),
        ]
    }
}

/// 耳を結ぶ線と額からあごへの線で頭の向きを出す
fn head_rotation(face: &PointSet) -> Option<Vec3> {
    use FaceLandmark::*;
    let h = face.face(RightEar)? - face.face(LeftEar)?;
    let v = face.face(Chin)? - face.face(Forehead)?;
    let roll = h.y.atan2(h.x);
    let yaw = h.z.atan2(h.x);
    let pitch = v.z.atan2(v.y);
    Some(Vec3::new(pitch, yaw, roll))
}

fn eye_open(face: &PointSet, upper: FaceLandmark, lower: FaceLandmark, outer: FaceLandmark, inner: FaceLandmark) -> Option<f32> {
    let lid = (face.face(upper)? - face.face(lower)?).norm();
    let width = (face.face(outer)? - face.face(inner)?).norm();
    if width <= f32::EPSILON {
        return None;
    }
    let ratio = (lid / width / 0.285).clamp(0.0, 2.0);
    Some(remap(ratio, 0.55, 0.85))
}

fn mouth_shape(face: &PointSet) -> Option<MouthShape> {
    use FaceLandmark::*;
    let eye_inner = (face.face(LeftEyeInner)? - face.face(RightEyeInner)?).norm();
    let eye_outer = (face.face(LeftEyeOuter)? - face.face(RightEyeOuter)?).norm();
    if eye_inner <= f32::EPSILON || eye_outer <= f32::EPSILON {
        return None;
    }
    let open = (face.face(UpperLipCenter)? - face.face(LowerLipCenter)?).norm();
    let width = (face.face(MouthLeft)? - face.face(MouthRight)?).norm();

    let mouth_x = (remap(width / eye_outer, 0.45, 0.9) - 0.3) * 2.0;
    let mouth_y = remap(open / eye_inner, 0.17, 0.5);

    let i = (remap(mouth_x, 0.0, 1.0) * 2.0 * remap(mouth_y, 0.2, 0.7)).clamp(0.0, 1.0);
    let a = mouth_y * 0.4 + mouth_y * (1.0 - i) * 0.6;
    let u = mouth_y * remap(1.0 - i, 0.0, 0.3) * 0.1;
    let e = remap(u, 0.2, 1.0) * (1.0 - i) * 0.3;
    let o = (1.0 - i) * remap(mouth_y, 0.3, 1.0) * 0.4;
    Some(MouthShape { a, i, u, e, o })
}

/// 眉と上まぶたの距離（目の幅比）
fn brow_raise(face: &PointSet) -> Option<f32> {
    use FaceLandmark::*;
    let side = |brow, upper, outer, inner| -> Option<f32> {
        let width = (face.face(outer)? - face.face(inner)?).norm();
        if width <= f32::EPSILON {
            return None;
        }
        Some((face.face(brow)? - face.face(upper)?).norm() / width)
    };
    let left = side(LeftBrow, LeftEyeUpper, LeftEyeOuter, LeftEyeInner)?;
    let right = side(RightBrow, RightEyeUpper, RightEyeOuter, RightEyeInner)?;
    Some(remap((left + right) * 0.5, 0.85, 1.25))
}

/// 顔ランドマークからリグを解く。必要な点が欠けていれば None。
pub fn solve_face(face: &PointSet) -> Option<FaceRig> {
    use FaceLandmark::*;
    if face.is_empty() {
        return None;
    }
    let head = head_rotation(face)?;
    Some(FaceRig {
        head,
        head_degrees: head.map(f32::to_degrees),
        eye_left: eye_open(face, LeftEyeUpper, LeftEyeLower, LeftEyeOuter, LeftEyeInner)?,
        eye_right: eye_open(face, RightEyeUpper, RightEyeLower, RightEyeOuter, RightEyeInner)?,
        mouth: mouth_shape(face)?,
        brow: brow_raise(face)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::Landmark;

    fn front_face() -> Vec<Landmark> {
        use FaceLandmark::*;
        let mut points = vec![Landmark::default(); 468];
        let mut set = |lm: FaceLandmark, x: f32, y: f32| points[lm.index()] = Landmark::new(x, y, 0.0);
        set(LeftEar, 0.30, 0.45);
        set(RightEar, 0.70, 0.45);
        set(Forehead, 0.50, 0.25);
        set(Chin, 0.50, 0.75);
        set(LeftEyeOuter, 0.36, 0.42);
        set(LeftEyeInner, 0.44, 0.42);
        set(LeftEyeUpper, 0.40, 0.41);
        set(LeftEyeLower, 0.40, 0.43);
        set(RightEyeOuter, 0.64, 0.42);
        set(RightEyeInner, 0.56, 0.42);
        set(RightEyeUpper, 0.60, 0.41);
        set(RightEyeLower, 0.60, 0.43);
        set(UpperLipCenter, 0.50, 0.60);
        set(LowerLipCenter, 0.50, 0.60);
        set(MouthLeft, 0.44, 0.61);
        set(MouthRight, 0.56, 0.61);
        set(LeftBrow, 0.40, 0.335);
        set(RightBrow, 0.60, 0.335);
        points
    }

    #[test]
    fn test_front_face_neutral() {
        let rig = solve_face(&PointSet::new(front_face())).unwrap();
        assert!(rig.head.norm() < 1e-5, "head={:?}", rig.head);
        assert_eq!(rig.eye_left, 1.0);
        assert_eq!(rig.eye_right, 1.0);
        assert_eq!(rig.mouth, MouthShape::default());
        assert!((rig.brow - 0.21875).abs() < 1e-3, "brow={}", rig.brow);
    }

    #[test]
    fn test_open_mouth_vowels() {
        let mut points = front_face();
        points[FaceLandmark::LowerLipCenter.index()] = Landmark::new(0.50, 0.66, 0.0);
        let rig = solve_face(&PointSet::new(points)).unwrap();
        assert!((rig.mouth.a - 1.0).abs() < 1e-4, "a={}", rig.mouth.a);
        assert!((rig.mouth.o - 0.4).abs() < 1e-4, "o={}", rig.mouth.o);
        assert_eq!(rig.mouth.i, 0.0);
    }

    #[test]
    fn test_turned_head_yaw() {
        let mut points = front_face();
        points[FaceLandmark::LeftEar.index()].z = 0.1;
        points[FaceLandmark::RightEar.index()].z = -0.1;
        let rig = solve_face(&PointSet::new(points)).unwrap();
        assert!(rig.head.y < -0.3, "yaw={}", rig.head.y);
        assert!((rig.head_degrees.y - rig.head.y.to_degrees()).abs() < 1e-4);
    }

    #[test]
    fn test_closed_eyes_drive_blink_morphs() {
        let mut points = front_face();
        points[FaceLandmark::LeftEyeLower.index()] = Landmark::new(0.40, 0.411, 0.0);
        let rig = solve_face(&PointSet::new(points)).unwrap();
        assert_eq!(rig.eye_left, 0.0);
        let targets = rig.morph_targets();
        let blink = targets.iter().find(|(n, _)| *n == "まばたき").unwrap().1;
        assert_eq!(blink, 1.0);
        let blink_right = targets.iter().find(|(n, _)| *n == "まばたき右").unwrap().1;
        assert_eq!(blink_right, 0.0);
    }

    #[test]
    fn test_empty_face_is_none() {
        assert!(solve_face(&PointSet::default()).is_none());
    }
}
