//! 左手系 Y-up のキャラクター空間で使う回転ユーティリティ
//!
//! クォータニオンの合成は Hamilton 積 (`a * b`)、ベクトルの回転は `q * v`。

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};

pub type Quat = UnitQuaternion<f32>;
pub type Vec3 = Vector3<f32>;

const EPSILON: f32 = 1e-6;

pub fn up() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

pub fn right() -> Vec3 {
    Vec3::new(1.0, 0.0, 0.0)
}

pub fn forward() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}

/// 検出器の Y-down 座標をキャラクター空間の Y-up に変換
pub fn flip_y(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.y, v.z)
}

/// 長さ 0 なら None
pub fn try_normalize(v: Vec3) -> Option<Vec3> {
    let n = v.norm();
    if n > EPSILON && n.is_finite() {
        Some(v / n)
    } else {
        None
    }
}

pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    try_normalize(v).unwrap_or(fallback)
}

/// ヨー(Y)・ピッチ(X)・ロール(Z) からクォータニオンを作る
pub fn yaw_pitch_roll(yaw: f32, pitch: f32, roll: f32) -> Quat {
    let (sr, cr) = (roll * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sy, cy) = (yaw * 0.5).sin_cos();

    let x = cy * sp * cr + sy * cp * sr;
    let y = sy * cp * cr - cy * sp * sr;
    let z = cy * cp * sr - sy * sp * cr;
    let w = cy * cp * cr + sy * sp * sr;
    UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
}

/// オイラー角 (x, y, z) → クォータニオン（ヨー・ピッチ・ロール順）
pub fn from_euler(x: f32, y: f32, z: f32) -> Quat {
    yaw_pitch_roll(y, x, z)
}

pub fn from_euler_vec(v: Vec3) -> Quat {
    from_euler(v.x, v.y, v.z)
}

/// from を to に重ねる最短回転。逆向きの場合は直交軸まわりに半回転する。
pub fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    let (from, to) = match (try_normalize(from), try_normalize(to)) {
        (Some(f), Some(t)) => (f, t),
        _ => return Quat::identity(),
    };

    let r = from.dot(&to) + 1.0;
    let q = if r < EPSILON {
        if from.x.abs() > from.z.abs() {
            Quaternion::new(0.0, -from.y, from.x, 0.0)
        } else {
            Quaternion::new(0.0, 0.0, -from.z, from.y)
        }
    } else {
        let c = from.cross(&to);
        Quaternion::new(r, c.x, c.y, c.z)
    };
    UnitQuaternion::new_normalize(q)
}

/// 軸まわりの回転。軸が 0 なら単位回転。
pub fn axis_angle(axis: Vec3, angle: f32) -> Quat {
    match try_normalize(axis) {
        Some(a) => UnitQuaternion::from_axis_angle(&Unit::new_unchecked(a), angle),
        None => Quat::identity(),
    }
}

/// ワールド方向ベクトルを rotation が表すローカル座標系へ
pub fn to_local(rotation: &Quat, v: Vec3) -> Vec3 {
    rotation.inverse_transform_vector(&v)
}

/// v0 から v1 への角度。cross(v0, v1) が normal 側なら正、それ以外は負。
pub fn signed_angle(v0: Vec3, v1: Vec3, normal: Vec3) -> f32 {
    let (a, b) = match (try_normalize(v0), try_normalize(v1)) {
        (Some(a), Some(b)) => (a, b),
        _ => return 0.0,
    };
    let angle = a.dot(&b).clamp(-1.0, 1.0).acos();
    if a.cross(&b).dot(&normal) > 0.0 {
        angle
    } else {
        -angle
    }
}

/// 水平方向を向く回転（Y 軸まわり）。水平成分が無ければ単位回転。
pub fn look_horizontal(direction: Vec3) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if try_normalize(flat).is_none() {
        return Quat::identity();
    }
    yaw_pitch_roll(flat.x.atan2(flat.z), 0.0, 0.0)
}

/// 半球を揃えた球面線形補間
pub fn slerp(from: &Quat, to: &Quat, t: f32) -> Quat {
    let a = from.coords;
    let mut b = to.coords;
    let mut dot = a.dot(&b);
    if dot < 0.0 {
        b = -b;
        dot = -dot;
    }

    let (s0, s1) = if dot > 1.0 - EPSILON {
        (1.0 - t, t)
    } else {
        let omega = dot.clamp(-1.0, 1.0).acos();
        let inv = 1.0 / omega.sin();
        (((1.0 - t) * omega).sin() * inv, (t * omega).sin() * inv)
    };
    let q = Quaternion::from_vector(a * s0 + b * s1);
    if q.norm() > EPSILON {
        UnitQuaternion::new_normalize(q)
    } else {
        *to
    }
}

pub fn lerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

pub fn lerp_scalar(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// (x, y, z, w) 配列
pub fn quat_to_array(q: &Quat) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

pub fn quat_from_array(a: [f32; 4]) -> Quat {
    let q = Quaternion::new(a[3], a[0], a[1], a[2]);
    if q.norm() > EPSILON {
        UnitQuaternion::new_normalize(q)
    } else {
        Quat::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn approx_eq_vec(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).norm() < eps
    }

    #[test]
    fn test_shortest_arc_maps_direction() {
        let pairs = [
            (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            (Vec3::new(-1.0, -1.0, 0.0), Vec3::new(0.3, 0.2, -0.9)),
            (Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.1, 1.0)),
            (Vec3::new(0.2, -0.7, 0.4), Vec3::new(-0.6, 0.1, 0.3)),
        ];
        for (from, to) in pairs {
            let q = shortest_arc(from, to);
            let mapped = q * from.normalize();
            assert!(
                approx_eq_vec(mapped, to.normalize(), 1e-4),
                "{:?} -> {:?} mapped to {:?}",
                from,
                to,
                mapped
            );
        }
    }

    #[test]
    fn test_shortest_arc_opposite_is_half_turn() {
        let from = Vec3::new(1.0, 0.0, 0.0);
        let q = shortest_arc(from, -from);
        assert!(approx_eq_vec(q * from, -from, 1e-4));
        assert!((q.angle() - PI).abs() < 1e-4);
    }

    #[test]
    fn test_shortest_arc_zero_vector_identity() {
        assert_eq!(shortest_arc(Vec3::zeros(), up()), Quat::identity());
    }

    #[test]
    fn test_yaw_pitch_roll_axes() {
        let yaw = yaw_pitch_roll(FRAC_PI_2, 0.0, 0.0);
        assert!(approx_eq_vec(yaw * forward(), right(), 1e-5));

        let pitch = yaw_pitch_roll(0.0, FRAC_PI_2, 0.0);
        assert!(approx_eq_vec(pitch * forward(), Vec3::new(0.0, -1.0, 0.0), 1e-5));

        let roll = yaw_pitch_roll(0.0, 0.0, FRAC_PI_2);
        assert!(approx_eq_vec(roll * right(), up(), 1e-5));
    }

    #[test]
    fn test_from_euler_swaps_order() {
        let a = from_euler(0.1, 0.2, 0.3);
        let b = yaw_pitch_roll(0.2, 0.1, 0.3);
        assert!(a.angle_to(&b) < 1e-6);
    }

    #[test]
    fn test_signed_angle() {
        let a = signed_angle(right(), forward(), up());
        let b = signed_angle(forward(), right(), up());
        assert!((a.abs() - FRAC_PI_2).abs() < 1e-5);
        assert!((a + b).abs() < 1e-5, "sign must flip: {} {}", a, b);
        assert_eq!(signed_angle(Vec3::zeros(), up(), up()), 0.0);
    }

    #[test]
    fn test_look_horizontal() {
        let q = look_horizontal(Vec3::new(1.0, 5.0, 0.0));
        assert!(approx_eq_vec(q * forward(), right(), 1e-5));
        assert_eq!(look_horizontal(up()), Quat::identity());
    }

    #[test]
    fn test_to_local_inverts_rotation() {
        let q = yaw_pitch_roll(0.4, -0.3, 0.2);
        let v = Vec3::new(0.3, 0.5, -0.1);
        assert!(approx_eq_vec(to_local(&q, q * v), v, 1e-5));
    }

    #[test]
    fn test_slerp_endpoints_and_hemisphere() {
        let a = Quat::identity();
        let b = yaw_pitch_roll(1.0, 0.0, 0.0);
        assert!(slerp(&a, &b, 0.0).angle_to(&a) < 1e-4);
        assert!(slerp(&a, &b, 1.0).angle_to(&b) < 1e-4);
        let half = slerp(&a, &b, 0.5);
        assert!((half.angle() - 0.5).abs() < 1e-4);

        // 符号反転した同じ回転でも遠回りしない
        let neg = UnitQuaternion::new_unchecked(-b.into_inner());
        let half_neg = slerp(&a, &neg, 0.5);
        assert!((half_neg.angle() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_quat_array_round_trip() {
        let q = yaw_pitch_roll(0.3, 0.2, 0.1);
        let r = quat_from_array(quat_to_array(&q));
        assert!(q.angle_to(&r) < 1e-6);
        assert_eq!(quat_from_array([0.0; 4]), Quat::identity());
    }
}
