/// 人体の可動域（ラジアン）
///
/// 股関節と膝の角度はリターゲット時に必ずこの範囲へクランプする。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomechanicalLimits {
    /// 股関節の前後回転
    pub hip_x: (f32, f32),
    /// 股関節の外転
    pub hip_y: (f32, f32),
    /// 股関節の内旋/外旋
    pub hip_z: (f32, f32),
    /// 膝の屈曲
    pub knee: (f32, f32),
}

impl Default for BiomechanicalLimits {
    fn default() -> Self {
        Self {
            hip_x: (-0.5, 0.5),
            hip_y: (-0.3, 0.3),
            hip_z: (-0.4, 0.4),
            knee: (0.0, 2.0),
        }
    }
}

/// NaN は下限に寄せる
fn clamp_range(value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

impl BiomechanicalLimits {
    pub fn clamp_hip(&self, x: f32, y: f32, z: f32) -> (f32, f32, f32) {
        (
            clamp_range(x, self.hip_x),
            clamp_range(y, self.hip_y),
            clamp_range(z, self.hip_z),
        )
    }

    pub fn clamp_knee(&self, angle: f32) -> f32 {
        clamp_range(angle, self.knee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_hip() {
        let limits = BiomechanicalLimits::default();
        assert_eq!(limits.clamp_hip(1.0, -1.0, 0.1), (0.5, -0.3, 0.1));
    }

    #[test]
    fn test_clamp_knee_never_negative() {
        let limits = BiomechanicalLimits::default();
        assert_eq!(limits.clamp_knee(-0.7), 0.0);
        assert_eq!(limits.clamp_knee(3.0), 2.0);
        assert_eq!(limits.clamp_knee(f32::NAN), 0.0);
    }

    #[test]
    fn test_infinite_inputs_stay_in_range() {
        let limits = BiomechanicalLimits::default();
        let (x, y, z) = limits.clamp_hip(f32::INFINITY, f32::NEG_INFINITY, f32::NAN);
        assert_eq!((x, y, z), (0.5, -0.3, -0.4));
    }
}
