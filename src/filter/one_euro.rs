use nalgebra::Vector3;

/// Low-pass filter component
#[derive(Debug, Clone)]
struct LowPassFilter {
    prev: Option<f32>,
}

impl LowPassFilter {
    fn new() -> Self {
        Self { prev: None }
    }

    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        match self.prev {
            Some(prev) => {
                let result = alpha * value + (1.0 - alpha) * prev;
                self.prev = Some(result);
                result
            }
            None => {
                self.prev = Some(value);
                value
            }
        }
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro Filter for a single scalar value
#[derive(Debug, Clone)]
struct ScalarFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    prev_value: Option<f32>,
}

impl ScalarFilter {
    fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            x_filter: LowPassFilter::new(),
            dx_filter: LowPassFilter::new(),
            prev_value: None,
        }
    }

    fn filter(&mut self, value: f32, dt: f32) -> f32 {
        let dx = match self.prev_value {
            Some(prev) if dt > 0.0 => (value - prev) / dt,
            _ => 0.0,
        };
        self.prev_value = Some(value);

        let edx = self
            .dx_filter
            .filter(dx, smoothing_factor(dt, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.filter(value, smoothing_factor(dt, cutoff))
    }

    fn last(&self) -> Option<f32> {
        self.x_filter.prev
    }

    fn reset(&mut self) {
        self.x_filter.reset();
        self.dx_filter.reset();
        self.prev_value = None;
    }
}

/// 3D 点用 One Euro Filter
///
/// 時刻は呼び出し側が渡すタイムスタンプ（秒）で管理する。
/// 最初のサンプルはそのまま返す。時間が進んでいないサンプルは固定の刻みで進める。
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    axes: [ScalarFilter; 3],
    last_time: Option<f64>,
    fallback_dt: f32,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            axes: std::array::from_fn(|_| ScalarFilter::new(min_cutoff, beta, d_cutoff)),
            last_time: None,
            fallback_dt: 1.0 / 30.0,
        }
    }

    /// タイムスタンプが進まないときの時間刻み。0 以下は無視する。
    pub fn with_fallback_dt(mut self, dt: f32) -> Self {
        if dt > 0.0 {
            self.fallback_dt = dt;
        }
        self
    }

    pub fn next(&mut self, timestamp: f64, point: Vector3<f32>) -> Vector3<f32> {
        let dt = match self.last_time {
            Some(t) => (timestamp - t) as f32,
            None => {
                self.last_time = Some(timestamp);
                return Vector3::new(
                    self.axes[0].filter(point.x, 0.0),
                    self.axes[1].filter(point.y, 0.0),
                    self.axes[2].filter(point.z, 0.0),
                );
            }
        };

        let dt = if dt > 0.0 { dt } else { self.fallback_dt };
        self.last_time = Some(timestamp);

        Vector3::new(
            self.axes[0].filter(point.x, dt),
            self.axes[1].filter(point.y, dt),
            self.axes[2].filter(point.z, dt),
        )
    }

    /// 直前の出力
    pub fn last(&self) -> Option<Vector3<f32>> {
        Some(Vector3::new(
            self.axes[0].last()?,
            self.axes[1].last()?,
            self.axes[2].last()?,
        ))
    }

    pub fn reset(&mut self) {
        for f in &mut self.axes {
            f.reset();
        }
        self.last_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_factor_bounds() {
        for &cutoff in &[0.1, 1.0, 10.0, 100.0] {
            for &te in &[0.001, 0.01, 0.033, 0.1] {
                let alpha = smoothing_factor(te, cutoff);
                assert!(alpha > 0.0 && alpha < 1.0, "alpha={} for te={}, cutoff={}", alpha, te, cutoff);
            }
        }
    }

    #[test]
    fn test_scalar_filter_high_beta_responsive() {
        let mut f_low_beta = ScalarFilter::new(1.0, 0.0, 1.0);
        let mut f_high_beta = ScalarFilter::new(1.0, 1.0, 1.0);

        f_low_beta.filter(0.0, 0.033);
        f_high_beta.filter(0.0, 0.033);

        let r_low = f_low_beta.filter(10.0, 0.033);
        let r_high = f_high_beta.filter(10.0, 0.033);

        assert!(r_high > r_low, "High beta ({}) should be more responsive than low beta ({})", r_high, r_low);
    }

    #[test]
    fn test_first_sample_passthrough() {
        let mut f = OneEuroFilter::new(0.5, 0.1, 1.0);
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(f.next(10.0, p), p);
    }

    #[test]
    fn test_constant_input_stays_constant() {
        let mut f = OneEuroFilter::new(0.5, 0.1, 1.0);
        let p = Vector3::new(0.3, -0.2, 0.1);
        for i in 0..30 {
            let out = f.next(i as f64 / 30.0, p);
            assert!((out - p).norm() < 1e-6, "frame {} drifted: {:?}", i, out);
        }
    }

    #[test]
    fn test_step_converges_without_overshoot() {
        let mut f = OneEuroFilter::new(0.5, 0.1, 1.0);
        f.next(0.0, Vector3::zeros());
        let target = Vector3::new(1.0, 0.0, 0.0);
        let mut prev = 0.0;
        for i in 1..300 {
            let out = f.next(i as f64 / 30.0, target);
            assert!(out.x >= prev - 1e-6, "not monotone at {}", i);
            assert!(out.x <= 1.0 + 1e-6, "overshoot at {}: {}", i, out.x);
            prev = out.x;
        }
        assert!(prev > 0.99, "did not converge: {}", prev);
    }

    #[test]
    fn test_equal_timestamps_still_converge() {
        let mut f = OneEuroFilter::new(0.5, 0.1, 1.0);
        f.next(0.0, Vector3::zeros());
        let target = Vector3::new(1.0, -1.0, 0.5);
        let mut prev = f64::MAX;
        for _ in 0..300 {
            let out = f.next(0.0, target);
            let err = (out - target).norm() as f64;
            assert!(err <= prev + 1e-6, "moved away from target: {}", err);
            prev = err;
        }
        assert!(prev < 0.01, "did not converge: {}", prev);
    }

    #[test]
    fn test_backwards_timestamp_uses_fallback_step() {
        let mut a = OneEuroFilter::new(0.5, 0.1, 1.0).with_fallback_dt(0.1);
        let mut b = OneEuroFilter::new(0.5, 0.1, 1.0);
        a.next(1.0, Vector3::zeros());
        b.next(1.0, Vector3::zeros());
        let p = Vector3::new(1.0, 0.0, 0.0);
        // 巻き戻りは固定刻みで処理され、通常どおり 0.1 秒進めた場合と一致する
        assert_eq!(a.next(0.5, p), b.next(1.1, p));
    }

    #[test]
    fn test_reset() {
        let mut f = OneEuroFilter::new(0.5, 0.1, 1.0);
        f.next(0.0, Vector3::new(1.0, 2.0, 3.0));
        f.next(0.1, Vector3::new(2.0, 2.0, 3.0));
        f.reset();
        assert_eq!(f.last(), None);
        let p = Vector3::new(10.0, 20.0, 30.0);
        assert_eq!(f.next(0.2, p), p);
    }
}
