use nalgebra::Vector3;

/// 3 軸で誤差共分散を共有する簡易 Kalman フィルタ
///
/// 状態は位置のみ（等位置モデル）。predict で共分散に過程ノイズを足し、
/// correct で観測とのゲインを計算して推定値を更新する。
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    process_noise: f32,
    measurement_noise: f32,
    estimate: Option<Vector3<f32>>,
    covariance: f32,
    last_time: Option<f64>,
}

impl KalmanFilter {
    pub fn new(process_noise: f32, measurement_noise: f32) -> Self {
        Self {
            process_noise,
            measurement_noise,
            estimate: None,
            covariance: 1.0,
            last_time: None,
        }
    }

    pub fn next(&mut self, timestamp: f64, point: Vector3<f32>) -> Vector3<f32> {
        self.last_time = Some(timestamp);
        let estimate = match self.estimate {
            Some(e) => e,
            None => {
                self.estimate = Some(point);
                return point;
            }
        };

        // predict
        self.covariance += self.process_noise;

        // correct
        let gain = self.covariance / (self.covariance + self.measurement_noise);
        let corrected = estimate + (point - estimate) * gain;
        self.covariance *= 1.0 - gain;
        self.estimate = Some(corrected);
        corrected
    }

    pub fn last(&self) -> Option<Vector3<f32>> {
        self.estimate
    }

    pub fn last_time(&self) -> Option<f64> {
        self.last_time
    }

    pub fn reset(&mut self) {
        self.estimate = None;
        self.covariance = 1.0;
        self.last_time = None;
    }
}
