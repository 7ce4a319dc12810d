use std::collections::HashMap;

use nalgebra::Vector3;
use tracing::debug;

use super::kalman::KalmanFilter;
use super::one_euro::OneEuroFilter;
use crate::config::FilterConfig;
use crate::landmark::PoseLandmark;

/// ストリームの用途。用途ごとにフィルタの種類とパラメータが決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// 腰（ワールド座標）: One Euro
    Torso,
    /// 肩・肘・手首（ワールド座標）: Kalman
    Arm,
    /// 股関節・膝・足首（ワールド座標）: One Euro
    Leg,
    /// 画面正規化ポーズ（ルート移動用）: One Euro
    Screen,
}

/// 論理ストリームの識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub landmark: PoseLandmark,
    pub channel: Channel,
}

impl StreamKey {
    pub const fn new(landmark: PoseLandmark, channel: Channel) -> Self {
        Self { landmark, channel }
    }

    /// エンジンが毎フレーム使うストリーム一覧
    pub fn all() -> Vec<StreamKey> {
        use PoseLandmark::*;
        let mut keys = Vec::new();
        for lm in [LeftHip, RightHip] {
            keys.push(Self::new(lm, Channel::Torso));
        }
        for lm in [LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist] {
            keys.push(Self::new(lm, Channel::Arm));
        }
        for lm in [LeftHip, RightHip, LeftKnee, RightKnee, LeftAnkle, RightAnkle] {
            keys.push(Self::new(lm, Channel::Leg));
        }
        for lm in [LeftHip, RightHip, LeftShoulder, RightShoulder] {
            keys.push(Self::new(lm, Channel::Screen));
        }
        keys
    }
}

#[derive(Debug, Clone)]
pub enum StreamFilter {
    OneEuro(OneEuroFilter),
    Kalman(KalmanFilter),
}

impl StreamFilter {
    pub fn for_channel(channel: Channel, config: &FilterConfig) -> Self {
        match channel {
            Channel::Torso | Channel::Screen => Self::OneEuro(OneEuroFilter::new(
                config.torso_min_cutoff,
                config.torso_beta,
                config.derivative_cutoff,
            )
            .with_fallback_dt(config.fallback_dt)),
            Channel::Leg => Self::OneEuro(OneEuroFilter::new(
                config.leg_min_cutoff,
                config.leg_beta,
                config.derivative_cutoff,
            )
            .with_fallback_dt(config.fallback_dt)),
            Channel::Arm => Self::Kalman(KalmanFilter::new(
                config.kalman_process_noise,
                config.kalman_measurement_noise,
            )),
        }
    }

    pub fn next(&mut self, timestamp: f64, point: Vector3<f32>) -> Vector3<f32> {
        match self {
            Self::OneEuro(f) => f.next(timestamp, point),
            Self::Kalman(f) => f.next(timestamp, point),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::OneEuro(f) => f.reset(),
            Self::Kalman(f) => f.reset(),
        }
    }
}

/// ストリームごとに 1 つだけ長寿命のフィルタを持つレジストリ
///
/// スケルトンのバインド時に作られ、以後のフレームで使い回す。
#[derive(Debug, Clone)]
pub struct FilterBank {
    config: FilterConfig,
    filters: HashMap<StreamKey, StreamFilter>,
}

impl FilterBank {
    pub fn new(config: &FilterConfig) -> Self {
        let filters = StreamKey::all()
            .into_iter()
            .map(|key| (key, StreamFilter::for_channel(key.channel, config)))
            .collect::<HashMap<_, _>>();
        debug!("filter bank built with {} streams", filters.len());
        Self {
            config: *config,
            filters,
        }
    }

    /// ストリームに 1 サンプル通す。未登録のキーはその場で作る。
    pub fn sample(&mut self, key: StreamKey, timestamp: f64, point: Vector3<f32>) -> Vector3<f32> {
        let config = &self.config;
        self.filters
            .entry(key)
            .or_insert_with(|| StreamFilter::for_channel(key.channel, config))
            .next(timestamp, point)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn contains(&self, key: &StreamKey) -> bool {
        self.filters.contains_key(key)
    }

    pub fn reset(&mut self) {
        for f in self.filters.values_mut() {
            f.reset();
        }
    }
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_prebuilds_streams() {
        let bank = FilterBank::default();
        assert_eq!(bank.len(), StreamKey::all().len());
        assert!(bank.contains(&StreamKey::new(PoseLandmark::LeftElbow, Channel::Arm)));
        assert!(!bank.contains(&StreamKey::new(PoseLandmark::Nose, Channel::Arm)));
    }

    #[test]
    fn test_arm_channel_is_kalman() {
        let config = FilterConfig::default();
        assert!(matches!(
            StreamFilter::for_channel(Channel::Arm, &config),
            StreamFilter::Kalman(_)
        ));
        assert!(matches!(
            StreamFilter::for_channel(Channel::Leg, &config),
            StreamFilter::OneEuro(_)
        ));
    }

    #[test]
    fn test_state_persists_across_samples() {
        let mut bank = FilterBank::default();
        let key = StreamKey::new(PoseLandmark::LeftKnee, Channel::Leg);
        bank.sample(key, 0.0, Vector3::zeros());
        let out = bank.sample(key, 1.0 / 30.0, Vector3::new(1.0, 0.0, 0.0));
        // 毎回作り直していれば 1.0 がそのまま出てくる
        assert!(out.x < 1.0, "filter did not smooth: {}", out.x);
    }

    #[test]
    fn test_streams_are_independent() {
        let mut bank = FilterBank::default();
        let left = StreamKey::new(PoseLandmark::LeftWrist, Channel::Arm);
        let right = StreamKey::new(PoseLandmark::RightWrist, Channel::Arm);
        bank.sample(left, 0.0, Vector3::zeros());
        let p = Vector3::new(5.0, 5.0, 5.0);
        assert_eq!(bank.sample(right, 0.1, p), p);
    }

    #[test]
    fn test_unknown_key_created_lazily() {
        let mut bank = FilterBank::default();
        let key = StreamKey::new(PoseLandmark::Nose, Channel::Torso);
        let p = Vector3::new(0.1, 0.2, 0.3);
        assert_eq!(bank.sample(key, 0.0, p), p);
        assert!(bank.contains(&key));
    }

    #[test]
    fn test_untimed_samples_still_follow() {
        let mut bank = FilterBank::default();
        let key = StreamKey::new(PoseLandmark::LeftHip, Channel::Torso);
        bank.sample(key, 0.0, Vector3::zeros());
        let target = Vector3::new(0.0, 0.0, 0.2);
        let mut out = Vector3::zeros();
        for _ in 0..120 {
            out = bank.sample(key, 0.0, target);
        }
        assert!((out - target).norm() < 1e-3, "stream froze at {:?}", out);
    }
}
