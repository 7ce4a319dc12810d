use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(default)]
    pub retarget: RetargetConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// ソルバーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// ワールド座標ランドマークからの直接計算
    #[default]
    Holistic,
    /// 2D+3D ポーズ対を使う旧ソルバー
    Legacy,
}

/// 部位ごとの有効/無効フラグ
///
/// 無効にした部位はボーンを書き換えないだけで、キーフレームには直前の値が記録される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MotionSettings {
    #[serde(default = "default_true")]
    pub body: bool,
    #[serde(default = "default_true")]
    pub legs: bool,
    #[serde(default = "default_true")]
    pub arms: bool,
    #[serde(default = "default_true")]
    pub head: bool,
    /// 表情と視線
    #[serde(default = "default_true")]
    pub face: bool,
    #[serde(default)]
    pub solver: SolverKind,
}

fn default_true() -> bool { true }

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            body: true,
            legs: true,
            arms: true,
            head: true,
            face: true,
            solver: SolverKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RetargetConfig {
    /// ボーン回転の slerp 係数
    #[serde(default = "default_lerp_factor")]
    pub lerp_factor: f32,
    /// ルート移動の補間係数の上限
    #[serde(default = "default_root_lerp_cap")]
    pub root_lerp_cap: f32,
    /// ルートの高さに加算するユーザー設定値
    #[serde(default)]
    pub pose_y_scale: f32,
    /// ルート横移動の倍率
    #[serde(default = "default_root_horizontal_scale")]
    pub root_horizontal_scale: f32,
    /// ルート奥行き移動の倍率
    #[serde(default = "default_root_depth_scale")]
    pub root_depth_scale: f32,
    /// 横移動の減衰係数
    #[serde(default = "default_horizontal_damping")]
    pub horizontal_damping: f32,
    /// 足IKターゲットの倍率
    #[serde(default = "default_foot_scale")]
    pub foot_scale: f32,
    /// 足IKターゲットの高さオフセット
    #[serde(default = "default_foot_y_offset")]
    pub foot_y_offset: f32,
    /// 視線方向から目ボーン回転への倍率
    #[serde(default = "default_eye_gaze_scale")]
    pub eye_gaze_scale: f32,
    /// 頭の前傾オフセット（度）
    #[serde(default = "default_head_tilt_offset_deg")]
    pub head_tilt_offset_deg: f32,
}

fn default_lerp_factor() -> f32 { 0.3 }
fn default_root_lerp_cap() -> f32 { 0.2 }
fn default_root_horizontal_scale() -> f32 { 25.0 }
fn default_root_depth_scale() -> f32 { 0.8 }
fn default_horizontal_damping() -> f32 { 0.7 }
fn default_foot_scale() -> f32 { 10.0 }
fn default_foot_y_offset() -> f32 { 7.0 }
fn default_eye_gaze_scale() -> f32 { 0.5 }
fn default_head_tilt_offset_deg() -> f32 { -20.0 }

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            lerp_factor: default_lerp_factor(),
            root_lerp_cap: default_root_lerp_cap(),
            pose_y_scale: 0.0,
            root_horizontal_scale: default_root_horizontal_scale(),
            root_depth_scale: default_root_depth_scale(),
            horizontal_damping: default_horizontal_damping(),
            foot_scale: default_foot_scale(),
            foot_y_offset: default_foot_y_offset(),
            eye_gaze_scale: default_eye_gaze_scale(),
            head_tilt_offset_deg: default_head_tilt_offset_deg(),
        }
    }
}

impl RetargetConfig {
    /// ルート移動に使う補間係数
    pub fn root_lerp(&self) -> f32 {
        self.lerp_factor.min(self.root_lerp_cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FilterConfig {
    /// 腰・画面相対ストリームの One Euro パラメータ
    #[serde(default = "default_torso_min_cutoff")]
    pub torso_min_cutoff: f32,
    #[serde(default = "default_torso_beta")]
    pub torso_beta: f32,
    /// 脚ストリームの One Euro パラメータ
    #[serde(default = "default_leg_min_cutoff")]
    pub leg_min_cutoff: f32,
    #[serde(default = "default_leg_beta")]
    pub leg_beta: f32,
    #[serde(default = "default_derivative_cutoff")]
    pub derivative_cutoff: f32,
    /// 腕ストリームの Kalman パラメータ
    #[serde(default = "default_kalman_process_noise")]
    pub kalman_process_noise: f32,
    #[serde(default = "default_kalman_measurement_noise")]
    pub kalman_measurement_noise: f32,
    /// タイムスタンプが進まないサンプルに使う時間刻み (秒)
    #[serde(default = "default_fallback_dt")]
    pub fallback_dt: f32,
}

fn default_torso_min_cutoff() -> f32 { 0.5 }
fn default_torso_beta() -> f32 { 0.1 }
fn default_leg_min_cutoff() -> f32 { 0.7 }
fn default_leg_beta() -> f32 { 0.15 }
fn default_derivative_cutoff() -> f32 { 1.0 }
fn default_kalman_process_noise() -> f32 { 0.1 }
fn default_kalman_measurement_noise() -> f32 { 3.0 }
fn default_fallback_dt() -> f32 { 1.0 / 30.0 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            torso_min_cutoff: default_torso_min_cutoff(),
            torso_beta: default_torso_beta(),
            leg_min_cutoff: default_leg_min_cutoff(),
            leg_beta: default_leg_beta(),
            derivative_cutoff: default_derivative_cutoff(),
            kalman_process_noise: default_kalman_process_noise(),
            kalman_measurement_noise: default_kalman_measurement_noise(),
            fallback_dt: default_fallback_dt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportConfig {
    /// VMD に書き出す最大フレーム数（等間隔間引き）
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// 類似フレーム判定の閾値（位置・回転成分）
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// モーフ重みの閾値倍率
    #[serde(default = "default_morph_threshold_scale")]
    pub morph_threshold_scale: f32,
    /// 類似判定で落ちた最終フレームを末尾に戻す
    #[serde(default = "default_true")]
    pub keep_last_frame: bool,
    /// glTF のサンプリングレート (Hz)
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// VMD ヘッダのモデル名
    #[serde(default)]
    pub model_name: String,
}

fn default_max_frames() -> usize { 3000 }
fn default_similarity_threshold() -> f32 { 0.003 }
fn default_morph_threshold_scale() -> f32 { 10.0 }
fn default_frame_rate() -> f32 { 30.0 }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
            similarity_threshold: default_similarity_threshold(),
            morph_threshold_scale: default_morph_threshold_scale(),
            keep_last_frame: true,
            frame_rate: default_frame_rate(),
            model_name: String::new(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト値を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.motion.body && config.motion.face);
        assert_eq!(config.motion.solver, SolverKind::Holistic);
        assert_eq!(config.retarget.lerp_factor, 0.3);
        assert_eq!(config.export.max_frames, 3000);
        assert_eq!(config.filter.kalman_measurement_noise, 3.0);
        assert!((config.filter.fallback_dt - 1.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [motion]
            legs = false
            solver = "legacy"

            [export]
            similarity_threshold = 0.01
            "#,
        )
        .unwrap();
        assert!(!config.motion.legs);
        assert!(config.motion.arms);
        assert_eq!(config.motion.solver, SolverKind::Legacy);
        assert_eq!(config.export.similarity_threshold, 0.01);
        assert_eq!(config.export.frame_rate, 30.0);
        assert!(config.export.keep_last_frame);
    }

    #[test]
    fn test_root_lerp_is_capped() {
        let mut retarget = RetargetConfig::default();
        assert_eq!(retarget.root_lerp(), 0.2);
        retarget.lerp_factor = 0.1;
        assert_eq!(retarget.root_lerp(), 0.1);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/akira.toml");
        assert_eq!(config.retarget.foot_scale, 10.0);
    }
}
