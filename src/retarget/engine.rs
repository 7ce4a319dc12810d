use tracing::{debug, info};

use super::holistic::{FilteredPose, HolisticSolver};
use super::legacy::LegacySolver;
use crate::config::{Config, MotionSettings, SolverKind};
use crate::export::{gltf, vmd, ExportError};
use crate::filter::FilterBank;
use crate::keyframe::{KeyFrame, KeyframeStore};
use crate::landmark::{DetectionResult, LandmarkSet};
use crate::skeleton::{BindError, BoneMap, Rig, Skeleton};

/// 新旧ソルバー。セッション開始時に 1 つ選ぶ。
#[derive(Debug, Clone)]
pub enum Solver {
    Holistic(HolisticSolver),
    Legacy(LegacySolver),
}

impl Solver {
    pub fn from_config(config: &Config) -> Self {
        match config.motion.solver {
            SolverKind::Holistic => Solver::Holistic(HolisticSolver::from_config(&config.retarget)),
            SolverKind::Legacy => Solver::Legacy(LegacySolver::from_config(&config.retarget)),
        }
    }

    pub fn kind(&self) -> SolverKind {
        match self {
            Solver::Holistic(_) => SolverKind::Holistic,
            Solver::Legacy(_) => SolverKind::Legacy,
        }
    }

    /// 1 フレーム分を解いてリグに書く。何も書かずに飛ばしたら false。
    pub fn compute_frame(
        &self,
        rig: &mut Rig<'_>,
        bank: &mut FilterBank,
        input: &DetectionResult,
        settings: &MotionSettings,
    ) -> bool {
        match (self, input) {
            (Solver::Holistic(solver), DetectionResult::Holistic(result)) => {
                let set = LandmarkSet::parse(result);
                if set.main_body.is_empty() {
                    debug!("t={:.3}: no body landmarks, tick skipped", set.timestamp);
                    return false;
                }
                let pose = FilteredPose::sample(bank, &set);
                solver.apply(rig, &set, &pose, settings);
                true
            }
            (Solver::Legacy(solver), DetectionResult::Legacy(result)) => solver.apply(rig, result, settings),
            _ => {
                debug!(
                    "t={:.3}: input shape does not match {:?} solver, tick skipped",
                    input.timestamp(),
                    self.kind()
                );
                false
            }
        }
    }
}

struct Binding {
    skeleton: Box<dyn Skeleton>,
    bones: BoneMap,
}

/// 検出結果を受けてスケルトンを動かし、キーフレームを溜めるエンジン
///
/// スケルトンが無い間の tick / apply は何もしない。
pub struct MotionEngine {
    config: Config,
    solver: Solver,
    bank: FilterBank,
    binding: Option<Binding>,
    store: KeyframeStore,
}

impl MotionEngine {
    pub fn new(config: Config) -> Self {
        Self {
            solver: Solver::from_config(&config),
            bank: FilterBank::new(&config.filter),
            binding: None,
            store: KeyframeStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// 部位フラグを差し替える。ソルバー種別が変わればフィルタも作り直す。
    pub fn set_settings(&mut self, settings: MotionSettings) {
        let changed = settings.solver != self.config.motion.solver;
        self.config.motion = settings;
        if changed {
            self.solver = Solver::from_config(&self.config);
            self.bank = FilterBank::new(&self.config.filter);
            info!("solver switched to {:?}", settings.solver);
        }
    }

    /// スケルトンを差し替える。必須ボーンが欠けていれば失敗し、以前の状態を保つ。
    /// 溜めたキーフレームは残す。
    pub fn bind(&mut self, skeleton: Box<dyn Skeleton>) -> Result<(), BindError> {
        let bones = BoneMap::bind(skeleton.as_ref())?;
        info!("skeleton bound: {} bones mapped", bones.len());
        self.binding = Some(Binding { skeleton, bones });
        self.bank = FilterBank::new(&self.config.filter);
        Ok(())
    }

    pub fn unbind(&mut self) -> Option<Box<dyn Skeleton>> {
        self.binding.take().map(|b| b.skeleton)
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn skeleton(&self) -> Option<&dyn Skeleton> {
        self.binding.as_ref().map(|b| b.skeleton.as_ref())
    }

    pub fn bones(&self) -> Option<&BoneMap> {
        self.binding.as_ref().map(|b| &b.bones)
    }

    /// 1 tick 分を処理し、記録したキーフレーム番号を返す
    pub fn tick(&mut self, input: &DetectionResult) -> Option<usize> {
        let Some(binding) = self.binding.as_mut() else {
            debug!("t={:.3}: no skeleton, tick skipped", input.timestamp());
            return None;
        };

        let mut rig = Rig::new(binding.skeleton.as_mut(), &binding.bones);
        if !self
            .solver
            .compute_frame(&mut rig, &mut self.bank, input, &self.config.motion)
        {
            return None;
        }

        // 部位フラグに関係なく全ボーン・全モーフを撮る
        Some(self.store.record(binding.skeleton.as_ref(), &binding.bones))
    }

    /// 記録済みキーフレームを補間なしで書き戻す
    pub fn apply_keyframe(&mut self, key_num: usize) -> bool {
        match self.binding.as_mut() {
            Some(binding) => self.store.apply(key_num, binding.skeleton.as_mut()),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn store(&self) -> &KeyframeStore {
        &self.store
    }

    pub fn keyframes(&self) -> &[KeyFrame] {
        self.store.frames()
    }

    pub fn export_vmd(&self) -> Result<Vec<u8>, ExportError> {
        if self.binding.is_none() {
            return Err(ExportError::NoSkeleton);
        }
        vmd::encode(self.store.frames(), &self.config.export)
    }

    pub fn export_gltf(&self) -> Result<Vec<u8>, ExportError> {
        let binding = self.binding.as_ref().ok_or(ExportError::NoSkeleton)?;
        gltf::encode(
            binding.skeleton.as_ref(),
            &binding.bones,
            self.store.frames(),
            &self.config.export,
        )
    }
}
