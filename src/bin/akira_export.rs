use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use akira_motion::config::{Config, SolverKind};
use akira_motion::export::vmd;
use akira_motion::landmark::DetectionResult;
use akira_motion::retarget::MotionEngine;
use akira_motion::skeleton::{MemorySkeleton, RigDescription, Skeleton};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Retarget a recorded landmark take and export VMD / glTF")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 収録済みテイク（JSON Lines）を流して書き出す
    Export(ExportArgs),
    /// VMD の中身を表示する
    Inspect {
        path: PathBuf,
        /// 再生時間の計算に使うフレームレート
        #[arg(long, default_value_t = 30.0)]
        frame_rate: f32,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Vmd,
    Gltf,
    Both,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// 1 行 1 フレームの検出結果
    input: PathBuf,
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// JSON のリグ記述。省略時は標準ヒューマノイド。
    #[arg(long)]
    rig: Option<PathBuf>,
    /// 設定ファイルのソルバー指定を上書き
    #[arg(long, value_enum)]
    solver: Option<CliSolver>,
    #[arg(long, value_enum, default_value_t = Format::Both)]
    format: Format,
    /// 出力先（拡張子は形式ごとに付け替える）
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliSolver {
    Holistic,
    Legacy,
}

fn load_skeleton(rig: Option<&Path>) -> Result<Box<dyn Skeleton>> {
    let Some(path) = rig else {
        return Ok(Box::new(MemorySkeleton::humanoid()));
    };
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let description: RigDescription =
        serde_json::from_str(&text).with_context(|| format!("failed to parse rig {}", path.display()))?;
    Ok(Box::new(MemorySkeleton::from_description(&description)))
}

fn read_take(path: &Path) -> Result<Vec<DetectionResult>> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut frames = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: DetectionResult =
            serde_json::from_str(&line).with_context(|| format!("{}:{}: invalid detection result", path.display(), i + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

fn export(args: ExportArgs) -> Result<()> {
    let mut config = Config::load_or_default(&args.config);
    if let Some(solver) = args.solver {
        config.motion.solver = match solver {
            CliSolver::Holistic => SolverKind::Holistic,
            CliSolver::Legacy => SolverKind::Legacy,
        };
    }
    info!("[config] solver={:?}, max_frames={}, frame_rate={}", config.motion.solver, config.export.max_frames, config.export.frame_rate);

    let take = read_take(&args.input)?;
    info!("{} frames read from {}", take.len(), args.input.display());

    let mut engine = MotionEngine::new(config);
    engine
        .bind(load_skeleton(args.rig.as_deref())?)
        .context("skeleton is missing required bones")?;

    let mut skipped = 0;
    for frame in &take {
        if engine.tick(frame).is_none() {
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!("{} of {} frames skipped", skipped, take.len());
    }
    if engine.store().is_empty() {
        bail!("no frame produced a keyframe");
    }

    let frame_rate = engine.config().export.frame_rate;
    println!(
        "{} keyframes ({:.2}s at {} fps)",
        engine.store().len(),
        engine.store().duration(frame_rate),
        frame_rate
    );

    let base = args.output.unwrap_or_else(|| {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("motion_{}", ts))
    });

    if matches!(args.format, Format::Vmd | Format::Both) {
        let path = base.with_extension("vmd");
        let bytes = engine.export_vmd()?;
        fs::write(&path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
        let motion = vmd::decode(&bytes)?;
        println!(
            "VMD:  {} ({} frames, {} joints, {} morphs)",
            path.display(),
            motion.frame_count(),
            motion.joint_names().len(),
            motion.morph_names().len()
        );
    }

    if matches!(args.format, Format::Gltf | Format::Both) {
        let path = base.with_extension("gltf");
        let bytes = engine.export_gltf()?;
        fs::write(&path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
        println!("glTF: {} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}

fn inspect(path: &Path, frame_rate: f32) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let motion = vmd::decode(&bytes).with_context(|| format!("{} is not a readable VMD", path.display()))?;

    println!("model:    {}", motion.model_name);
    println!("frames:   {}", motion.frame_count());
    println!("duration: {:.2}s", motion.duration(frame_rate));
    println!("records:  {} bone, {} morph", motion.bones.len(), motion.morphs.len());
    println!("joints:");
    for name in motion.joint_names() {
        println!("  {}", name);
    }
    println!("morphs:");
    for name in motion.morph_names() {
        println!("  {}", name);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();
    info!("Akira Motion Export ({})", env!("GIT_VERSION"));

    match opts.command {
        Command::Export(args) => export(args),
        Command::Inspect { path, frame_rate } => inspect(&path, frame_rate),
    }
}
