// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运动特征采集 (Kinematic Feature Collection)
//!
//! 逐帧读取图片序列, 取置信度最高的姿态检测, 计算头/心/尾三点的
//! 朝向与速度, 结束时 (含 Ctrl-C 中断) 写出特征快照。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pose_kinematics::config::{CollectorConfig, TimestampMode};
use pose_kinematics::detection::{Detector, NullDetector, ReplayDetector};
use pose_kinematics::input::ImageSequence;
use pose_kinematics::pipeline::Collector;

/// 特征采集参数
#[derive(Parser, Debug)]
#[command(author, version, about = "姿态运动特征采集", long_about = None)]
struct Args {
    /// 帧目录 (按文件名排序)
    #[arg(short, long)]
    frames: PathBuf,

    /// 外部跟踪模型导出的检测结果 (JSON Lines)
    #[arg(short, long)]
    annotations: Option<PathBuf>,

    /// 配置文件, 不存在时写入默认值
    #[arg(short, long, default_value = "collector.json")]
    config: PathBuf,

    /// 按固定帧率生成时间戳 (默认使用读取时刻)
    #[arg(long)]
    fps: Option<f64>,

    /// 快照输出目录
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 关闭进度条
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = CollectorConfig::load(&args.config);
    if let Some(fps) = args.fps {
        anyhow::ensure!(fps > 0.0, "--fps must be positive, got {}", fps);
        config.timestamps = TimestampMode::Nominal { fps };
    }
    if let Some(output) = args.output {
        config.snapshot_dir = output;
    }
    if args.quiet {
        config.show_progress = false;
    }
    config.print_summary();

    let mut detector: Box<dyn Detector> = match &args.annotations {
        Some(path) => Box::new(
            ReplayDetector::load(path, config.detection_conf_threshold)
                .with_context(|| format!("加载标注文件失败: {}", path.display()))?,
        ),
        None => {
            warn!("⚠️ 未指定标注文件, 不会产生任何特征记录");
            Box::new(NullDetector)
        }
    };
    detector.summary();

    let mut source = ImageSequence::open(&args.frames, config.timestamps)
        .with_context(|| format!("无法打开帧目录: {}", args.frames.display()))?;

    // ========== Ctrl-C 中断 ==========
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        ctrlc::set_handler(move || {
            interrupt.store(true, Ordering::SeqCst);
        })
        .context("无法注册 Ctrl-C 处理")?;
    }

    let collector = Collector::new(config);
    let report = collector
        .run(&mut source, &mut detector, &interrupt)
        .context("采集失败 (已采集的数据已保存)")?;

    info!("💾 Data saved to: {}", report.snapshot.display());
    info!("📊 Number of tracked frames: {}", report.history.total_records());
    if report.interrupted {
        info!("🛑 采集被用户中断, 已处理 {} 帧", report.frames_processed);
    }
    Ok(())
}
