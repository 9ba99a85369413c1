// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! WebSocket 视频推流服务 (Stream Server)
//!
//! 客户端发送 `{"action":"start"}` / `{"action":"stop"}` 控制推流,
//! 服务端以 base64 JPEG 推送标注后的画面。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pose_kinematics::config::{StreamConfig, TimestampMode};
use pose_kinematics::detection::{Detector, NullDetector, ReplayDetector};
use pose_kinematics::input::SequenceOpener;
use pose_kinematics::stream::{serve, SharedDetector};

/// 推流服务参数
#[derive(Parser, Debug)]
#[command(author, version, about = "WebSocket 视频推流服务", long_about = None)]
struct Args {
    /// 作为摄像头循环播放的帧目录
    #[arg(short, long)]
    frames: PathBuf,

    /// 外部跟踪模型导出的检测结果 (JSON Lines)
    #[arg(short, long)]
    annotations: Option<PathBuf>,

    /// 配置文件, 不存在时写入默认值
    #[arg(short, long, default_value = "stream.json")]
    config: PathBuf,

    /// 监听地址, 覆盖配置文件
    #[arg(short, long)]
    bind: Option<String>,

    /// 按固定帧率生成时间戳
    #[arg(long)]
    fps: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = StreamConfig::load(&args.config);
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    config.print_summary();

    let detector: Box<dyn Detector> = match &args.annotations {
        Some(path) => Box::new(
            ReplayDetector::load(path, config.detection_conf_threshold)
                .with_context(|| format!("加载标注文件失败: {}", path.display()))?,
        ),
        None => {
            warn!("⚠️ 未指定标注文件, 只推送原始画面");
            Box::new(NullDetector)
        }
    };
    detector.summary();
    let detector: SharedDetector = Arc::new(Mutex::new(detector));

    let mut opener = SequenceOpener::new(args.frames.clone());
    if let Some(fps) = args.fps {
        anyhow::ensure!(fps > 0.0, "--fps must be positive, got {}", fps);
        opener.timestamps = TimestampMode::Nominal { fps };
    }

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("无法监听 {}", config.bind))?;

    tokio::select! {
        result = serve(listener, Arc::new(opener), detector, config) => {
            result.context("推流服务异常退出")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 收到 Ctrl-C, 服务退出");
        }
    }
    Ok(())
}
