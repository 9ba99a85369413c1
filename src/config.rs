// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 运行配置 - 通过JSON文件调整参数

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::kinematics::{TrackId, TrackPolicy};

/// 帧时间戳来源
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Wall-clock time at the moment the frame is read.
    WallClock,
    /// `index / fps`, for recorded footage replayed faster or slower than real time.
    Nominal { fps: f64 },
}

/// 特征采集参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    // === 运动学参数 ===
    pub max_time_gap: f64,       // 超过该间隔(秒)不计算速度
    pub track_policy: TrackPolicy, // 轨迹ID策略
    pub primary_track_id: TrackId, // 固定主轨迹ID

    // === 检测参数 ===
    pub detection_conf_threshold: f32, // 检测置信度阈值

    // === 输入输出 ===
    pub timestamps: TimestampMode,
    pub snapshot_dir: PathBuf,
    pub show_progress: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 0.1,
            track_policy: TrackPolicy::Primary,
            primary_track_id: 0,

            detection_conf_threshold: 0.2,

            timestamps: TimestampMode::WallClock,
            snapshot_dir: PathBuf::from("collected_data"),
            show_progress: true,
        }
    }
}

impl CollectorConfig {
    pub fn load(path: impl AsRef<Path>) -> Self {
        load_or_create(path.as_ref())
    }

    pub fn print_summary(&self) {
        info!("🎛️  采集配置:");
        info!("  最大时间间隔: {:.3}s", self.max_time_gap);
        info!("  轨迹策略: {:?} (主轨迹 {})", self.track_policy, self.primary_track_id);
        info!("  检测置信度: {:.2}", self.detection_conf_threshold);
        info!("  时间戳: {:?}", self.timestamps);
        info!("  输出目录: {}", self.snapshot_dir.display());
    }
}

/// 推流服务参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub bind: String,
    pub frame_interval_ms: u64, // ~30fps
    pub jpeg_quality: u8,
    pub detection_conf_threshold: f32,
    pub greeting: String,
    pub outbound_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8765".to_string(),
            frame_interval_ms: 33,
            jpeg_quality: 100,
            detection_conf_threshold: 0.7,
            greeting: "Connected to Video Processor".to_string(),
            outbound_capacity: 32,
        }
    }
}

impl StreamConfig {
    pub fn load(path: impl AsRef<Path>) -> Self {
        load_or_create(path.as_ref())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn print_summary(&self) {
        info!("🎛️  推流配置:");
        info!("  监听地址: {}", self.bind);
        info!("  帧间隔: {}ms", self.frame_interval_ms);
        info!("  JPEG质量: {}", self.jpeg_quality);
        info!("  检测置信度: {:.2}", self.detection_conf_threshold);
    }
}

/// 从JSON文件加载配置, 文件不存在时写入默认值, 解析失败时使用默认值
fn load_or_create<T>(path: &Path) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    match fs::read_to_string(path) {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(config) => {
                info!("✅ 配置已从 {} 加载", path.display());
                config
            }
            Err(e) => {
                warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                T::default()
            }
        },
        Err(_) => {
            info!("📝 配置文件不存在,创建默认配置...");
            let config = T::default();
            save_json(&config, path);
            config
        }
    }
}

fn save_json<T: Serialize>(config: &T, path: &Path) {
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                error!("❌ 保存配置失败: {}", e);
            } else {
                info!("💾 配置已保存到 {}", path.display());
            }
        }
        Err(e) => error!("❌ 序列化配置失败: {}", e),
    }
}
