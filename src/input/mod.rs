// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// 帧来源的统一抽象:
/// - FrameSource:   逐帧读取 (采集循环 / 推流循环共用)
/// - SourceOpener:  按需打开采集源 (推流会话 start 时调用)
/// - ImageSequence: 图片序列 (目录), 可循环播放模拟摄像头
/// - MemorySource:  内存帧序列
pub mod memory;
pub mod sequence;

use image::{DynamicImage, RgbImage};

use crate::error::Result;

pub use memory::MemorySource;
pub use sequence::{ImageSequence, SequenceOpener};

/// 单帧画面 + 采集时间
#[derive(Clone, Debug)]
pub struct Frame {
    /// 帧序号 (在源中的位置)
    pub index: u64,
    /// 采集时间 (秒)
    pub timestamp: f64,
    pub image: DynamicImage,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: DynamicImage) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    /// 64x64 黑色画面, 用于合成输入
    pub fn blank(index: u64, timestamp: f64) -> Self {
        Self::new(index, timestamp, DynamicImage::ImageRgb8(RgbImage::new(64, 64)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 帧来源
pub trait FrameSource: Send {
    /// 读取下一帧; `Ok(None)` 表示源已结束 (或暂无可用帧)
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// 总帧数 (未知或无限时为 None)
    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// 释放底层资源, 之后 `next_frame` 只返回 `Ok(None)`
    fn release(&mut self);

    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn total_frames(&self) -> Option<u64> {
        (**self).total_frames()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// 采集源工厂, 打开失败返回 `Error::SourceUnavailable`
pub trait SourceOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

pub(crate) fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
