// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 图片序列输入 - 按文件名顺序读取目录中的帧

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{wall_clock_secs, Frame, FrameSource, SourceOpener};
use crate::config::TimestampMode;
use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub struct ImageSequence {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
    read: u64,
    looping: bool,
    timestamps: TimestampMode,
    released: bool,
}

impl ImageSequence {
    /// 打开帧目录, 目录不存在或没有图片时返回 `SourceUnavailable`
    pub fn open(dir: impl AsRef<Path>, timestamps: TimestampMode) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| Error::SourceUnavailable(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::SourceUnavailable(format!(
                "{}: no image frames found",
                dir.display()
            )));
        }

        info!("📹 帧目录: {} ({} 帧)", dir.display(), paths.len());

        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            cursor: 0,
            read: 0,
            looping: false,
            timestamps,
            released: false,
        })
    }

    /// 播放结束后从头开始 (模拟摄像头)
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn timestamp(&self) -> f64 {
        match self.timestamps {
            TimestampMode::WallClock => wall_clock_secs(),
            TimestampMode::Nominal { fps } => self.read as f64 / fps,
        }
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let index = self.cursor as u64;
        let path = &self.paths[self.cursor];
        let image = image::open(path)?;
        let frame = Frame::new(index, self.timestamp(), image);

        self.cursor += 1;
        self.read += 1;
        Ok(Some(frame))
    }

    fn total_frames(&self) -> Option<u64> {
        if self.looping {
            None
        } else {
            Some(self.paths.len() as u64)
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.paths.clear();
            info!("📹 帧目录已释放: {}", self.dir.display());
        }
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}

impl Drop for ImageSequence {
    fn drop(&mut self) {
        if !self.released {
            warn!("⚠️ 帧目录未显式释放: {}", self.dir.display());
        }
    }
}

/// 以循环图片序列作为"摄像头"
#[derive(Clone, Debug)]
pub struct SequenceOpener {
    pub dir: PathBuf,
    pub timestamps: TimestampMode,
}

impl SequenceOpener {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timestamps: TimestampMode::WallClock,
        }
    }
}

impl SourceOpener for SequenceOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        let seq = ImageSequence::open(&self.dir, self.timestamps)?.looping(true);
        Ok(Box::new(seq))
    }
}
