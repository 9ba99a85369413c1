// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 内存帧序列 - 合成输入 / 测试替身

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Frame, FrameSource};
use crate::error::{Error, Result};

pub struct MemorySource {
    frames: VecDeque<Frame>,
    total: u64,
    read: u64,
    fail_after: Option<u64>,
    released: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into(),
            read: 0,
            fail_after: None,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 读取 `n` 帧后返回读取错误 (模拟设备掉线)
    pub fn fail_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// 共享的释放标记, 源被移动后仍可观察
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.is_released() {
            return Ok(None);
        }
        if self.fail_after.is_some_and(|n| self.read >= n) {
            return Err(Error::SourceUnavailable("memory source read error".to_string()));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.read += 1;
        }
        Ok(frame)
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        format!("memory ({} frames)", self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_in_order_then_ends() {
        let mut src = MemorySource::new(vec![Frame::blank(0, 0.0), Frame::blank(1, 0.1)]);
        assert_eq!(src.total_frames(), Some(2));
        assert_eq!(src.next_frame().unwrap().unwrap().index, 0);
        assert_eq!(src.next_frame().unwrap().unwrap().index, 1);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_release_stops_reading() {
        let mut src = MemorySource::new(vec![Frame::blank(0, 0.0)]);
        let flag = src.release_flag();
        src.release();
        assert!(flag.load(Ordering::SeqCst));
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_fail_after() {
        let mut src =
            MemorySource::new(vec![Frame::blank(0, 0.0), Frame::blank(1, 0.1)]).fail_after(1);
        assert!(src.next_frame().unwrap().is_some());
        assert!(matches!(src.next_frame(), Err(Error::SourceUnavailable(_))));
    }
}
