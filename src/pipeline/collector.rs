// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 采集循环 (Collection Loop)
//! 职责: FrameSource → Detector → Extractor → FeatureHistory → 快照

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::progress::Progress;
use crate::config::CollectorConfig;
use crate::detection::{select_primary, Detector};
use crate::error::Result;
use crate::input::FrameSource;
use crate::kinematics::{Extractor, FeatureHistory};

/// 一次采集的结果
#[derive(Debug)]
pub struct CollectionReport {
    pub frames_processed: u64,
    pub frames_with_detection: u64,
    pub skipped_malformed: u64,
    pub interrupted: bool,
    pub snapshot: PathBuf,
    pub history: FeatureHistory,
}

#[derive(Debug, Default)]
struct LoopStats {
    frames_processed: u64,
    frames_with_detection: u64,
    skipped_malformed: u64,
    interrupted: bool,
}

/// 作用域守卫: 持有输入源与特征历史, 结束时先保存快照、再释放输入源。
///
/// 正常路径调用 `finish`; 若循环 panic 导致守卫被直接 drop, 在 `Drop` 中尽力完成同样的顺序。
struct SnapshotGuard<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
    history: FeatureHistory,
    snapshot_dir: &'a Path,
    finished: bool,
}

impl<'a, S: FrameSource + ?Sized> SnapshotGuard<'a, S> {
    fn new(source: &'a mut S, snapshot_dir: &'a Path) -> Self {
        Self {
            source,
            history: FeatureHistory::new(),
            snapshot_dir,
            finished: false,
        }
    }

    fn finish(mut self) -> Result<(FeatureHistory, PathBuf)> {
        self.finished = true;
        let saved = self.history.save_snapshot(self.snapshot_dir);
        self.source.release();
        let history = mem::take(&mut self.history);
        saved.map(|path| (history, path))
    }
}

impl<S: FrameSource + ?Sized> Drop for SnapshotGuard<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("⚠️ 采集循环异常退出, 尝试保存已采集数据");
        if let Err(e) = self.history.save_snapshot(self.snapshot_dir) {
            error!("❌ 保存特征数据失败: {}", e);
        }
        self.source.release();
    }
}

pub struct Collector {
    config: CollectorConfig,
    extractor: Extractor,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            extractor: Extractor::new(config.max_time_gap),
            config,
        }
    }

    /// 处理整个输入源
    ///
    /// `interrupt` 被置位后在下一帧之前停止。任何退出路径都会保存快照并释放输入源;
    /// 推理或读帧失败时在保存之后返回该错误。
    pub fn run<S, D>(
        &self,
        source: &mut S,
        detector: &mut D,
        interrupt: &AtomicBool,
    ) -> Result<CollectionReport>
    where
        S: FrameSource + ?Sized,
        D: Detector + ?Sized,
    {
        info!(
            "🎬 开始采集: {} (最大时间间隔 {:.3}s)",
            source.describe(),
            self.extractor.max_time_gap()
        );
        let start = Instant::now();
        let mut progress = Progress::new(source.total_frames(), self.config.show_progress);

        let mut guard = SnapshotGuard::new(source, &self.config.snapshot_dir);
        let outcome = self.process(&mut guard, detector, interrupt, &mut progress);
        progress.finish();

        let finished = guard.finish();
        let stats = outcome.inspect_err(|e| error!("❌ 采集中断: {}", e))?;
        let (history, snapshot) = finished?;

        let coverage = progress
            .percent()
            .map(|p| format!(" ({p:.1}%)"))
            .unwrap_or_default();
        info!(
            "✅ 采集完成: {} 帧{} | 跟踪帧数: {} | 跳过: {} | 耗时 {:.1}s",
            progress.processed(),
            coverage,
            history.total_records(),
            stats.skipped_malformed,
            start.elapsed().as_secs_f64()
        );

        Ok(CollectionReport {
            frames_processed: stats.frames_processed,
            frames_with_detection: stats.frames_with_detection,
            skipped_malformed: stats.skipped_malformed,
            interrupted: stats.interrupted,
            snapshot,
            history,
        })
    }

    fn process<S, D>(
        &self,
        guard: &mut SnapshotGuard<'_, S>,
        detector: &mut D,
        interrupt: &AtomicBool,
        progress: &mut Progress,
    ) -> Result<LoopStats>
    where
        S: FrameSource + ?Sized,
        D: Detector + ?Sized,
    {
        let mut stats = LoopStats::default();

        loop {
            if interrupt.load(Ordering::SeqCst) {
                info!("🛑 Stopped by user");
                stats.interrupted = true;
                break;
            }

            let Some(frame) = guard.source.next_frame()? else {
                break;
            };

            let detections = detector.infer(&frame)?;

            if let Some(detection) = select_primary(&detections) {
                if detection.has_keypoints() {
                    let keypoints = detection.keypoints.as_deref().unwrap_or_default();
                    stats.frames_with_detection += 1;
                    let track = self
                        .config
                        .track_policy
                        .resolve(detection, self.config.primary_track_id);
                    let previous = guard.history.latest(track);

                    match self.extractor.extract(keypoints, previous, frame.timestamp) {
                        Ok(record) => guard.history.append(track, record),
                        Err(e) if e.is_recoverable() => {
                            stats.skipped_malformed += 1;
                            debug!("frame {}: {}", frame.index, e);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            stats.frames_processed += 1;
            progress.advance(guard.history.total_records());
        }

        Ok(stats)
    }
}
