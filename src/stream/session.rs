// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推流会话状态机 (Streaming Session)
//!
//! ```text
//! Idle --start--> Streaming --stop--> Idle
//! ```
//!
//! 会话状态只由分发任务修改; 推流任务只读取 `active` 标记并产出画面。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::protocol::{ClientCommand, ServerMessage};
use super::renderer::{annotate, encode_jpeg_base64, iso_timestamp};
use crate::config::StreamConfig;
use crate::detection::Detector;
use crate::error::{Error, Result};
use crate::input::{FrameSource, SourceOpener};

/// 多个连接共享同一个检测器
pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

type SharedSource = Arc<Mutex<Option<Box<dyn FrameSource>>>>;

pub const STARTED: &str = "Camera streaming started";
pub const ALREADY_ACTIVE: &str = "Camera streaming already active";
pub const STOPPED: &str = "Camera streaming stopped";
pub const WORKER_FAILED: &str = "Camera streaming stopped: frame worker failed";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
}

/// 一次 start 到 stop 之间的资源
struct ActiveStream {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
    source: SharedSource,
    frame_size: Arc<OnceLock<(u32, u32)>>,
}

impl ActiveStream {
    /// 推流任务异常退出后为 false
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// 停止推流任务并等待其结束, 之后释放采集源
    async fn halt(self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!("❌ 推流任务异常退出: {}", e);
            }
        }
        let source = self.source;
        if let Err(e) = tokio::task::spawn_blocking(move || release_source(&source)).await {
            error!("❌ 释放采集源失败: {}", e);
        }
    }
}

fn release_source(source: &SharedSource) {
    let mut slot = source.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(mut src) = slot.take() {
        src.release();
        info!("📷 采集源已释放");
    }
}

pub struct StreamingSession {
    opener: Arc<dyn SourceOpener>,
    detector: SharedDetector,
    outbound: mpsc::Sender<ServerMessage>,
    interval: Duration,
    jpeg_quality: u8,
    conf_threshold: f32,
    stream: Option<ActiveStream>,
}

impl StreamingSession {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        detector: SharedDetector,
        outbound: mpsc::Sender<ServerMessage>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            opener,
            detector,
            outbound,
            interval: config.frame_interval(),
            jpeg_quality: config.jpeg_quality,
            conf_threshold: config.detection_conf_threshold,
            stream: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.stream.as_ref().is_some_and(ActiveStream::is_running) {
            SessionState::Streaming
        } else {
            SessionState::Idle
        }
    }

    /// 首帧的画面尺寸 (宽, 高), 推流开始前为 None
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.stream
            .as_ref()
            .and_then(|s| s.frame_size.get().copied())
    }

    /// 处理一条客户端文本消息
    ///
    /// 只有出站通道已关闭时返回 `Error::ConnectionClosed`, 协议错误以 `error` 消息回复。
    pub async fn handle_message(&mut self, text: &str) -> Result<()> {
        match ClientCommand::parse(text) {
            Ok(ClientCommand::Start) => self.start().await,
            Ok(ClientCommand::Stop) => self.stop().await,
            Ok(ClientCommand::Unknown(action)) => {
                debug!("unknown command: {}", action);
                self.reply(ServerMessage::error(format!("Unknown command: {action}")))
                    .await
            }
            Err(e) => {
                debug!("bad client message: {:?}", text);
                self.reply(ServerMessage::error(e.to_string())).await
            }
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        // 推流任务已退出: 回收旧资源后重新打开
        if let Some(stale) = self.stream.take_if(|s| !s.is_running()) {
            warn!("⚠️ 上一次推流已异常结束, 重新打开采集源");
            stale.halt().await;
        }
        if self.stream.is_some() {
            return self.reply(ServerMessage::response(ALREADY_ACTIVE)).await;
        }

        let mut source = match self.opener.open() {
            Ok(source) => source,
            Err(e) => {
                warn!("⚠️ 无法打开采集源: {}", e);
                return self.reply(ServerMessage::error(e.to_string())).await;
            }
        };
        info!("🎬 开始推流: {}", source.describe());

        // 确认先于首帧
        if let Err(e) = self.reply(ServerMessage::response(STARTED)).await {
            source.release();
            return Err(e);
        }

        let active = Arc::new(AtomicBool::new(true));
        let source: SharedSource = Arc::new(Mutex::new(Some(source)));
        let frame_size = Arc::new(OnceLock::new());

        let worker = PushWorker {
            active: Arc::clone(&active),
            source: Arc::clone(&source),
            detector: Arc::clone(&self.detector),
            frame_size: Arc::clone(&frame_size),
            outbound: self.outbound.clone(),
            interval: self.interval,
            jpeg_quality: self.jpeg_quality,
            conf_threshold: self.conf_threshold,
        };
        let task = tokio::spawn(worker.run());

        self.stream = Some(ActiveStream {
            active,
            task,
            source,
            frame_size,
        });
        Ok(())
    }

    /// 停止推流; 已经空闲时同样回复确认
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            stream.halt().await;
            info!("⏹️ 推流已停止");
        }
        self.reply(ServerMessage::response(STOPPED)).await
    }

    /// 连接结束时调用: 回到 Idle 并释放资源, 不再发送任何消息
    pub async fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.halt().await;
            info!("⏹️ 连接关闭, 推流已停止");
        }
    }

    async fn reply(&self, message: ServerMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            warn!("⚠️ 会话未正常关闭, 强制释放推流资源");
            stream.active.store(false, Ordering::SeqCst);
            stream.task.abort();
            release_source(&stream.source);
        }
    }
}

/// 推流任务: 读帧 → 检测 → 渲染 → 发送, 每帧之间休眠固定间隔
struct PushWorker {
    active: Arc<AtomicBool>,
    source: SharedSource,
    detector: SharedDetector,
    frame_size: Arc<OnceLock<(u32, u32)>>,
    outbound: mpsc::Sender<ServerMessage>,
    interval: Duration,
    jpeg_quality: u8,
    conf_threshold: f32,
}

impl PushWorker {
    async fn run(self) {
        let this = Arc::new(self);
        while this.active.load(Ordering::SeqCst) {
            let job = Arc::clone(&this);
            match tokio::task::spawn_blocking(move || job.produce()).await {
                Ok(Ok(Some(message))) => {
                    if !this.active.load(Ordering::SeqCst) {
                        break;
                    }
                    if this.outbound.send(message).await.is_err() {
                        debug!("outbound channel closed, push loop exits");
                        break;
                    }
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!("⚠️ 推流帧处理失败, 跳过: {}", e),
                Err(e) => {
                    error!("❌ 推流帧处理异常, 推流终止: {}", e);
                    this.active.store(false, Ordering::SeqCst);
                    let _ = this.outbound.send(ServerMessage::error(WORKER_FAILED)).await;
                    break;
                }
            }
            tokio::time::sleep(this.interval).await;
        }
    }

    /// 产出一帧消息; 暂无可用帧时返回 None
    fn produce(&self) -> Result<Option<ServerMessage>> {
        let frame = {
            let mut slot = self.source.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_mut() {
                Some(source) => source.next_frame()?,
                None => None,
            }
        };
        let Some(frame) = frame else {
            return Ok(None);
        };

        self.frame_size.get_or_init(|| {
            info!("📐 画面尺寸: {}x{}", frame.width(), frame.height());
            (frame.width(), frame.height())
        });

        // 其他会话的检测器 panic 不影响本会话
        let mut detections = self
            .detector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .infer(&frame)?;
        detections.retain(|d| d.confidence >= self.conf_threshold);

        let canvas = annotate(&frame.image, &detections);
        let data = encode_jpeg_base64(&canvas, self.jpeg_quality)?;
        Ok(Some(ServerMessage::Frame {
            data,
            timestamp: iso_timestamp(),
        }))
    }
}
