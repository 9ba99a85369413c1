// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器 (Detector)
//! 职责: Frame → 外部姿态/检测模型 → Vec<Detection>

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::types::Detection;
use crate::error::{Error, Result};
use crate::input::Frame;

/// 统一的检测接口
///
/// 模型本身是外部协作者: 任何能对单帧给出检测结果的实现都可以接入
/// (ONNX/TensorRT 推理、离线标注回放等)。
pub trait Detector: Send {
    /// 单帧推理, 失败时返回 `Error::Inference`
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// 打印检测器信息
    fn summary(&self) {}
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).infer(frame)
    }

    fn summary(&self) {
        (**self).summary()
    }
}

/// 选取置信度最高的检测 (并列时取第一个)
pub fn select_primary(detections: &[Detection]) -> Option<&Detection> {
    detections
        .iter()
        .reduce(|max, x| if x.confidence > max.confidence { x } else { max })
}

/// 不做任何检测, 推流时只转发原始画面
#[derive(Debug, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn summary(&self) {
        info!("🎯 检测器: 禁用");
    }
}

/// 标注文件中的一行
#[derive(Debug, Deserialize)]
struct AnnotatedFrame {
    frame: u64,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// 离线标注回放检测器
///
/// 读取外部跟踪模型导出的 JSON Lines 文件, 每行对应一帧:
///
/// ```text
/// {"frame": 0, "detections": [{"confidence": 0.91, "track_id": 3,
///   "keypoints": [{"x": 10, "y": 20}, {"x": 14, "y": 22}, {"x": 18, "y": 25}]}]}
/// ```
///
/// 没有出现在文件中的帧视为无检测。
#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<Detection>>,
    conf_threshold: f32,
}

impl ReplayDetector {
    pub fn load(path: impl AsRef<Path>, conf_threshold: f32) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let detector = Self::parse(&text, conf_threshold)?;
        if detector.is_empty() {
            warn!("⚠️ 标注文件没有任何帧: {}", path.display());
        } else {
            info!(
                "✅ 标注文件加载成功: {} ({} 帧)",
                path.display(),
                detector.len()
            );
        }
        Ok(detector)
    }

    pub fn parse(text: &str, conf_threshold: f32) -> Result<Self> {
        let mut frames = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: AnnotatedFrame = serde_json::from_str(line)
                .map_err(|e| Error::Inference(format!("annotation line {}: {}", lineno + 1, e)))?;
            frames.insert(entry.frame, entry.detections);
        }
        Ok(Self {
            frames,
            conf_threshold,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let detections: Vec<Detection> = self
            .frames
            .get(&frame.index)
            .map(|dets| {
                dets.iter()
                    .filter(|d| d.confidence >= self.conf_threshold)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        debug!("frame {}: {} detections", frame.index, detections.len());
        Ok(detections)
    }

    fn summary(&self) {
        info!(
            "🎯 检测器: 标注回放 ({} 帧, conf >= {:.2})",
            self.len(),
            self.conf_threshold
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint;

    fn det(confidence: f32) -> Detection {
        Detection {
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_primary_highest_confidence() {
        let dets = vec![det(0.3), det(0.9), det(0.5)];
        assert_eq!(select_primary(&dets).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_select_primary_tie_keeps_first() {
        let mut a = det(0.8);
        a.track_id = Some(1);
        let mut b = det(0.8);
        b.track_id = Some(2);
        let dets = vec![a, b];
        assert_eq!(select_primary(&dets).unwrap().track_id, Some(1));
    }

    #[test]
    fn test_select_primary_empty() {
        assert!(select_primary(&[]).is_none());
    }

    #[test]
    fn test_replay_lookup_and_threshold() {
        let text = r#"
{"frame": 0, "detections": [{"confidence": 0.9, "track_id": 4, "keypoints": [{"x": 1, "y": 2}]}, {"confidence": 0.1}]}
{"frame": 2, "detections": []}
"#;
        let mut detector = ReplayDetector::parse(text, 0.2).unwrap();
        assert_eq!(detector.len(), 2);

        let dets = detector.infer(&Frame::blank(0, 0.0)).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].track_id, Some(4));
        assert_eq!(dets[0].keypoints.as_ref().unwrap()[0], Keypoint::new(1.0, 2.0));

        assert!(detector.infer(&Frame::blank(1, 0.0)).unwrap().is_empty());
        assert!(detector.infer(&Frame::blank(2, 0.0)).unwrap().is_empty());
    }

    #[test]
    fn test_replay_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "\n\n").unwrap();
        let mut detector = ReplayDetector::load(&path, 0.5).unwrap();
        assert!(detector.is_empty());
        assert!(detector.infer(&Frame::blank(0, 0.0)).unwrap().is_empty());
    }

    #[test]
    fn test_replay_bad_line_is_inference_error() {
        let err = ReplayDetector::parse("{\"frame\": 0}\nnope\n", 0.0).unwrap_err();
        match err {
            Error::Inference(msg) => assert!(msg.contains("line 2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
