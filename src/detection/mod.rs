// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection Adapter)
///
/// 外部姿态/检测模型的统一包装:
/// - Detector:       单帧推理接口
/// - ReplayDetector: 离线标注回放
/// - yolov8:         YOLOv8-pose 原始张量解码
pub mod detector;
pub mod types;
pub mod yolov8;

pub use detector::{select_primary, Detector, NullDetector, ReplayDetector};
pub use types::{BBox, Detection, Keypoint};
