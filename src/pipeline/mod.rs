// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 特征采集流水线 (Collection Pipeline)
///
/// 单线程逐帧处理:
/// - FrameSource: 读取下一帧
/// - Detector:    外部模型推理, 取置信度最高的目标
/// - Extractor:   计算运动学特征并追加到 FeatureHistory
///
/// 无论正常结束、用户中断还是出错, 都先保存快照再释放输入源。
pub mod collector;
pub mod progress;

pub use collector::{CollectionReport, Collector};
pub use progress::Progress;
