#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 运行配置参数
pub mod detection; // 检测适配 (外部模型)
pub mod error; // 错误类型
pub mod input; // 帧输入
pub mod kinematics; // 运动学特征
pub mod pipeline; // 特征采集循环
pub mod stream; // WebSocket 推流

pub use crate::config::{CollectorConfig, StreamConfig, TimestampMode};
pub use crate::detection::{BBox, Detection, Detector, Keypoint};
pub use crate::error::{Error, Result};
pub use crate::input::{Frame, FrameSource, SourceOpener};
pub use crate::kinematics::{Extractor, FeatureHistory, FeatureRecord, TrackId, TrackPolicy};

/// 按置信度降序排序后做NMS, 没有检测框的结果不参与重叠判断
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = match (&xs[prev_index].bbox, &xs[index].bbox) {
                (Some(a), Some(b)) => a.iou(b),
                _ => 0.0,
            };
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 本地时间字符串, 如 `gen_time_string("_")` → `20240101_093000`
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!("%Y%m%d{}%H%M%S", delimiter);
    chrono::Local::now().format(&fmt).to_string()
}

/// 头 → 心 → 尾 骨架连线
pub const SKELETON: [(usize, usize); 2] = [(0, 1), (1, 2)];
