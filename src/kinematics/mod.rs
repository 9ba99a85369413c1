// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 运动学特征 (Kinematic features)
///
/// - extractor: 关键点三元组 → 特征记录 (朝向 + 一阶导数)
/// - history:   按轨迹ID追加的特征历史, 会话结束时落盘
pub mod extractor;
pub mod history;

use serde::{Deserialize, Serialize};

use crate::detection::Detection;

pub use extractor::{
    normalize_degrees, shortest_angle_delta, Extractor, FeatureRecord, KeypointTriple, Point,
};
pub use history::FeatureHistory;

/// 轨迹ID
pub type TrackId = u32;

/// 轨迹ID策略
///
/// 每帧最多保留一个目标 (置信度最高的检测), 区别只在于记录归属到哪条轨迹。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPolicy {
    /// 所有记录归属固定的主轨迹 (单目标研究)
    #[default]
    Primary,
    /// 使用模型跟踪器给出的ID, 没有ID时退回主轨迹
    Native,
}

impl TrackPolicy {
    pub fn resolve(&self, detection: &Detection, primary: TrackId) -> TrackId {
        match self {
            TrackPolicy::Primary => primary,
            TrackPolicy::Native => detection.track_id.unwrap_or(primary),
        }
    }
}
