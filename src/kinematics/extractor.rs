// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 特征提取器 (Kinematic Feature Extractor)
//!
//! 关键点顺序固定为 头(head) → 心(heart/center) → 尾(tail)。
//! 朝向取 head→heart 与 heart→tail 两个方向向量的均值,
//! 速度/角速度只相对同一轨迹的上一条记录计算, 且仅当时间间隔不超过 `max_time_gap`。

use serde::{Deserialize, Serialize};

use crate::detection::Keypoint;
use crate::error::{Error, Result};

/// 二维点 (像素坐标)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<&Keypoint> for Point {
    fn from(kp: &Keypoint) -> Self {
        Self::new(kp.x as f64, kp.y as f64)
    }
}

/// 头 / 心 / 尾 三个关键点
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeypointTriple {
    pub head: Point,
    pub heart: Point,
    pub tail: Point,
}

impl KeypointTriple {
    pub const REQUIRED: usize = 3;

    pub fn new(head: Point, heart: Point, tail: Point) -> Self {
        Self { head, heart, tail }
    }

    /// 取前三个关键点, 不足三个时返回 `MalformedInput`
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Result<Self> {
        match keypoints {
            [head, heart, tail, ..] => Ok(Self::new(head.into(), heart.into(), tail.into())),
            _ => Err(Error::MalformedInput {
                expected: Self::REQUIRED,
                found: keypoints.len(),
            }),
        }
    }

    /// 身体朝向 (度), 范围 (−180, 180]
    pub fn body_orientation(&self) -> f64 {
        let head_to_heart = (self.heart.x - self.head.x, self.heart.y - self.head.y);
        let heart_to_tail = (self.tail.x - self.heart.x, self.tail.y - self.heart.y);
        let mean_x = (head_to_heart.0 + heart_to_tail.0) / 2.0;
        let mean_y = (head_to_heart.1 + heart_to_tail.1) / 2.0;
        normalize_degrees(mean_y.atan2(mean_x).to_degrees())
    }
}

/// 角度归一化到 (−180, 180]
pub fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// 从 `from` 转到 `to` 的最短有符号角度差, 179° → −179° 为 +2°
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    normalize_degrees(to - from)
}

/// 一条运动学特征记录
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub head_x: f64,
    pub head_y: f64,
    pub heart_x: f64,
    pub heart_y: f64,
    pub body_orientation: f64,
    pub timestamp: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub angular_velocity: f64,
}

impl FeatureRecord {
    pub fn has_motion(&self) -> bool {
        self.velocity_x != 0.0 || self.velocity_y != 0.0 || self.angular_velocity != 0.0
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Extractor {
    max_time_gap: f64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Extractor {
    pub fn new(max_time_gap: f64) -> Self {
        Self { max_time_gap }
    }

    pub fn max_time_gap(&self) -> f64 {
        self.max_time_gap
    }

    /// 关键点列表 → 特征记录
    pub fn extract(
        &self,
        keypoints: &[Keypoint],
        previous: Option<&FeatureRecord>,
        now: f64,
    ) -> Result<FeatureRecord> {
        let triple = KeypointTriple::from_keypoints(keypoints)?;
        Ok(self.extract_triple(&triple, previous, now))
    }

    pub fn extract_triple(
        &self,
        triple: &KeypointTriple,
        previous: Option<&FeatureRecord>,
        now: f64,
    ) -> FeatureRecord {
        let body_orientation = triple.body_orientation();
        let mut record = FeatureRecord {
            head_x: triple.head.x,
            head_y: triple.head.y,
            heart_x: triple.heart.x,
            heart_y: triple.heart.y,
            body_orientation,
            timestamp: now,
            velocity_x: 0.0,
            velocity_y: 0.0,
            angular_velocity: 0.0,
        };

        if let Some(prev) = previous {
            let dt = now - prev.timestamp;
            // dt <= 0: 时间戳不单调, 不计算导数
            if dt > 0.0 && dt <= self.max_time_gap {
                record.velocity_x = (record.heart_x - prev.heart_x) / dt;
                record.velocity_y = (record.heart_y - prev.heart_y) / dt;
                record.angular_velocity =
                    shortest_angle_delta(prev.body_orientation, body_orientation) / dt;
            }
        }

        record
    }
}
