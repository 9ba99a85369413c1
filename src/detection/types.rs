// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统数据结构定义
/// Data structures for the detection adapter
use serde::{Deserialize, Serialize};

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn from_xywh(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            x1: xmin,
            y1: ymin,
            x2: xmin + width,
            y2: ymin + height,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn intersection_area(&self, another: &BBox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &BBox) -> f32 {
        let inter = self.intersection_area(another);
        let union = self.area() + another.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// 关键点 (x, y, confidence)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            confidence: 1.0,
        }
    }

    pub fn new_with_conf(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }
}

/// 单个检测结果 (one model output for one object in one frame)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f32,
    #[serde(default)]
    pub track_id: Option<u32>,
    #[serde(default)]
    pub class_id: u32,
    #[serde(default)]
    pub bbox: Option<BBox>,
    #[serde(default)]
    pub keypoints: Option<Vec<Keypoint>>,
}

impl Detection {
    pub fn has_keypoints(&self) -> bool {
        self.keypoints.as_ref().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BBox::from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::from_xywh(20.0, 20.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BBox::from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::from_xywh(5.0, 0.0, 10.0, 10.0);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_keypoint_confidence_defaults_to_one() {
        let kp: Keypoint = serde_json::from_str(r#"{"x": 1.5, "y": 2.0}"#).unwrap();
        assert_eq!(kp, Keypoint::new(1.5, 2.0));
    }

    #[test]
    fn test_has_keypoints() {
        let mut det = Detection::default();
        assert!(!det.has_keypoints());
        det.keypoints = Some(vec![]);
        assert!(!det.has_keypoints());
        det.keypoints = Some(vec![Keypoint::new(0.0, 0.0)]);
        assert!(det.has_keypoints());
    }
}
