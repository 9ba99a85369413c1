// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 集成测试公共工具: 合成帧目录与标注文件

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use serde_json::json;

/// 写出 `n` 张 32x24 的 PNG 帧
pub fn write_frames(dir: &Path, n: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..n {
        RgbImage::from_pixel(32, 24, Rgb([(i * 20 % 255) as u8, 40, 80]))
            .save(dir.join(format!("frame_{i:04}.png")))
            .unwrap();
    }
}

/// 每帧一个目标, 心点以恒定位移 (dx, dy) 移动, 朝向不变
pub fn write_linear_annotations(path: &Path, n: usize, dx: f32, dy: f32) {
    let mut lines = Vec::with_capacity(n);
    for i in 0..n {
        let x = 10.0 + dx * i as f32;
        let y = 12.0 + dy * i as f32;
        let line = json!({
            "frame": i,
            "detections": [{
                "confidence": 0.9,
                "track_id": 1,
                "class_id": 0,
                "bbox": {"x1": x - 6.0, "y1": y - 4.0, "x2": x + 6.0, "y2": y + 4.0},
                "keypoints": [
                    {"x": x - 5.0, "y": y},
                    {"x": x, "y": y},
                    {"x": x + 5.0, "y": y}
                ]
            }]
        });
        lines.push(line.to_string());
    }
    fs::write(path, lines.join("\n")).unwrap();
}
