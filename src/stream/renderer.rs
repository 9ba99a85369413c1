// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推流画面渲染: 检测框 / 关键点 / 骨架 → JPEG → base64

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::detection::{Detection, Keypoint};
use crate::error::Result;
use crate::SKELETON;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// 低于该置信度的关键点不绘制
const KPT_VISIBLE: f32 = 0.3;

type Point = (f32, f32);

/// 将线段裁剪到 [0, w-1] x [0, h-1] 内 (Liang-Barsky), 完全在画面外时返回 None
fn clip_segment(p: Point, q: Point, width: u32, height: u32) -> Option<(Point, Point)> {
    if width == 0 || height == 0 || ![p.0, p.1, q.0, q.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (x0, y0) = (f64::from(p.0), f64::from(p.1));
    let (dx, dy) = (f64::from(q.0) - x0, f64::from(q.1) - y0);
    let (xmax, ymax) = (f64::from(width - 1), f64::from(height - 1));

    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (pk, qk) in [(-dx, x0), (dx, xmax - x0), (-dy, y0), (dy, ymax - y0)] {
        if pk == 0.0 {
            if qk < 0.0 {
                return None;
            }
            continue;
        }
        let r = qk / pk;
        if pk < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| ((x0 + t * dx) as f32, (y0 + t * dy) as f32);
    Some((at(t0), at(t1)))
}

fn draw_clipped_line(canvas: &mut RgbImage, p: Point, q: Point, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    if let Some((a, b)) = clip_segment(p, q, width, height) {
        draw_line_segment_mut(canvas, a, b, color);
    }
}

fn in_canvas(kpt: &Keypoint, width: u32, height: u32) -> bool {
    kpt.x >= 0.0 && kpt.y >= 0.0 && kpt.x < width as f32 && kpt.y < height as f32
}

/// 在画面上绘制检测结果, 返回新的 RGB 图像
///
/// 画面外的坐标先裁剪, 绘制耗时只与画面大小有关。
pub fn annotate(image: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();

    for det in detections {
        if let Some(b) = &det.bbox {
            if b.width() > 0.0 && b.height() > 0.0 {
                let corners = [(b.x1, b.y1), (b.x2, b.y1), (b.x2, b.y2), (b.x1, b.y2)];
                for i in 0..corners.len() {
                    let next = corners[(i + 1) % corners.len()];
                    draw_clipped_line(&mut canvas, corners[i], next, GREEN);
                }
            }
        }

        let Some(kpts) = det.keypoints.as_deref() else {
            continue;
        };

        // 骨架连线
        for &(a, b) in &SKELETON {
            if let (Some(p), Some(q)) = (kpts.get(a), kpts.get(b)) {
                if p.confidence > KPT_VISIBLE && q.confidence > KPT_VISIBLE {
                    draw_clipped_line(&mut canvas, (p.x, p.y), (q.x, q.y), YELLOW);
                }
            }
        }

        for kpt in kpts
            .iter()
            .filter(|k| k.confidence > KPT_VISIBLE && in_canvas(k, width, height))
        {
            draw_filled_circle_mut(
                &mut canvas,
                (kpt.x.round() as i32, kpt.y.round() as i32),
                4,
                RED,
            );
        }
    }

    canvas
}

/// JPEG 编码后转 base64 (standard alphabet, 带 padding)
pub fn encode_jpeg_base64(image: &RgbImage, quality: u8) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

/// 本地时间 ISO-8601 (微秒精度)
pub fn iso_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
