// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8-pose 张量适配
// 包含: letterbox 预处理、原始输出解码 (bbox + 关键点)、NMS

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{Array, Axis, Ix3, IxDyn};
use tracing::info;

use super::detector::Detector;
use super::types::{BBox, Detection, Keypoint};
use crate::error::{Error, Result};
use crate::input::Frame;
use crate::non_max_suppression;

const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;

/// 推理引擎 (ONNX Runtime / TensorRT / ...)
///
/// 输入 NCHW 张量, 返回模型原始输出, 不做任何解码。
pub trait InferenceBackend: Send {
    fn run(&mut self, input: Array<f32, IxDyn>) -> Result<Vec<Array<f32, IxDyn>>>;
}

/// 后处理参数
#[derive(Clone, Debug)]
pub struct PoseConfig {
    pub nc: usize,     // 类别数
    pub nk: usize,     // 关键点数
    pub conf: f32,     // 检测置信度阈值
    pub kconf: f32,    // 关键点置信度阈值
    pub iou: f32,      // NMS IOU阈值
    pub width: u32,    // 模型输入宽
    pub height: u32,   // 模型输入高
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            nc: 1,
            nk: 3,
            conf: 0.2,
            kconf: 0.0,
            iou: 0.2,
            width: 640,
            height: 640,
        }
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// 预处理: 图片 → NCHW 张量 (等比缩放, 左上对齐, 灰色填充)
pub fn letterbox(images: &[DynamicImage], width: u32, height: u32) -> Array<f32, IxDyn> {
    let mut ys = Array::ones((images.len(), 3, height as usize, width as usize)).into_dyn();
    ys.fill(144.0 / 255.0);
    for (idx, x) in images.iter().enumerate() {
        let (w0, h0) = x.dimensions();
        let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
        let img = x.resize_exact(
            (w_new as u32).clamp(1, width),
            (h_new as u32).clamp(1, height),
            FilterType::Triangle,
        );

        for (x, y, rgb) in img.pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b, _] = rgb.0;
            ys[[idx, 0, y, x]] = (r as f32) / 255.0;
            ys[[idx, 1, y, x]] = (g as f32) / 255.0;
            ys[[idx, 2, y, x]] = (b as f32) / 255.0;
        }
    }
    ys
}

/// YOLOv8-pose 后处理器
///
/// 原始输出形状 `[batch, 4 + nc + 3 * nk, anchors]`, 每列为
/// `cx, cy, w, h, cls_0..cls_nc, (kx, ky, kconf) * nk`。
#[derive(Clone, Debug, Default)]
pub struct PosePostprocessor {
    config: PoseConfig,
}

impl PosePostprocessor {
    pub fn new(config: PoseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PoseConfig {
        &self.config
    }

    /// 原始输出 → 每张图片的检测结果
    ///
    /// `originals` 为每张输入图片的原始 (宽, 高), 用于坐标还原。
    pub fn decode(
        &self,
        output: &Array<f32, IxDyn>,
        originals: &[(u32, u32)],
    ) -> Result<Vec<Vec<Detection>>> {
        let cfg = &self.config;
        let preds = output
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|e| Error::Inference(format!("unexpected output shape: {e}")))?;

        let expected = CXYWH_OFFSET + cfg.nc + KPT_STEP * cfg.nk;
        if cfg.nc == 0 || preds.shape()[1] != expected {
            return Err(Error::Inference(format!(
                "output has {} rows per anchor, expected {} (nc={}, nk={})",
                preds.shape()[1],
                expected,
                cfg.nc,
                cfg.nk
            )));
        }

        let mut ys = Vec::with_capacity(preds.shape()[0]);
        for (idx, anchor) in preds.axis_iter(Axis(0)).enumerate() {
            let (w0, h0) = *originals
                .get(idx)
                .ok_or_else(|| Error::Inference(format!("missing original size for batch {idx}")))?;
            let width_original = w0 as f32;
            let height_original = h0 as f32;
            let ratio = (cfg.width as f32 / width_original).min(cfg.height as f32 / height_original);

            let mut data: Vec<Detection> = Vec::new();
            for pred in anchor.axis_iter(Axis(1)) {
                let (class_id, confidence) = (0..cfg.nc)
                    .map(|c| (c, pred[CXYWH_OFFSET + c]))
                    .reduce(|max, x| if x.1 > max.1 { x } else { max })
                    .unwrap_or((0, 0.0));

                if confidence < cfg.conf {
                    continue;
                }

                let cx = pred[0] / ratio;
                let cy = pred[1] / ratio;
                let w = pred[2] / ratio;
                let h = pred[3] / ratio;
                let x = (cx - w / 2.).max(0.0f32).min(width_original);
                let y = (cy - h / 2.).max(0.0f32).min(height_original);

                let kpt_base = CXYWH_OFFSET + cfg.nc;
                let keypoints: Vec<Keypoint> = (0..cfg.nk)
                    .map(|i| {
                        let kx = pred[kpt_base + KPT_STEP * i] / ratio;
                        let ky = pred[kpt_base + KPT_STEP * i + 1] / ratio;
                        let kconf = pred[kpt_base + KPT_STEP * i + 2];
                        if kconf < cfg.kconf {
                            Keypoint::default()
                        } else {
                            Keypoint::new_with_conf(
                                kx.max(0.0f32).min(width_original),
                                ky.max(0.0f32).min(height_original),
                                kconf,
                            )
                        }
                    })
                    .collect();

                data.push(Detection {
                    confidence,
                    track_id: None,
                    class_id: class_id as u32,
                    bbox: Some(BBox::from_xywh(x, y, w, h)),
                    keypoints: if keypoints.is_empty() {
                        None
                    } else {
                        Some(keypoints)
                    },
                });
            }

            non_max_suppression(&mut data, cfg.iou);
            ys.push(data);
        }

        Ok(ys)
    }
}

/// 张量检测器: letterbox → 推理引擎 → 后处理
pub struct TensorDetector<B> {
    backend: B,
    postprocessor: PosePostprocessor,
}

impl<B: InferenceBackend> TensorDetector<B> {
    pub fn new(backend: B, config: PoseConfig) -> Self {
        Self {
            backend,
            postprocessor: PosePostprocessor::new(config),
        }
    }
}

impl<B: InferenceBackend> Detector for TensorDetector<B> {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let cfg = self.postprocessor.config();
        let xs = letterbox(std::slice::from_ref(&frame.image), cfg.width, cfg.height);
        let ys = self.backend.run(xs)?;
        let output = ys
            .first()
            .ok_or_else(|| Error::Inference("model returned no outputs".to_string()))?;
        let mut batches = self
            .postprocessor
            .decode(output, &[frame.image.dimensions()])?;
        Ok(batches.pop().unwrap_or_default())
    }

    fn summary(&self) {
        let cfg = self.postprocessor.config();
        info!(
            "🎯 检测器: YOLOv8-pose {}x{} | nc={} nk={} | conf={:.2} iou={:.2}",
            cfg.width, cfg.height, cfg.nc, cfg.nk, cfg.conf, cfg.iou
        );
    }
}
