// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! YOLOv8 检测模型
//!
//! - 预处理: letterbox 缩放到推理尺寸 (左上对齐, 144/255 填充)
//! - 推理: ONNX Runtime (需要 `onnx` 特性)
//! - 后处理: 解码 `[1, 4+nc, N]` 输出头 → 类别过滤 → NMS

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{s, Array, ArrayView2, Axis, Ix4};

use crate::detection::types::{BBox, DetectionParams};
use crate::non_max_suppression;

/// 输出头中 cxcywh 占用的通道数
const CXYWH_OFFSET: usize = 4;

/// 计算等比缩放比例与缩放后尺寸
pub fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// Letterbox 预处理, 返回 NCHW 张量与缩放比例
pub fn preprocess(frame: &RgbImage, inf_w: u32, inf_h: u32) -> Result<(Array<f32, Ix4>, f32)> {
    let (w0, h0) = frame.dimensions();
    if w0 == 0 || h0 == 0 {
        return Err(anyhow!("empty frame {}x{}", w0, h0));
    }
    let (ratio, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, inf_w as f32, inf_h as f32);
    let w_new = (w_new as u32).clamp(1, inf_w);
    let h_new = (h_new as u32).clamp(1, inf_h);

    // 1. Resize: 原图 → 推理尺寸 (fast_image_resize, 双线性)
    let src_image = fr::images::Image::from_vec_u8(w0, h0, frame.as_raw().clone(), fr::PixelType::U8x3)
        .context("failed to wrap frame for resize")?;
    let mut dst_image = fr::images::Image::new(w_new, h_new, fr::PixelType::U8x3);
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .context("letterbox resize failed")?;

    // 2. 填充灰边 + 归一化
    let mut ys = Array::ones((1, 3, inf_h as usize, inf_w as usize));
    ys.fill(144.0 / 255.0);
    let buf = dst_image.buffer();
    let row = w_new as usize * 3;
    for y in 0..h_new as usize {
        for x in 0..w_new as usize {
            let i = y * row + x * 3;
            ys[[0, 0, y, x]] = buf[i] as f32 / 255.0;
            ys[[0, 1, y, x]] = buf[i + 1] as f32 / 255.0;
            ys[[0, 2, y, x]] = buf[i + 2] as f32 / 255.0;
        }
    }

    Ok((ys, ratio))
}

/// 解码单张图的输出头 `[4+nc, N]`
///
/// 只保留 argmax 类别为 `target_class_id` 且分数不低于置信度阈值的锚点,
/// 坐标还原到原图并裁剪到画面内, 最后按 `iou_threshold` 做 NMS。
pub fn decode_predictions(
    preds: ArrayView2<f32>,
    ratio: f32,
    frame_w: u32,
    frame_h: u32,
    params: &DetectionParams,
) -> Vec<BBox> {
    let width_original = frame_w as f32;
    let height_original = frame_h as f32;
    let nc = preds.shape()[0].saturating_sub(CXYWH_OFFSET);
    if nc == 0 || ratio <= 0.0 {
        return Vec::new();
    }

    let mut data: Vec<BBox> = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

        let Some((id, &confidence)) = clss
            .into_iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if id as u32 != params.target_class_id || confidence < params.confidence_threshold {
            continue;
        }

        let cx = bbox[0] / ratio;
        let cy = bbox[1] / ratio;
        let w = bbox[2] / ratio;
        let h = bbox[3] / ratio;
        let x1 = (cx - w / 2.).clamp(0.0, width_original);
        let y1 = (cy - h / 2.).clamp(0.0, height_original);
        let x2 = (cx + w / 2.).clamp(0.0, width_original);
        let y2 = (cy + h / 2.).clamp(0.0, height_original);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        data.push(BBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: id as u32,
        });
    }

    non_max_suppression(&mut data, params.iou_threshold);
    data
}

#[cfg(feature = "onnx")]
pub use session::YOLOv8;

#[cfg(feature = "onnx")]
mod session {
    use anyhow::{Context, Result};
    use image::RgbImage;
    use ndarray::Ix3;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;

    use super::{decode_predictions, preprocess};
    use crate::detection::types::{BBox, DetectionParams};

    /// YOLOv8 ONNX 检测器
    pub struct YOLOv8 {
        session: Session,
        input_name: String,
        output_name: String,
        width: u32,
        height: u32,
    }

    impl YOLOv8 {
        /// 加载 ONNX 模型 (`imgsz` 为推理输入边长)
        pub fn new(model_path: &str, imgsz: u32) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(model_path)
                .with_context(|| format!("failed to load ONNX model {}", model_path))?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "images".to_string());
            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "output0".to_string());

            log::info!(
                "YOLOv8 loaded: {} (input `{}` {}x{}, output `{}`)",
                model_path,
                input_name,
                imgsz,
                imgsz,
                output_name
            );

            Ok(Self {
                session,
                input_name,
                output_name,
                width: imgsz,
                height: imgsz,
            })
        }

        /// 单帧检测: 预处理 → 推理 → 后处理
        pub fn detect(&mut self, frame: &RgbImage, params: &DetectionParams) -> Result<Vec<BBox>> {
            let (xs, ratio) = preprocess(frame, self.width, self.height)?;
            let input = Tensor::from_array(xs)?;
            let outputs = self
                .session
                .run(ort::inputs![self.input_name.as_str() => input])
                .context("YOLOv8 inference failed")?;
            let output: ndarray::ArrayViewD<f32> = outputs[self.output_name.as_str()]
                .try_extract_array()
                .context("failed to extract YOLOv8 output")?;
            let output = output
                .into_dimensionality::<Ix3>()
                .context("unexpected YOLOv8 output rank")?;

            let (w, h) = frame.dimensions();
            Ok(decode_predictions(
                output.index_axis(ndarray::Axis(0), 0),
                ratio,
                w,
                h,
                params,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params() -> DetectionParams {
        DetectionParams {
            target_class_id: 0,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        }
    }

    /// 构造 `[4+2, N]` 输出头, 每列 (cx, cy, w, h, cls0, cls1)
    fn head(cols: &[[f32; 6]]) -> Array2<f32> {
        let mut a = Array2::zeros((6, cols.len()));
        for (j, c) in cols.iter().enumerate() {
            for (i, v) in c.iter().enumerate() {
                a[[i, j]] = *v;
            }
        }
        a
    }

    #[test]
    fn letterbox_keeps_aspect_and_pads_grey() {
        let frame = RgbImage::from_pixel(64, 32, image::Rgb([255, 0, 0]));
        let (xs, ratio) = preprocess(&frame, 32, 32).unwrap();
        assert_eq!(xs.shape(), &[1, 3, 32, 32]);
        assert!((ratio - 0.5).abs() < 1e-6);
        // 缩放内容在左上 32x16
        assert!((xs[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
        assert!(xs[[0, 1, 15, 31]].abs() < 0.01);
        // 下半部分为填充色
        assert!((xs[[0, 0, 20, 5]] - 144.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn decode_filters_class_and_confidence() {
        let preds = head(&[
            [50.0, 50.0, 20.0, 20.0, 0.9, 0.1],  // 目标类
            [10.0, 10.0, 8.0, 8.0, 0.1, 0.8],    // 其他类
            [80.0, 80.0, 10.0, 10.0, 0.2, 0.05], // 低于阈值
        ]);
        let boxes = decode_predictions(preds.view(), 1.0, 100, 100, &params());
        assert_eq!(boxes.len(), 1);
        assert_eq!((boxes[0].x1, boxes[0].y1, boxes[0].x2, boxes[0].y2), (40.0, 40.0, 60.0, 60.0));
    }

    #[test]
    fn decode_rescales_clamps_and_suppresses() {
        let preds = head(&[
            [10.0, 10.0, 20.0, 20.0, 0.6, 0.0],
            [10.5, 10.0, 20.0, 20.0, 0.9, 0.0], // 与上一个高度重叠
        ]);
        let boxes = decode_predictions(preds.view(), 0.5, 30, 30, &params());
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!((b.confidence - 0.9).abs() < 1e-6);
        // (21 - 20) → 1, 右下裁剪到 30
        assert_eq!((b.x1, b.y1, b.x2, b.y2), (1.0, 0.0, 30.0, 30.0));
    }
}
