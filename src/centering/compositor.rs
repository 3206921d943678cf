// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 裁剪合成 (Crop compositor)
//!
//! 以目标中心为准在原图上开一个 `imgsz×imgsz` 的理想窗口,
//! 裁剪到画面范围后贴到黑色画布的对应位置, 越界部分保持黑色。

use image::{imageops, GenericImageView, RgbImage};

/// 单帧裁剪方案 (由中心、画面尺寸与输出尺寸推导)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropPlan {
    /// 理想窗口 (x1, y1, x2, y2), 可能越界
    pub ideal: (i32, i32, i32, i32),
    /// 裁剪到 `[0,W]×[0,H]` 后的源窗口
    pub source_window: (i32, i32, i32, i32),
    /// 源窗口在画布上的左上角
    pub paste_offset: (i32, i32),
    /// 输出画布边长
    pub imgsz: u32,
}

impl CropPlan {
    pub fn compute(center: (i32, i32), frame_w: u32, frame_h: u32, imgsz: u32) -> Self {
        let (cx, cy) = center;
        let size = imgsz as i32;
        let half = size / 2;

        let x1 = cx - half;
        let y1 = cy - half;
        let x2 = x1 + size;
        let y2 = y1 + size;

        let src_x1 = x1.max(0);
        let src_y1 = y1.max(0);
        let src_x2 = x2.min(frame_w as i32);
        let src_y2 = y2.min(frame_h as i32);

        Self {
            ideal: (x1, y1, x2, y2),
            source_window: (src_x1, src_y1, src_x2, src_y2),
            paste_offset: ((-x1).max(0), (-y1).max(0)),
            imgsz,
        }
    }

    /// 需要拷贝的尺寸 (可能 ≤ 0)
    pub fn copy_size(&self) -> (i32, i32) {
        let (x1, y1, x2, y2) = self.source_window;
        (x2 - x1, y2 - y1)
    }

    /// 源窗口与画面没有交集
    pub fn is_empty(&self) -> bool {
        let (w, h) = self.copy_size();
        w <= 0 || h <= 0
    }

    /// 原图坐标 → 画布坐标
    pub fn to_canvas(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x - self.source_window.0 + self.paste_offset.0,
            y - self.source_window.1 + self.paste_offset.1,
        )
    }
}

/// 合成结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Composite {
    /// 已拷贝源窗口
    Copied,
    /// 窗口在画面外, 输出黑色画布
    OutOfFrame,
    /// 实际裁出的尺寸与预期不符, 输出黑色画布
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// 全黑画布
pub fn black_canvas(imgsz: u32) -> RgbImage {
    RgbImage::new(imgsz, imgsz)
}

/// 按方案合成输出帧
///
/// 方案基于上报的画面尺寸; 若实际帧更小导致裁出的区域尺寸不符,
/// 丢弃拷贝并返回黑色画布。
pub fn compose(frame: &RgbImage, plan: &CropPlan) -> (RgbImage, Composite) {
    let mut canvas = black_canvas(plan.imgsz);
    if plan.is_empty() {
        return (canvas, Composite::OutOfFrame);
    }

    let (w, h) = plan.copy_size();
    let expected = (w as u32, h as u32);
    let (src_x1, src_y1, _, _) = plan.source_window;

    let region = imageops::crop_imm(frame, src_x1 as u32, src_y1 as u32, expected.0, expected.1);
    let actual = (region.width(), region.height());
    if actual != expected {
        return (canvas, Composite::SizeMismatch { expected, actual });
    }

    let region = region.to_image();
    let (paste_x, paste_y) = plan.paste_offset;
    imageops::replace(&mut canvas, &region, paste_x as i64, paste_y as i64);
    (canvas, Composite::Copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 每个像素编码自身坐标
    fn coord_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 251) as u8, (y % 251) as u8, 7]))
    }

    #[test]
    fn plan_near_top_left_corner() {
        let plan = CropPlan::compute((100, 100), 640, 480, 640);
        assert_eq!(plan.ideal, (-220, -220, 420, 420));
        assert_eq!(plan.source_window, (0, 0, 420, 420));
        assert_eq!(plan.paste_offset, (220, 220));
        assert_eq!(plan.copy_size(), (420, 420));
    }

    #[test]
    fn odd_size_truncates_half() {
        let plan = CropPlan::compute((10, 10), 100, 100, 5);
        assert_eq!(plan.ideal, (8, 8, 13, 13));
    }

    #[test]
    fn compose_pastes_region_and_keeps_black_border() {
        let frame = coord_frame(640, 480);
        let plan = CropPlan::compute((100, 100), 640, 480, 640);
        let (out, status) = compose(&frame, &plan);
        assert_eq!(status, Composite::Copied);
        assert_eq!(out.dimensions(), (640, 640));

        assert_eq!(out.get_pixel(220, 220), frame.get_pixel(0, 0));
        assert_eq!(out.get_pixel(639, 639), frame.get_pixel(419, 419));
        assert_eq!(out.get_pixel(300, 250), frame.get_pixel(80, 30));
        assert_eq!(*out.get_pixel(219, 300), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(300, 219), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn window_outside_frame_is_black() {
        let frame = coord_frame(100, 100);
        let plan = CropPlan::compute((500, 500), 100, 100, 64);
        assert!(plan.is_empty());
        let (out, status) = compose(&frame, &plan);
        assert_eq!(status, Composite::OutOfFrame);
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn undersized_frame_falls_back_to_black() {
        // 上报 200x200, 实际只有 100x100
        let frame = coord_frame(100, 100);
        let plan = CropPlan::compute((150, 150), 200, 200, 64);
        let (out, status) = compose(&frame, &plan);
        assert_eq!(
            status,
            Composite::SizeMismatch {
                expected: (64, 64),
                actual: (0, 0)
            }
        );
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn canvas_translation_matches_paste() {
        let plan = CropPlan::compute((100, 100), 640, 480, 640);
        assert_eq!(plan.to_canvas(0, 0), (220, 220));
        assert_eq!(plan.to_canvas(100, 100), (320, 320));
    }
}
