// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 叠加绘制 (Overlay renderer)
//!
//! 把当前帧选中目标的框与跟踪ID画到输出画布上 (画布坐标)。

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::centering::CropPlan;
use crate::config::TrackerConfig;
use crate::detection::Detection;

/// 框与标签颜色
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// 常见系统字体路径 (未配置字体时依次尝试)
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// 原图框 → 画布框, 裁剪到 `[0, imgsz-1]`, 退化返回 None
pub fn project_box(det: &Detection, plan: &CropPlan) -> Option<(i32, i32, i32, i32)> {
    let max = plan.imgsz as i32 - 1;
    if max < 0 {
        return None;
    }
    let (x1, y1, x2, y2) = det.bbox;
    let (ox1, oy1) = plan.to_canvas(x1, y1);
    let (ox2, oy2) = plan.to_canvas(x2, y2);

    let bbox = (
        ox1.clamp(0, max),
        oy1.clamp(0, max),
        ox2.clamp(0, max),
        oy2.clamp(0, max),
    );
    if bbox.2 <= bbox.0 || bbox.3 <= bbox.1 {
        return None;
    }
    Some(bbox)
}

/// 标签文字
pub fn label_text(track_id: Option<u32>) -> String {
    match track_id {
        Some(id) => format!("ID: {}", id),
        None => "No ID".to_string(),
    }
}

/// 标签基线位置 (框左上角上方 10 像素, 最低 10)
pub fn label_anchor(x1: i32, y1: i32) -> (i32, i32) {
    (x1, (y1 - 10).max(10))
}

/// 叠加绘制器
pub struct OverlayRenderer {
    font: Option<FontVec>,
    scale: PxScale,
    thickness: u32,
    color: Rgb<u8>,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>, font_size: f32, thickness: u32) -> Self {
        Self {
            font,
            scale: PxScale::from(font_size),
            thickness: thickness.max(1),
            color: GREEN,
        }
    }

    /// 加载字体: 指定路径优先, 其次系统字体; 都失败时只画框
    pub fn load(font_path: Option<&str>, cfg: &TrackerConfig) -> Self {
        let candidates = font_path.into_iter().chain(SYSTEM_FONTS);
        let mut font = None;
        for path in candidates {
            match std::fs::read(path) {
                Ok(bytes) => match FontVec::try_from_vec(bytes) {
                    Ok(f) => {
                        log::debug!("label font: {}", path);
                        font = Some(f);
                        break;
                    }
                    Err(e) => log::warn!("invalid font {}: {}", path, e),
                },
                Err(_) => continue,
            }
        }
        if font.is_none() {
            log::warn!("no usable font found, labels will not be drawn");
        }
        Self::new(font, cfg.label_font_size, cfg.box_thickness)
    }

    /// 绘制一个检测; 框完全落在画布外时不绘制, 返回是否绘制
    pub fn draw(&self, canvas: &mut RgbImage, det: &Detection, plan: &CropPlan) -> bool {
        let Some((x1, y1, x2, y2)) = project_box(det, plan) else {
            return false;
        };

        // 向内逐层描边模拟线宽
        for i in 0..self.thickness as i32 {
            let w = x2 - x1 + 1 - 2 * i;
            let h = y2 - y1 + 1 - 2 * i;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + i, y1 + i).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, self.color);
        }

        if let Some(font) = &self.font {
            let text = label_text(det.track_id);
            let (_, text_h) = text_size(self.scale, font, &text);
            let (lx, baseline) = label_anchor(x1, y1);
            let top = (baseline - text_h as i32).max(0);
            draw_text_mut(canvas, self.color, lx, top, self.scale, font, &text);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_placeholder_without_id() {
        assert_eq!(label_text(Some(12)), "ID: 12");
        assert_eq!(label_text(None), "No ID");
    }

    #[test]
    fn label_anchor_never_above_ten() {
        assert_eq!(label_anchor(5, 100), (5, 90));
        assert_eq!(label_anchor(5, 12), (5, 10));
        assert_eq!(label_anchor(5, 0), (5, 10));
    }

    #[test]
    fn project_translates_and_clamps() {
        let plan = CropPlan::compute((100, 100), 640, 480, 640);
        let det = Detection::new((50, 60, 150, 140), Some(1), 0.9);
        assert_eq!(project_box(&det, &plan), Some((270, 280, 370, 360)));

        // 右下越界被裁剪到 imgsz-1
        let plan = CropPlan::compute((320, 240), 640, 480, 100);
        let det = Detection::new((300, 200, 400, 300), None, 0.9);
        assert_eq!(project_box(&det, &plan), Some((30, 10, 99, 99)));
    }

    #[test]
    fn box_outside_canvas_draws_nothing() {
        let plan = CropPlan::compute((320, 240), 640, 480, 100);
        let det = Detection::new((0, 0, 40, 40), Some(3), 0.9);
        assert!(project_box(&det, &plan).is_none());

        let renderer = OverlayRenderer::new(None, 24.0, 2);
        let mut canvas = RgbImage::new(100, 100);
        assert!(!renderer.draw(&mut canvas, &det, &plan));
        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn draws_green_rectangle_with_thickness() {
        let plan = CropPlan::compute((50, 50), 100, 100, 100);
        let det = Detection::new((20, 20, 60, 60), None, 0.9);
        let renderer = OverlayRenderer::new(None, 24.0, 2);
        let mut canvas = RgbImage::new(100, 100);
        assert!(renderer.draw(&mut canvas, &det, &plan));
        assert_eq!(*canvas.get_pixel(20, 40), GREEN);
        assert_eq!(*canvas.get_pixel(21, 40), GREEN);
        assert_eq!(*canvas.get_pixel(22, 40), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(60, 60), GREEN);
    }
}
