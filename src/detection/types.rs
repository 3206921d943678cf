// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测系统数据结构定义
//! Data structures for the detection system

// ========== 公共常量 ==========

/// YOLOv8推理输入尺寸
pub const INF_SIZE: u32 = 640;

// ========== 数据结构 ==========

/// 浮点检测框 (模型输出坐标, 原图像素)
/// Floating point box straight out of the model head
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// 截断为整数像素检测 (退化框返回 None)
    pub fn to_detection(&self, track_id: Option<u32>) -> Option<Detection> {
        let x1 = self.x1 as i32;
        let y1 = self.y1 as i32;
        let x2 = self.x2 as i32;
        let y2 = self.y2 as i32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Detection {
            bbox: (x1, y1, x2, y2),
            track_id,
            confidence: self.confidence,
            class_id: self.class_id,
        })
    }
}

/// 检测结果 (Detection, 原图整数像素坐标)
///
/// `bbox` 为 `(x1, y1, x2, y2)`, 适配器保证 `x2 > x1` 且 `y2 > y1`。
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: (i32, i32, i32, i32),
    /// 跟踪ID (跟踪器未绑定时为 None)
    pub track_id: Option<u32>,
    pub confidence: f32,
    pub class_id: u32,
}

impl Detection {
    pub fn new(bbox: (i32, i32, i32, i32), track_id: Option<u32>, confidence: f32) -> Self {
        Self {
            bbox,
            track_id,
            confidence,
            class_id: 0,
        }
    }

    pub fn width(&self) -> i32 {
        self.bbox.2 - self.bbox.0
    }

    pub fn height(&self) -> i32 {
        self.bbox.3 - self.bbox.1
    }

    /// 面积 (i64 避免大框溢出)
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// 中心点 (整数截断)
    pub fn center(&self) -> (i32, i32) {
        let (x1, y1, x2, y2) = self.bbox;
        ((x1 + x2) / 2, (y1 + y2) / 2)
    }

    /// 裁剪到画面范围 `[0,w]×[0,h]`, 裁剪后退化则返回 None
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Detection> {
        let (x1, y1, x2, y2) = self.bbox;
        let w = width as i32;
        let h = height as i32;
        let bbox = (x1.clamp(0, w), y1.clamp(0, h), x2.clamp(0, w), y2.clamp(0, h));
        if bbox.2 <= bbox.0 || bbox.3 <= bbox.1 {
            return None;
        }
        Some(Detection { bbox, ..self.clone() })
    }
}

/// 每帧检测参数 (Detection parameters passed to the adapter)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    pub target_class_id: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            target_class_id: 0,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_truncates() {
        let d = Detection::new((10, 10, 15, 13), None, 0.9);
        assert_eq!(d.center(), (12, 11));
        assert_eq!(d.area(), 15);
    }

    #[test]
    fn clamp_drops_boxes_outside_frame() {
        let d = Detection::new((-20, -5, 30, 40), Some(3), 0.5);
        let c = d.clamp_to(20, 20).unwrap();
        assert_eq!(c.bbox, (0, 0, 20, 20));
        assert_eq!(c.track_id, Some(3));

        let outside = Detection::new((25, 0, 40, 10), None, 0.5);
        assert!(outside.clamp_to(20, 20).is_none());
    }

    #[test]
    fn float_box_truncates_to_pixels() {
        let b = BBox {
            x1: 1.9,
            y1: 2.2,
            x2: 10.7,
            y2: 2.9,
            confidence: 0.4,
            class_id: 0,
        };
        // y2 截断后等于 y1, 退化
        assert!(b.to_detection(None).is_none());

        let b = BBox { y2: 8.5, ..b };
        let d = b.to_detection(Some(1)).unwrap();
        assert_eq!(d.bbox, (1, 2, 10, 8));
    }
}
