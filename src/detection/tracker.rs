// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 多目标跟踪公共组件
//! Common components for multi-object tracking

use super::types::BBox;

// ========== 公共数据结构 ==========

/// 跟踪对象 (单条轨迹)
#[derive(Clone, Debug)]
pub struct TrackedObject {
    /// 唯一跟踪ID
    pub id: u32,

    /// 最近一次匹配到的边界框
    pub bbox: BBox,

    /// 中心点速度 (像素/帧)
    velocity: (f32, f32),

    /// 连续丢失帧数
    pub frames_lost: u32,
}

impl TrackedObject {
    pub fn new(id: u32, bbox: BBox) -> Self {
        Self {
            id,
            bbox,
            velocity: (0.0, 0.0),
            frames_lost: 0,
        }
    }

    /// 获取中心点
    pub fn center(&self) -> (f32, f32) {
        let cx = (self.bbox.x1 + self.bbox.x2) / 2.0;
        let cy = (self.bbox.y1 + self.bbox.y2) / 2.0;
        (cx, cy)
    }

    /// 匹配成功: 更新框与速度
    pub fn update(&mut self, bbox: BBox) {
        let (cx0, cy0) = self.center();
        let cx1 = (bbox.x1 + bbox.x2) / 2.0;
        let cy1 = (bbox.y1 + bbox.y2) / 2.0;
        // 丢失期间的位移平均到每一帧
        let steps = (self.frames_lost + 1) as f32;
        self.velocity = ((cx1 - cx0) / steps, (cy1 - cy0) / steps);
        self.bbox = bbox;
        self.frames_lost = 0;
    }

    pub fn mark_lost(&mut self) {
        self.frames_lost += 1;
    }

    /// 匀速模型预测的下一帧框
    pub fn predicted_bbox(&self) -> BBox {
        let steps = (self.frames_lost + 1) as f32;
        let dx = self.velocity.0 * steps;
        let dy = self.velocity.1 * steps;
        BBox {
            x1: self.bbox.x1 + dx,
            y1: self.bbox.y1 + dy,
            x2: self.bbox.x2 + dx,
            y2: self.bbox.y2 + dy,
            ..self.bbox.clone()
        }
    }
}

// ========== 工具函数 ==========

/// 计算两个框的 IOU
pub fn compute_iou(bbox1: &BBox, bbox2: &BBox) -> f32 {
    let x1 = bbox1.x1.max(bbox2.x1);
    let y1 = bbox1.y1.max(bbox2.y1);
    let x2 = bbox1.x2.min(bbox2.x2);
    let y2 = bbox1.y2.min(bbox2.y2);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = bbox1.area() + bbox2.area() - intersection;

    if union <= 0.0 {
        return 0.0;
    }

    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox {
            x1,
            y1,
            x2,
            y2,
            confidence: 0.9,
            class_id: 0,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(compute_iou(&a, &bbox(20.0, 20.0, 30.0, 30.0)), 0.0);
        // 一半重叠: 50 / 150
        let half = bbox(5.0, 0.0, 15.0, 10.0);
        assert!((compute_iou(&a, &half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn prediction_follows_velocity() {
        let mut t = TrackedObject::new(1, bbox(0.0, 0.0, 10.0, 10.0));
        t.update(bbox(4.0, 2.0, 14.0, 12.0));
        let p = t.predicted_bbox();
        assert_eq!((p.x1, p.y1), (8.0, 4.0));

        t.mark_lost();
        let p = t.predicted_bbox();
        assert_eq!((p.x1, p.y1), (12.0, 6.0));
    }
}
