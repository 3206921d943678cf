// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 目标选择 (Target selector)

use crate::detection::Detection;

/// 选出面积最大的检测框; 面积相同取最先出现者, 空集返回 None
pub fn select_target(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for det in detections {
        match best {
            Some(b) if det.area() <= b.area() => {}
            _ => best = Some(det),
        }
    }
    best
}
