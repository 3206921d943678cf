// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 目标居中跟随 (Subject-centering follow)
//!
//! 逐帧检测/跟踪单个目标, 并把它裁剪到固定尺寸画布的中心:
//! 读取 → 检测 → 选择 → 记忆 → 裁剪合成 → 叠加绘制 → 写出。
pub mod centering; // 目标选择 / 位置记忆 / 裁剪合成
pub mod config; // 命令行与 JSON 配置
pub mod detection; // 检测与跟踪适配器
pub mod error; // 错误类型
pub mod input; // 视频输入
pub mod models; // 模型实现
pub mod output; // 视频输出
pub mod pipeline; // 逐帧管线驱动
pub mod renderer; // 叠加绘制

pub use crate::centering::{select_target, CropPlan, PositionMemory, TargetState};
pub use crate::config::{Args, TrackerConfig};
pub use crate::detection::{DetectAndTrack, Detection, DetectionParams};
pub use crate::error::PipelineError;
pub use crate::pipeline::{FrameOutcome, FramePipeline, RunSummary};
pub use crate::renderer::OverlayRenderer;

use crate::detection::types::BBox;

/// 贪心 NMS: 按置信度降序, 丢弃与已保留框 IOU 超过阈值的框
pub fn non_max_suppression(xs: &mut Vec<BBox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = detection::tracker::compute_iou(&xs[prev_index], &xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
