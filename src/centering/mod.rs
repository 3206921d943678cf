// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 目标居中 (Subject centering)
///
/// - Selector:   从当前帧检测集中选出唯一跟随目标
/// - Memory:     最后已知位置, 跨帧保持
/// - Compositor: 源窗口/粘贴偏移计算与黑边合成
pub mod compositor;
pub mod memory;
pub mod selector;

pub use compositor::{black_canvas, compose, Composite, CropPlan};
pub use memory::{PositionMemory, TargetState};
pub use selector::select_target;
