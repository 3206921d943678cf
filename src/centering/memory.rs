// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 位置记忆 (Position memory)
//!
//! 记住最后一次选中目标的中心与尺寸, 检测缺失的帧沿用该位置。
//! 不做滤波与外推。

use crate::detection::Detection;

/// 目标状态 (原图整数像素)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetState {
    pub center: (i32, i32),
    pub bbox_size: (i32, i32),
}

impl TargetState {
    pub fn from_detection(det: &Detection) -> Self {
        Self {
            center: det.center(),
            bbox_size: (det.width(), det.height()),
        }
    }
}

/// 最后已知位置, 一次运行内由管线独占
#[derive(Clone, Debug, Default)]
pub struct PositionMemory {
    state: Option<TargetState>,
}

impl PositionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 有选中目标时覆盖, 否则保持不变
    pub fn update(&mut self, selected: Option<&Detection>) {
        if let Some(det) = selected {
            self.state = Some(TargetState::from_detection(det));
        }
    }

    /// 首次选中之前返回 None
    pub fn read(&self) -> Option<TargetState> {
        self.state
    }

    pub fn is_set(&self) -> bool {
        self.state.is_some()
    }
}
