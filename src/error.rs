// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 错误类型 (Error types)
//!
//! 只有导致整次运行中止的情况才是错误; 单帧的检测缺失、窗口越界、
//! 尺寸不符都以 `FrameOutcome` 的形式返回。

use std::path::PathBuf;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot open video source {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    #[error("video source reports invalid frame rate: {0}")]
    InvalidFrameRate(String),

    #[error("video source reports invalid frame size {width}x{height}")]
    InvalidFrameSize { width: u32, height: u32 },

    #[error("cannot open video sink {path}: no usable codec (tried {tried})")]
    SinkOpen { path: PathBuf, tried: String },

    #[error("failed to write frame {index}: {reason}")]
    SinkWrite { index: u64, reason: String },

    #[error("video source failed mid-stream: {0}")]
    SourceRead(String),

    #[error("ffprobe failed: {0}")]
    Probe(String),

    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
