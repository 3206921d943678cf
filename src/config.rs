// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 配置 (Configuration)
//!
//! - `Args`: 命令行参数 (clap)
//! - `TrackerConfig`: 跟踪与绘制参数, 通过JSON文件调整

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::DetectionParams;
use crate::error::{PipelineError, PipelineResult};

/// 目标居中跟随参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "目标居中跟随 - 检测并跟踪单个目标, 输出以其为中心的固定尺寸视频", long_about = None)]
pub struct Args {
    /// ONNX 检测模型路径
    #[arg(short, long)]
    pub model: PathBuf,

    /// 输入视频路径
    #[arg(short, long)]
    pub input: PathBuf,

    /// 输出视频路径 (目录不存在时自动创建)
    #[arg(short, long)]
    pub output: PathBuf,

    /// 跟随的目标类别ID
    #[arg(long = "class-id", default_value_t = 0)]
    pub target_class_id: u32,

    /// 输出画面边长 (正方形)
    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,

    /// 检测置信度阈值
    #[arg(long = "conf", default_value_t = 0.25)]
    pub confidence_threshold: f32,

    /// NMS IOU阈值
    #[arg(long = "iou", default_value_t = 0.7)]
    pub iou_threshold: f32,

    /// 跟踪器配置JSON (不存在时写出默认配置)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 每处理多少帧输出一次进度日志
    #[arg(long, default_value_t = 100)]
    pub progress_every: u64,

    /// 解码后端
    #[arg(long, value_enum, default_value_t = DecoderBackend::Cli)]
    pub decoder: DecoderBackend,
}

/// 解码后端
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderBackend {
    /// ffmpeg 子进程
    Cli,
    /// ez-ffmpeg 进程内解码 (需要 ffmpeg-lib 特性)
    Lib,
}

/// 输出边长上限, 保证裁剪坐标在 i32 内不溢出
pub const MAX_IMGSZ: u32 = 8192;

impl Args {
    /// 检查参数合法性 (在打开任何文件之前)
    pub fn validate(&self) -> PipelineResult<()> {
        if self.imgsz == 0 || self.imgsz > MAX_IMGSZ {
            return Err(PipelineError::Config(format!(
                "imgsz must be within [1, {}], got {}",
                MAX_IMGSZ, self.imgsz
            )));
        }
        for (name, v) in [
            ("conf", self.confidence_threshold),
            ("iou", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(PipelineError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )));
            }
        }
        if self.progress_every == 0 {
            return Err(PipelineError::Config(
                "progress-every must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            target_class_id: self.target_class_id,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
        }
    }
}

/// 跟踪器与绘制参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // === 跟踪器 ===
    pub tracker: String, // bytetrack / none

    // === ByteTrack参数 ===
    pub bytetrack_max_lost_frames: u32,      // 最大丢失帧数
    pub bytetrack_high_score_threshold: f32, // 高分阈值
    pub bytetrack_low_score_threshold: f32,  // 低分阈值
    pub bytetrack_new_track_threshold: f32,  // 新建轨迹阈值
    pub bytetrack_high_iou_threshold: f32,   // 高分IOU阈值
    pub bytetrack_low_iou_threshold: f32,    // 低分IOU阈值

    // === 绘制参数 ===
    pub label_font_size: f32, // 标签字号(像素)
    pub box_thickness: u32,   // 框线宽
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracker: "bytetrack".to_string(),

            // ByteTrack
            bytetrack_max_lost_frames: 30,
            bytetrack_high_score_threshold: 0.25,
            bytetrack_low_score_threshold: 0.1,
            bytetrack_new_track_threshold: 0.25,
            bytetrack_high_iou_threshold: 0.2,
            bytetrack_low_iou_threshold: 0.5,

            // 绘制
            label_font_size: 24.0,
            box_thickness: 2,
        }
    }
}

impl TrackerConfig {
    /// 从JSON文件加载配置; 不存在时写出默认配置, 解析失败时使用默认值
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "failed to parse config {}: {}, using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("config {} not found, writing defaults", path.display());
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::error!("failed to save config: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("config saved to {}", path.display());
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!(
            "tracker: {} | max lost {} | high {:.2} low {:.2} new {:.2} | iou {:.2}/{:.2}",
            self.tracker,
            self.bytetrack_max_lost_frames,
            self.bytetrack_high_score_threshold,
            self.bytetrack_low_score_threshold,
            self.bytetrack_new_track_threshold,
            self.bytetrack_high_iou_threshold,
            self.bytetrack_low_iou_threshold
        );
        log::info!(
            "overlay: font {:.0}px | thickness {}",
            self.label_font_size,
            self.box_thickness
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["follow", "-m", "m.onnx", "-i", "in.mp4", "-o", "out/o.mp4"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_match_documented_values() {
        let a = args(&[]);
        assert_eq!(a.target_class_id, 0);
        assert_eq!(a.imgsz, 640);
        assert_eq!(a.confidence_threshold, 0.25);
        assert_eq!(a.iou_threshold, 0.7);
        assert_eq!(a.progress_every, 100);
        assert_eq!(a.decoder, DecoderBackend::Cli);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(args(&["--imgsz", "0"]).validate().is_err());
        assert!(args(&["--imgsz", "3000000000"]).validate().is_err());
        assert!(args(&["--imgsz", "8192"]).validate().is_ok());
        assert!(args(&["--conf", "1.5"]).validate().is_err());
        assert!(args(&["--iou=-0.1"]).validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: TrackerConfig = serde_json::from_str(r#"{"box_thickness": 4}"#).unwrap();
        assert_eq!(cfg.box_thickness, 4);
        assert_eq!(cfg.tracker, "bytetrack");
    }
}
