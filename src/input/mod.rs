// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输入系统 (Video Input System)
///
/// - FfmpegSource:   ffmpeg 子进程解码 (默认)
/// - EzFfmpegSource: ez-ffmpeg 进程内解码 (`ffmpeg-lib` 特性)
/// - MemorySource:   内存帧序列 (测试/嵌入)
pub mod decoder;
pub mod probe;

#[cfg(feature = "ffmpeg-lib")]
pub mod decode_filter;

pub use decoder::FfmpegSource;
pub use probe::{parse_frame_rate, probe_video};

#[cfg(feature = "ffmpeg-lib")]
pub use decode_filter::EzFfmpegSource;

use image::RgbImage;
use std::collections::VecDeque;

use crate::error::{PipelineError, PipelineResult};

/// 视频元数据
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 容器上报的总帧数 (未知时为 None)
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    /// 帧率必须为正的有限值
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(PipelineError::InvalidFrameRate(self.fps.to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidFrameSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// 视频源: 元数据 + 顺序取帧
///
/// `next_frame` 返回 `Ok(None)` 表示流结束; 返回 `Err` 表示中途读取失败。
pub trait VideoSource {
    fn info(&self) -> &VideoInfo;

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn info(&self) -> &VideoInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        (**self).next_frame()
    }
}

/// 内存帧序列
pub struct MemorySource {
    info: VideoInfo,
    frames: VecDeque<RgbImage>,
    /// 读到第 n 帧时返回错误
    fail_at: Option<usize>,
    served: usize,
}

impl MemorySource {
    pub fn new(info: VideoInfo, frames: Vec<RgbImage>) -> Self {
        Self {
            info,
            frames: frames.into(),
            fail_at: None,
            served: 0,
        }
    }

    /// 以第一帧尺寸推导元数据
    pub fn from_frames(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let info = VideoInfo {
            width,
            height,
            fps,
            frame_count: Some(frames.len() as u64),
        };
        Self::new(info, frames)
    }

    /// 在读取第 `index` 帧 (从 0 计) 时模拟读取失败
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl VideoSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        if self.fail_at == Some(self.served) {
            return Err(PipelineError::SourceRead(format!(
                "simulated read failure at frame {}",
                self.served
            )));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.served += 1;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_serves_in_order_then_ends() {
        let frames = vec![
            RgbImage::from_pixel(4, 2, image::Rgb([1, 1, 1])),
            RgbImage::from_pixel(4, 2, image::Rgb([2, 2, 2])),
        ];
        let mut src = MemorySource::from_frames(frames, 30.0);
        assert_eq!(src.info().frame_count, Some(2));
        assert_eq!(src.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(src.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn invalid_frame_rate_rejected() {
        let info = VideoInfo {
            width: 10,
            height: 10,
            fps: 0.0,
            frame_count: None,
        };
        assert!(matches!(info.validate(), Err(PipelineError::InvalidFrameRate(_))));
        let info = VideoInfo {
            fps: f64::NAN,
            ..info
        };
        assert!(info.validate().is_err());
    }
}
