// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输出系统 (Video Output System)
///
/// - FfmpegSink: ffmpeg 子进程编码 (mp4v → XVID 回退)
/// - MemorySink: 收集到内存 (测试/嵌入)
pub mod encoder;

pub use encoder::{encoder_listed, select_codec, Codec, FfmpegSink, CODECS};

use image::RgbImage;

use crate::error::{PipelineError, PipelineResult};

/// 视频输出: 按顺序接收 `imgsz×imgsz` 三通道帧
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> PipelineResult<()>;

    /// 刷新并关闭输出, 重复调用无副作用
    fn finish(&mut self) -> PipelineResult<()>;
}

impl<S: VideoSink + ?Sized> VideoSink for Box<S> {
    fn write_frame(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> PipelineResult<()> {
        (**self).finish()
    }
}

/// 内存输出
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<RgbImage>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        if self.finished {
            return Err(PipelineError::SinkWrite {
                index: self.frames.len() as u64,
                reason: "sink already finished".to_string(),
            });
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.finished = true;
        Ok(())
    }
}
