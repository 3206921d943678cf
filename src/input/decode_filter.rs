// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg 进程内解码 (ez-ffmpeg 帧过滤器 → crossbeam 通道)
/// In-process FFmpeg decoding through an ez-ffmpeg frame filter
use crossbeam_channel::{Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use std::path::Path;

use super::probe::probe_video;
use super::{VideoInfo, VideoSource};
use crate::error::{PipelineError, PipelineResult};

/// 解码线程 → 主循环
enum Decoded {
    Frame(RgbImage),
    Failed(String),
}

/// FFmpeg解码过滤器: 视频帧 → RGB 帧
pub struct DecodeFilter {
    tx: Sender<Decoded>,
    pub total_frames: usize,
    pub dropped_frames: usize,
}

impl DecodeFilter {
    fn new(tx: Sender<Decoded>) -> Self {
        Self {
            tx,
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    /// 空帧/损坏帧以 0x0 图像上报, 由管线计数后跳过
    fn send_empty(&mut self, why: &str) -> Result<(), String> {
        self.dropped_frames += 1;
        log::debug!("dropped frame #{}: {}", self.total_frames, why);
        self.tx
            .send(Decoded::Frame(RgbImage::new(0, 0)))
            .map_err(|_| "receiver closed".to_string())
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("decode filter started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        unsafe {
            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.send_empty("empty or corrupt")?;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 {
                self.send_empty("zero size")?;
                return Ok(None);
            }

            // YUV420P数据指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.send_empty("null plane")?;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.send_empty("bad stride")?;
                return Ok(None);
            }

            let mut rgb = RgbImage::new(w, h);
            yuv420p_to_rgb_scalar(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut rgb,
                w as usize,
                h as usize,
            );

            // 通道有界, 主循环处理不过来时在此阻塞
            self.tx
                .send(Decoded::Frame(rgb))
                .map_err(|_| "receiver closed".to_string())?;
        }

        Ok(None)
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!(
            "decode filter finished: {} frames, {} dropped",
            self.total_frames,
            self.dropped_frames
        );
    }
}

/// 标量版本YUV转换 (BT.601)
#[allow(clippy::too_many_arguments)]
#[inline]
unsafe fn yuv420p_to_rgb_scalar(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    out: &mut RgbImage,
    width: usize,
    height: usize,
) {
    let buffer: &mut [u8] = out;
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}

/// ez-ffmpeg 解码源
pub struct EzFfmpegSource {
    info: VideoInfo,
    rx: Receiver<Decoded>,
}

impl EzFfmpegSource {
    pub fn open(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::SourceOpen {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        let info = probe_video(path)?;

        let (tx, rx) = crossbeam_channel::bounded(4);
        let url = path.to_string_lossy().to_string();
        std::thread::Builder::new()
            .name("decode".to_string())
            .spawn(move || {
                if let Err(e) = run_decode(&url, tx.clone()) {
                    log::error!("decode failed: {}", e);
                    let _ = tx.send(Decoded::Failed(e));
                }
            })?;

        Ok(Self { info, rx })
    }
}

/// 解码线程主体
fn run_decode(url: &str, tx: Sender<Decoded>) -> Result<(), String> {
    let filter = DecodeFilter::new(tx);
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_descs(["format=yuv420p"].into())
        .output(out)
        .build()
        .map_err(|e| format!("build failed: {}", e))?;

    let sch = ctx.start().map_err(|e| format!("start failed: {}", e))?;
    sch.wait().map_err(|e| format!("decode aborted: {}", e))
}

impl VideoSource for EzFfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        match self.rx.recv() {
            Ok(Decoded::Frame(frame)) => Ok(Some(frame)),
            Ok(Decoded::Failed(e)) => Err(PipelineError::SourceRead(e)),
            // 解码线程退出且通道已空
            Err(_) => Ok(None),
        }
    }
}
