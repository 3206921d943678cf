// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 逐帧处理管线 (Frame Pipeline Driver)
///
/// 单线程顺序处理, 每帧:
/// 读取 → 检测 → 选择 → 记忆 → 裁剪合成 → 叠加绘制 → 写出
///
/// - 检测失败按"无检测"处理并记录
/// - 从未见过目标时输出全黑画布
/// - 只在本帧选中目标时绘制框与ID
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;

use crate::centering::{black_canvas, compose, select_target, Composite, CropPlan, PositionMemory};
use crate::detection::{DetectAndTrack, Detection, DetectionParams};
use crate::error::PipelineResult;
use crate::input::{VideoInfo, VideoSource};
use crate::output::VideoSink;
use crate::renderer::OverlayRenderer;

/// 单帧结果分类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 尚未见过目标, 输出全黑
    Unseen,
    /// 本帧选中目标并完成裁剪
    Tracked,
    /// 本帧无目标, 沿用最后位置裁剪
    Held,
    /// 裁剪窗口与画面无交集, 输出全黑
    OutOfFrame,
    /// 裁出尺寸与预期不符, 输出全黑
    SizeMismatch,
}

/// 单帧处理报告
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    /// 适配器返回 (裁剪到画面后) 的检测数
    pub detections: usize,
    /// 本帧选中的目标
    pub selected: Option<Detection>,
    /// 本帧使用的裁剪方案 (Unseen 时为 None)
    pub plan: Option<CropPlan>,
    pub drawn: bool,
    pub detector_error: bool,
}

/// 整次运行统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_emitted: u64,
    /// 空帧 (0 尺寸) 跳过数, 不产生输出
    pub skipped_empty: u64,
    pub tracked: u64,
    pub held: u64,
    pub unseen: u64,
    pub out_of_frame: u64,
    pub size_mismatch: u64,
    pub detector_errors: u64,
    pub cancelled: bool,
    /// 中途读取失败的原因 (运行按结束处理)
    pub source_error: Option<String>,
    /// 检测器统计 (帧率, 跟踪)
    pub detector_stats: Option<String>,
}

impl RunSummary {
    fn record(&mut self, report: &FrameReport) {
        match report.outcome {
            FrameOutcome::Unseen => self.unseen += 1,
            FrameOutcome::Tracked => self.tracked += 1,
            FrameOutcome::Held => self.held += 1,
            FrameOutcome::OutOfFrame => self.out_of_frame += 1,
            FrameOutcome::SizeMismatch => self.size_mismatch += 1,
        }
        if report.detector_error {
            self.detector_errors += 1;
        }
    }

    pub fn log(&self) {
        log::info!(
            "frames read {} | emitted {} | skipped empty {}",
            self.frames_read,
            self.frames_emitted,
            self.skipped_empty
        );
        log::info!(
            "tracked {} | held {} | unseen {} | out of frame {} | size mismatch {} | detector errors {}",
            self.tracked,
            self.held,
            self.unseen,
            self.out_of_frame,
            self.size_mismatch,
            self.detector_errors
        );
        if self.cancelled {
            log::warn!("run cancelled before end of stream");
        }
        if let Some(stats) = &self.detector_stats {
            log::info!("detector: {}", stats);
        }
        if let Some(e) = &self.source_error {
            log::warn!("source stopped early: {}", e);
        }
    }
}

/// 进度回调: (已处理帧数, 总帧数)
pub type ProgressFn = Box<dyn FnMut(u64, Option<u64>)>;

/// 逐帧管线
pub struct FramePipeline<D> {
    detector: D,
    params: DetectionParams,
    imgsz: u32,
    renderer: OverlayRenderer,
    memory: PositionMemory,
    cancel: Option<Arc<AtomicBool>>,
    progress_every: u64,
    progress: Option<ProgressFn>,
}

impl<D: DetectAndTrack> FramePipeline<D> {
    pub fn new(detector: D, params: DetectionParams, imgsz: u32, renderer: OverlayRenderer) -> Self {
        Self {
            detector,
            params,
            imgsz,
            renderer,
            memory: PositionMemory::new(),
            cancel: None,
            progress_every: 100,
            progress: None,
        }
    }

    /// 取消标志: 每次取帧前检查
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, every: u64, callback: Option<ProgressFn>) -> Self {
        self.progress_every = every.max(1);
        self.progress = callback;
        self
    }

    pub fn memory(&self) -> &PositionMemory {
        &self.memory
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// 处理整条视频流
    ///
    /// 源元数据非法、写出失败为致命错误; 中途读取失败按流结束处理。
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> PipelineResult<RunSummary>
    where
        S: VideoSource + ?Sized,
        K: VideoSink + ?Sized,
    {
        let info = source.info().clone();
        info.validate()?;
        self.memory = PositionMemory::new();

        log::info!(
            "following class {} with {} (conf {:.2}, iou {:.2}) → {}x{}",
            self.params.target_class_id,
            self.detector.name(),
            self.params.confidence_threshold,
            self.params.iou_threshold,
            self.imgsz,
            self.imgsz
        );

        let mut summary = RunSummary::default();
        loop {
            if self.cancelled() {
                summary.cancelled = true;
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream after {} frames", summary.frames_read);
                    break;
                }
                Err(e) => {
                    log::error!("read failed at frame {}: {}", summary.frames_read + 1, e);
                    summary.source_error = Some(e.to_string());
                    break;
                }
            };
            summary.frames_read += 1;

            if frame.width() == 0 || frame.height() == 0 {
                log::debug!("frame {}: empty payload, skipped", summary.frames_read);
                summary.skipped_empty += 1;
                continue;
            }

            let (canvas, report) = self.process_frame(&frame, &info);
            summary.record(&report);
            sink.write_frame(&canvas)?;
            summary.frames_emitted += 1;

            if summary.frames_read % self.progress_every == 0 {
                match info.frame_count {
                    Some(total) => log::info!("processed {}/{} frames", summary.frames_read, total),
                    None => log::info!("processed {} frames", summary.frames_read),
                }
            }
            if let Some(cb) = self.progress.as_mut() {
                cb(summary.frames_read, info.frame_count);
            }
        }

        sink.finish()?;
        summary.detector_stats = self.detector.stats();
        summary.log();
        Ok(summary)
    }

    /// 处理单帧, 返回输出画布与报告
    ///
    /// 裁剪方案基于 `info` 上报的画面尺寸。
    pub fn process_frame(&mut self, frame: &RgbImage, info: &VideoInfo) -> (RgbImage, FrameReport) {
        let (fw, fh) = frame.dimensions();

        // 1. 检测 + 跟踪
        let mut detector_error = false;
        let detections: Vec<Detection> = match self.detector.detect_and_track(frame, &self.params) {
            Ok(dets) => dets.iter().filter_map(|d| d.clamp_to(fw, fh)).collect(),
            Err(e) => {
                log::warn!("detector failed, treating frame as empty: {:#}", e);
                detector_error = true;
                Vec::new()
            }
        };

        // 2. 选择目标 + 更新记忆
        let selected = select_target(&detections).cloned();
        if let Some(det) = &selected {
            log::debug!(
                "selected {:?} area {} id {:?} of {} detections",
                det.bbox,
                det.area(),
                det.track_id,
                detections.len()
            );
        }
        self.memory.update(selected.as_ref());

        let mut report = FrameReport {
            outcome: FrameOutcome::Unseen,
            detections: detections.len(),
            selected,
            plan: None,
            drawn: false,
            detector_error,
        };

        // 3. 从未见过目标: 全黑
        let Some(state) = self.memory.read() else {
            log::debug!("target not seen yet, writing black frame");
            return (black_canvas(self.imgsz), report);
        };

        // 4. 裁剪合成
        let plan = CropPlan::compute(state.center, info.width, info.height, self.imgsz);
        let (mut canvas, composite) = compose(frame, &plan);
        report.plan = Some(plan);
        report.outcome = match composite {
            Composite::Copied if report.selected.is_some() => FrameOutcome::Tracked,
            Composite::Copied => FrameOutcome::Held,
            Composite::OutOfFrame => {
                log::debug!("crop window {:?} outside frame, writing black", plan.source_window);
                FrameOutcome::OutOfFrame
            }
            Composite::SizeMismatch { expected, actual } => {
                log::warn!(
                    "cropped region is {}x{}, expected {}x{}, writing black",
                    actual.0,
                    actual.1,
                    expected.0,
                    expected.1
                );
                FrameOutcome::SizeMismatch
            }
        };

        // 5. 只为本帧选中的目标绘制
        if let Some(det) = &report.selected {
            report.drawn = self.renderer.draw(&mut canvas, det, &plan);
        }

        (canvas, report)
    }
}
