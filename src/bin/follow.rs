// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 目标居中跟随 (Follow)
///
/// 读取视频, 逐帧检测并跟踪指定类别中面积最大的目标,
/// 输出以目标为中心、边长为 imgsz 的正方形视频。
///
/// Ctrl-C 会在下一帧之前停止, 已写出的部分仍然是完整的视频文件。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use yolov8_follow::config::{Args, DecoderBackend, TrackerConfig};
use yolov8_follow::detection::types::INF_SIZE;
use yolov8_follow::detection::{ByteTrackParams, Detector, TrackerType};
use yolov8_follow::input::{FfmpegSource, VideoSource};
use yolov8_follow::models::YOLOv8;
use yolov8_follow::output::FfmpegSink;
use yolov8_follow::{FramePipeline, OverlayRenderer};

fn open_source(args: &Args) -> Result<Box<dyn VideoSource>> {
    match args.decoder {
        DecoderBackend::Cli => Ok(Box::new(FfmpegSource::open(&args.input)?)),
        #[cfg(feature = "ffmpeg-lib")]
        DecoderBackend::Lib => Ok(Box::new(yolov8_follow::input::EzFfmpegSource::open(
            &args.input,
        )?)),
        #[cfg(not(feature = "ffmpeg-lib"))]
        DecoderBackend::Lib => bail!("--decoder lib requires building with the `ffmpeg-lib` feature"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    args.validate()?;

    // 1. 配置
    let cfg = match &args.config {
        Some(path) => TrackerConfig::load(path),
        None => TrackerConfig::default(),
    };
    cfg.log_summary();

    // 2. 模型
    let model_path = args
        .model
        .to_str()
        .context("model path is not valid UTF-8")?;
    let model = YOLOv8::new(model_path, INF_SIZE)?;
    let tracker = TrackerType::from_name(&cfg.tracker, ByteTrackParams::from(&cfg));
    let detector = Detector::new(model, tracker);

    // 3. 输入/输出
    let mut source = open_source(&args)?;
    let info = source.info().clone();
    let mut sink = FfmpegSink::create(&args.output, args.imgsz, info.fps)?;

    // 4. Ctrl-C → 取消标志
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, stopping after current frame");
        flag.store(true, Ordering::Relaxed);
    })
    .context("error setting Ctrl-C handler")?;

    // 5. 进度条
    let bar = match info.frame_count {
        Some(total) => {
            let bar = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar
        }
        None => ProgressBar::new_spinner(),
    };
    let progress_bar = bar.clone();

    let renderer = OverlayRenderer::load(args.font.as_deref().and_then(|p| p.to_str()), &cfg);
    let mut pipeline = FramePipeline::new(detector, args.detection_params(), args.imgsz, renderer)
        .with_cancel(cancel)
        .with_progress(
            args.progress_every,
            Some(Box::new(move |done: u64, _total: Option<u64>| {
                progress_bar.set_position(done)
            })),
        );

    let summary = pipeline.run(&mut source, &mut sink);
    bar.finish_and_clear();
    let summary = summary?;

    if summary.frames_emitted == 0 {
        log::warn!("no frames were written to {}", args.output.display());
    }
    log::info!(
        "done, {} frames ({}) saved to {}",
        sink.frames_written(),
        sink.codec().fourcc,
        args.output.display()
    );
    Ok(())
}
