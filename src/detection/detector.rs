// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测器 (Detector)
//! 职责: 单帧 → 框检测 → 跟踪ID绑定 → 整数像素 Detection 列表

use std::time::Instant;

use anyhow::Result;
use image::RgbImage;

use super::bytetrack::{ByteTrackParams, ByteTracker};
use super::types::{BBox, Detection, DetectionParams};

/// 检测+跟踪适配器接口
///
/// 返回的框必须在画面内且不退化 (`x2 > x1`, `y2 > y1`),
/// 并且已按目标类别与置信度/IOU阈值过滤。
pub trait DetectAndTrack {
    fn name(&self) -> &str {
        "detector"
    }

    fn detect_and_track(
        &mut self,
        frame: &RgbImage,
        params: &DetectionParams,
    ) -> Result<Vec<Detection>>;

    /// 运行统计, 结束时写入汇总
    fn stats(&self) -> Option<String> {
        None
    }
}

impl<T: DetectAndTrack + ?Sized> DetectAndTrack for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect_and_track(
        &mut self,
        frame: &RgbImage,
        params: &DetectionParams,
    ) -> Result<Vec<Detection>> {
        (**self).detect_and_track(frame, params)
    }

    fn stats(&self) -> Option<String> {
        (**self).stats()
    }
}

/// 纯框检测后端 (不带跟踪)
pub trait BoxDetector {
    fn detect(&mut self, frame: &RgbImage, params: &DetectionParams) -> Result<Vec<BBox>>;
}

#[cfg(feature = "onnx")]
impl BoxDetector for crate::models::YOLOv8 {
    fn detect(&mut self, frame: &RgbImage, params: &DetectionParams) -> Result<Vec<BBox>> {
        crate::models::YOLOv8::detect(self, frame, params)
    }
}

/// 跟踪器类型
pub enum TrackerType {
    ByteTrack(ByteTracker),
    None,
}

impl TrackerType {
    /// 根据名称创建跟踪器 (`bytetrack` / `none`)
    pub fn from_name(name: &str, params: ByteTrackParams) -> Self {
        match name.to_lowercase().as_str() {
            "none" | "off" => {
                log::info!("tracker: disabled");
                TrackerType::None
            }
            other => {
                if other != "bytetrack" {
                    log::warn!("unknown tracker `{}`, falling back to ByteTrack", other);
                }
                log::info!("tracker: ByteTrack");
                TrackerType::ByteTrack(ByteTracker::new(params))
            }
        }
    }
}

/// 检测器 = 框检测后端 + 跟踪器
pub struct Detector<B> {
    backend: B,
    tracker: TrackerType,

    // 统计
    count: u64,
    last: Instant,
    current_fps: f64,
    frames: u64,
    started: Instant,
}

impl<B: BoxDetector> Detector<B> {
    pub fn new(backend: B, tracker: TrackerType) -> Self {
        Self {
            backend,
            tracker,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            frames: 0,
            started: Instant::now(),
        }
    }

    /// 整次运行的平均检测帧率
    fn average_fps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.frames == 0 || elapsed <= 0.0 {
            0.0
        } else {
            self.frames as f64 / elapsed
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.current_fps = self.count as f64 / elapsed;
            log::debug!("detector: {:.1} fps", self.current_fps);
            self.count = 0;
            self.last = Instant::now();
        }
    }
}

impl<B: BoxDetector> DetectAndTrack for Detector<B> {
    fn name(&self) -> &str {
        match self.tracker {
            TrackerType::ByteTrack(_) => "detector+bytetrack",
            TrackerType::None => "detector",
        }
    }

    fn detect_and_track(
        &mut self,
        frame: &RgbImage,
        params: &DetectionParams,
    ) -> Result<Vec<Detection>> {
        let boxes = self.backend.detect(frame, params)?;
        self.tick();

        let ids = match &mut self.tracker {
            TrackerType::ByteTrack(tracker) => tracker.update(&boxes),
            TrackerType::None => vec![None; boxes.len()],
        };

        let (w, h) = frame.dimensions();
        Ok(boxes
            .iter()
            .zip(ids)
            .filter_map(|(b, id)| b.to_detection(id))
            .filter_map(|d| d.clamp_to(w, h))
            .collect())
    }

    fn stats(&self) -> Option<String> {
        let mut line = format!(
            "{} frames detected | {:.1} fps avg",
            self.frames,
            self.average_fps()
        );
        if let TrackerType::ByteTrack(tracker) = &self.tracker {
            line.push_str(" | ");
            line.push_str(&tracker.stats());
        }
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 按脚本逐帧返回框
    struct Scripted(Vec<Vec<BBox>>);

    impl BoxDetector for Scripted {
        fn detect(&mut self, _frame: &RgbImage, _params: &DetectionParams) -> Result<Vec<BBox>> {
            Ok(if self.0.is_empty() { Vec::new() } else { self.0.remove(0) })
        }
    }

    fn bbox(x1: f32, x2: f32, confidence: f32) -> BBox {
        BBox {
            x1,
            y1: 10.0,
            x2,
            y2: 60.0,
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn binds_stable_track_ids() {
        let backend = Scripted(vec![
            vec![bbox(10.0, 40.5, 0.9)],
            vec![bbox(12.0, 42.0, 0.9)],
        ]);
        let mut det = Detector::new(
            backend,
            TrackerType::from_name("bytetrack", ByteTrackParams::default()),
        );
        let frame = RgbImage::new(100, 100);
        let params = DetectionParams::default();

        let first = det.detect_and_track(&frame, &params).unwrap();
        assert_eq!(first[0].bbox, (10, 10, 40, 60));
        assert_eq!(first[0].track_id, Some(1));

        let second = det.detect_and_track(&frame, &params).unwrap();
        assert_eq!(second[0].track_id, Some(1));

        let stats = det.stats().unwrap();
        assert!(stats.starts_with("2 frames detected"));
        assert!(stats.ends_with("tracks: 1 | ids issued: 1"));
    }

    #[test]
    fn without_tracker_ids_are_none_and_degenerate_boxes_dropped() {
        let backend = Scripted(vec![vec![bbox(10.0, 40.0, 0.9), bbox(5.2, 5.9, 0.8)]]);
        let mut det = Detector::new(backend, TrackerType::None);
        let out = det
            .detect_and_track(&RgbImage::new(100, 100), &DetectionParams::default())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, None);
        assert!(!det.stats().unwrap().contains("tracks"));
    }
}
