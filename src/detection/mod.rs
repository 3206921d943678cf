// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// - Detector:  框检测后端 + 跟踪器, 实现 `DetectAndTrack`
/// - ByteTrack: 高低分两轮 IOU 匹配, 分配稳定的跟踪ID
pub mod bytetrack;
pub mod detector;
pub mod tracker;
pub mod types;

pub use bytetrack::{ByteTrackParams, ByteTracker};
pub use detector::{BoxDetector, DetectAndTrack, Detector, TrackerType};
pub use types::{BBox, Detection, DetectionParams};
