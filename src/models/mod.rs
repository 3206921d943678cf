// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 模型实现
///
/// - **YOLOv8**: letterbox 预处理 + 输出头解码始终可用,
///   ONNX Runtime 会话需要启用 `onnx` 特性。
pub mod yolov8;

#[cfg(feature = "onnx")]
pub use yolov8::YOLOv8;
pub use yolov8::{decode_predictions, preprocess, scale_wh};
