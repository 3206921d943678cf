// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 跟踪配置文件读写测试

use std::io::Write;

use tempfile::{tempdir, NamedTempFile};
use yolov8_follow::detection::ByteTrackParams;
use yolov8_follow::TrackerConfig;

#[test]
fn missing_config_file_is_created_with_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tracker.json");

    let cfg = TrackerConfig::load(&path);
    assert_eq!(cfg, TrackerConfig::default());
    assert!(path.exists());

    // 写出的文件读回不变
    assert_eq!(TrackerConfig::load(&path), cfg);
}

#[test]
fn overrides_are_applied() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"tracker": "none", "bytetrack_max_lost_frames": 5, "label_font_size": 18.0}}"#
    )
    .unwrap();

    let cfg = TrackerConfig::load(file.path());
    assert_eq!(cfg.tracker, "none");
    assert_eq!(cfg.label_font_size, 18.0);
    assert_eq!(cfg.box_thickness, 2);

    let params = ByteTrackParams::from(&cfg);
    assert_eq!(params.max_lost_frames, 5);
    assert_eq!(params.high_score_threshold, 0.25);
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    assert_eq!(TrackerConfig::load(file.path()), TrackerConfig::default());
}
