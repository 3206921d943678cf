// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! ByteTrack 算法实现
//! ByteTrack: Simple and effective multi-object tracking
//!
//! 核心思想:
//! 1. 高低分检测框分开处理
//! 2. 高分框优先匹配 (IOU)
//! 3. 低分框救援丢失的轨迹
//! 4. 纯运动模型,无需外观特征
//!
//! 输出只关心"每个检测框对应哪条轨迹", 供跟随管线读取稳定的ID。

use super::tracker::{compute_iou, TrackedObject};
use super::types::BBox;
use crate::config::TrackerConfig;

/// ByteTrack 参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ByteTrackParams {
    /// 最大允许丢失帧数
    pub max_lost_frames: u32,
    /// 高分检测阈值
    pub high_score_threshold: f32,
    /// 低分检测阈值 (用于救援)
    pub low_score_threshold: f32,
    /// 新建轨迹阈值
    pub new_track_threshold: f32,
    /// 高分匹配 IOU 阈值
    pub high_iou_threshold: f32,
    /// 低分匹配 IOU 阈值
    pub low_iou_threshold: f32,
}

impl Default for ByteTrackParams {
    fn default() -> Self {
        Self {
            max_lost_frames: 30,
            high_score_threshold: 0.25,
            low_score_threshold: 0.1,
            new_track_threshold: 0.25,
            high_iou_threshold: 0.2,
            low_iou_threshold: 0.5,
        }
    }
}

impl From<&TrackerConfig> for ByteTrackParams {
    fn from(cfg: &TrackerConfig) -> Self {
        Self {
            max_lost_frames: cfg.bytetrack_max_lost_frames,
            high_score_threshold: cfg.bytetrack_high_score_threshold,
            low_score_threshold: cfg.bytetrack_low_score_threshold,
            new_track_threshold: cfg.bytetrack_new_track_threshold,
            high_iou_threshold: cfg.bytetrack_high_iou_threshold,
            low_iou_threshold: cfg.bytetrack_low_iou_threshold,
        }
    }
}

/// ByteTrack 追踪器
pub struct ByteTracker {
    /// 当前轨迹
    tracks: Vec<TrackedObject>,

    /// 下一个分配的ID
    next_id: u32,

    params: ByteTrackParams,
}

impl ByteTracker {
    pub fn new(params: ByteTrackParams) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            params,
        }
    }

    /// 更新跟踪, 返回与 `detections` 一一对应的轨迹ID
    pub fn update(&mut self, detections: &[BBox]) -> Vec<Option<u32>> {
        let mut ids: Vec<Option<u32>> = vec![None; detections.len()];

        // 1. 分离高低分检测框
        let mut high_dets: Vec<(usize, &BBox)> = Vec::new();
        let mut low_dets: Vec<(usize, &BBox)> = Vec::new();

        for (idx, det) in detections.iter().enumerate() {
            if det.confidence >= self.params.high_score_threshold {
                high_dets.push((idx, det));
            } else if det.confidence >= self.params.low_score_threshold {
                low_dets.push((idx, det));
            }
        }

        // 2. 第一轮匹配: 高分检测 + 所有轨迹
        let mut matched_track = vec![false; self.tracks.len()];
        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();

        let assignments =
            self.match_detections_to_tracks(&high_dets, &all_tracks, self.params.high_iou_threshold);

        for (det_idx, track_idx) in assignments {
            matched_track[track_idx] = true;
            self.tracks[track_idx].update(detections[det_idx].clone());
            ids[det_idx] = Some(self.tracks[track_idx].id);
        }

        // 3. 第二轮匹配: 低分检测 + 未匹配的轨迹 (救援)
        let unmatched_tracks: Vec<usize> = (0..self.tracks.len())
            .filter(|&idx| !matched_track[idx])
            .collect();

        let low_assignments = self.match_detections_to_tracks(
            &low_dets,
            &unmatched_tracks,
            self.params.low_iou_threshold,
        );

        for (det_idx, track_idx) in low_assignments {
            matched_track[track_idx] = true;
            self.tracks[track_idx].update(detections[det_idx].clone());
            ids[det_idx] = Some(self.tracks[track_idx].id);
        }

        // 4. 未匹配的轨迹 → 标记丢失
        for (track_idx, &matched) in matched_track.iter().enumerate() {
            if !matched {
                self.tracks[track_idx].mark_lost();
            }
        }

        // 5. 未匹配的高分检测 → 新建轨迹
        for (det_idx, det) in detections.iter().enumerate() {
            if ids[det_idx].is_none() && det.confidence >= self.params.new_track_threshold {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(TrackedObject::new(id, det.clone()));
                ids[det_idx] = Some(id);
            }
        }

        // 6. 删除丢失太久的轨迹
        let max_lost = self.params.max_lost_frames;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        ids
    }

    /// IOU 贪心匹配, 返回 (检测索引, 轨迹索引)
    fn match_detections_to_tracks(
        &self,
        detections: &[(usize, &BBox)],
        track_indices: &[usize],
        iou_threshold: f32,
    ) -> Vec<(usize, usize)> {
        if detections.is_empty() || track_indices.is_empty() {
            return Vec::new();
        }

        // 计算 IOU 代价矩阵
        let mut candidates = Vec::new();
        for (local_det_idx, (det_idx, detection)) in detections.iter().enumerate() {
            for (local_track_idx, &track_idx) in track_indices.iter().enumerate() {
                let iou = compute_iou(detection, &self.tracks[track_idx].predicted_bbox());

                if iou >= iou_threshold {
                    let cost = 1.0 - iou;
                    candidates.push((cost, *det_idx, local_det_idx, track_idx, local_track_idx));
                }
            }
        }

        // 贪心匹配: 按代价排序
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut assignments = Vec::new();
        let mut used_det = vec![false; detections.len()];
        let mut used_track = vec![false; track_indices.len()];

        for (_, det_idx, local_det_idx, track_idx, local_track_idx) in candidates {
            if !used_det[local_det_idx] && !used_track[local_track_idx] {
                assignments.push((det_idx, track_idx));
                used_det[local_det_idx] = true;
                used_track[local_track_idx] = true;
            }
        }

        assignments
    }

    /// 当前存活轨迹数
    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// 跟踪统计 (存活轨迹数 / 已分配ID数)
    pub fn stats(&self) -> String {
        format!(
            "tracks: {} | ids issued: {}",
            self.tracks.len(),
            self.next_id - 1
        )
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, confidence: f32) -> BBox {
        BBox {
            x1: x,
            y1: 0.0,
            x2: x + 50.0,
            y2: 100.0,
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn ids_persist_across_small_motion() {
        let mut tracker = ByteTracker::default();
        let first = tracker.update(&[bbox(0.0, 0.9), bbox(300.0, 0.8)]);
        assert_eq!(first, vec![Some(1), Some(2)]);

        // 顺序交换, ID 跟随框而不是位置
        let second = tracker.update(&[bbox(305.0, 0.8), bbox(4.0, 0.9)]);
        assert_eq!(second, vec![Some(2), Some(1)]);
    }

    #[test]
    fn low_score_detection_rescues_but_never_spawns() {
        let mut tracker = ByteTracker::default();
        assert_eq!(tracker.update(&[bbox(0.0, 0.9)]), vec![Some(1)]);

        // 低分框救援已有轨迹
        assert_eq!(tracker.update(&[bbox(2.0, 0.15)]), vec![Some(1)]);

        // 远处的低分框不新建轨迹
        assert_eq!(tracker.update(&[bbox(600.0, 0.15)]), vec![None]);
    }

    #[test]
    fn lost_tracks_expire() {
        let params = ByteTrackParams {
            max_lost_frames: 2,
            ..ByteTrackParams::default()
        };
        let mut tracker = ByteTracker::new(params);
        tracker.update(&[bbox(0.0, 0.9)]);
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert_eq!(tracker.active_tracks(), 0);

        // 重新出现时分配新ID
        assert_eq!(tracker.update(&[bbox(0.0, 0.9)]), vec![Some(2)]);
    }
}
