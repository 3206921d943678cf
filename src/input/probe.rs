// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! FFprobe 视频信息
//! FFprobe video information

use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};

use super::VideoInfo;
use crate::error::{PipelineError, PipelineResult};

/// FFprobe JSON 输出
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// 探测视频文件
pub fn probe_video(path: &Path) -> PipelineResult<VideoInfo> {
    which::which("ffprobe").map_err(|_| PipelineError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    if !output.status.success() {
        return Err(PipelineError::SourceOpen {
            path: path.to_path_buf(),
            reason: format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    parse_probe_output(&output.stdout)
}

/// 解析 ffprobe JSON, 取第一条视频流
pub fn parse_probe_output(json: &[u8]) -> PipelineResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| PipelineError::Probe("no video stream found".to_string()))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidFrameSize { width, height });
    }

    // avg_frame_rate 为 "0/0" 时退回 r_frame_rate
    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|r| parse_frame_rate(r))
        .find(|fps| fps.is_finite() && *fps > 0.0)
        .ok_or_else(|| {
            PipelineError::InvalidFrameRate(
                stream
                    .avg_frame_rate
                    .clone()
                    .or_else(|| stream.r_frame_rate.clone())
                    .unwrap_or_else(|| "missing".to_string()),
            )
        })?;

    let frame_count = stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// 解析帧率字符串 ("30/1" 或 "29.97")
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.trim().parse().ok()
}
