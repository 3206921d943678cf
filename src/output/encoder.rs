// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 视频编码输出 (ffmpeg 子进程, rawvideo rgb24 输入)
//! Video encoder sink feeding rgb24 frames into an ffmpeg child process

use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;

use super::VideoSink;
use crate::error::{PipelineError, PipelineResult};

/// 候选编码 (fourcc 标签 + ffmpeg 编码器名)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Codec {
    pub fourcc: &'static str,
    pub encoder: &'static str,
}

/// 按顺序尝试: mp4v, 失败后退回 XVID
pub const CODECS: [Codec; 2] = [
    Codec {
        fourcc: "mp4v",
        encoder: "mpeg4",
    },
    Codec {
        fourcc: "XVID",
        encoder: "libxvid",
    },
];

/// `ffmpeg -encoders` 输出中是否列出该视频编码器 (只看 `------` 分隔线之后)
pub fn encoder_listed(listing: &str, encoder: &str) -> bool {
    let mut lines = listing.lines();
    for line in lines.by_ref() {
        if line.trim_start().starts_with("---") {
            break;
        }
    }
    lines.any(|line| {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(flags), Some(name)) => {
                flags.len() == 6 && flags.starts_with('V') && name == encoder
            }
            _ => false,
        }
    })
}

fn list_encoders() -> PipelineResult<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// 编码器启动后的观察时间, 期间退出视为启动失败
const STARTUP_GRACE: Duration = Duration::from_millis(200);

/// 按 `CODECS` 顺序选出第一个已编入 ffmpeg 且能成功启动的编码
///
/// `start` 启动并确认编码器; 返回 `Err` 时继续尝试下一个候选。
/// 全部失败时返回已尝试的 fourcc 列表 (如 `"mp4v, XVID"`)。
pub fn select_codec<T, F>(listing: &str, mut start: F) -> Result<(Codec, T), String>
where
    F: FnMut(Codec) -> Result<T, String>,
{
    let mut tried = Vec::new();
    for codec in CODECS {
        tried.push(codec.fourcc);
        if !encoder_listed(listing, codec.encoder) {
            log::warn!(
                "codec {} unavailable (encoder `{}` not built into ffmpeg)",
                codec.fourcc,
                codec.encoder
            );
            continue;
        }
        match start(codec) {
            Ok(handle) => return Ok((codec, handle)),
            Err(reason) => log::warn!("codec {} failed to start: {}", codec.fourcc, reason),
        }
    }
    Err(tried.join(", "))
}

/// ffmpeg 编码输出
pub struct FfmpegSink {
    path: PathBuf,
    codec: Codec,
    size: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FfmpegSink {
    /// 创建输出: 确保目录存在且可写 → 依次尝试候选编码
    pub fn create(path: &Path, size: u32, fps: f64) -> PipelineResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                log::info!("created output directory {}", dir.display());
            }
        }
        // 输出文件不可写时直接失败, 不必再试编码
        File::create(path)?;

        which::which("ffmpeg").map_err(|_| PipelineError::ToolNotFound("ffmpeg"))?;
        let listing = list_encoders()?;

        let (codec, mut child) = select_codec(&listing, |codec| {
            check_encoder(codec, size, fps)?;
            start_encoder(path, codec, size, fps)
        })
        .map_err(|tried| {
            let _ = std::fs::remove_file(path);
            PipelineError::SinkOpen {
                path: path.to_path_buf(),
                tried,
            }
        })?;

        let stdin = child.stdin.take();
        log::info!(
            "sink: {} ({}x{} @ {:.2} fps, codec {})",
            path.display(),
            size,
            size,
            fps,
            codec.fourcc
        );
        Ok(Self {
            path: path.to_path_buf(),
            codec,
            size,
            child,
            stdin,
            frames_written: 0,
        })
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

fn encoder_command(codec: Codec, size: u32, fps: f64) -> Command {
    let dims = format!("{}x{}", size, size);
    let rate = format!("{}", fps);
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", dims.as_str(), "-r", rate.as_str(), "-i", "-"])
        .args(["-c:v", codec.encoder, "-vtag", codec.fourcc])
        .args(["-pix_fmt", "yuv420p", "-an"]);
    cmd
}

/// 试编码一帧黑图到空输出, 确认编码器接受这组参数
fn check_encoder(codec: Codec, size: u32, fps: f64) -> Result<(), String> {
    let mut child = encoder_command(codec, size, fps)
        .args(["-frames:v", "1", "-f", "null", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| e.to_string())?;

    let frame = vec![0u8; size as usize * size as usize * 3];
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(&frame),
        None => Ok(()),
    };
    let output = child.wait_with_output().map_err(|e| e.to_string())?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = stderr.lines().last().unwrap_or_default().trim().to_string();
    Err(match written {
        Err(e) if reason.is_empty() => format!("test encode failed: {}", e),
        _ => format!("test encode exited with {}: {}", output.status, reason),
    })
}

/// 启动正式编码进程; 观察期内退出视为失败
fn start_encoder(path: &Path, codec: Codec, size: u32, fps: f64) -> Result<Child, String> {
    let mut child = encoder_command(codec, size, fps)
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| e.to_string())?;

    std::thread::sleep(STARTUP_GRACE);
    match child.try_wait() {
        Ok(None) => Ok(child),
        Ok(Some(status)) => Err(format!("encoder exited during startup with {}", status)),
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(e.to_string())
        }
    }
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> PipelineResult<()> {
        let index = self.frames_written;
        if frame.dimensions() != (self.size, self.size) {
            return Err(PipelineError::SinkWrite {
                index,
                reason: format!(
                    "frame is {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    self.size,
                    self.size
                ),
            });
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| PipelineError::SinkWrite {
            index,
            reason: "sink already finished".to_string(),
        })?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| PipelineError::SinkWrite {
                index,
                reason: e.to_string(),
            })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        // 关闭 stdin 让编码器收尾
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        drop(stdin);
        let status = self.child.wait()?;
        if !status.success() {
            return Err(PipelineError::SinkWrite {
                index: self.frames_written,
                reason: format!("encoder for {} exited with {}", self.path.display(), status),
            });
        }
        log::info!(
            "wrote {} frames to {}",
            self.frames_written,
            self.path.display()
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            // 未调用 finish: 仍然让编码器正常收尾
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V.S... mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn finds_listed_video_encoders_only() {
        assert!(encoder_listed(LISTING, "mpeg4"));
        assert!(encoder_listed(LISTING, "libx264"));
        assert!(!encoder_listed(LISTING, "libxvid"));
        assert!(!encoder_listed(LISTING, "aac"));
        // 图例行不算
        assert!(!encoder_listed(LISTING, "="));
    }

    #[test]
    fn falls_back_to_xvid_when_mp4v_not_built() {
        let listing = LISTING.replace("mpeg4 ", "libxvid ");
        let mut started = Vec::new();
        let (codec, _) = select_codec(&listing, |c| {
            started.push(c.fourcc);
            Ok(())
        })
        .unwrap();
        assert_eq!(codec.fourcc, "XVID");
        assert_eq!(started, vec!["XVID"]);
    }

    #[test]
    fn falls_back_to_xvid_when_mp4v_fails_to_start() {
        let listing = format!("{} V..... libxvid              libxvidcore MPEG-4 part 2\n", LISTING);
        let mut started = Vec::new();
        let (codec, handle) = select_codec(&listing, |c| {
            started.push(c.fourcc);
            if c.fourcc == "mp4v" {
                Err("encoder exited during startup".to_string())
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!((codec.fourcc, handle), ("XVID", 7));
        assert_eq!(started, vec!["mp4v", "XVID"]);
    }

    #[test]
    fn no_usable_codec_reports_everything_tried() {
        // mp4v 已编入但启动失败, XVID 未编入
        let tried = select_codec(LISTING, |_| Err::<(), _>("bad parameters".to_string()))
            .unwrap_err();
        assert_eq!(tried, "mp4v, XVID");

        let err = PipelineError::SinkOpen {
            path: PathBuf::from("out/follow.mp4"),
            tried,
        };
        assert!(err.to_string().ends_with("(tried mp4v, XVID)"));
    }
}
