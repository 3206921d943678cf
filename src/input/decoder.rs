// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频文件解码器 (ffmpeg 子进程, rawvideo rgb24 管道)
/// Video file decoder piping rgb24 frames out of an ffmpeg child process
use image::RgbImage;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use super::probe::probe_video;
use super::{VideoInfo, VideoSource};
use crate::error::{PipelineError, PipelineResult};

/// ffmpeg 解码源
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    frame_bytes: usize,
    frames_read: u64,
}

impl FfmpegSource {
    /// 打开视频: 探测元数据 → 启动解码进程
    pub fn open(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::SourceOpen {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        which::which("ffmpeg").map_err(|_| PipelineError::ToolNotFound("ffmpeg"))?;

        let info = probe_video(path)?;
        log::info!(
            "source: {} ({}x{} @ {:.2} fps, {} frames)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.frame_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        );

        // 关闭自动旋转, 保证输出尺寸与探测结果一致
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PipelineError::SourceOpen {
                path: path.to_path_buf(),
                reason: format!("failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| PipelineError::SourceOpen {
            path: path.to_path_buf(),
            reason: "ffmpeg stdout unavailable".to_string(),
        })?;

        let frame_bytes = info.width as usize * info.height as usize * 3;
        Ok(Self {
            info,
            child,
            stdout,
            frame_bytes,
            frames_read: 0,
        })
    }

    /// 读满 buf, 返回实际读取的字节数 (EOF 时可能不足)
    fn read_full(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// 数据读完: 等待解码进程退出并检查状态
    fn end_of_stream(&mut self) -> PipelineResult<Option<RgbImage>> {
        let status = self
            .child
            .wait()
            .map_err(|e| PipelineError::SourceRead(e.to_string()))?;
        check_decoder_exit(status, self.frames_read)?;
        Ok(None)
    }
}

/// 解码进程非零退出视为读取失败 (文件损坏, 解码出错)
fn check_decoder_exit(status: ExitStatus, frames_read: u64) -> PipelineResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(PipelineError::SourceRead(format!(
        "ffmpeg decoder exited with {} after {} frames",
        status, frames_read
    )))
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        let mut buf = vec![0u8; self.frame_bytes];
        let n = self
            .read_full(&mut buf)
            .map_err(|e| PipelineError::SourceRead(e.to_string()))?;

        if n == 0 {
            return self.end_of_stream();
        }
        if n < self.frame_bytes {
            log::warn!(
                "truncated trailing frame after {} frames ({} of {} bytes), stopping",
                self.frames_read,
                n,
                self.frame_bytes
            );
            return self.end_of_stream();
        }

        self.frames_read += 1;
        let frame = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| PipelineError::SourceRead("frame buffer size mismatch".to_string()))?;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // 提前结束 (取消/出错) 时进程可能仍在运行
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn clean_decoder_exit_is_end_of_stream() {
        assert!(check_decoder_exit(ExitStatus::from_raw(0), 12).is_ok());
    }

    #[test]
    fn failed_decoder_exit_is_read_error() {
        // wait 状态 0x100 即退出码 1
        let err = check_decoder_exit(ExitStatus::from_raw(1 << 8), 3).unwrap_err();
        assert!(matches!(err, PipelineError::SourceRead(ref m) if m.contains("after 3 frames")));
    }
}
