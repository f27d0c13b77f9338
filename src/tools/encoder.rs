//! 外部擷取工具（ffmpeg / ffprobe）的抽象層
//!
//! 元件在建構時注入 `Arc<dyn EncoderGateway>`，測試可以換成假的實作。
//! 呼叫是同步阻塞的；子程序逾時與終止策略不在這一層處理。

use super::ffmpeg_command::{ScreenshotCommand, ScreenshotOptions, SeekTarget};
use super::ffprobe_info::{VideoInfo, count_read_frames, get_video_info};
use crate::error::{PipelineError, Result};
use log::debug;
use std::path::{Path, PathBuf};

pub trait EncoderGateway: Send + Sync {
    /// 擷取單張影格，回傳編碼後的影像位元組（BMP）
    fn screenshot(
        &self,
        path: &Path,
        target: SeekTarget,
        options: ScreenshotOptions,
    ) -> Result<Vec<u8>>;

    /// 實際解碼後可讀到的幀數
    fn probe_frame_count(&self, path: &Path) -> Result<i64>;

    fn probe(&self, path: &Path) -> Result<VideoInfo>;
}

/// 以 ffmpeg / ffprobe 命令列實作的 [`EncoderGateway`]
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEncoder {
    #[must_use]
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl EncoderGateway for FfmpegEncoder {
    fn screenshot(
        &self,
        path: &Path,
        target: SeekTarget,
        options: ScreenshotOptions,
    ) -> Result<Vec<u8>> {
        let command = ScreenshotCommand::new(path, target, options);
        debug!("擷取影格 {}: {:?}", path.display(), target);

        let output = command
            .build_command(&self.ffmpeg)
            .output()
            .map_err(|e| PipelineError::encoder(path, format!("無法執行 ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::encoder(
                path,
                format!("ffmpeg 擷取影格失敗: {}", stderr.trim()),
            ));
        }

        if output.stdout.is_empty() {
            return Err(PipelineError::encoder(path, "ffmpeg 未輸出任何影格"));
        }

        Ok(output.stdout)
    }

    fn probe_frame_count(&self, path: &Path) -> Result<i64> {
        count_read_frames(&self.ffprobe, path)
            .map_err(|e| PipelineError::encoder(path, format!("{e:#}")))
    }

    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        get_video_info(&self.ffprobe, path)
            .map_err(|e| PipelineError::encoder(path, format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_encoder_error() {
        let encoder = FfmpegEncoder::new(
            "/nonexistent/bin/ffmpeg-missing",
            "/nonexistent/bin/ffprobe-missing",
        );
        let path = Path::new("/test/video.mp4");

        let err = encoder
            .screenshot(path, SeekTarget::Time(1.0), ScreenshotOptions::width(160))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encoder { .. }));

        let err = encoder.probe_frame_count(path).unwrap_err();
        assert!(matches!(err, PipelineError::Encoder { .. }));
    }
}
