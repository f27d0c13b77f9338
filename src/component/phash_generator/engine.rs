use super::dct_hash::perception_hash;
use crate::error::{PipelineError, Result};
use crate::model::{MediaFile, MediaKind};
use crate::tools::{EncoderGateway, LockCoordinator, ScreenshotOptions, SeekTarget};
use image::DynamicImage;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 沒有內建解碼器、需要透過 ffmpeg 轉成 BMP 的格式
const FFMPEG_DECODED_EXTENSIONS: &[&str] = &["avif"];

fn needs_ffmpeg_decode(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FFMPEG_DECODED_EXTENSIONS
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
}

/// 感知雜湊引擎：圖片直接解碼，影片取中間一幀
///
/// 讀取來源前取得共享鎖；等待期間收到中斷信號就放棄。
pub struct PhashEngine {
    encoder: Arc<dyn EncoderGateway>,
    locks: Arc<LockCoordinator>,
    shutdown_signal: Arc<AtomicBool>,
}

impl PhashEngine {
    pub fn new(
        encoder: Arc<dyn EncoderGateway>,
        locks: Arc<LockCoordinator>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            encoder,
            locks,
            shutdown_signal,
        }
    }

    pub fn generate(&self, file: &MediaFile) -> Result<u64> {
        match file.kind {
            MediaKind::Image => self.generate_image_hash(file),
            MediaKind::Video => self.generate_video_hash(file),
        }
    }

    pub fn generate_image_hash(&self, file: &MediaFile) -> Result<u64> {
        let image = self.load_image(file)?;
        Ok(perception_hash(&image))
    }

    /// 以影片中間點的單一影格計算雜湊；長度未知時取第 0 秒
    pub fn generate_video_hash(&self, file: &MediaFile) -> Result<u64> {
        let timestamp = file
            .duration
            .filter(|d| *d > 0.0 && d.is_finite())
            .map_or(0.0, |d| d / 2.0);

        let bytes = {
            let _source_lock = self
                .locks
                .acquire_shared_cancellable(&file.path, &self.shutdown_signal)?;
            self.encoder.screenshot(
                &file.path,
                SeekTarget::Time(timestamp),
                ScreenshotOptions::default(),
            )?
        };

        let frame = image::load_from_memory(&bytes).map_err(|e| {
            PipelineError::encoder(&file.path, format!("無法解碼擷取的影格: {e}"))
        })?;
        debug!(
            "以 {timestamp:.3}s 的影格計算 phash: {}",
            file.path.display()
        );
        Ok(perception_hash(&frame))
    }

    fn load_image(&self, file: &MediaFile) -> Result<DynamicImage> {
        if needs_ffmpeg_decode(&file.path) {
            // ffmpeg 無法讀取壓縮檔內的檔案
            if file.is_in_archive() {
                return Err(PipelineError::unsupported(
                    &file.path,
                    "AVIF images in zip files are not supported for phash generation",
                ));
            }
            return self.load_image_ffmpeg(&file.path);
        }

        if let Some(archive) = &file.archive {
            return Err(PipelineError::unsupported(
                &file.path,
                format!("無法直接讀取壓縮檔 {} 內的圖片", archive.display()),
            ));
        }

        let _source_lock = self
            .locks
            .acquire_shared_cancellable(&file.path, &self.shutdown_signal)?;
        Ok(image::open(&file.path)?)
    }

    fn load_image_ffmpeg(&self, path: &Path) -> Result<DynamicImage> {
        let bytes = {
            let _source_lock = self
                .locks
                .acquire_shared_cancellable(path, &self.shutdown_signal)?;
            self.encoder
                .screenshot(path, SeekTarget::Time(0.0), ScreenshotOptions::default())?
        };

        image::load_from_memory(&bytes)
            .map_err(|e| PipelineError::encoder(path, format!("無法解碼 ffmpeg 輸出: {e}")))
    }
}
