use super::cue_track::write_cue_file;
use super::planner::{GeneratorPlan, SeekStrategy};
use super::sprite_merger::{decode_tile, save_sprite_image};
use crate::error::{PipelineError, Result};
use crate::model::MediaFile;
use crate::tools::{EncoderGateway, LockCoordinator, ScreenshotOptions, SeekTarget};
use image::DynamicImage;
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 單次產生的結果；已存在且不覆蓋的產物不會寫入
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteOutcome {
    pub image_written: bool,
    pub cue_written: bool,
}

impl SpriteOutcome {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        !self.image_written && !self.cue_written
    }
}

/// 依規劃逐張擷取縮圖，合併成預覽圖並輸出 VTT
///
/// 每張截圖前會對來源檔取得共享鎖；寫出每個產物時對輸出路徑取得獨佔鎖，
/// 「檢查是否存在再寫入」在同一把鎖內完成。
pub struct SpriteGenerator {
    encoder: Arc<dyn EncoderGateway>,
    locks: Arc<LockCoordinator>,
    shutdown_signal: Arc<AtomicBool>,
}

impl SpriteGenerator {
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

    pub fn generate(
        &self,
        plan: &GeneratorPlan,
        media: &MediaFile,
        image_path: &Path,
        cue_path: &Path,
        overwrite: bool,
    ) -> Result<SpriteOutcome> {
        let image_written = self.generate_sprite_image(plan, media, image_path, overwrite)?;
        let cue_written = self.generate_cue_file(plan, media, image_path, cue_path, overwrite)?;

        Ok(SpriteOutcome {
            image_written,
            cue_written,
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn generate_sprite_image(
        &self,
        plan: &GeneratorPlan,
        media: &MediaFile,
        image_path: &Path,
        overwrite: bool,
    ) -> Result<bool> {
        let _output_lock = self
            .locks
            .acquire_exclusive_cancellable(image_path, &self.shutdown_signal)?;
        if !overwrite && image_path.exists() {
            return Ok(false);
        }

        let tiles = match plan.seek_strategy {
            SeekStrategy::Timestamp => {
                info!("產生預覽圖: {}", media.path.display());
                self.capture_by_timestamp(plan, media)?
            }
            SeekStrategy::FrameIndexed => {
                info!(
                    "產生預覽圖: {} ({} 幀)",
                    media.path.display(),
                    plan.frame_count
                );
                self.capture_by_frame(plan, media)?
            }
        };

        if tiles.is_empty() {
            return Err(PipelineError::encoder(&media.path, "沒有擷取到任何縮圖"));
        }

        // 寫入前最後確認一次，中斷時不留下任何產物
        self.check_cancelled()?;
        save_sprite_image(&tiles, plan.grid_size, image_path)?;
        Ok(true)
    }

    fn generate_cue_file(
        &self,
        plan: &GeneratorPlan,
        media: &MediaFile,
        image_path: &Path,
        cue_path: &Path,
        overwrite: bool,
    ) -> Result<bool> {
        let _output_lock = self
            .locks
            .acquire_exclusive_cancellable(cue_path, &self.shutdown_signal)?;
        if !overwrite && cue_path.exists() {
            return Ok(false);
        }

        self.check_cancelled()?;
        info!("產生預覽 VTT: {}", media.path.display());
        write_cue_file(plan, image_path, cue_path)?;
        Ok(true)
    }

    fn screenshot_options(plan: &GeneratorPlan, media: &MediaFile) -> ScreenshotOptions {
        // 直式影片限制高度，避免縮成細長條
        if media.is_portrait() {
            ScreenshotOptions::height(plan.sprite_size)
        } else {
            ScreenshotOptions::width(plan.sprite_size)
        }
    }

    fn capture(
        &self,
        media: &MediaFile,
        target: SeekTarget,
        options: ScreenshotOptions,
    ) -> Result<DynamicImage> {
        self.check_cancelled()?;
        let _source_lock = self
            .locks
            .acquire_shared_cancellable(&media.path, &self.shutdown_signal)?;
        let bytes = self.encoder.screenshot(&media.path, target, options)?;
        decode_tile(&media.path, &bytes)
    }

    fn capture_by_timestamp(
        &self,
        plan: &GeneratorPlan,
        media: &MediaFile,
    ) -> Result<Vec<DynamicImage>> {
        let options = Self::screenshot_options(plan, media);
        let step = plan.duration / plan.chunk_count as f64;

        (0..plan.chunk_count)
            .map(|i| self.capture(media, SeekTarget::Time(i as f64 * step), options))
            .collect()
    }

    fn capture_by_frame(
        &self,
        plan: &GeneratorPlan,
        media: &MediaFile,
    ) -> Result<Vec<DynamicImage>> {
        if plan.frame_count <= 0 {
            return Err(PipelineError::invalid_media(
                &media.path,
                format!(
                    "duration({:.3})/frame count({}) invalid, skipping sprite creation",
                    plan.duration, plan.frame_count
                ),
            ));
        }

        let options = Self::screenshot_options(plan, media);
        let step = (plan.frame_count - 1) as f64 / plan.chunk_count as f64;

        // 幀數少於區塊數時會重複使用相同的幀，確保剛好 chunk_count 張
        (0..plan.chunk_count)
            .map(|i| {
                let frame = frame_index(i, step).ok_or_else(|| {
                    PipelineError::invalid_media(&media.path, "frame number out of range")
                })?;
                self.capture(media, SeekTarget::Frame(frame), options)
            })
            .collect()
    }
}

/// `round(i * step)`，超出 i64 範圍或非有限值時回傳 None
fn frame_index(index: usize, step: f64) -> Option<i64> {
    let frame = (index as f64 * step).round();
    if !frame.is_finite() || frame >= i64::MAX as f64 || frame <= i64::MIN as f64 {
        return None;
    }
    Some(frame as i64)
}
