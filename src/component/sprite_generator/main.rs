use super::generator::{SpriteGenerator, SpriteOutcome};
use super::planner::SpritePlanner;
use crate::config::save::{add_recent_path, save_settings};
use crate::config::{Config, SpriteOutputMode};
use crate::error::PipelineError;
use crate::model::MediaFile;
use crate::prompt_directory;
use crate::tools::{
    EncoderGateway, FfmpegEncoder, LockCoordinator, probe_media, scan_video_files,
    validate_directory_exists,
};
use anyhow::Result;
use console::style;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// `sprites` 子資料夾名稱
pub const SPRITE_DIRECTORY: &str = "sprites";

/// 預覽圖批次結果
#[derive(Debug, Default)]
pub struct GenerationResult {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 預覽圖與 VTT 的輸出路徑
#[must_use]
pub fn sprite_output_paths(video_path: &Path, mode: SpriteOutputMode) -> (PathBuf, PathBuf) {
    let stem = video_path
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string());
    let parent = video_path.parent().unwrap_or_else(|| Path::new("."));
    let directory = match mode {
        SpriteOutputMode::SubDirectory => parent.join(SPRITE_DIRECTORY),
        SpriteOutputMode::SameDirectory => parent.to_path_buf(),
    };

    (
        directory.join(format!("{stem}_sprite.jpg")),
        directory.join(format!("{stem}_thumbs.vtt")),
    )
}

/// 影片預覽圖（sprite sheet + WebVTT）產生器
pub struct SpriteSheetGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
    encoder: Arc<dyn EncoderGateway>,
    locks: Arc<LockCoordinator>,
}

impl SpriteSheetGenerator {
    pub fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        let encoder: Arc<dyn EncoderGateway> = Arc::new(FfmpegEncoder::new(
            &config.settings.ffmpeg.ffmpeg_path,
            &config.settings.ffmpeg.ffprobe_path,
        ));
        Self::with_encoder(config, shutdown_signal, encoder, Arc::new(LockCoordinator::new()))
    }

    pub fn with_encoder(
        config: Config,
        shutdown_signal: Arc<AtomicBool>,
        encoder: Arc<dyn EncoderGateway>,
        locks: Arc<LockCoordinator>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
            encoder,
            locks,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== 影片預覽圖 (Sprite) 產生 ===").cyan().bold());

        let input_dir = prompt_directory(
            "請輸入影片資料夾路徑",
            &self.config.settings.recent_paths,
        )?;
        validate_directory_exists(&input_dir)?;
        self.remember_path(&input_dir);

        println!("{}", style("掃描影片檔案中...").dim());
        let videos = scan_video_files(&input_dir, &self.config.file_type_table)?;

        if videos.is_empty() {
            println!("{}", style("找不到任何影片檔案").yellow());
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "找到 {} 個影片檔案，輸出位置: {}",
                videos.len(),
                self.config.settings.sprite.output_mode
            ))
            .green()
        );

        let result = self.process_videos(videos);
        self.print_summary(&result);

        Ok(())
    }

    fn remember_path(&self, directory: &Path) {
        let mut settings = self.config.settings.clone();
        add_recent_path(&mut settings, &directory.to_string_lossy());
        if let Err(e) = save_settings(&settings) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }
    }

    /// 依序處理每部影片；單一影片失敗只記錄，不影響其他影片
    pub fn process_videos(&self, videos: Vec<MediaFile>) -> GenerationResult {
        let mut result = GenerationResult {
            total_videos: videos.len(),
            ..GenerationResult::default()
        };

        for (index, mut video) in videos.into_iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷訊號，停止處理");
                break;
            }

            let video_name = video
                .path
                .file_name()
                .map_or_else(|| format!("video_{index}"), |s| s.to_string_lossy().to_string());

            println!(
                "\n{} [{}/{}] {}",
                style("處理中").cyan(),
                index + 1,
                result.total_videos,
                style(&video_name).bold()
            );

            match self.process_single_video(&mut video) {
                Ok(outcome) if outcome.is_skipped() => {
                    println!("  {} 預覽圖已存在，跳過", style("⤳").dim());
                    result.skipped += 1;
                }
                Ok(_) => {
                    println!("  {} 預覽圖已建立", style("✓").green());
                    result.successful += 1;
                }
                Err(PipelineError::Cancelled) => {
                    warn!("已中斷: {}", video.path.display());
                    break;
                }
                Err(e) => {
                    error!("產生預覽圖失敗 {}: {e}", video.describe());
                    println!("  {} 處理失敗: {}", style("✗").red(), e);
                    result.failed += 1;
                }
            }
        }

        result
    }

    fn process_single_video(
        &self,
        video: &mut MediaFile,
    ) -> std::result::Result<SpriteOutcome, PipelineError> {
        let sprite_settings = &self.config.settings.sprite;
        let (image_path, cue_path) = sprite_output_paths(&video.path, sprite_settings.output_mode);

        // 兩個產物都已存在時不需要探測影片
        if !sprite_settings.overwrite && image_path.exists() && cue_path.exists() {
            return Ok(SpriteOutcome::default());
        }

        probe_media(
            self.encoder.as_ref(),
            &self.locks,
            &self.shutdown_signal,
            video,
        )?;

        let plan = SpritePlanner::new(
            Arc::clone(&self.encoder),
            Arc::clone(&self.locks),
            Arc::clone(&self.shutdown_signal),
        )
        .plan(video, &sprite_settings.generation)?;
        println!(
            "  {:.1}s, {}x{} => {} 張 ({}x{})",
            plan.duration,
            video.width,
            video.height,
            plan.chunk_count,
            plan.grid_size,
            plan.grid_size
        );

        SpriteGenerator::new(
            Arc::clone(&self.encoder),
            Arc::clone(&self.locks),
            Arc::clone(&self.shutdown_signal),
        )
        .generate(
            &plan,
            video,
            &image_path,
            &cue_path,
            sprite_settings.overwrite,
        )
    }

    fn print_summary(&self, result: &GenerationResult) {
        println!();
        println!("{}", style("=== 預覽圖產生摘要 ===").cyan().bold());
        println!("  總計: {} 個影片", result.total_videos);
        println!("  成功: {} 個", style(result.successful).green());

        if result.skipped > 0 {
            println!("  跳過: {} 個", style(result.skipped).yellow());
        }

        if result.failed > 0 {
            println!("  失敗: {} 個", style(result.failed).red());
        }

        info!(
            "預覽圖產生完成 - 成功: {}, 跳過: {}, 失敗: {}",
            result.successful, result.skipped, result.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_sub_directory() {
        let (image, cue) =
            sprite_output_paths(Path::new("/videos/clip.mp4"), SpriteOutputMode::SubDirectory);
        assert_eq!(image, PathBuf::from("/videos/sprites/clip_sprite.jpg"));
        assert_eq!(cue, PathBuf::from("/videos/sprites/clip_thumbs.vtt"));
    }

    #[test]
    fn test_output_paths_same_directory() {
        let (image, cue) =
            sprite_output_paths(Path::new("/videos/clip.mp4"), SpriteOutputMode::SameDirectory);
        assert_eq!(image, PathBuf::from("/videos/clip_sprite.jpg"));
        assert_eq!(cue, PathBuf::from("/videos/clip_thumbs.vtt"));
    }
}
