use super::engine::PhashEngine;
use super::task::{GeneratePhashTask, PhashOutcome};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::error::PipelineError;
use crate::model::{MediaFile, MediaKind};
use crate::prompt_directory;
use crate::tools::{
    EncoderGateway, FfmpegEncoder, FingerprintStore, JsonFingerprintStore, LockCoordinator,
    calculate_checksum, normalize_input_path, probe_media, scan_media_files,
    validate_directory_exists,
};
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PhashResult {
    pub total_files: usize,
    pub generated: usize,
    pub reused: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 批次產生資料夾內所有媒體的 phash
pub struct PhashGenerator {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
    encoder: Arc<dyn EncoderGateway>,
    locks: Arc<LockCoordinator>,
}

impl PhashGenerator {
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
        println!("{}", style("=== 感知雜湊 (phash) 產生 ===").cyan().bold());

        let directory = prompt_directory(
            "請輸入要計算的資料夾路徑",
            &self.config.settings.recent_paths,
        )?;
        validate_directory_exists(&directory)?;
        self.remember_path(&directory);

        println!("{}", style("掃描媒體檔案中...").dim());
        let files = scan_media_files(&directory, &self.config.file_type_table)?;
        if files.is_empty() {
            println!("{}", style("找不到任何影片或圖片").yellow());
            return Ok(());
        }

        let store_path = Path::new(&self.config.settings.phash.store_path);
        let store = JsonFingerprintStore::load_from_file(store_path)
            .with_context(|| format!("無法載入指紋紀錄: {}", store_path.display()))?;
        println!(
            "{}",
            style(format!(
                "找到 {} 個媒體檔案，指紋紀錄 {} 筆",
                files.len(),
                store.len()
            ))
            .green()
        );

        let result = self.process_files(files, Arc::new(store));
        self.print_summary(&result);

        Ok(())
    }

    /// 計算單一檔案的 phash 並顯示，不寫入紀錄
    pub fn run_single(&self) -> Result<()> {
        println!("{}", style("=== 計算單一檔案 phash ===").cyan().bold());

        let input: String = Input::new()
            .with_prompt("請輸入檔案路徑")
            .interact_text()?;
        let path = normalize_input_path(&input);
        if !path.is_file() {
            bail!("檔案不存在: {}", path.display());
        }

        let mut file = match self.config.file_type_table.media_kind(&path) {
            Some(MediaKind::Image) => MediaFile::image(&path),
            Some(MediaKind::Video) => MediaFile::video(&path),
            None => bail!("不支援的檔案類型: {}", path.display()),
        };
        probe_media(
            self.encoder.as_ref(),
            &self.locks,
            &self.shutdown_signal,
            &mut file,
        )?;

        let hash = self.engine().generate(&file)?;
        println!("{hash:016x} {}", path.display());
        Ok(())
    }

    fn engine(&self) -> Arc<PhashEngine> {
        Arc::new(PhashEngine::new(
            Arc::clone(&self.encoder),
            Arc::clone(&self.locks),
            Arc::clone(&self.shutdown_signal),
        ))
    }

    fn remember_path(&self, directory: &Path) {
        let mut settings = self.config.settings.clone();
        add_recent_path(&mut settings, &directory.to_string_lossy());
        if let Err(e) = save_settings(&settings) {
            warn!("無法儲存最近使用的路徑: {e:#}");
        }
    }

    /// 平行處理所有檔案；單一檔案失敗只記錄，批次繼續
    pub fn process_files(
        &self,
        files: Vec<MediaFile>,
        store: Arc<dyn FingerprintStore>,
    ) -> PhashResult {
        let task = GeneratePhashTask::new(
            Arc::clone(&store),
            self.engine(),
            Arc::clone(&self.shutdown_signal),
            self.config.settings.phash.overwrite,
        );

        let generated = AtomicUsize::new(0);
        let reused = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        progress_bar.set_message("計算 phash 中...");

        let total_files = files.len();
        files.into_par_iter().for_each(|mut file| {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                return;
            }

            match self.process_file(&task, store.as_ref(), &mut file) {
                Ok(PhashOutcome::Generated(_)) => {
                    generated.fetch_add(1, Ordering::SeqCst);
                }
                Ok(PhashOutcome::Reused(_)) => {
                    reused.fetch_add(1, Ordering::SeqCst);
                }
                Ok(PhashOutcome::AlreadyPresent) => {
                    skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) if is_cancelled(&e) => {}
                Err(e) => {
                    error!("產生 phash 失敗 {}: {e:#}", file.describe());
                    failed.fetch_add(1, Ordering::SeqCst);
                }
            }

            progress_bar.inc(1);
        });

        progress_bar.finish_with_message("完成");

        PhashResult {
            total_files,
            generated: generated.load(Ordering::SeqCst),
            reused: reused.load(Ordering::SeqCst),
            skipped: skipped.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
        }
    }

    fn process_file(
        &self,
        task: &GeneratePhashTask,
        store: &dyn FingerprintStore,
        file: &mut MediaFile,
    ) -> Result<PhashOutcome> {
        // 以紀錄中的指紋為準，已算過的檔案不必重算
        if let Some(record) = store.get(&file.path)? {
            file.fingerprints = record.fingerprints;
        }

        if file.fingerprints.checksum().is_none() {
            let checksum = calculate_checksum(&file.path)?;
            self.check_cancelled()?;

            let record: &MediaFile = file;
            let committed =
                store.with_transaction(&mut |txn| txn.update_fingerprint(record, checksum.clone()));
            match committed {
                Ok(()) => file.fingerprints.append_unique(checksum),
                // 提交當下剛好被中斷時不回報錯誤
                Err(e) if self.shutdown_signal.load(Ordering::SeqCst) => {
                    debug!("中斷時提交 checksum 失敗，略過: {e}");
                    return Err(PipelineError::Cancelled.into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        if task_needs_probe(file, self.config.settings.phash.overwrite) {
            probe_media(
                self.encoder.as_ref(),
                &self.locks,
                &self.shutdown_signal,
                file,
            )?;
        }

        Ok(task.run(file)?)
    }

    fn check_cancelled(&self) -> std::result::Result<(), PipelineError> {
        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn print_summary(&self, result: &PhashResult) {
        println!();
        println!("{}", style("=== phash 產生摘要 ===").cyan().bold());
        println!("  總計: {} 個檔案", result.total_files);
        println!("  新計算: {} 個", style(result.generated).green());
        println!("  沿用相同內容: {} 個", style(result.reused).green());

        if result.skipped > 0 {
            println!("  已存在: {} 個", style(result.skipped).yellow());
        }

        if result.failed > 0 {
            println!("  失敗: {} 個", style(result.failed).red());
        }

        info!(
            "phash 產生完成 - 新計算: {}, 沿用: {}, 已存在: {}, 失敗: {}",
            result.generated, result.reused, result.skipped, result.failed
        );
    }
}

/// 影片要計算 phash 時才需要探測長度
fn task_needs_probe(file: &MediaFile, overwrite: bool) -> bool {
    file.kind == MediaKind::Video
        && file.duration.is_none()
        && (overwrite || file.fingerprints.phash().is_none())
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<PipelineError>()
        .is_some_and(PipelineError::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileTypeTable, UserSettings};
    use crate::error::Result as PipelineResult;
    use crate::model::Fingerprint;
    use crate::tools::{ScreenshotOptions, SeekTarget, StoreTransaction, VideoInfo};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    struct UnusedEncoder;

    impl EncoderGateway for UnusedEncoder {
        fn screenshot(
            &self,
            path: &Path,
            _: SeekTarget,
            _: ScreenshotOptions,
        ) -> PipelineResult<Vec<u8>> {
            Err(PipelineError::encoder(path, "not used"))
        }

        fn probe_frame_count(&self, path: &Path) -> PipelineResult<i64> {
            Err(PipelineError::encoder(path, "not used"))
        }

        fn probe(&self, path: &Path) -> PipelineResult<VideoInfo> {
            Err(PipelineError::encoder(path, "not used"))
        }
    }

    /// 讀取既有紀錄時收到中斷信號
    struct CancelOnLookup {
        inner: JsonFingerprintStore,
        signal: Arc<AtomicBool>,
    }

    impl FingerprintStore for CancelOnLookup {
        fn with_transaction(
            &self,
            f: &mut dyn FnMut(&mut dyn StoreTransaction) -> PipelineResult<()>,
        ) -> PipelineResult<()> {
            self.inner.with_transaction(f)
        }

        fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> PipelineResult<Vec<MediaFile>> {
            self.inner.find_by_fingerprint(fingerprint)
        }

        fn get(&self, path: &Path) -> PipelineResult<Option<MediaFile>> {
            self.signal.store(true, Ordering::SeqCst);
            self.inner.get(path)
        }
    }

    /// 提交途中收到中斷信號，提交本身失敗
    struct CancelOnCommit {
        signal: Arc<AtomicBool>,
        commits: AtomicUsize,
    }

    impl FingerprintStore for CancelOnCommit {
        fn with_transaction(
            &self,
            _f: &mut dyn FnMut(&mut dyn StoreTransaction) -> PipelineResult<()>,
        ) -> PipelineResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            self.signal.store(true, Ordering::SeqCst);
            Err(PipelineError::Transaction("interrupted".to_string()))
        }

        fn find_by_fingerprint(&self, _: &Fingerprint) -> PipelineResult<Vec<MediaFile>> {
            Ok(Vec::new())
        }

        fn get(&self, _: &Path) -> PipelineResult<Option<MediaFile>> {
            Ok(None)
        }
    }

    fn generator(signal: &Arc<AtomicBool>) -> PhashGenerator {
        let config = Config {
            file_type_table: FileTypeTable {
                video_file: vec![".mp4".to_string()],
                image_file: vec![".png".to_string()],
                archive_file: vec![".zip".to_string()],
            },
            settings: UserSettings::default(),
        };
        PhashGenerator::with_encoder(
            config,
            Arc::clone(signal),
            Arc::new(UnusedEncoder),
            Arc::new(LockCoordinator::new()),
        )
    }

    fn write_image(dir: &Path) -> MediaFile {
        let path = dir.join("photo.png");
        RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 64]))
            .save(&path)
            .unwrap();
        MediaFile::image(path)
    }

    #[test]
    fn test_cancelled_before_checksum_commit_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let signal = Arc::new(AtomicBool::new(false));
        let store = Arc::new(CancelOnLookup {
            inner: JsonFingerprintStore::in_memory(),
            signal: Arc::clone(&signal),
        });

        let result = generator(&signal).process_files(
            vec![write_image(temp_dir.path())],
            Arc::clone(&store) as Arc<dyn FingerprintStore>,
        );

        assert!(signal.load(Ordering::SeqCst));
        assert!(store.inner.is_empty());
        assert_eq!(result.generated, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_checksum_commit_failure_during_cancellation_is_not_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let signal = Arc::new(AtomicBool::new(false));
        let store = Arc::new(CancelOnCommit {
            signal: Arc::clone(&signal),
            commits: AtomicUsize::new(0),
        });

        let result = generator(&signal).process_files(
            vec![write_image(temp_dir.path())],
            Arc::clone(&store) as Arc<dyn FingerprintStore>,
        );

        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
        assert_eq!(result.generated, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn test_video_needs_probe_only_when_hash_missing() {
        let mut file = MediaFile::video("/videos/a.mp4");
        assert!(task_needs_probe(&file, false));

        file.fingerprints.append_unique(Fingerprint::phash(7));
        assert!(!task_needs_probe(&file, false));
        assert!(task_needs_probe(&file, true));

        file.duration = Some(10.0);
        assert!(!task_needs_probe(&file, true));
        assert!(!task_needs_probe(&MediaFile::image("/a.png"), true));
    }
}
