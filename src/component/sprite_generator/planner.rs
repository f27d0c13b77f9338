//! 預覽圖規劃：由影片長度、幀數與設定推算取樣間隔、網格大小與定位方式

use crate::config::{DEFAULT_SPRITE_SIZE, SpriteGenerationConfig};
use crate::error::{PipelineError, Result};
use crate::model::MediaFile;
use crate::tools::{EncoderGateway, LockCoordinator};
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 影片短於此秒數時改用幀序號定位
const SHORT_VIDEO_SECONDS: f64 = 5.0;

/// 浮點除法誤差的容忍範圍（相對值）
const COUNT_EPSILON: f64 = 1e-9;

/// 單張預覽圖最多容納的縮圖數（100x100）
pub const MAX_SPRITE_COUNT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStrategy {
    /// 以時間點定位
    Timestamp,
    /// 以幀序號定位，短片或幀數不足時使用
    FrameIndexed,
}

/// 單次產生請求的規劃結果，用完即丟
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorPlan {
    pub interval: f64,
    /// 一定是完全平方數
    pub chunk_count: usize,
    pub grid_size: usize,
    pub seek_strategy: SeekStrategy,
    pub duration: f64,
    /// 0 表示未知
    pub frame_count: i64,
    pub frame_rate: Option<f64>,
    /// 每個區塊涵蓋的幀數，作為字幕時間軸的取樣步長
    pub frames_per_chunk: f64,
    pub sprite_size: u32,
}

impl GeneratorPlan {
    fn refresh_frames_per_chunk(&mut self) {
        self.frames_per_chunk = frames_per_chunk(
            self.frame_count,
            self.frame_rate,
            self.duration,
            self.chunk_count,
        );
    }
}

/// 推算取樣間隔
///
/// 有自訂間隔時先套用上限再套用下限，下限一律最後生效並覆蓋上限的調整。
pub fn calculate_sprite_interval(duration: f64, config: &SpriteGenerationConfig) -> Result<f64> {
    let custom_interval = config.sprite_interval;

    if custom_interval <= 0.0 || !custom_interval.is_finite() {
        if config.minimum_sprites <= 0 {
            return Err(PipelineError::Configuration(format!(
                "minimum_sprites({}) 必須大於 0（未設定 sprite_interval 時）",
                config.minimum_sprites
            )));
        }

        debug!(
            "以影片長度 {duration:.3}s 與最少張數 {} 推算間隔",
            config.minimum_sprites
        );
        return Ok(duration / f64::from(config.minimum_sprites));
    }

    let sprite_count = count_chunks(duration, custom_interval) as f64;
    let mut interval = custom_interval;

    if config.maximum_sprites > 0 && sprite_count > f64::from(config.maximum_sprites) {
        interval = duration / f64::from(config.maximum_sprites);
        debug!(
            "間隔 {custom_interval:.1}s 會產生 {sprite_count} 張，超過上限 {}，調整為 {interval:.1}s",
            config.maximum_sprites
        );
    }

    if config.minimum_sprites > 0 && sprite_count < f64::from(config.minimum_sprites) {
        interval = duration / f64::from(config.minimum_sprites);
        debug!(
            "間隔 {custom_interval:.1}s 只會產生 {sprite_count} 張，低於下限 {}，調整為 {interval:.1}s",
            config.minimum_sprites
        );
    }

    Ok(interval)
}

/// `ceil(duration / interval)`，但吸收浮點誤差
///
/// 例如 59.94 / (59.94 / 50) 算出 50.00000000000001，不應進位成 51。
#[must_use]
pub fn count_chunks(duration: f64, interval: f64) -> usize {
    let raw = duration / interval;
    let nearest = raw.round();
    if (raw - nearest).abs() <= COUNT_EPSILON * nearest.max(1.0) {
        nearest as usize
    } else {
        raw.ceil() as usize
    }
}

/// 能容納 `chunk_count` 張縮圖的最小正方形邊長
#[must_use]
pub fn sprite_grid_size(chunk_count: usize) -> usize {
    let mut grid_size = (chunk_count as f64).sqrt().ceil() as usize;
    while grid_size * grid_size < chunk_count {
        grid_size += 1;
    }
    while grid_size > 0 && (grid_size - 1) * (grid_size - 1) >= chunk_count {
        grid_size -= 1;
    }
    grid_size
}

fn frames_per_chunk(
    frame_count: i64,
    frame_rate: Option<f64>,
    duration: f64,
    chunk_count: usize,
) -> f64 {
    let frames = if frame_count > 0 {
        frame_count as f64
    } else {
        frame_rate.map_or(0.0, |rate| rate * duration)
    };

    if chunk_count == 0 || !frames.is_finite() {
        return 0.0;
    }
    frames / chunk_count as f64
}

fn invalid_duration(media: &MediaFile) -> PipelineError {
    PipelineError::invalid_media(
        &media.path,
        format!(
            "duration({:.3})/frame count({}) invalid, skipping sprite creation",
            media.duration.unwrap_or(0.0),
            media.frame_count.unwrap_or(0)
        ),
    )
}

/// 純計算的規劃，不重新探測幀數
pub fn plan_sprite_sheet(
    media: &MediaFile,
    config: &SpriteGenerationConfig,
) -> Result<GeneratorPlan> {
    let duration = media
        .duration
        .filter(|d| *d > 0.0 && d.is_finite())
        .ok_or_else(|| invalid_duration(media))?;
    let frame_count = media.frame_count.unwrap_or(0);

    let interval = calculate_sprite_interval(duration, config)?;
    if interval <= 0.0 || !interval.is_finite() {
        return Err(PipelineError::Configuration(format!(
            "推算出的間隔 {interval} 無效"
        )));
    }

    let raw_count = duration / interval;
    if !raw_count.is_finite() || raw_count > MAX_SPRITE_COUNT as f64 {
        return Err(PipelineError::Configuration(format!(
            "間隔 {interval}s 會產生 {raw_count:.0} 張縮圖，超過上限 {MAX_SPRITE_COUNT}"
        )));
    }

    let chunk_count = count_chunks(duration, interval);
    let grid_size = sprite_grid_size(chunk_count);
    let adjusted_count = grid_size * grid_size;
    if adjusted_count != chunk_count {
        debug!(
            "調整區塊數 {chunk_count} -> {adjusted_count} 以填滿 {grid_size}x{grid_size} 網格"
        );
    }

    let seek_strategy = if duration < SHORT_VIDEO_SECONDS
        || (frame_count > 0 && frame_count <= adjusted_count as i64)
    {
        SeekStrategy::FrameIndexed
    } else {
        SeekStrategy::Timestamp
    };

    let sprite_size = u32::try_from(config.sprite_size)
        .ok()
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_SPRITE_SIZE as u32);

    let mut plan = GeneratorPlan {
        interval,
        chunk_count: adjusted_count,
        grid_size,
        seek_strategy,
        duration,
        frame_count,
        frame_rate: media.frame_rate.filter(|r| *r > 0.0 && r.is_finite()),
        frames_per_chunk: 0.0,
        sprite_size,
    };
    plan.refresh_frames_per_chunk();
    Ok(plan)
}

/// 規劃預覽圖，幀序號定位時會向擷取工具重新取得實際幀數
///
/// 重新計算幀數要解碼整個檔案，期間持有來源檔的共享鎖。
pub struct SpritePlanner {
    encoder: Arc<dyn EncoderGateway>,
    locks: Arc<LockCoordinator>,
    shutdown_signal: Arc<AtomicBool>,
}

impl SpritePlanner {
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

    pub fn plan(
        &self,
        media: &MediaFile,
        config: &SpriteGenerationConfig,
    ) -> Result<GeneratorPlan> {
        let mut plan = plan_sprite_sheet(media, config)?;

        if plan.seek_strategy == SeekStrategy::FrameIndexed {
            if plan.duration <= 0.0 {
                return Err(invalid_duration(media));
            }

            warn!(
                "影片過短 ({:.3}s, {} 幀)，改用幀序號定位: {}",
                plan.duration,
                plan.frame_count,
                media.path.display()
            );

            // 容器宣告的幀數可能是 0 或不正確，以實際解碼的幀數為準
            let read_frames = {
                let _source_lock = self
                    .locks
                    .acquire_shared_cancellable(&media.path, &self.shutdown_signal)?;
                self.encoder.probe_frame_count(&media.path)
            };
            match read_frames {
                Ok(read_frames) if read_frames != plan.frame_count => {
                    warn!(
                        "以實際讀取幀數 ({read_frames}) 取代宣告幀數 ({}): {}",
                        plan.frame_count,
                        media.path.display()
                    );
                    plan.frame_count = read_frames;
                    plan.refresh_frames_per_chunk();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("無法重新計算幀數，沿用宣告值: {e}");
                }
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ScreenshotOptions, SeekTarget, VideoInfo};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn video(duration: f64, frame_count: Option<i64>) -> MediaFile {
        let mut file = MediaFile::video("/videos/clip.mp4");
        file.duration = Some(duration);
        file.frame_count = frame_count;
        file.frame_rate = Some(24.0);
        file
    }

    fn interval_config(min: i32, max: i32, interval: f64) -> SpriteGenerationConfig {
        SpriteGenerationConfig {
            minimum_sprites: min,
            maximum_sprites: max,
            sprite_interval: interval,
            sprite_size: 160,
        }
    }

    struct ProbeOnly {
        read_frames: Option<i64>,
        probes: AtomicUsize,
    }

    impl ProbeOnly {
        fn new(read_frames: Option<i64>) -> Arc<Self> {
            Arc::new(Self {
                read_frames,
                probes: AtomicUsize::new(0),
            })
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    fn planner(encoder: &Arc<ProbeOnly>) -> SpritePlanner {
        SpritePlanner::new(
            encoder.clone(),
            Arc::new(LockCoordinator::new()),
            Arc::new(AtomicBool::new(false)),
        )
    }

    impl EncoderGateway for ProbeOnly {
        fn screenshot(&self, path: &Path, _: SeekTarget, _: ScreenshotOptions) -> Result<Vec<u8>> {
            Err(PipelineError::encoder(path, "not used"))
        }

        fn probe_frame_count(&self, path: &Path) -> Result<i64> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.read_frames
                .ok_or_else(|| PipelineError::encoder(path, "probe failed"))
        }

        fn probe(&self, path: &Path) -> Result<VideoInfo> {
            Err(PipelineError::encoder(path, "not used"))
        }
    }

    #[test]
    fn test_243_seconds_gives_9x9() {
        let plan = plan_sprite_sheet(&video(243.0, None), &SpriteGenerationConfig::default())
            .unwrap();
        assert!((plan.interval - 3.0).abs() < 1e-9);
        assert_eq!(plan.chunk_count, 81);
        assert_eq!(plan.grid_size, 9);
        assert_eq!(plan.seek_strategy, SeekStrategy::Timestamp);
    }

    #[test]
    fn test_250_seconds_gives_9x9() {
        let plan = plan_sprite_sheet(&video(250.0, None), &SpriteGenerationConfig::default())
            .unwrap();
        assert!((plan.interval - 250.0 / 81.0).abs() < 1e-9);
        assert_eq!(plan.chunk_count, 81);
        assert_eq!(plan.grid_size, 9);
    }

    #[test]
    fn test_short_video_uses_frame_seek() {
        // 24 幀小於 81 區塊，但即使不看幀數，3 秒也已經觸發幀序號定位
        let plan =
            plan_sprite_sheet(&video(3.0, Some(24)), &SpriteGenerationConfig::default()).unwrap();
        assert_eq!(plan.seek_strategy, SeekStrategy::FrameIndexed);

        let plan =
            plan_sprite_sheet(&video(3.0, Some(10_000)), &SpriteGenerationConfig::default())
                .unwrap();
        assert_eq!(plan.seek_strategy, SeekStrategy::FrameIndexed);
    }

    #[test]
    fn test_unknown_frame_count_keeps_timestamp_seek() {
        let plan =
            plan_sprite_sheet(&video(10.0, Some(0)), &SpriteGenerationConfig::default()).unwrap();
        assert_eq!(plan.seek_strategy, SeekStrategy::Timestamp);
        assert_eq!(plan.frame_count, 0);
        // 幀數未知時以 frame_rate * duration 推算
        assert!((plan.frames_per_chunk - 240.0 / 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_frame_count_uses_frame_seek() {
        let plan =
            plan_sprite_sheet(&video(60.0, Some(50)), &SpriteGenerationConfig::default()).unwrap();
        assert_eq!(plan.seek_strategy, SeekStrategy::FrameIndexed);
    }

    #[test]
    fn test_derived_interval_chunk_count_is_perfect_square() {
        for min in [1, 2, 5, 10, 17, 50, 81, 99, 120] {
            for duration in [0.5, 3.0, 7.3, 59.94, 250.0, 3600.0, 12_345.6] {
                let config = interval_config(min, 0, 0.0);
                let interval = calculate_sprite_interval(duration, &config).unwrap();
                let raw = count_chunks(duration, interval);
                assert_eq!(raw, min as usize, "duration={duration}, min={min}");

                let plan = plan_sprite_sheet(&video(duration, None), &config).unwrap();
                let root = plan.grid_size;
                assert_eq!(root * root, plan.chunk_count);
                assert!(plan.chunk_count >= min as usize);
            }
        }
    }

    #[test]
    fn test_count_chunks_absorbs_rounding() {
        assert_eq!(count_chunks(59.94, 59.94 / 50.0), 50);
        assert_eq!(count_chunks(10.0, 3.0), 4);
        assert_eq!(count_chunks(9.0, 3.0), 3);
    }

    #[test]
    fn test_grid_size_monotonic_and_square() {
        let mut previous = 0;
        for n in 1..=2000 {
            let g = sprite_grid_size(n);
            assert!(g * g >= n);
            assert!((g - 1) * (g - 1) < n);
            assert!(g >= previous);
            previous = g;
        }
        assert_eq!(sprite_grid_size(81), 9);
        assert_eq!(sprite_grid_size(82), 10);
    }

    #[test]
    fn test_minimum_applied_after_maximum() {
        // 100 秒、間隔 1 秒 => 100 張，超過上限 50；下限 200 最後套用
        let config = interval_config(200, 50, 1.0);
        let interval = calculate_sprite_interval(100.0, &config).unwrap();
        assert!((interval - 100.0 / 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_interval_within_bounds_kept() {
        let config = interval_config(10, 200, 2.0);
        let interval = calculate_sprite_interval(100.0, &config).unwrap();
        assert!((interval - 2.0).abs() < 1e-12);

        let plan = plan_sprite_sheet(&video(100.0, None), &config).unwrap();
        assert_eq!(plan.grid_size, 8);
        assert_eq!(plan.chunk_count, 64);
    }

    #[test]
    fn test_custom_interval_capped_by_maximum() {
        let config = interval_config(0, 25, 1.0);
        let interval = calculate_sprite_interval(100.0, &config).unwrap();
        assert!((interval - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_tiny_interval_without_maximum_is_rejected() {
        for interval in [f64::MIN_POSITIVE, 1e-6] {
            let config = interval_config(0, 0, interval);
            let err = plan_sprite_sheet(&video(3600.0, None), &config).unwrap_err();
            assert!(matches!(err, PipelineError::Configuration(_)));
        }

        // 剛好填滿上限仍可接受
        let config = interval_config(0, 0, 1.0);
        let plan = plan_sprite_sheet(&video(MAX_SPRITE_COUNT as f64, None), &config).unwrap();
        assert_eq!(plan.grid_size, 100);
    }

    #[test]
    fn test_missing_minimum_is_configuration_error() {
        let config = interval_config(0, 81, 0.0);
        let err = plan_sprite_sheet(&video(100.0, None), &config).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_non_positive_duration_is_invalid_media() {
        let config = SpriteGenerationConfig::default();
        for duration in [0.0, -1.0, f64::NAN] {
            let err = plan_sprite_sheet(&video(duration, None), &config).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidMedia { .. }));
        }

        let mut file = video(1.0, None);
        file.duration = None;
        let err = plan_sprite_sheet(&file, &config).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMedia { .. }));
    }

    #[test]
    fn test_sprite_size_defaults_when_non_positive() {
        let mut config = SpriteGenerationConfig::default();
        config.sprite_size = 0;
        let plan = plan_sprite_sheet(&video(100.0, None), &config).unwrap();
        assert_eq!(plan.sprite_size, 160);

        config.sprite_size = 240;
        let plan = plan_sprite_sheet(&video(100.0, None), &config).unwrap();
        assert_eq!(plan.sprite_size, 240);
    }

    #[test]
    fn test_planner_reprobes_frame_count() {
        let encoder = ProbeOnly::new(Some(72));

        let plan = planner(&encoder)
            .plan(&video(3.0, Some(0)), &SpriteGenerationConfig::default())
            .unwrap();
        assert_eq!(plan.frame_count, 72);
        assert!((plan.frames_per_chunk - 72.0 / 81.0).abs() < 1e-9);
        assert_eq!(encoder.probes(), 1);
    }

    #[test]
    fn test_planner_keeps_declared_count_when_probe_fails() {
        let encoder = ProbeOnly::new(None);

        let plan = planner(&encoder)
            .plan(&video(3.0, Some(24)), &SpriteGenerationConfig::default())
            .unwrap();
        assert_eq!(plan.frame_count, 24);
        assert_eq!(encoder.probes(), 1);
    }

    #[test]
    fn test_planner_skips_probe_for_timestamp_seek() {
        let encoder = ProbeOnly::new(Some(1));

        let plan = planner(&encoder)
            .plan(&video(600.0, Some(14_400)), &SpriteGenerationConfig::default())
            .unwrap();
        assert_eq!(plan.seek_strategy, SeekStrategy::Timestamp);
        assert_eq!(encoder.probes(), 0);
    }

    #[test]
    fn test_planner_probe_waits_for_exclusive_scope() {
        let encoder = ProbeOnly::new(Some(24));
        let locks = Arc::new(LockCoordinator::new());
        let planner = SpritePlanner::new(
            encoder.clone(),
            Arc::clone(&locks),
            Arc::new(AtomicBool::new(false)),
        );
        let file = video(3.0, Some(0));
        let exclusive = locks.acquire_exclusive(&file.path);

        thread::scope(|scope| {
            let handle = scope.spawn(|| planner.plan(&file, &SpriteGenerationConfig::default()));

            thread::sleep(Duration::from_millis(100));
            assert_eq!(encoder.probes(), 0);

            drop(exclusive);
            let plan = handle.join().unwrap().unwrap();
            assert_eq!(plan.frame_count, 24);
        });

        assert_eq!(encoder.probes(), 1);
        assert_eq!(locks.shared_count(&file.path), 0);
    }

    #[test]
    fn test_planner_cancelled_while_waiting_for_source() {
        let encoder = ProbeOnly::new(Some(24));
        let locks = Arc::new(LockCoordinator::new());
        let planner = SpritePlanner::new(
            encoder.clone(),
            Arc::clone(&locks),
            Arc::new(AtomicBool::new(true)),
        );
        let file = video(3.0, Some(0));
        let _exclusive = locks.acquire_exclusive(&file.path);

        let err = planner
            .plan(&file, &SpriteGenerationConfig::default())
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(encoder.probes(), 0);
    }
}
