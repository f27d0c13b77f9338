//! WebVTT 預覽時間軸
//!
//! 每個區塊一筆 cue，依列優先順序對應預覽圖中的一格，時間連續且涵蓋整段影片。

use super::planner::{GeneratorPlan, SeekStrategy};
use super::sprite_merger::write_atomically;
use crate::error::{PipelineError, Result};
use log::debug;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 格式化為 `HH:MM:SS.mmm`；負數或非有限值輸出 0
#[must_use]
pub fn format_vtt_time(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// 每筆 cue 的長度（秒）
///
/// 時間點定位用每區塊幀數除以幀率；幀序號定位時每區塊幀數可能為 0，
/// 改用 `(frame_count - 1) / chunk_count / frame_rate`。
/// 幀率未知等情況算不出有效值時，平均分配影片長度。
#[must_use]
pub fn cue_step(plan: &GeneratorPlan) -> f64 {
    let chunks = plan.chunk_count.max(1) as f64;
    let fallback = plan.duration / chunks;

    let step = plan.frame_rate.map_or(f64::NAN, |rate| match plan.seek_strategy {
        SeekStrategy::Timestamp => plan.frames_per_chunk / rate,
        SeekStrategy::FrameIndexed => (plan.frame_count - 1) as f64 / chunks / rate,
    });

    if step.is_finite() && step > 0.0 {
        step
    } else {
        fallback
    }
}

/// 依規劃與單格尺寸產生所有 cue
///
/// 第 i 筆從 `min(i * step, duration)` 開始，到下一筆的開始結束；最後一筆固定結束在 `duration`。
#[must_use]
pub fn build_cues(plan: &GeneratorPlan, tile_width: u32, tile_height: u32) -> Vec<Cue> {
    let step = cue_step(plan);
    let grid_size = plan.grid_size.max(1);
    let start_of = |index: usize| (index as f64 * step).min(plan.duration);

    (0..plan.chunk_count)
        .map(|index| {
            let end = if index + 1 == plan.chunk_count {
                plan.duration
            } else {
                start_of(index + 1)
            };
            Cue {
                start: start_of(index),
                end,
                x: (index % grid_size) as u32 * tile_width,
                y: (index / grid_size) as u32 * tile_height,
                width: tile_width,
                height: tile_height,
            }
        })
        .collect()
}

#[must_use]
pub fn render_vtt(cues: &[Cue], image_name: &str) -> String {
    let mut vtt = String::from("WEBVTT\n\n");
    for (index, cue) in cues.iter().enumerate() {
        let _ = write!(
            vtt,
            "{}\n{} --> {}\n{}#xywh={},{},{},{}\n\n",
            index + 1,
            format_vtt_time(cue.start),
            format_vtt_time(cue.end),
            image_name,
            cue.x,
            cue.y,
            cue.width,
            cue.height
        );
    }
    vtt
}

/// 由磁碟上的預覽圖尺寸推算單格大小並寫出 VTT
///
/// 讀取實際檔案而不是沿用記憶體中的結果，預覽圖步驟被略過時也能單獨重建 cue 檔。
pub fn write_cue_file(plan: &GeneratorPlan, image_path: &Path, cue_path: &Path) -> Result<()> {
    let (width, height) = image::image_dimensions(image_path)?;
    let grid = u32::try_from(plan.grid_size.max(1))
        .map_err(|_| PipelineError::Configuration(format!("網格過大: {}", plan.grid_size)))?;

    let image_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            PipelineError::Configuration(format!("無效的預覽圖路徑: {}", image_path.display()))
        })?;

    let cues = build_cues(plan, width / grid, height / grid);
    write_atomically(cue_path, render_vtt(&cues, &image_name).as_bytes())?;
    debug!("VTT 已寫入: {} ({} cues)", cue_path.display(), cues.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(
        strategy: SeekStrategy,
        duration: f64,
        frame_count: i64,
        frame_rate: Option<f64>,
        chunk_count: usize,
    ) -> GeneratorPlan {
        let grid_size = (chunk_count as f64).sqrt() as usize;
        let frames = if frame_count > 0 {
            frame_count as f64
        } else {
            frame_rate.unwrap_or(0.0) * duration
        };
        GeneratorPlan {
            interval: duration / chunk_count as f64,
            chunk_count,
            grid_size,
            seek_strategy: strategy,
            duration,
            frame_count,
            frame_rate,
            frames_per_chunk: frames / chunk_count as f64,
            sprite_size: 160,
        }
    }

    fn assert_covers(cues: &[Cue], duration: f64) {
        assert!(cues[0].start.abs() < 1e-12);
        for pair in cues.windows(2) {
            assert!((pair[0].end - pair[1].start).abs() < 1e-12);
            assert!(pair[0].end >= pair[0].start);
        }
        let total: f64 = cues.iter().map(|c| c.end - c.start).sum();
        assert!((total - duration).abs() < 1e-9, "total={total}, duration={duration}");
        assert!((cues[cues.len() - 1].end - duration).abs() < 1e-12);
    }

    #[test]
    fn test_format_vtt_time() {
        assert_eq!(format_vtt_time(0.0), "00:00:00.000");
        assert_eq!(format_vtt_time(3.0), "00:00:03.000");
        assert_eq!(format_vtt_time(3723.4567), "01:02:03.457");
        assert_eq!(format_vtt_time(-5.0), "00:00:00.000");
        assert_eq!(format_vtt_time(f64::NAN), "00:00:00.000");
        assert_eq!(format_vtt_time(f64::INFINITY), "00:00:00.000");
    }

    #[test]
    fn test_timestamp_cues_cover_duration() {
        let plan = plan(SeekStrategy::Timestamp, 243.0, 5832, Some(24.0), 81);
        let cues = build_cues(&plan, 160, 90);

        assert_eq!(cues.len(), 81);
        assert_covers(&cues, 243.0);
        assert!((cues[1].start - 3.0).abs() < 1e-9);
        assert_eq!((cues[10].x, cues[10].y), (160, 90));
    }

    #[test]
    fn test_frame_indexed_cues_cover_duration() {
        let plan = plan(SeekStrategy::FrameIndexed, 3.0, 24, Some(8.0), 81);
        let cues = build_cues(&plan, 160, 90);

        assert_eq!(cues.len(), 81);
        assert_covers(&cues, 3.0);
        assert!((cue_step(&plan) - 23.0 / 81.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_frame_rate_falls_back_to_even_split() {
        let plan = plan(SeekStrategy::Timestamp, 100.0, 0, None, 25);
        assert!((cue_step(&plan) - 4.0).abs() < 1e-12);
        assert_covers(&build_cues(&plan, 10, 10), 100.0);

        let single_frame = plan_single_frame();
        assert!((cue_step(&single_frame) - single_frame.duration / 81.0).abs() < 1e-12);
    }

    fn plan_single_frame() -> GeneratorPlan {
        plan(SeekStrategy::FrameIndexed, 1.0, 1, Some(25.0), 81)
    }

    #[test]
    fn test_overlong_step_clamps_to_duration() {
        let mut plan = plan(SeekStrategy::Timestamp, 10.0, 0, Some(30.0), 4);
        plan.frames_per_chunk = 300.0;
        let cues = build_cues(&plan, 10, 10);
        assert_covers(&cues, 10.0);
    }

    #[test]
    fn test_render_vtt_layout() {
        let plan = plan(SeekStrategy::Timestamp, 12.0, 0, None, 4);
        let vtt = render_vtt(&build_cues(&plan, 160, 90), "clip_sprite.jpg");

        assert!(vtt.starts_with("WEBVTT\n\n1\n00:00:00.000 --> 00:00:03.000\n"));
        assert!(vtt.contains("clip_sprite.jpg#xywh=0,0,160,90\n"));
        assert!(vtt.contains("4\n00:00:09.000 --> 00:00:12.000\nclip_sprite.jpg#xywh=160,90,160,90\n"));
    }
}
