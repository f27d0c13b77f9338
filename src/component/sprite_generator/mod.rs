//! 影片預覽圖（sprite sheet）產生元件
//!
//! 流程：
//! A. 規劃：由長度與幀數推算間隔、網格與定位方式
//! B. 逐張擷取縮圖（共享鎖保護來源檔）
//! C. 在記憶體中合併為網格預覽圖後一次寫出
//! D. 依預覽圖實際尺寸輸出 WebVTT 時間軸

mod cue_track;
mod generator;
mod main;
mod planner;
mod sprite_merger;

pub use cue_track::{Cue, build_cues, cue_step, format_vtt_time, render_vtt, write_cue_file};
pub use generator::{SpriteGenerator, SpriteOutcome};
pub use main::{GenerationResult, SPRITE_DIRECTORY, SpriteSheetGenerator, sprite_output_paths};
pub use planner::{
    GeneratorPlan, SeekStrategy, SpritePlanner, calculate_sprite_interval, count_chunks,
    plan_sprite_sheet, sprite_grid_size,
};
pub use sprite_merger::{combine_sprite_images, save_sprite_image, write_atomically};
