//! 感知雜湊（phash）元件
//!
//! 圖片直接解碼（AVIF 透過 ffmpeg 轉換），影片取中間一幀，
//! 以 DCT 計算 64 位元雜湊後寫入指紋紀錄。內容相同的檔案沿用既有結果。

mod dct_hash;
mod engine;
mod main;
mod task;

pub use dct_hash::{HASH_IMAGE_SIZE, hamming_distance, perception_hash};
pub use engine::PhashEngine;
pub use main::{PhashGenerator, PhashResult};
pub use task::{GeneratePhashTask, PhashOutcome};
