use crate::model::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MAX_RECENT_PATHS: usize = 5;

/// 預設截圖數量，9x9 網格
pub const DEFAULT_SPRITE_AMOUNT: i32 = 81;

/// 每張縮圖最長邊的預設像素
pub const DEFAULT_SPRITE_SIZE: i32 = 160;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "VIDEO_FILE")]
    pub video_file: Vec<String>,
    #[serde(rename = "IMAGE_FILE")]
    pub image_file: Vec<String>,
    #[serde(rename = "ARCHIVE_FILE", default)]
    pub archive_file: Vec<String>,
}

impl FileTypeTable {
    fn extension_matches(extensions: &[String], path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .is_some_and(|ext| extensions.iter().any(|e| e.to_lowercase() == ext))
    }

    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        Self::extension_matches(&self.video_file, path)
    }

    #[must_use]
    pub fn is_image_file(&self, path: &Path) -> bool {
        Self::extension_matches(&self.image_file, path)
    }

    #[must_use]
    pub fn is_archive_file(&self, path: &Path) -> bool {
        Self::extension_matches(&self.archive_file, path)
    }

    #[must_use]
    pub fn media_kind(&self, path: &Path) -> Option<MediaKind> {
        if self.is_video_file(path) {
            Some(MediaKind::Video)
        } else if self.is_image_file(path) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// 預覽圖產生參數（不可變輸入）
///
/// `sprite_interval` 為 0 時由影片長度與張數上下限推算。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteGenerationConfig {
    /// 最少張數；0 表示不限
    pub minimum_sprites: i32,
    /// 最多張數；0 表示不限
    pub maximum_sprites: i32,
    /// 每張間隔秒數
    pub sprite_interval: f64,
    /// 縮圖最長邊像素；<= 0 時使用預設值
    pub sprite_size: i32,
}

impl Default for SpriteGenerationConfig {
    fn default() -> Self {
        Self {
            minimum_sprites: DEFAULT_SPRITE_AMOUNT,
            maximum_sprites: DEFAULT_SPRITE_AMOUNT,
            sprite_interval: 0.0,
            sprite_size: DEFAULT_SPRITE_SIZE,
        }
    }
}

/// 預覽圖輸出位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpriteOutputMode {
    /// 輸出到影片旁的 `sprites` 子資料夾
    #[default]
    SubDirectory,
    /// 輸出到影片所在資料夾
    SameDirectory,
}

impl fmt::Display for SpriteOutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubDirectory => write!(f, "sprites 子資料夾"),
            Self::SameDirectory => write!(f, "與影片相同資料夾"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteSettings {
    #[serde(flatten)]
    pub generation: SpriteGenerationConfig,
    pub output_mode: SpriteOutputMode,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhashSettings {
    /// 指紋紀錄檔位置
    pub store_path: String,
    /// 已有 phash 時仍重新計算
    pub overwrite: bool,
}

impl Default for PhashSettings {
    fn default() -> Self {
        Self {
            store_path: "fingerprints.json".to_string(),
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// 選單語言，對應 `locales/` 內的語系代碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en-US")]
    EnUs,
    #[default]
    #[serde(rename = "zh-TW")]
    ZhTw,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::ZhTw => "zh-TW",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnUs => write!(f, "English"),
            Self::ZhTw => write!(f, "繁體中文"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub language: Language,
    pub sprite: SpriteSettings,
    pub phash: PhashSettings,
    pub ffmpeg: FfmpegSettings,
    pub recent_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file_type_table: FileTypeTable,
    pub settings: UserSettings,
}
