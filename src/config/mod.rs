pub mod load;
pub mod save;
pub mod types;

pub use types::{
    Config, DEFAULT_SPRITE_AMOUNT, DEFAULT_SPRITE_SIZE, FfmpegSettings, FileTypeTable, Language,
    MAX_RECENT_PATHS, PhashSettings, SpriteGenerationConfig, SpriteOutputMode, SpriteSettings,
    UserSettings,
};
