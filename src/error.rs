use std::path::PathBuf;

/// 指紋與預覽圖管線的錯誤分類
///
/// 每種錯誤只影響目前處理中的檔案，批次處理會記錄後繼續。
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// interval / minimum / maximum 組合無效，規劃中止
    #[error("invalid sprite configuration: {0}")]
    Configuration(String),

    /// 時長或幀數不合法，該檔案無法處理
    #[error("invalid media {path:?}: {reason}")]
    InvalidMedia { path: PathBuf, reason: String },

    /// ffmpeg / ffprobe 擷取或解碼失敗
    #[error("encoder error for {path:?}: {message}")]
    Encoder { path: PathBuf, message: String },

    /// 格式與容器組合不支援（例如壓縮檔內的 AVIF），不重試
    #[error("unsupported source {path:?}: {reason}")]
    UnsupportedSource { path: PathBuf, reason: String },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn invalid_media(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidMedia {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn encoder(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Encoder {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
