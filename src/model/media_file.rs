use super::fingerprint::FingerprintSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

/// 影片或圖片資產
///
/// 未知的數值欄位以 `None` 表示，和「值為 0」區分開來。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    /// 檔案位於壓縮檔內時，指向該壓縮檔
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    pub kind: MediaKind,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<i64>,
    #[serde(default)]
    pub frame_rate: Option<f64>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub fingerprints: FingerprintSet,
}

impl MediaFile {
    #[must_use]
    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self::new(path, MediaKind::Video)
    }

    #[must_use]
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::new(path, MediaKind::Image)
    }

    fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            archive: None,
            kind,
            duration: None,
            frame_count: None,
            frame_rate: None,
            width: 0,
            height: 0,
            fingerprints: FingerprintSet::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    #[must_use]
    pub const fn is_in_archive(&self) -> bool {
        self.archive.is_some()
    }

    /// 宣告的幀數；0 或未設定都視為未知
    #[must_use]
    pub fn known_frame_count(&self) -> Option<i64> {
        self.frame_count.filter(|&fc| fc > 0)
    }

    /// 日誌用的時長／幀數描述
    #[must_use]
    pub fn describe(&self) -> String {
        let duration = self
            .duration
            .map_or_else(|| "unknown".to_string(), |d| format!("{d:.3}s"));
        let frames = self
            .frame_count
            .map_or_else(|| "unknown".to_string(), |fc| fc.to_string());
        format!(
            "{} (duration={duration}, frames={frames})",
            self.path.display()
        )
    }
}
