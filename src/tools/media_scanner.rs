use crate::config::FileTypeTable;
use crate::error::Result;
use crate::model::{MediaFile, MediaKind};
use crate::tools::encoder::EncoderGateway;
use crate::tools::ffprobe_info::VideoInfo;
use crate::tools::lock_coordinator::LockCoordinator;
use anyhow::Context;
use log::{debug, warn};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use walkdir::WalkDir;

/// 掃描資料夾內所有影片與圖片，依路徑排序
///
/// 只依副檔名分類，不讀取檔案內容；壓縮檔略過不展開。
pub fn scan_media_files(
    directory: &Path,
    file_type_table: &FileTypeTable,
) -> anyhow::Result<Vec<MediaFile>> {
    if !directory.is_dir() {
        anyhow::bail!("路徑不是資料夾: {}", directory.display());
    }

    let mut media_files: Vec<MediaFile> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| match file_type_table.media_kind(entry.path()) {
            Some(MediaKind::Video) => Some(MediaFile::video(entry.into_path())),
            Some(MediaKind::Image) => Some(MediaFile::image(entry.into_path())),
            None => None,
        })
        .collect();

    media_files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(
        "掃描 {} 找到 {} 個媒體檔案",
        directory.display(),
        media_files.len()
    );
    Ok(media_files)
}

/// 只保留影片
pub fn scan_video_files(
    directory: &Path,
    file_type_table: &FileTypeTable,
) -> anyhow::Result<Vec<MediaFile>> {
    let files = scan_media_files(directory, file_type_table)
        .with_context(|| format!("無法掃描影片: {}", directory.display()))?;
    Ok(files
        .into_iter()
        .filter(|f| f.kind == MediaKind::Video)
        .collect())
}

/// 把 ffprobe 結果寫回 MediaFile
///
/// 長度為 0 代表 ffprobe 沒有回報長度，保留為未設定。
pub fn apply_video_info(file: &mut MediaFile, info: &VideoInfo) {
    file.duration = Some(info.duration_seconds).filter(|d| *d > 0.0);
    file.frame_count = info.frame_count;
    file.frame_rate = info.frame_rate;
    file.width = info.width;
    file.height = info.height;
}

/// 以 Encoder Gateway 探測影片資訊並填入 MediaFile
///
/// 探測期間持有來源檔的共享鎖，等待時收到中斷信號回傳 `Cancelled`。
pub fn probe_media(
    encoder: &dyn EncoderGateway,
    locks: &LockCoordinator,
    cancel: &AtomicBool,
    file: &mut MediaFile,
) -> Result<()> {
    if file.kind != MediaKind::Video {
        return Ok(());
    }

    let probed = {
        let _source_lock = locks.acquire_shared_cancellable(&file.path, cancel)?;
        encoder.probe(&file.path)
    };

    match probed {
        Ok(info) => {
            apply_video_info(file, &info);
            Ok(())
        }
        Err(e) => {
            warn!("無法取得影片資訊 {}: {e}", file.path.display());
            Err(e)
        }
    }
}
