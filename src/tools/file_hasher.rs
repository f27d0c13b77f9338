use crate::model::Fingerprint;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// 計算檔案內容的 BLAKE3 checksum，作為去重用的指紋
pub fn calculate_checksum(path: &Path) -> Result<Fingerprint> {
    let file = File::open(path).with_context(|| format!("無法開啟檔案: {}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = blake3::Hasher::new();

    hasher
        .update_reader(&mut reader)
        .with_context(|| format!("讀取檔案失敗: {}", path.display()))?;

    Ok(Fingerprint::checksum(hasher.finalize().to_hex().to_string()))
}
