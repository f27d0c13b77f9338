use crate::error::{PipelineError, Result};
use crate::model::{Fingerprint, MediaFile};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 交易內可用的寫入操作
pub trait StoreTransaction {
    /// 新增或覆蓋整筆檔案紀錄
    fn upsert_file(&mut self, file: &MediaFile) -> Result<()>;

    /// 以 append-unique 規則更新單一指紋；檔案不存在時先建立紀錄
    fn update_fingerprint(&mut self, file: &MediaFile, fingerprint: Fingerprint) -> Result<()>;
}

/// 指紋儲存的交易邊界
///
/// `with_transaction` 是全有或全無：閉包回傳錯誤時不會留下任何部分寫入。
pub trait FingerprintStore: Send + Sync {
    fn with_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<()>,
    ) -> Result<()>;

    /// 找出帶有相同指紋（類型與值都相同）的檔案
    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Vec<MediaFile>>;

    fn find_by_checksum(&self, checksum: &str) -> Result<Vec<MediaFile>> {
        self.find_by_fingerprint(&Fingerprint::checksum(checksum))
    }

    fn get(&self, path: &Path) -> Result<Option<MediaFile>>;
}

type Records = BTreeMap<PathBuf, MediaFile>;

struct WorkingCopy {
    records: Records,
}

impl StoreTransaction for WorkingCopy {
    fn upsert_file(&mut self, file: &MediaFile) -> Result<()> {
        self.records.insert(file.path.clone(), file.clone());
        Ok(())
    }

    fn update_fingerprint(&mut self, file: &MediaFile, fingerprint: Fingerprint) -> Result<()> {
        self.records
            .entry(file.path.clone())
            .or_insert_with(|| file.clone())
            .fingerprints
            .append_unique(fingerprint);
        Ok(())
    }
}

/// 以 JSON 檔案保存的指紋儲存；`in_memory` 版本不落地
pub struct JsonFingerprintStore {
    records: Mutex<Records>,
    file_path: Option<PathBuf>,
}

impl JsonFingerprintStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Records::new()),
            file_path: None,
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Records::new()
            } else {
                let files: Vec<MediaFile> = serde_json::from_str(&content).map_err(|e| {
                    PipelineError::Transaction(format!(
                        "無法解析指紋檔案 {}: {e}",
                        path.display()
                    ))
                })?;
                files.into_iter().map(|f| (f.path.clone(), f)).collect()
            }
        } else {
            Records::new()
        };

        debug!("載入指紋紀錄 {} 筆: {}", records.len(), path.display());

        Ok(Self {
            records: Mutex::new(records),
            file_path: Some(path.to_path_buf()),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    #[must_use]
    pub fn files(&self) -> Vec<MediaFile> {
        self.records.lock().values().cloned().collect()
    }

    fn save_to_file(path: &Path, records: &Records) -> Result<()> {
        let files: Vec<&MediaFile> = records.values().collect();
        let content = serde_json::to_string_pretty(&files)
            .map_err(|e| PipelineError::Transaction(format!("無法序列化指紋紀錄: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // 先寫暫存檔再改名，避免留下寫到一半的檔案
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(())
    }
}

impl FingerprintStore for JsonFingerprintStore {
    fn with_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTransaction) -> Result<()>,
    ) -> Result<()> {
        // 持有鎖直到提交完成，交易彼此串行
        let mut records = self.records.lock();
        let mut working = WorkingCopy {
            records: records.clone(),
        };

        f(&mut working)?;

        if let Some(path) = &self.file_path {
            Self::save_to_file(path, &working.records).map_err(|e| {
                warn!("指紋紀錄寫入失敗 {}: {e}", path.display());
                PipelineError::Transaction(format!("無法寫入 {}: {e}", path.display()))
            })?;
        }

        *records = working.records;
        Ok(())
    }

    fn find_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Vec<MediaFile>> {
        let records = self.records.lock();
        Ok(records
            .values()
            .filter(|file| file.fingerprints.get(fingerprint.kind) == Some(&fingerprint.value))
            .cloned()
            .collect())
    }

    fn get(&self, path: &Path) -> Result<Option<MediaFile>> {
        Ok(self.records.lock().get(path).cloned())
    }
}
