use super::engine::PhashEngine;
use crate::error::{PipelineError, Result};
use crate::model::{Fingerprint, MediaFile};
use crate::tools::FingerprintStore;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhashOutcome {
    /// 已有 phash 且不覆蓋
    AlreadyPresent,
    /// 沿用相同 checksum 的其他檔案的 phash
    Reused(u64),
    Generated(u64),
}

impl PhashOutcome {
    #[must_use]
    pub const fn hash(&self) -> Option<u64> {
        match self {
            Self::AlreadyPresent => None,
            Self::Reused(hash) | Self::Generated(hash) => Some(*hash),
        }
    }
}

/// 為單一檔案產生 phash 並寫入指紋儲存
///
/// 不覆蓋時先找內容相同（checksum 一致）且已有 phash 的檔案直接沿用。
/// 兩個相同內容的檔案同時各自計算是可接受的，結果一定相同。
pub struct GeneratePhashTask {
    store: Arc<dyn FingerprintStore>,
    engine: Arc<PhashEngine>,
    shutdown_signal: Arc<AtomicBool>,
    overwrite: bool,
}

impl GeneratePhashTask {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        engine: Arc<PhashEngine>,
        shutdown_signal: Arc<AtomicBool>,
        overwrite: bool,
    ) -> Self {
        Self {
            store,
            engine,
            shutdown_signal,
            overwrite,
        }
    }

    #[must_use]
    pub fn description(file: &MediaFile) -> String {
        format!("Generating phash for {}", file.path.display())
    }

    fn required(&self, file: &MediaFile) -> bool {
        self.overwrite || file.fingerprints.phash().is_none()
    }

    pub fn run(&self, file: &mut MediaFile) -> Result<PhashOutcome> {
        if !self.required(file) {
            return Ok(PhashOutcome::AlreadyPresent);
        }

        let existing = if self.overwrite {
            None
        } else {
            match self.find_existing_phash(file) {
                Ok(found) => found,
                Err(e) => {
                    warn!("查詢既有 phash 失敗: {e}");
                    None
                }
            }
        };

        let outcome = if let Some(hash) = existing {
            info!("沿用既有 phash: {}", file.path.display());
            PhashOutcome::Reused(hash)
        } else {
            debug!("{}", Self::description(file));
            PhashOutcome::Generated(self.engine.generate(file)?)
        };

        let Some(hash) = outcome.hash() else {
            return Ok(outcome);
        };

        if self.shutdown_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Cancelled);
        }

        let fingerprint = Fingerprint::phash(hash);
        let record: &MediaFile = file;
        let committed = self.store.with_transaction(&mut |txn| {
            txn.update_fingerprint(record, fingerprint.clone())
        });

        match committed {
            Ok(()) => {
                file.fingerprints.append_unique(fingerprint);
                Ok(outcome)
            }
            // 提交當下剛好被中斷時不回報錯誤
            Err(e) if self.shutdown_signal.load(Ordering::SeqCst) => {
                debug!("中斷時提交失敗，略過: {e}");
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    }

    /// 找出 checksum 相同且已有 phash 的第一個檔案
    fn find_existing_phash(&self, file: &MediaFile) -> Result<Option<u64>> {
        let Some(checksum) = file.fingerprints.checksum() else {
            return Ok(None);
        };

        let siblings = self.store.find_by_checksum(checksum)?;
        Ok(siblings
            .iter()
            .find_map(|sibling| sibling.fingerprints.phash()))
    }
}
