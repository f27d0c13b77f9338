//! 以路徑為單位的讀寫鎖
//!
//! 擷取影格等讀取操作取得共享鎖；重新掃描、刪除等前景變更取得獨佔鎖。
//! 不同路徑互不影響。取得鎖時會一直阻塞，沒有內建逾時，
//! 需要限制等待時間的呼叫端使用 `*_cancellable` 版本搭配中斷信號。

use crate::error::{PipelineError, Result};
use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 等待期間檢查中斷信號的間隔
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct PathState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

impl PathState {
    const fn is_idle(&self) -> bool {
        self.readers == 0 && !self.writer && self.waiting_writers == 0
    }

    // 有寫者在排隊時新的讀者也要等，避免寫者飢餓
    const fn can_read(&self) -> bool {
        !self.writer && self.waiting_writers == 0
    }

    const fn can_write(&self) -> bool {
        !self.writer && self.readers == 0
    }
}

#[derive(Debug, Default)]
pub struct LockCoordinator {
    state: Mutex<HashMap<PathBuf, PathState>>,
    released: Condvar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shared,
    Exclusive,
}

impl LockCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_shared(&self, path: &Path) -> SharedScope<'_> {
        let mut state = self.state.lock();
        while !state.entry(path.to_path_buf()).or_default().can_read() {
            self.released.wait(&mut state);
        }
        Self::grant(&mut state, path, Mode::Shared);
        SharedScope {
            coordinator: self,
            path: path.to_path_buf(),
        }
    }

    pub fn acquire_exclusive(&self, path: &Path) -> ExclusiveScope<'_> {
        let mut state = self.state.lock();
        state.entry(path.to_path_buf()).or_default().waiting_writers += 1;
        while !state.entry(path.to_path_buf()).or_default().can_write() {
            self.released.wait(&mut state);
        }
        Self::grant(&mut state, path, Mode::Exclusive);
        ExclusiveScope {
            coordinator: self,
            path: path.to_path_buf(),
        }
    }

    /// 等待共享鎖，期間收到中斷信號則放棄並回傳 `Cancelled`
    pub fn acquire_shared_cancellable(
        &self,
        path: &Path,
        cancel: &AtomicBool,
    ) -> Result<SharedScope<'_>> {
        let mut state = self.state.lock();
        while !state.entry(path.to_path_buf()).or_default().can_read() {
            if cancel.load(Ordering::SeqCst) {
                self.cleanup(&mut state, path);
                return Err(PipelineError::Cancelled);
            }
            self.released.wait_for(&mut state, CANCEL_POLL_INTERVAL);
        }
        Self::grant(&mut state, path, Mode::Shared);
        Ok(SharedScope {
            coordinator: self,
            path: path.to_path_buf(),
        })
    }

    /// 等待獨佔鎖，期間收到中斷信號則放棄並回傳 `Cancelled`
    pub fn acquire_exclusive_cancellable(
        &self,
        path: &Path,
        cancel: &AtomicBool,
    ) -> Result<ExclusiveScope<'_>> {
        let mut state = self.state.lock();
        state.entry(path.to_path_buf()).or_default().waiting_writers += 1;
        while !state.entry(path.to_path_buf()).or_default().can_write() {
            if cancel.load(Ordering::SeqCst) {
                if let Some(entry) = state.get_mut(path) {
                    entry.waiting_writers -= 1;
                }
                self.cleanup(&mut state, path);
                // 排隊中的寫者離開後，被擋住的讀者可以繼續
                self.released.notify_all();
                return Err(PipelineError::Cancelled);
            }
            self.released.wait_for(&mut state, CANCEL_POLL_INTERVAL);
        }
        Self::grant(&mut state, path, Mode::Exclusive);
        Ok(ExclusiveScope {
            coordinator: self,
            path: path.to_path_buf(),
        })
    }

    /// 目前持有該路徑共享鎖的數量
    #[must_use]
    pub fn shared_count(&self, path: &Path) -> usize {
        self.state.lock().get(path).map_or(0, |s| s.readers)
    }

    #[must_use]
    pub fn is_exclusively_held(&self, path: &Path) -> bool {
        self.state.lock().get(path).is_some_and(|s| s.writer)
    }

    fn grant(state: &mut MutexGuard<'_, HashMap<PathBuf, PathState>>, path: &Path, mode: Mode) {
        let entry = state.entry(path.to_path_buf()).or_default();
        match mode {
            Mode::Shared => entry.readers += 1,
            Mode::Exclusive => {
                entry.waiting_writers -= 1;
                entry.writer = true;
            }
        }
        debug!("取得 {mode:?} 鎖: {}", path.display());
    }

    fn release(&self, path: &Path, mode: Mode) {
        let mut state = self.state.lock();
        if let Some(entry) = state.get_mut(path) {
            match mode {
                Mode::Shared => entry.readers = entry.readers.saturating_sub(1),
                Mode::Exclusive => entry.writer = false,
            }
        }
        self.cleanup(&mut state, path);
        drop(state);
        self.released.notify_all();
        debug!("釋放 {mode:?} 鎖: {}", path.display());
    }

    fn cleanup(&self, state: &mut MutexGuard<'_, HashMap<PathBuf, PathState>>, path: &Path) {
        if state.get(path).is_some_and(PathState::is_idle) {
            state.remove(path);
        }
    }
}

/// 共享鎖範圍，drop 時釋放（包含錯誤與中斷路徑）
#[must_use = "鎖在 drop 時立即釋放"]
#[derive(Debug)]
pub struct SharedScope<'a> {
    coordinator: &'a LockCoordinator,
    path: PathBuf,
}

impl Drop for SharedScope<'_> {
    fn drop(&mut self) {
        self.coordinator.release(&self.path, Mode::Shared);
    }
}

/// 獨佔鎖範圍，drop 時釋放
#[must_use = "鎖在 drop 時立即釋放"]
#[derive(Debug)]
pub struct ExclusiveScope<'a> {
    coordinator: &'a LockCoordinator,
    path: PathBuf,
}

impl Drop for ExclusiveScope<'_> {
    fn drop(&mut self) {
        self.coordinator.release(&self.path, Mode::Exclusive);
    }
}
