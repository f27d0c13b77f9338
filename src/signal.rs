//! Ctrl-C 中斷旗標
//!
//! 第一次 Ctrl-C 只設定旗標，進行中的擷取、鎖等待與提交會自行停下；
//! 旗標已設定時再按一次則直接結束程式。

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 被中斷時的結束碼（128 + SIGINT）
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[must_use]
pub fn setup_shutdown_signal() -> Arc<AtomicBool> {
    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let handler_signal = Arc::clone(&shutdown_signal);

    let installed = ctrlc::set_handler(move || {
        if request_shutdown(&handler_signal) {
            eprintln!("\n收到中斷信號，完成目前的步驟後停止...");
        } else {
            eprintln!("\n再次收到中斷信號，立即結束");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    if let Err(e) = installed {
        warn!("無法設定 Ctrl-C 處理器，中斷將直接結束程式: {e}");
    }

    shutdown_signal
}

/// 設定中斷旗標，回傳是否為第一次要求
pub fn request_shutdown(shutdown_signal: &AtomicBool) -> bool {
    !shutdown_signal.swap(true, Ordering::SeqCst)
}

/// 新的批次開始前清除上一次的中斷
pub fn clear_shutdown(shutdown_signal: &AtomicBool) {
    if shutdown_signal.swap(false, Ordering::SeqCst) {
        warn!("清除上一次的中斷信號");
    }
}
