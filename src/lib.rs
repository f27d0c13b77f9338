pub mod component;
pub mod config;
pub mod error;
pub mod init;
pub mod menu;
pub mod model;
pub mod signal;
pub mod tools;

pub use error::PipelineError;

rust_i18n::i18n!("locales", fallback = "en-US");

use anyhow::Result;
use console::{Term, style};
use dialoguer::Input;
use std::path::PathBuf;
use tools::normalize_input_path;

pub fn pause(term: &Term) -> Result<()> {
    println!("\n{}", style("按 Enter 繼續...").dim());
    term.read_line()?;
    Ok(())
}

/// 詢問資料夾路徑，預設帶入最近一次使用的路徑
pub fn prompt_directory(prompt: &str, recent_paths: &[String]) -> Result<PathBuf> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(recent) = recent_paths.first() {
        input = input.default(recent.clone());
    }
    let path = input.interact_text()?;
    Ok(normalize_input_path(&path))
}
