use crate::component::{PhashGenerator, SpriteSheetGenerator};
use crate::config::Config;
use crate::pause;
use crate::signal::clear_shutdown;
use anyhow::Result;
use console::{Term, style};
use rust_i18n::t;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_sprite_generator(term: &Term, shutdown_signal: &Arc<AtomicBool>) -> Result<()> {
    clear_shutdown(shutdown_signal);
    let config = Config::new()?;
    let generator = SpriteSheetGenerator::new(config, Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        eprintln!("{} {:#}", style(t!("common.error_prefix")).red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_phash_generator(term: &Term, shutdown_signal: &Arc<AtomicBool>) -> Result<()> {
    clear_shutdown(shutdown_signal);
    let config = Config::new()?;
    let generator = PhashGenerator::new(config, Arc::clone(shutdown_signal));

    if let Err(e) = generator.run() {
        eprintln!("{} {:#}", style(t!("common.error_prefix")).red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn run_single_phash(term: &Term, shutdown_signal: &Arc<AtomicBool>) -> Result<()> {
    clear_shutdown(shutdown_signal);
    let config = Config::new()?;
    let generator = PhashGenerator::new(config, Arc::clone(shutdown_signal));

    if let Err(e) = generator.run_single() {
        eprintln!("{} {:#}", style(t!("common.error_prefix")).red().bold(), e);
    }

    pause(term)?;
    Ok(())
}
