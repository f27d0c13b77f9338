use crate::config::save::save_settings;
use crate::config::{Config, Language, SpriteOutputMode};
use crate::menu::handlers::{run_phash_generator, run_single_phash, run_sprite_generator};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use rust_i18n::t;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style(t!("main_menu.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let options = [
        t!("main_menu.opt_sprite"),
        t!("main_menu.opt_phash_batch"),
        t!("main_menu.opt_phash_single"),
        t!("main_menu.opt_settings"),
        t!("main_menu.exit"),
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(t!("main_menu.prompt"))
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_sprite_generator(term, shutdown_signal)?;
            reload_settings(config);
            Ok(true)
        }
        Some(1) => {
            run_phash_generator(term, shutdown_signal)?;
            reload_settings(config);
            Ok(true)
        }
        Some(2) => {
            run_single_phash(term, shutdown_signal)?;
            Ok(true)
        }
        Some(3) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(4) | None => Ok(false),
        _ => unreachable!(),
    }
}

/// 元件執行後可能更新了最近路徑，重新讀取設定
fn reload_settings(config: &mut Config) {
    if let Ok(fresh) = Config::new() {
        config.settings = fresh.settings;
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style(t!("settings.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let options = [
            t!("settings.opt_sprite"),
            t!("settings.opt_phash"),
            t!("settings.opt_ffmpeg"),
            t!("settings.opt_language"),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_sprite_settings_menu(term, config)?,
            Some(1) => show_phash_settings_menu(term, config)?,
            Some(2) => show_ffmpeg_settings_menu(term, config)?,
            Some(3) => show_language_menu(term, config)?,
            Some(4) | None => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn show_sprite_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        let sprite = &config.settings.sprite;
        println!("{}", style(t!("settings.sprite.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let generation = &sprite.generation;
        let options = [
            t!("settings.sprite.minimum", value = generation.minimum_sprites),
            t!("settings.sprite.maximum", value = generation.maximum_sprites),
            t!("settings.sprite.interval", value = generation.sprite_interval),
            t!("settings.sprite.size", value = generation.sprite_size),
            t!("settings.sprite.output_mode", value = output_mode_label(sprite.output_mode)),
            t!("settings.sprite.overwrite", value = on_off(sprite.overwrite)),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.item_prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let generation = &mut config.settings.sprite.generation;
        match selection {
            Some(0) => {
                generation.minimum_sprites = prompt_non_negative_i32(
                    &t!("settings.sprite.minimum_prompt"),
                    generation.minimum_sprites,
                )?;
            }
            Some(1) => {
                generation.maximum_sprites = prompt_non_negative_i32(
                    &t!("settings.sprite.maximum_prompt"),
                    generation.maximum_sprites,
                )?;
            }
            Some(2) => {
                generation.sprite_interval = Input::<f64>::new()
                    .with_prompt(t!("settings.sprite.interval_prompt"))
                    .default(generation.sprite_interval)
                    .validate_with(|value: &f64| {
                        if value.is_finite() && *value >= 0.0 {
                            Ok(())
                        } else {
                            Err(t!("common.invalid_number"))
                        }
                    })
                    .interact_text_on(term)?;
            }
            Some(3) => {
                generation.sprite_size = prompt_non_negative_i32(
                    &t!("settings.sprite.size_prompt"),
                    generation.sprite_size,
                )?;
            }
            Some(4) => {
                let modes = [SpriteOutputMode::SubDirectory, SpriteOutputMode::SameDirectory];
                let labels = modes.map(output_mode_label);
                let current = config.settings.sprite.output_mode;
                let Some(mode) = select_value(
                    term,
                    &t!("settings.sprite.output_mode_prompt"),
                    &modes,
                    &labels,
                    current,
                )?
                else {
                    continue;
                };
                config.settings.sprite.output_mode = mode;
            }
            Some(5) => {
                config.settings.sprite.overwrite = !config.settings.sprite.overwrite;
            }
            Some(6) | None => break,
            _ => unreachable!(),
        }

        save_and_notify(config)?;
    }

    Ok(())
}

fn show_phash_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        let phash = &config.settings.phash;
        println!("{}", style(t!("settings.phash.title")).cyan().bold());
        println!("{}", style(t!("common.esc_hint")).dim());

        let options = [
            t!("settings.phash.store_path", value = phash.store_path),
            t!("settings.phash.overwrite", value = on_off(phash.overwrite)),
            t!("settings.back"),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("settings.item_prompt"))
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => {
                config.settings.phash.store_path = Input::<String>::new()
                    .with_prompt(t!("settings.phash.store_path_prompt"))
                    .default(config.settings.phash.store_path.clone())
                    .interact_text_on(term)?
                    .trim()
                    .to_string();
            }
            Some(1) => {
                config.settings.phash.overwrite = !config.settings.phash.overwrite;
            }
            Some(2) | None => break,
            _ => unreachable!(),
        }

        save_and_notify(config)?;
    }

    Ok(())
}

fn show_ffmpeg_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.ffmpeg.title")).cyan().bold());

    let ffmpeg = &mut config.settings.ffmpeg;
    ffmpeg.ffmpeg_path = Input::<String>::new()
        .with_prompt("ffmpeg")
        .default(ffmpeg.ffmpeg_path.clone())
        .interact_text_on(term)?
        .trim()
        .to_string();
    ffmpeg.ffprobe_path = Input::<String>::new()
        .with_prompt("ffprobe")
        .default(ffmpeg.ffprobe_path.clone())
        .interact_text_on(term)?
        .trim()
        .to_string();

    save_and_notify(config)
}

/// 語言設定選單
fn show_language_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style(t!("settings.language.title")).cyan().bold());
    println!("{}", style(t!("common.esc_hint")).dim());

    let languages = [Language::ZhTw, Language::EnUs];
    let labels = languages.map(|language| Cow::Owned(language.to_string()));
    let Some(selected) = select_value(
        term,
        &t!("settings.language.prompt"),
        &languages,
        &labels,
        config.settings.language,
    )?
    else {
        return Ok(());
    };

    if selected != config.settings.language {
        config.settings.language = selected;
        rust_i18n::set_locale(selected.as_str());
        save_and_notify(config)?;
    }

    Ok(())
}

fn prompt_non_negative_i32(prompt: &str, current: i32) -> Result<i32> {
    let value = Input::<i32>::new()
        .with_prompt(prompt)
        .default(current)
        .validate_with(|value: &i32| {
            if *value >= 0 {
                Ok(())
            } else {
                Err(t!("common.invalid_integer"))
            }
        })
        .interact_text()?;
    Ok(value)
}

fn select_value<T: Copy + PartialEq>(
    term: &Term,
    prompt: &str,
    values: &[T],
    labels: &[Cow<'static, str>],
    current: T,
) -> Result<Option<T>> {
    let default_index = values.iter().position(|&v| v == current).unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(labels)
        .default(default_index)
        .interact_on_opt(term)?;

    Ok(selection.map(|index| values[index]))
}

fn save_and_notify(config: &Config) -> Result<()> {
    save_settings(&config.settings)?;
    println!("\n{}", style(t!("settings.saved")).green());
    std::thread::sleep(std::time::Duration::from_millis(600));
    Ok(())
}

fn output_mode_label(mode: SpriteOutputMode) -> Cow<'static, str> {
    match mode {
        SpriteOutputMode::SubDirectory => t!("settings.sprite.sub_directory"),
        SpriteOutputMode::SameDirectory => t!("settings.sprite.same_directory"),
    }
}

fn on_off(value: bool) -> Cow<'static, str> {
    if value { t!("common.on") } else { t!("common.off") }
}
