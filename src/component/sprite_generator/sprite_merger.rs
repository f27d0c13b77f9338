use crate::error::{PipelineError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbImage};
use log::debug;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// 解碼 ffmpeg 輸出的單張影格
pub fn decode_tile(source: &Path, bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| PipelineError::encoder(source, format!("無法解碼擷取的影格: {e}")))
}

/// 依列優先順序把縮圖排成 `grid_size x grid_size` 的網格
///
/// 每格大小以第一張為準，尺寸不同的縮圖會縮放到相同大小。
pub fn combine_sprite_images(tiles: &[DynamicImage], grid_size: usize) -> Result<RgbImage> {
    let first = tiles
        .first()
        .ok_or_else(|| PipelineError::Configuration("沒有可合併的縮圖".to_string()))?;
    if tiles.len() > grid_size * grid_size {
        return Err(PipelineError::Configuration(format!(
            "縮圖數量 {} 超過 {grid_size}x{grid_size} 網格",
            tiles.len()
        )));
    }

    let tile_width = first.width();
    let tile_height = first.height();
    let grid = u32::try_from(grid_size)
        .map_err(|_| PipelineError::Configuration(format!("網格過大: {grid_size}")))?;

    let mut canvas = RgbImage::new(tile_width * grid, tile_height * grid);
    debug!(
        "合併 {} 張縮圖為 {}x{} 預覽圖 ({}x{})",
        tiles.len(),
        grid_size,
        grid_size,
        canvas.width(),
        canvas.height()
    );

    for (index, tile) in tiles.iter().enumerate() {
        let mut rgb = tile.to_rgb8();
        if rgb.dimensions() != (tile_width, tile_height) {
            rgb = imageops::resize(&rgb, tile_width, tile_height, FilterType::Triangle);
        }

        let column = (index % grid_size) as i64;
        let row = (index / grid_size) as i64;
        imageops::replace(
            &mut canvas,
            &rgb,
            column * i64::from(tile_width),
            row * i64::from(tile_height),
        );
    }

    Ok(canvas)
}

/// 依副檔名選擇編碼格式，無法辨識時用 JPEG
#[must_use]
pub fn output_format(path: &Path) -> ImageFormat {
    ImageFormat::from_path(path).unwrap_or(ImageFormat::Jpeg)
}

pub fn encode_image(image: RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// 先寫到同資料夾的暫存檔再改名，最終路徑上不會出現寫到一半的檔案
pub fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

/// 合併並寫出預覽圖
pub fn save_sprite_image(tiles: &[DynamicImage], grid_size: usize, path: &Path) -> Result<()> {
    let canvas = combine_sprite_images(tiles, grid_size)?;
    let bytes = encode_image(canvas, output_format(path))?;
    write_atomically(path, &bytes)?;
    debug!("預覽圖已寫入: {}", path.display());
    Ok(())
}
