//! 64 位元 DCT 感知雜湊
//!
//! 縮放為 64x64 灰階、做二維 DCT-II、取左上 8x8 低頻係數，
//! 大於中位數的位置設為 1（由最高位元開始）。對重新壓縮與縮放不敏感。

use image::DynamicImage;
use image::imageops::{self, FilterType};
use rustdct::DctPlanner;

/// 計算 DCT 前縮放的邊長
pub const HASH_IMAGE_SIZE: usize = 64;

/// 取用的低頻係數邊長，8x8 = 64 位元
const HASH_BLOCK_SIZE: usize = 8;

fn luma_pixels(image: &DynamicImage) -> Vec<f64> {
    let side = HASH_IMAGE_SIZE as u32;
    let resized = imageops::resize(&image.to_rgb8(), side, side, FilterType::Triangle);

    resized
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
        })
        .collect()
}

/// 二維 DCT-II：先對每列，再對每欄
fn dct_2d(values: &mut [f64], dimension: usize) {
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(dimension);

    values.chunks_exact_mut(dimension).for_each(|row| {
        dct.process_dct2(row);
    });

    let mut column = vec![0f64; dimension];
    for x in 0..dimension {
        for (y, value) in column.iter_mut().enumerate() {
            *value = values[y * dimension + x];
        }
        dct.process_dct2(&mut column);
        for (y, value) in column.iter().enumerate() {
            values[y * dimension + x] = *value;
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted[sorted.len() / 2]
}

#[must_use]
pub fn perception_hash(image: &DynamicImage) -> u64 {
    let mut pixels = luma_pixels(image);
    dct_2d(&mut pixels, HASH_IMAGE_SIZE);

    let low_frequencies: Vec<f64> = pixels
        .chunks_exact(HASH_IMAGE_SIZE)
        .take(HASH_BLOCK_SIZE)
        .flat_map(|row| row[..HASH_BLOCK_SIZE].iter().copied())
        .collect();

    let median = median(&low_frequencies);
    let bits = low_frequencies.len();

    low_frequencies
        .iter()
        .enumerate()
        .filter(|(_, value)| **value > median)
        .fold(0u64, |hash, (index, _)| hash | (1 << (bits - index - 1)))
}

/// 兩個雜湊之間不同的位元數
#[must_use]
pub const fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn pattern(width: u32, height: u32, offset: i16) -> DynamicImage {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let fx = f64::from(x) / f64::from(width);
            let fy = f64::from(y) / f64::from(height);
            let base = (fx * 180.0 + (fy * 6.0).sin() * 40.0 + 20.0) as i16 + offset;
            let v = base.clamp(0, 255) as u8;
            Rgb([v, v / 2, 255 - v])
        });
        DynamicImage::ImageRgb8(image)
    }

    fn other_pattern(width: u32, height: u32) -> DynamicImage {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let checker = ((x * 8 / width) + (y * 8 / height)) % 2 == 0;
            let v = if checker { 230 } else { 25 };
            Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn test_hash_is_deterministic() {
        let image = pattern(320, 180, 0);
        assert_eq!(perception_hash(&image), perception_hash(&image));
    }

    #[test]
    fn test_hash_tolerates_resize_and_brightness() {
        let original = perception_hash(&pattern(320, 180, 0));
        let resized = perception_hash(&pattern(640, 360, 0));
        let brighter = perception_hash(&pattern(320, 180, 8));

        assert!(hamming_distance(original, resized) <= 6);
        assert!(hamming_distance(original, brighter) <= 6);
    }

    #[test]
    fn test_different_images_are_far_apart() {
        let a = perception_hash(&pattern(320, 180, 0));
        let b = perception_hash(&other_pattern(320, 180));
        assert!(hamming_distance(a, b) > 10);
    }

    #[test]
    fn test_hash_sets_roughly_half_the_bits() {
        let hash = perception_hash(&pattern(320, 180, 0));
        let ones = hash.count_ones();
        assert!((16..=48).contains(&ones), "ones={ones}");
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(hamming_distance(u64::MAX, 0), 64);
    }
}
