//! Perceptual average hash for images.
//!
//! The image is converted to grayscale, downscaled to 8×8, and each pixel
//! contributes one bit: set when it is brighter than the mean. Bits are
//! packed row-major, most significant first.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader};

/// Side length of the downscaled hash grid.
pub const HASH_SIDE: u32 = 8;

/// Decode an image file and compute its average hash.
///
/// The format is sniffed from content, so a mislabelled extension still
/// decodes when the bytes are a supported format.
pub fn average_hash(path: &Path) -> Result<u64, ImageError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(average_hash_of(&image))
}

/// Compute the average hash of a decoded image.
pub fn average_hash_of(image: &DynamicImage) -> u64 {
    let gray = image.to_luma8();
    let small = imageops::resize(&gray, HASH_SIDE, HASH_SIDE, FilterType::Lanczos3);

    let pixels: Vec<u32> = small.pixels().map(|p| u32::from(p.0[0])).collect();
    let total: u32 = pixels.iter().sum();
    let mean = f64::from(total) / pixels.len() as f64;

    pixels
        .iter()
        .fold(0u64, |bits, &p| (bits << 1) | u64::from(f64::from(p) > mean))
}

/// Number of differing bits between two hashes.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn split_image(width: u32, height: u32) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, _| {
            if x < width / 2 { Luma([0]) } else { Luma([255]) }
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_left_dark_right_bright() {
        let hash = average_hash_of(&split_image(64, 64));
        // Each row: four dark bits then four bright bits.
        assert_eq!(hash, 0x0f0f_0f0f_0f0f_0f0f);
    }

    #[test]
    fn test_hash_is_scale_invariant() {
        let small = average_hash_of(&split_image(32, 32));
        let large = average_hash_of(&split_image(256, 256));
        assert_eq!(small, large);
    }

    #[test]
    fn test_uniform_image_hashes_to_zero() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([128])));
        assert_eq!(average_hash_of(&img), 0);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(0b1011, 0b0001), 2);
        assert_eq!(hamming_distance(u64::MAX, 0), 64);
    }
}
