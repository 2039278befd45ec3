use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, Luma, imageops};

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

// BT.601 weights in 14-bit fixed point, as used by OpenCV's RGB-to-gray.
const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;

/// Convert to 8-bit luma and equalize its histogram.
///
/// This is the contrast normalization every detector pass runs on.
pub fn to_equalized_gray(image: &DynamicImage) -> GrayImage {
    equalize_histogram(&to_gray(image))
}

/// 8-bit luma with BT.601 weights. Alpha is ignored; luma inputs pass through.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            image.to_luma8()
        }
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([bt601_luma(r, g, b)])
            })
        }
    }
}

fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B;
    ((weighted + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Spread the luma histogram over the full `0..=255` range.
pub fn equalize_histogram(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let mut hist = [0u32; 256];
    for px in gray.pixels() {
        hist[px[0] as usize] += 1;
    }
    let lut = build_equalization_lut(&hist, w * h);

    let mut out = gray.clone();
    for px in out.pixels_mut() {
        px[0] = lut[px[0] as usize];
    }
    out
}

/// Horizontally mirrored copy of a grayscale frame.
pub fn mirror_horizontal(gray: &GrayImage) -> GrayImage {
    imageops::flip_horizontal(gray)
}

fn identity_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, item) in lut.iter_mut().enumerate() {
        *item = i as u8;
    }
    lut
}

fn build_equalization_lut(hist: &[u32; 256], total: u32) -> [u8; 256] {
    if total == 0 {
        return identity_lut();
    }

    let mut cdf = [0u32; 256];
    let mut cumulative = 0u32;
    let mut cdf_min = None;
    for (idx, count) in hist.iter().enumerate() {
        cumulative += *count;
        cdf[idx] = cumulative;
        if cdf_min.is_none() && *count > 0 {
            cdf_min = Some(cumulative);
        }
    }

    let cdf_min = match cdf_min {
        Some(v) => v,
        None => return identity_lut(),
    };

    // Single-level image: nothing to spread.
    if cdf_min == total {
        return identity_lut();
    }

    let denom = (total - cdf_min) as f32;
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let numerator = cdf[i].saturating_sub(cdf_min) as f32;
        *slot = (numerator / denom * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn equalization_stretches_two_levels() {
        let mut img = GrayImage::new(4, 1);
        for x in 0..2 {
            img.put_pixel(x, 0, Luma([90]));
        }
        for x in 2..4 {
            img.put_pixel(x, 0, Luma([110]));
        }
        let out = equalize_histogram(&img);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn flat_image_is_unchanged() {
        let img = GrayImage::from_pixel(3, 3, Luma([42]));
        assert_eq!(equalize_histogram(&img), img);
    }

    #[test]
    fn mirror_flips_columns() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([1]));
        img.put_pixel(2, 0, Luma([3]));
        let flipped = mirror_horizontal(&img);
        assert_eq!(flipped.get_pixel(0, 0)[0], 3);
        assert_eq!(flipped.get_pixel(2, 0)[0], 1);
    }

    #[test]
    fn equalized_gray_keeps_dimensions() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(7, 5, Rgb([10, 200, 30])));
        assert_eq!(to_equalized_gray(&rgb).dimensions(), (7, 5));
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([200, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 90, 0]));
        let rgb = DynamicImage::ImageRgb8(img);

        let gray = to_gray(&rgb);
        assert_eq!((gray.get_pixel(0, 0)[0], gray.get_pixel(1, 0)[0]), (60, 53));

        // Red is the brighter pixel, so it must end up at the top after equalization.
        let equalized = to_equalized_gray(&rgb);
        assert_eq!(
            (equalized.get_pixel(0, 0)[0], equalized.get_pixel(1, 0)[0]),
            (255, 0)
        );
    }

    #[test]
    fn gray_extremes_and_alpha() {
        assert_eq!(bt601_luma(255, 255, 255), 255);
        assert_eq!(bt601_luma(0, 0, 0), 0);
        assert_eq!(bt601_luma(0, 0, 255), 29);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([200, 0, 0, 0])));
        assert_eq!(to_gray(&rgba).get_pixel(0, 0)[0], 60);
    }

    #[test]
    fn luma_input_passes_through() {
        let gray = GrayImage::from_pixel(2, 2, Luma([77]));
        assert_eq!(to_gray(&DynamicImage::ImageLuma8(gray.clone())), gray);
    }
}
