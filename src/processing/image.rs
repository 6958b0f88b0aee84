use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use serde::{Deserialize, Serialize};

/// Rectangular structuring element, anchored at its centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectKernel {
    pub width: u32,
    pub height: u32,
}

impl RectKernel {
    pub const fn new(width: u32, height: u32) -> Self {
        RectKernel { width, height }
    }
}

/// Grey-level image operations shared by the locator and the recognizer.
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn smooth(image: &GrayImage, sigma: f32) -> GrayImage {
        if sigma <= 0.0 {
            return image.clone();
        }
        gaussian_blur_f32(image, sigma)
    }

    pub fn dilate_rect(image: &GrayImage, kernel: RectKernel) -> GrayImage {
        rect_filter(image, kernel, u8::max)
    }

    pub fn erode_rect(image: &GrayImage, kernel: RectKernel) -> GrayImage {
        rect_filter(image, kernel, u8::min)
    }

    pub fn close_rect(image: &GrayImage, kernel: RectKernel) -> GrayImage {
        Self::erode_rect(&Self::dilate_rect(image, kernel), kernel)
    }

    /// Closing minus the source: dark details narrower than the kernel turn bright.
    pub fn blackhat(image: &GrayImage, kernel: RectKernel) -> GrayImage {
        let mut closed = Self::close_rect(image, kernel);
        for (out, src) in closed.pixels_mut().zip(image.pixels()) {
            out[0] = out[0].saturating_sub(src[0]);
        }
        closed
    }

    /// Absolute gradient values stretched linearly onto 0..=255.
    pub fn normalize_gradient(gradient: &ImageBuffer<Luma<i16>, Vec<i16>>) -> GrayImage {
        let (width, height) = gradient.dimensions();
        let magnitudes: Vec<u16> = gradient.as_raw().iter().map(|v| v.unsigned_abs()).collect();
        let min = magnitudes.iter().copied().min().unwrap_or(0);
        let max = magnitudes.iter().copied().max().unwrap_or(0);
        if max == min {
            return GrayImage::new(width, height);
        }

        let scale = 255.0 / f32::from(max - min);
        let data = magnitudes
            .iter()
            .map(|&m| (f32::from(m - min) * scale) as u8)
            .collect();
        gray_from_raw(width, height, data)
    }

    pub fn otsu_binarize(image: &GrayImage) -> GrayImage {
        threshold(image, otsu_level(image))
    }

    pub fn denoise(image: &GrayImage, radius: u32) -> GrayImage {
        if radius == 0 {
            return image.clone();
        }
        median_filter(image, radius, radius)
    }

    pub fn upscale(image: &GrayImage, factor: u32) -> GrayImage {
        if factor <= 1 {
            return image.clone();
        }
        let (width, height) = image.dimensions();
        imageops::resize(image, width * factor, height * factor, FilterType::CatmullRom)
    }

    /// Contrast-limited adaptive histogram equalisation over a `grid`×`grid` tiling,
    /// bilinearly blending the per-tile mappings.
    pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image.clone();
        }
        let tiles_x = grid.clamp(1, width);
        let tiles_y = grid.clamp(1, height);
        let span = |i: u32, n: u32, len: u32| (i * len / n, (i + 1) * len / n);

        let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let (x0, x1) = span(tx, tiles_x, width);
                let (y0, y1) = span(ty, tiles_y, height);

                let mut hist = [0u32; 256];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[image.get_pixel(x, y)[0] as usize] += 1;
                    }
                }
                let area = (x1 - x0) * (y1 - y0);
                let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

                let mut excess = 0;
                for bin in hist.iter_mut() {
                    if *bin > limit {
                        excess += *bin - limit;
                        *bin = limit;
                    }
                }
                let bonus = excess / 256;
                let residual = (excess % 256) as usize;
                for (k, bin) in hist.iter_mut().enumerate() {
                    *bin += bonus + u32::from(k < residual);
                }

                let lut = &mut luts[(ty * tiles_x + tx) as usize];
                let scale = 255.0 / area as f32;
                let mut cdf = 0;
                for (k, count) in hist.iter().enumerate() {
                    cdf += count;
                    lut[k] = (cdf as f32 * scale).round().min(255.0) as u8;
                }
            }
        }

        let tile_w = width as f32 / tiles_x as f32;
        let tile_h = height as f32 / tiles_y as f32;
        let neighbours = |pos: f32, n: u32| {
            let base = pos.floor();
            let lo = (base.max(0.0) as u32).min(n - 1);
            let hi = ((base + 1.0).max(0.0) as u32).min(n - 1);
            (lo, hi, (pos - base).clamp(0.0, 1.0))
        };

        ImageBuffer::from_fn(width, height, |x, y| {
            let value = image.get_pixel(x, y)[0] as usize;
            let (x0, x1, fx) = neighbours((x as f32 + 0.5) / tile_w - 0.5, tiles_x);
            let (y0, y1, fy) = neighbours((y as f32 + 0.5) / tile_h - 0.5, tiles_y);
            let at = |tx: u32, ty: u32| f32::from(luts[(ty * tiles_x + tx) as usize][value]);

            let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
            let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
            Luma([(top * (1.0 - fy) + bottom * fy).round() as u8])
        })
    }
}

fn gray_from_raw(width: u32, height: u32, data: Vec<u8>) -> GrayImage {
    ImageBuffer::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

// Separable min/max sweep; out-of-image samples are ignored.
fn rect_filter(image: &GrayImage, kernel: RectKernel, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as i64, height as i64);
    let kx = i64::from(kernel.width.max(1));
    let ky = i64::from(kernel.height.max(1));
    let (ax, ay) = (kx / 2, ky / 2);
    let src = image.as_raw();

    let mut horizontal = vec![0u8; src.len()];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let lo = (x - ax).max(0);
            let hi = (x - ax + kx - 1).min(w - 1);
            let mut acc = src[(row + x) as usize];
            for sx in lo..=hi {
                acc = pick(acc, src[(row + sx) as usize]);
            }
            horizontal[(row + x) as usize] = acc;
        }
    }

    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        let lo = (y - ay).max(0);
        let hi = (y - ay + ky - 1).min(h - 1);
        for x in 0..w {
            let mut acc = horizontal[(y * w + x) as usize];
            for sy in lo..=hi {
                acc = pick(acc, horizontal[(sy * w + x) as usize]);
            }
            out[(y * w + x) as usize] = acc;
        }
    }

    gray_from_raw(width, height, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_with_dark_dot() -> GrayImage {
        let mut image = GrayImage::from_pixel(9, 9, Luma([255]));
        image.put_pixel(4, 4, Luma([0]));
        image
    }

    #[test]
    fn test_erode_spreads_dark_pixel_over_kernel() {
        let eroded = ImageProcessor::erode_rect(&white_with_dark_dot(), RectKernel::new(3, 1));
        assert_eq!(eroded.get_pixel(3, 4)[0], 0);
        assert_eq!(eroded.get_pixel(5, 4)[0], 0);
        assert_eq!(eroded.get_pixel(4, 3)[0], 255);
        assert_eq!(eroded.get_pixel(6, 4)[0], 255);
    }

    #[test]
    fn test_close_removes_small_dark_detail() {
        let closed = ImageProcessor::close_rect(&white_with_dark_dot(), RectKernel::new(3, 3));
        assert!(closed.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_blackhat_highlights_dark_detail() {
        let hat = ImageProcessor::blackhat(&white_with_dark_dot(), RectKernel::new(3, 3));
        assert_eq!(hat.get_pixel(4, 4)[0], 255);
        assert_eq!(hat.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_normalize_gradient_stretches_range() {
        let gradient = ImageBuffer::from_raw(3, 1, vec![-40i16, 10, 20]).unwrap();
        let normalized = ImageProcessor::normalize_gradient(&gradient);
        assert_eq!(normalized.as_raw(), &vec![255, 0, 85]);
    }

    #[test]
    fn test_normalize_flat_gradient_is_black() {
        let gradient = ImageBuffer::from_raw(2, 1, vec![7i16, -7]).unwrap();
        assert!(ImageProcessor::normalize_gradient(&gradient)
            .pixels()
            .all(|p| p[0] == 0));
    }

    #[test]
    fn test_otsu_binarize_splits_bimodal_image() {
        let image = ImageBuffer::from_fn(10, 2, |x, _| Luma([if x < 5 { 30 } else { 220 }]));
        let binary = ImageProcessor::otsu_binarize(&image);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(9, 1)[0], 255);
    }

    #[test]
    fn test_upscale_multiplies_dimensions() {
        let image = GrayImage::new(20, 7);
        assert_eq!(ImageProcessor::upscale(&image, 3).dimensions(), (60, 21));
    }

    #[test]
    fn test_clahe_widens_low_contrast_range() {
        let image = ImageBuffer::from_fn(64, 64, |x, _| Luma([100 + (x % 11) as u8]));
        let enhanced = ImageProcessor::clahe(&image, 2.5, 8);

        let min = enhanced.pixels().map(|p| p[0]).min().unwrap();
        let max = enhanced.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(enhanced.dimensions(), (64, 64));
        assert!(max - min > 10);
    }
}
