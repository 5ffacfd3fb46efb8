//! Color and texture features of a soil photograph
//!
//! Color statistics come from the center region (middle half of each
//! dimension) to avoid vignetting and background at the borders; texture
//! statistics use the whole grayscale image. Color-space values follow the
//! common 8-bit conventions (HSV hue in [0, 180), LAB scaled to [0, 255]).

use image::{DynamicImage, GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::sample::decode_bytes;
use crate::utils::error::{GreenThumbError, Result};

/// Smallest accepted width/height of a soil image
pub const MIN_SOIL_IMAGE_SIDE: u32 = 50;

/// Largest accepted width/height of a soil image
pub const MAX_SOIL_IMAGE_SIDE: u32 = 4096;

/// Features consumed by a soil analyzer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilFeatures {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub h: f64,
    pub s: f64,
    pub v: f64,
    pub l: f64,
    pub a: f64,
    pub b_lab: f64,
    /// Mean of the per-channel RGB standard deviations
    pub rgb_uniformity: f64,
    /// Mean Sobel gradient magnitude
    pub edge_density: f64,
    /// Std of the Sobel gradient magnitude; `None` when not measured
    pub edge_variance: Option<f64>,
    /// Grayscale variance
    pub roughness: f64,
    pub contrast: f64,
    pub homogeneity: f64,
}

impl Default for SoilFeatures {
    fn default() -> Self {
        Self {
            r: 128.0,
            g: 100.0,
            b: 80.0,
            h: 20.0,
            s: 50.0,
            v: 100.0,
            l: 0.0,
            a: 0.0,
            b_lab: 0.0,
            rgb_uniformity: 0.0,
            edge_density: 10.0,
            edge_variance: None,
            roughness: 500.0,
            contrast: 0.0,
            homogeneity: 0.0,
        }
    }
}

/// Decode an uploaded soil image and check its dimensions
pub fn validate_soil_image(bytes: &[u8]) -> Result<DynamicImage> {
    let img = decode_bytes(bytes)
        .map_err(|e| GreenThumbError::InvalidImage(format!("not a decodable image ({})", e)))?;

    let (width, height) = img.dimensions();
    if width < MIN_SOIL_IMAGE_SIDE || height < MIN_SOIL_IMAGE_SIDE {
        warn!("Image too small: {}x{}", width, height);
        return Err(GreenThumbError::InvalidImage(format!(
            "image too small: {}x{} (minimum {}x{})",
            width, height, MIN_SOIL_IMAGE_SIDE, MIN_SOIL_IMAGE_SIDE
        )));
    }

    if width > MAX_SOIL_IMAGE_SIDE || height > MAX_SOIL_IMAGE_SIDE {
        warn!("Image too large: {}x{}", width, height);
        return Err(GreenThumbError::InvalidImage(format!(
            "image too large: {}x{} (maximum {}x{})",
            width, height, MAX_SOIL_IMAGE_SIDE, MAX_SOIL_IMAGE_SIDE
        )));
    }

    Ok(img)
}

/// RGB -> 8-bit HSV with hue in [0, 180)
fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> [f64; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [(h / 2.0).round() % 180.0, s.round(), max]
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// RGB -> CIELAB (D65) scaled to 8 bits: L*255/100, a+128, b+128
fn rgb_to_lab8(r: u8, g: u8, b: u8) -> [f64; 3] {
    let (r, g, b) = (srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let l = if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (lab_f(x) - lab_f(y));
    let b_star = 200.0 * (lab_f(y) - lab_f(z));

    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0),
        (a + 128.0).round().clamp(0.0, 255.0),
        (b_star + 128.0).round().clamp(0.0, 255.0),
    ]
}

fn gray8(r: u8, g: u8, b: u8) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round()
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, variance.sqrt())
}

/// Mirror an out-of-range coordinate back inside `[0, len)` without repeating the edge
fn reflect101(i: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * (len - 1) - i;
    }
    i.clamp(0, len - 1) as usize
}

/// 3x3 Sobel gradient magnitude for every pixel
fn sobel_magnitude(gray: &[f64], width: usize, height: usize) -> Vec<f64> {
    let at = |x: i64, y: i64| -> f64 {
        let xx = reflect101(x, width as i64);
        let yy = reflect101(y, height as i64);
        gray[yy * width + xx]
    };

    let mut magnitude = Vec::with_capacity(width * height);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            magnitude.push((gx * gx + gy * gy).sqrt());
        }
    }
    magnitude
}

fn center_pixels(rgb: &RgbImage) -> Vec<[u8; 3]> {
    let (w, h) = rgb.dimensions();
    let (x0, x1) = (w / 4, 3 * w / 4);
    let (y0, y1) = (h / 4, 3 * h / 4);

    let mut pixels = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
    for y in y0..y1 {
        for x in x0..x1 {
            pixels.push(rgb.get_pixel(x, y).0);
        }
    }

    // degenerate center of a tiny image: fall back to the whole frame
    if pixels.is_empty() {
        pixels = rgb.pixels().map(|p| p.0).collect();
    }
    pixels
}

fn channel_values(pixels: &[[u8; 3]], c: usize) -> impl Iterator<Item = f64> + Clone + '_ {
    pixels.iter().map(move |p| p[c] as f64)
}

/// Compute the full feature record for a decoded image
pub fn extract_features(img: &DynamicImage) -> SoilFeatures {
    let rgb = img.to_rgb8();
    let center = center_pixels(&rgb);

    let (r, r_std) = mean_std(channel_values(&center, 0));
    let (g, g_std) = mean_std(channel_values(&center, 1));
    let (b, b_std) = mean_std(channel_values(&center, 2));

    let hsv: Vec<[f64; 3]> = center.iter().map(|p| rgb_to_hsv8(p[0], p[1], p[2])).collect();
    let lab: Vec<[f64; 3]> = center.iter().map(|p| rgb_to_lab8(p[0], p[1], p[2])).collect();
    let component_mean = |values: &[[f64; 3]], c: usize| {
        values.iter().map(|v| v[c]).sum::<f64>() / values.len().max(1) as f64
    };

    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let gray: Vec<f64> = rgb.pixels().map(|p| gray8(p[0], p[1], p[2])).collect();
    let magnitude = sobel_magnitude(&gray, width, height);

    let (edge_density, edge_variance) = mean_std(magnitude.iter().copied());
    let (_, gray_std) = mean_std(gray.iter().copied());
    let max_gray = gray.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_gray = gray.iter().copied().fold(f64::INFINITY, f64::min);
    let contrast = if gray.is_empty() { 0.0 } else { max_gray - min_gray };

    SoilFeatures {
        r,
        g,
        b,
        h: component_mean(&hsv, 0),
        s: component_mean(&hsv, 1),
        v: component_mean(&hsv, 2),
        l: component_mean(&lab, 0),
        a: component_mean(&lab, 1),
        b_lab: component_mean(&lab, 2),
        rgb_uniformity: (r_std + g_std + b_std) / 3.0,
        edge_density,
        edge_variance: Some(edge_variance),
        roughness: gray_std * gray_std,
        contrast,
        homogeneity: 1.0 / (1.0 + edge_variance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn png(img: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_uniform_image_has_no_texture() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(60, 60, Rgb([128, 128, 128])));
        let features = extract_features(&img);

        assert_eq!(features.r, 128.0);
        assert_eq!(features.s, 0.0);
        assert_eq!(features.v, 128.0);
        assert_eq!(features.edge_density, 0.0);
        assert_eq!(features.edge_variance, Some(0.0));
        assert_eq!(features.roughness, 0.0);
        assert_eq!(features.contrast, 0.0);
        assert_eq!(features.homogeneity, 1.0);
        assert_eq!(features.rgb_uniformity, 0.0);
    }

    #[test]
    fn test_center_region_drives_color() {
        // red border, blue center
        let img = ImageBuffer::from_fn(80, 80, |x, y| {
            if (20..60).contains(&x) && (20..60).contains(&y) {
                Rgb([0, 0, 255])
            } else {
                Rgb([255, 0, 0])
            }
        });
        let features = extract_features(&DynamicImage::ImageRgb8(img));

        assert_eq!(features.r, 0.0);
        assert_eq!(features.b, 255.0);
        assert_eq!(features.h, 120.0);
        assert!(features.edge_density > 0.0);
        assert!(features.contrast > 0.0);
    }

    #[test]
    fn test_color_conversions() {
        assert_eq!(rgb_to_hsv8(255, 0, 0), [0.0, 255.0, 255.0]);
        assert_eq!(rgb_to_hsv8(0, 255, 0), [60.0, 255.0, 255.0]);
        assert_eq!(rgb_to_lab8(255, 255, 255), [255.0, 128.0, 128.0]);
        assert_eq!(rgb_to_lab8(0, 0, 0), [0.0, 128.0, 128.0]);
        assert_eq!(gray8(255, 255, 255), 255.0);
    }

    #[test]
    fn test_sobel_vertical_edge() {
        // left half 0, right half 100
        let width = 6;
        let gray: Vec<f64> = (0..36).map(|i| if i % width < 3 { 0.0 } else { 100.0 }).collect();
        let magnitude = sobel_magnitude(&gray, width, 6);

        assert_eq!(magnitude[0], 0.0);
        assert_eq!(magnitude[2], 400.0);
        assert_eq!(magnitude[3], 400.0);
        assert_eq!(magnitude[5], 0.0);
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate_soil_image(&png(ImageBuffer::from_pixel(50, 50, Rgb([1, 2, 3])))).is_ok());
        assert!(matches!(
            validate_soil_image(&png(ImageBuffer::from_pixel(49, 80, Rgb([1, 2, 3])))),
            Err(GreenThumbError::InvalidImage(_))
        ));
        assert!(matches!(
            validate_soil_image(b"plain text"),
            Err(GreenThumbError::InvalidImage(_))
        ));
    }
}
