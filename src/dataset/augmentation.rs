//! Training-time image augmentation
//!
//! Applied to resized leaf images before normalization, in a fixed order:
//! horizontal mirror, rotation, brightness jitter, contrast jitter. Validation
//! and inference never go through this module.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq)]
pub struct AugmentationConfig {
    /// Probability of a horizontal mirror (0.0 - 1.0)
    pub horizontal_flip_prob: f32,
    /// Rotation angle is drawn from [-rotation_degrees, rotation_degrees]
    pub rotation_degrees: f32,
    /// Brightness factor is drawn from [1 - brightness, 1 + brightness]
    pub brightness: f32,
    /// Contrast factor is drawn from [1 - contrast, 1 + contrast]
    pub contrast: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip_prob: 0.5,
            rotation_degrees: 15.0,
            brightness: 0.2,
            contrast: 0.2,
        }
    }
}

impl AugmentationConfig {
    /// Identity transform
    pub fn none() -> Self {
        Self {
            horizontal_flip_prob: 0.0,
            rotation_degrees: 0.0,
            brightness: 0.0,
            contrast: 0.0,
        }
    }
}

/// Applies random transformations drawn from a seeded RNG
#[derive(Clone, Debug, Default)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Apply the augmentation sequence to an image
    pub fn augment(&self, img: DynamicImage, rng: &mut ChaCha8Rng) -> DynamicImage {
        let mut result = img;

        if rng.gen::<f32>() < self.config.horizontal_flip_prob {
            result = result.fliph();
        }

        if self.config.rotation_degrees > 0.0 {
            let angle = rng.gen_range(-self.config.rotation_degrees..=self.config.rotation_degrees);
            result = rotate(&result, angle);
        }

        if self.config.brightness > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.config.brightness..=self.config.brightness);
            result = adjust_brightness(&result, factor);
        }

        if self.config.contrast > 0.0 {
            let factor = 1.0 + rng.gen_range(-self.config.contrast..=self.config.contrast);
            result = adjust_contrast(&result, factor);
        }

        result
    }
}

/// Rotate around the image center; pixels sampled from outside the source are black
pub fn rotate(img: &DynamicImage, angle_degrees: f32) -> DynamicImage {
    if angle_degrees.abs() < 0.1 {
        return img.clone();
    }

    let angle_rad = angle_degrees.to_radians();
    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();

    let mut output = ImageBuffer::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;

            let src_x = cx + dx * cos_a + dy * sin_a;
            let src_y = cy - dx * sin_a + dy * cos_a;

            output.put_pixel(x, y, bilinear_sample(&rgb, src_x, src_y));
        }
    }

    DynamicImage::ImageRgb8(output)
}

fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();

    if x < 0.0 || y < 0.0 || x > (width - 1) as f32 || y > (height - 1) as f32 {
        return Rgb([0, 0, 0]);
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;
        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

/// Scale every channel by `factor`
pub fn adjust_brightness(img: &DynamicImage, factor: f32) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (pixel[c] as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Blend each pixel with the mean luminance: factor 0 is flat gray, 1 is identity
pub fn adjust_contrast(img: &DynamicImage, factor: f32) -> DynamicImage {
    let mut rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let count = (width as f64 * height as f64).max(1.0);

    let sum: f64 = rgb
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    let mean = (sum / count) as f32;

    for pixel in rgb.pixels_mut() {
        for c in 0..3 {
            pixel[c] = (mean + factor * (pixel[c] as f32 - mean)).round().clamp(0.0, 255.0) as u8;
        }
    }

    DynamicImage::ImageRgb8(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_image() -> DynamicImage {
        let mut img = ImageBuffer::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 4) as u8, (y * 4) as u8, 128]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_default_matches_training_policy() {
        let config = AugmentationConfig::default();
        assert_eq!(config.horizontal_flip_prob, 0.5);
        assert_eq!(config.rotation_degrees, 15.0);
        assert_eq!(config.brightness, 0.2);
        assert_eq!(config.contrast, 0.2);
    }

    #[test]
    fn test_augment_keeps_dimensions() {
        let aug = Augmenter::default();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..5 {
            let result = aug.augment(create_test_image(), &mut rng);
            assert_eq!(result.dimensions(), (64, 64));
        }
    }

    #[test]
    fn test_augment_is_reproducible_for_a_seed() {
        let aug = Augmenter::default();
        let a = aug.augment(create_test_image(), &mut ChaCha8Rng::seed_from_u64(7));
        let b = aug.augment(create_test_image(), &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.to_rgb8().into_raw(), b.to_rgb8().into_raw());
    }

    #[test]
    fn test_no_augmentation_is_identity() {
        let aug = Augmenter::new(AugmentationConfig::none());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let img = create_test_image();

        let result = aug.augment(img.clone(), &mut rng);
        assert_eq!(result.to_rgb8().into_raw(), img.to_rgb8().into_raw());
    }

    #[test]
    fn test_brightness_scales_pixels() {
        let img = create_test_image();
        let brighter = adjust_brightness(&img, 1.2).to_rgb8();
        let darker = adjust_brightness(&img, 0.8).to_rgb8();
        let orig = img.to_rgb8();

        let p = orig.get_pixel(10, 10);
        assert!(brighter.get_pixel(10, 10)[2] > p[2]);
        assert!(darker.get_pixel(10, 10)[2] < p[2]);
    }

    #[test]
    fn test_contrast_zero_flattens() {
        let flat = adjust_contrast(&create_test_image(), 0.0).to_rgb8();
        let first = *flat.get_pixel(0, 0);
        assert!(flat.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_rotation_keeps_center() {
        let img = create_test_image();
        let rotated = rotate(&img, 10.0).to_rgb8();
        let orig = img.to_rgb8();

        let a = orig.get_pixel(32, 32);
        let b = rotated.get_pixel(32, 32);
        for c in 0..3 {
            assert!((a[c] as i32 - b[c] as i32).abs() <= 1);
        }
    }
}
