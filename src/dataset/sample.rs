//! Sample Loader and Burn batching
//!
//! Turns a [`SampleRecord`] into a normalized CHW float image plus the two
//! class labels, and groups loaded samples into tensors for the model.

use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use rand_chacha::ChaCha8Rng;

use super::augmentation::Augmenter;
use super::index::SampleRecord;
use crate::utils::error::{GreenThumbError, Result};
use crate::IMAGE_SIZE;

/// Per-channel normalization mean (ImageNet statistics)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel normalization std (ImageNet statistics)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// One decoded, normalized sample
#[derive(Clone, Debug)]
pub struct LeafItem {
    /// Image data as flattened CHW float array [3 * S * S]
    pub image: Vec<f32>,
    pub crop_label: usize,
    pub severity_label: usize,
}

/// Open an image file, forcing a decode error on any failure
pub fn decode_file(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| GreenThumbError::Decode(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| GreenThumbError::Decode(format!("{}: {}", path.display(), e)))?
        .decode()
        .map_err(|e| GreenThumbError::Decode(format!("{}: {}", path.display(), e)))
}

/// Decode an in-memory image (uploads)
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Resize to a square and convert to a normalized CHW vector
pub fn to_normalized_chw(img: &DynamicImage, image_size: usize) -> Vec<f32> {
    let size = image_size as u32;
    let rgb = if img.width() == size && img.height() == size {
        img.to_rgb8()
    } else {
        img.resize_exact(size, size, FilterType::Triangle).to_rgb8()
    };

    let plane = image_size * image_size;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * image_size + x as usize;
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + offset] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    data
}

/// Loads records from disk into model-ready samples
#[derive(Clone, Debug)]
pub struct SampleLoader {
    image_size: usize,
    augmenter: Augmenter,
}

impl Default for SampleLoader {
    fn default() -> Self {
        Self::new(IMAGE_SIZE)
    }
}

impl SampleLoader {
    pub fn new(image_size: usize) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::default(),
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Preprocess a decoded image; augmentation draws from `rng` only when `augment` is set
    pub fn preprocess(&self, img: &DynamicImage, augment: bool, rng: &mut ChaCha8Rng) -> Vec<f32> {
        let size = self.image_size as u32;
        let resized = DynamicImage::ImageRgb8(img.resize_exact(size, size, FilterType::Triangle).to_rgb8());

        if augment {
            let augmented = self.augmenter.augment(resized, rng);
            to_normalized_chw(&augmented, self.image_size)
        } else {
            to_normalized_chw(&resized, self.image_size)
        }
    }

    /// Load one record: decode, force RGB, resize, optionally augment, normalize
    pub fn load(&self, record: &SampleRecord, augment: bool, rng: &mut ChaCha8Rng) -> Result<LeafItem> {
        let img = decode_file(&record.path)?;

        Ok(LeafItem {
            image: self.preprocess(&img, augment, rng),
            crop_label: record.crop.index(),
            severity_label: record.severity.index(),
        })
    }
}

/// A batch of leaf images with both label sets
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// [batch_size]
    pub crop_targets: Tensor<B, 1, Int>,
    /// [batch_size]
    pub severity_targets: Tensor<B, 1, Int>,
}

/// Stacks loaded samples into tensors
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    image_size: usize,
}

impl LeafBatcher {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let batch_size = items.len();
        let size = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.iter().copied()).collect();
        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, 3, size, size]),
            device,
        );

        let crop_data: Vec<i64> = items.iter().map(|item| item.crop_label as i64).collect();
        let crop_targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(crop_data, [batch_size]), device);

        let severity_data: Vec<i64> = items.iter().map(|item| item.severity_label as i64).collect();
        let severity_targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(severity_data, [batch_size]), device);

        LeafBatch {
            images,
            crop_targets,
            severity_targets,
        }
    }
}
