//! Dataset module: label sets, directory index, sample loading and batching
//!
//! - `labels`: the fixed crop and severity label sets
//! - `index`: scanning the `{crop}/{severity}/` layout, statistics, uploads
//! - `augmentation`: randomized training-time transforms
//! - `sample`: decoding, normalization and Burn batching

pub mod augmentation;
pub mod index;
pub mod labels;
pub mod sample;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use index::{create_layout, store_upload, Dataset, DatasetStatistics, DatasetStatus, SampleRecord};
pub use labels::{crop_names, severity_levels, Crop, Severity};
pub use sample::{LeafBatch, LeafBatcher, LeafItem, SampleLoader};
