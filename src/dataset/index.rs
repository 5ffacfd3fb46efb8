//! Dataset Index
//!
//! Scans the crop/severity directory layout into an in-memory list of labeled
//! samples. The expected structure is:
//!
//! ```text
//! root/
//! ├── tomato/
//! │   ├── 0/
//! │   │   ├── leaf_001.jpg
//! │   │   └── leaf_002.png
//! │   ├── 20/
//! │   └── ...
//! ├── potato/
//! └── ...
//! ```
//!
//! Unknown crop folders and invalid severity folders are skipped with a warning.
//! The index is never cached: every statistics/validate/train call rescans disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::labels::{Crop, Severity};
use crate::utils::error::{GreenThumbError, Result};

/// Accepted image extensions (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A single labeled image on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub path: PathBuf,
    pub crop: Crop,
    pub severity: Severity,
}

/// Ordered collection of samples found under a dataset root
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    root: PathBuf,
    records: Vec<SampleRecord>,
}

/// Whether the dataset can be trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetStatus {
    Empty,
    Ready,
}

/// Per-crop, per-severity image counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub status: DatasetStatus,
    pub total_images: usize,
    pub crops_available: usize,
    /// crop name -> severity level -> image count; every crop is listed
    pub crops: BTreeMap<String, BTreeMap<u32, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn sorted_children(dir: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
}

/// True if the path carries one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

impl Dataset {
    /// Walk `root/{crop}/{severity}/` and collect every image file.
    ///
    /// A missing root yields an empty dataset.
    pub fn scan<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut records = Vec::new();

        if !root.is_dir() {
            warn!("Dataset directory {:?} does not exist", root);
            return Self { root, records };
        }

        for crop_entry in sorted_children(&root).filter(|e| e.file_type().is_dir()) {
            let crop_name = crop_entry.file_name().to_string_lossy().to_string();
            let Some(crop) = Crop::from_name(&crop_name) else {
                warn!("Unknown crop type '{}' skipped", crop_name);
                continue;
            };

            for severity_entry in sorted_children(crop_entry.path()).filter(|e| e.file_type().is_dir()) {
                let severity_name = severity_entry.file_name().to_string_lossy().to_string();
                let level: u32 = match severity_name.parse() {
                    Ok(level) => level,
                    Err(_) => {
                        warn!("Invalid severity directory name '{}' skipped", severity_name);
                        continue;
                    }
                };
                let Some(severity) = Severity::from_level(level) else {
                    warn!("Invalid severity '{}' skipped", level);
                    continue;
                };

                let before = records.len();
                records.extend(
                    sorted_children(severity_entry.path())
                        .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
                        .map(|e| SampleRecord {
                            path: e.path().to_path_buf(),
                            crop,
                            severity,
                        }),
                );
                debug!("{}/{}: {} images", crop, level, records.len() - before);
            }
        }

        info!("Indexed {} images under {:?}", records.len(), root);
        Self { root, records }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Precondition gate for training: at least one image indexed
    pub fn validate(&self) -> bool {
        !self.records.is_empty()
    }

    /// Per-crop, per-severity counts
    pub fn statistics(&self) -> DatasetStatistics {
        let mut crops: BTreeMap<String, BTreeMap<u32, usize>> = Crop::ALL
            .iter()
            .map(|c| (c.name().to_string(), BTreeMap::new()))
            .collect();

        for record in &self.records {
            *crops
                .entry(record.crop.name().to_string())
                .or_default()
                .entry(record.severity.level())
                .or_insert(0) += 1;
        }

        let crops_available = crops.values().filter(|counts| !counts.is_empty()).count();

        if self.records.is_empty() {
            DatasetStatistics {
                status: DatasetStatus::Empty,
                total_images: 0,
                crops_available: 0,
                crops,
                message: Some("No images in dataset".to_string()),
            }
        } else {
            DatasetStatistics {
                status: DatasetStatus::Ready,
                total_images: self.records.len(),
                crops_available,
                crops,
                message: None,
            }
        }
    }
}

/// Create every `{crop}/{severity}` directory under `root`
pub fn create_layout<P: AsRef<Path>>(root: P) -> Result<()> {
    let root = root.as_ref();
    for crop in Crop::ALL {
        for severity in Severity::ALL {
            std::fs::create_dir_all(root.join(crop.name()).join(severity.level().to_string()))?;
        }
    }
    info!("Directory structure created at {:?}", root);
    Ok(())
}

/// Write one uploaded training image to `{root}/{crop}/{severity}/{filename}`.
///
/// Crop and severity are checked against the fixed label sets; the file name
/// must be a plain name without directory components.
pub fn store_upload<P: AsRef<Path>>(
    root: P,
    crop_type: &str,
    severity: i64,
    filename: &str,
    bytes: &[u8],
) -> Result<PathBuf> {
    let crop = Crop::parse(crop_type)?;
    let severity = Severity::parse_level(severity)?;

    let is_plain_name = !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\'])
        && Path::new(filename).file_name().map(|n| n == filename).unwrap_or(false);
    if !is_plain_name {
        return Err(GreenThumbError::Config(format!(
            "Invalid file name '{}'",
            filename
        )));
    }

    let dir = root
        .as_ref()
        .join(crop.name())
        .join(severity.level().to_string());
    std::fs::create_dir_all(&dir)?;

    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    info!("Stored training image {:?}", path);

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"not really an image").unwrap();
    }

    fn scenario_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "tomato/0/a.jpg");
        touch(dir.path(), "tomato/40/b.jpg");
        touch(dir.path(), "potato/100/c.png");
        touch(dir.path(), "unknown_crop/0/d.jpg");
        dir
    }

    #[test]
    fn test_scan_scenario_counts() {
        let dir = scenario_root();
        let dataset = Dataset::scan(dir.path());
        let stats = dataset.statistics();

        assert_eq!(stats.status, DatasetStatus::Ready);
        assert_eq!(stats.total_images, 3);
        assert_eq!(stats.crops_available, 2);
        assert_eq!(stats.crops.len(), Crop::COUNT);
        assert_eq!(stats.crops["tomato"][&0], 1);
        assert_eq!(stats.crops["tomato"][&40], 1);
        assert_eq!(stats.crops["potato"][&100], 1);
        assert!(stats.crops["rice"].is_empty());
        assert!(!stats.crops.contains_key("unknown_crop"));
        assert!(dataset.validate());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let dir = scenario_root();
        let first = Dataset::scan(dir.path());
        let second = Dataset::scan(dir.path());

        assert_eq!(first.statistics(), second.statistics());
        assert_eq!(first.records(), second.records());
    }

    #[test]
    fn test_scan_filters_names_and_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Tomato/20/upper.JPG");
        touch(dir.path(), "tomato/20/photo.jpeg");
        touch(dir.path(), "tomato/20/notes.txt");
        touch(dir.path(), "tomato/30/odd.jpg");
        touch(dir.path(), "tomato/mild/word.jpg");
        touch(dir.path(), "rice/-20/neg.png");

        let dataset = Dataset::scan(dir.path());

        assert_eq!(dataset.len(), 2);
        assert!(dataset
            .records()
            .iter()
            .all(|r| r.crop == Crop::Tomato && r.severity == Severity::Minimal));
    }

    #[test]
    fn test_empty_and_missing_roots() {
        let dir = TempDir::new().unwrap();

        let empty = Dataset::scan(dir.path());
        assert!(!empty.validate());
        let stats = empty.statistics();
        assert_eq!(stats.status, DatasetStatus::Empty);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.message.as_deref(), Some("No images in dataset"));

        let missing = Dataset::scan(dir.path().join("does-not-exist"));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_statistics_json_shape() {
        let dir = scenario_root();
        let json = serde_json::to_value(Dataset::scan(dir.path()).statistics()).unwrap();

        assert_eq!(json["status"], "ready");
        assert_eq!(json["crops"]["tomato"]["40"], 1);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_store_upload_validates_labels() {
        let dir = TempDir::new().unwrap();

        let path = store_upload(dir.path(), "Potato", 60, "leaf.png", b"png").unwrap();
        assert_eq!(path, dir.path().join("potato").join("60").join("leaf.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png");

        assert!(matches!(
            store_upload(dir.path(), "kale", 0, "x.jpg", b""),
            Err(GreenThumbError::Config(_))
        ));
        assert!(matches!(
            store_upload(dir.path(), "rice", 50, "x.jpg", b""),
            Err(GreenThumbError::Config(_))
        ));
        assert!(matches!(
            store_upload(dir.path(), "rice", 0, "../escape.jpg", b""),
            Err(GreenThumbError::Config(_))
        ));
    }

    #[test]
    fn test_create_layout() {
        let dir = TempDir::new().unwrap();
        create_layout(dir.path()).unwrap();

        assert!(dir.path().join("grapes").join("100").is_dir());
        assert!(Dataset::scan(dir.path()).is_empty());
    }
}
