//! Application context shared by the CLI and the HTTP server
//!
//! Owns the serving classifier, the dataset location, the soil analyzer and a
//! single-slot training dispatcher. Training runs on a blocking tokio task
//! against its own autodiff copy of the weights; when it finishes the serving
//! classifier reloads the best checkpoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use crate::dataset::{Dataset, DatasetStatistics};
use crate::inference::{predict_batch, BatchReport, PredictionResult};
use crate::model::{ClassifierConfig, ModelInfo, PlantDiseaseClassifier};
use crate::recommend::recommend;
use crate::soil::{analyze_soil_image, ColorTextureAnalyzer, SoilAnalysis, SoilAnalyzer};
use crate::training::{EpochRecord, Trainer, TrainerPhase, TrainingConfig, TrainingObserver, TrainingSummary};
use crate::utils::error::{GreenThumbError, Result};

/// Filesystem layout and model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Root of the `{crop}/{severity}/` image tree
    pub raw_dir: PathBuf,
    /// Best checkpoint, loaded at startup and after training
    pub checkpoint_path: PathBuf,
    /// Scratch space for weights handed to a training run
    pub staging_dir: PathBuf,
    pub history_path: PathBuf,
    pub classifier: ClassifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_root(".")
    }
}

impl AppConfig {
    /// Standard layout below `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            raw_dir: root.join("data/raw"),
            checkpoint_path: root.join("models/saved/plant_classifier.mpk"),
            staging_dir: root.join("models/checkpoints"),
            history_path: root.join("models/training_history.json"),
            classifier: ClassifierConfig::default(),
        }
    }

    /// Standard layout with explicit data and models directories
    pub fn with_dirs<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, models_dir: Q) -> Self {
        let data_dir = data_dir.as_ref();
        let models_dir = models_dir.as_ref();
        Self {
            data_dir: data_dir.to_path_buf(),
            raw_dir: data_dir.join("raw"),
            checkpoint_path: models_dir.join("saved/plant_classifier.mpk"),
            staging_dir: models_dir.join("checkpoints"),
            history_path: models_dir.join("training_history.json"),
            classifier: ClassifierConfig::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    /// Create every directory the application writes to
    pub fn create_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        std::fs::create_dir_all(self.data_dir.join("processed"))?;
        std::fs::create_dir_all(&self.staging_dir)?;
        if let Some(parent) = self.checkpoint_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Prediction plus care advice
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    pub recommendations: Vec<String>,
}

/// Last completed epoch of a running job
#[derive(Debug, Clone, Serialize)]
pub struct EpochProgress {
    #[serde(flatten)]
    pub record: EpochRecord,
    pub learning_rate: f64,
}

/// State of the training slot
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrainingStatus {
    Idle,
    Running {
        run_id: String,
        started_at: DateTime<Utc>,
        config: TrainingConfig,
        phase: TrainerPhase,
        latest: Option<EpochProgress>,
    },
    Completed {
        run_id: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        summary: TrainingSummary,
    },
    Failed {
        run_id: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        message: String,
    },
}

impl TrainingStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TrainingStatus::Running { .. })
    }
}

/// Acknowledgement of a dispatched training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingStarted {
    pub run_id: String,
    pub config: TrainingConfig,
    pub train_candidates: usize,
}

/// Where an uploaded training image was stored
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub crop_type: String,
    pub severity: u32,
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub uptime_seconds: u64,
    pub training: bool,
}

/// Publishes trainer progress into the shared status slot
struct StatusObserver {
    status: Arc<RwLock<TrainingStatus>>,
}

impl TrainingObserver for StatusObserver {
    fn on_phase(&mut self, new_phase: TrainerPhase) {
        if let TrainingStatus::Running { phase, .. } = &mut *self.status.blocking_write() {
            *phase = new_phase;
        }
    }

    fn on_epoch_end(&mut self, record: &EpochRecord, learning_rate: f64) {
        if let TrainingStatus::Running { latest, .. } = &mut *self.status.blocking_write() {
            *latest = Some(EpochProgress {
                record: *record,
                learning_rate,
            });
        }
    }
}

/// Everything a background training run needs
struct TrainingJob {
    run_id: String,
    started_at: DateTime<Utc>,
    config: TrainingConfig,
    classifier_config: ClassifierConfig,
    dataset: Dataset,
    snapshot_path: PathBuf,
    checkpoint_path: PathBuf,
    history_path: PathBuf,
    status: Arc<RwLock<TrainingStatus>>,
    serving: Arc<Mutex<PlantDiseaseClassifier<DefaultBackend>>>,
}

impl TrainingJob {
    fn train(&self) -> Result<TrainingSummary> {
        let mut classifier =
            PlantDiseaseClassifier::<TrainingBackend>::new(self.classifier_config.clone(), default_device())?;
        classifier.load(&self.snapshot_path)?;

        let mut trainer = Trainer::new(
            classifier,
            self.config.clone(),
            &self.checkpoint_path,
            &self.history_path,
        );
        let mut observer = StatusObserver {
            status: self.status.clone(),
        };
        trainer.train(&self.dataset, &mut observer)
    }

    fn remove_snapshot(&self) {
        if let Err(e) = std::fs::remove_file(&self.snapshot_path) {
            warn!(
                "Could not remove staging snapshot {:?}: {}",
                self.snapshot_path, e
            );
        }
    }

    /// Runs on a blocking thread
    fn run(self) {
        let outcome = self.train().and_then(|summary| {
            self.serving.blocking_lock().load(&self.checkpoint_path)?;
            Ok(summary)
        });
        self.remove_snapshot();

        let finished_at = Utc::now();
        let status = match outcome {
            Ok(summary) => {
                info!(
                    "Training run {} completed, best validation loss {:.4}",
                    self.run_id, summary.best_val_loss
                );
                TrainingStatus::Completed {
                    run_id: self.run_id.clone(),
                    started_at: self.started_at,
                    finished_at,
                    summary,
                }
            }
            Err(e) => {
                error!("Training run {} failed: {}", self.run_id, e);
                TrainingStatus::Failed {
                    run_id: self.run_id.clone(),
                    started_at: self.started_at,
                    finished_at,
                    message: e.to_string(),
                }
            }
        };

        *self.status.blocking_write() = status;
    }
}

/// Run CPU-bound inference off the async workers
async fn run_inference<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| GreenThumbError::Inference(format!("inference task failed: {}", e)))
}

/// Shared application state
pub struct AppContext {
    config: AppConfig,
    classifier: Arc<Mutex<PlantDiseaseClassifier<DefaultBackend>>>,
    soil_analyzer: Box<dyn SoilAnalyzer>,
    training: Arc<RwLock<TrainingStatus>>,
    training_task: Mutex<Option<JoinHandle<()>>>,
    started_at: Instant,
}

impl AppContext {
    /// Create directories and load the serving classifier.
    ///
    /// An unreadable checkpoint is logged and the untrained model is served.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.create_dirs()?;

        let mut classifier =
            PlantDiseaseClassifier::<DefaultBackend>::new(config.classifier.clone(), default_device())?;
        if config.checkpoint_path.exists() {
            if let Err(e) = classifier.load(&config.checkpoint_path) {
                warn!("Serving untrained model: {}", e);
            }
        } else {
            info!("No checkpoint at {:?}, serving untrained model", config.checkpoint_path);
        }

        Ok(Self {
            config,
            classifier: Arc::new(Mutex::new(classifier)),
            soil_analyzer: Box::new(ColorTextureAnalyzer::new()),
            training: Arc::new(RwLock::new(TrainingStatus::Idle)),
            training_task: Mutex::new(None),
            started_at: Instant::now(),
        })
    }

    pub fn with_soil_analyzer(mut self, analyzer: Box<dyn SoilAnalyzer>) -> Self {
        self.soil_analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            service: "Plant Disease Analysis API",
            version: crate::VERSION,
            backend: backend_name(),
            uptime_seconds: self.uptime_seconds(),
            training: self.training.read().await.is_running(),
        }
    }

    /// Copy of the serving weights; the lock is released before inference runs
    async fn serving_classifier(&self) -> PlantDiseaseClassifier<DefaultBackend> {
        self.classifier.lock().await.clone()
    }

    /// Classify one uploaded leaf image and attach care advice
    pub async fn analyze(&self, bytes: &[u8]) -> Result<Analysis> {
        let classifier = self.serving_classifier().await;
        let bytes = bytes.to_vec();
        let prediction = run_inference(move || classifier.predict_bytes(&bytes)).await??;
        let recommendations = recommend(prediction.crop_type, prediction.severity_level);
        Ok(Analysis {
            prediction,
            recommendations,
        })
    }

    /// Classify several uploads; failures are reported per item
    pub async fn batch_analyze(&self, files: Vec<(String, Vec<u8>)>) -> Result<BatchReport> {
        let classifier = self.serving_classifier().await;
        run_inference(move || predict_batch(&classifier, &files)).await
    }

    pub fn dataset(&self) -> Dataset {
        Dataset::scan(&self.config.raw_dir)
    }

    pub fn dataset_stats(&self) -> DatasetStatistics {
        self.dataset().statistics()
    }

    pub fn validate_dataset(&self) -> bool {
        self.dataset().validate()
    }

    pub fn upload_training_data(
        &self,
        crop_type: &str,
        severity: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt> {
        let path = crate::dataset::store_upload(&self.config.raw_dir, crop_type, severity, filename, bytes)?;
        let crop = crate::dataset::Crop::parse(crop_type)?;
        Ok(UploadReceipt {
            crop_type: crop.name().to_string(),
            severity: severity as u32,
            filename: filename.to_string(),
            path,
        })
    }

    pub async fn model_info(&self) -> ModelInfo {
        self.classifier.lock().await.model_info()
    }

    /// Roll the serving weights back to the untrained state
    pub async fn reset_model(&self) -> Result<()> {
        self.classifier.lock().await.reset()
    }

    pub fn analyze_soil(&self, bytes: &[u8]) -> Result<SoilAnalysis> {
        analyze_soil_image(bytes, self.soil_analyzer.as_ref())
    }

    pub async fn training_status(&self) -> TrainingStatus {
        self.training.read().await.clone()
    }

    /// Dispatch a training run in the background.
    ///
    /// Fails with `EmptyDataset` when no images are indexed and with `Busy`
    /// while another run is in flight.
    pub async fn start_training(&self, config: TrainingConfig) -> Result<TrainingStarted> {
        config.validate()?;

        let dataset = self.dataset();
        if !dataset.validate() {
            return Err(GreenThumbError::EmptyDataset);
        }

        let mut status = self.training.write().await;
        if status.is_running() {
            return Err(GreenThumbError::Busy(
                "a training run is already in progress".to_string(),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        let snapshot_path = self.config.staging_dir.join(format!("serving_{}.mpk", run_id));
        self.classifier.lock().await.save(&snapshot_path)?;

        let started_at = Utc::now();
        *status = TrainingStatus::Running {
            run_id: run_id.clone(),
            started_at,
            config: config.clone(),
            phase: TrainerPhase::Idle,
            latest: None,
        };
        drop(status);

        let started = TrainingStarted {
            run_id: run_id.clone(),
            config: config.clone(),
            train_candidates: dataset.len(),
        };

        let job = TrainingJob {
            run_id,
            started_at,
            config,
            classifier_config: self.config.classifier.clone(),
            dataset,
            snapshot_path,
            checkpoint_path: self.config.checkpoint_path.clone(),
            history_path: self.config.history_path.clone(),
            status: self.training.clone(),
            serving: self.classifier.clone(),
        };

        info!("Training run {} dispatched", started.run_id);
        let handle = tokio::task::spawn_blocking(move || job.run());
        *self.training_task.lock().await = Some(handle);

        Ok(started)
    }

    /// Wait for the most recently dispatched run to finish
    pub async fn join_training(&self) -> TrainingStatus {
        let handle = self.training_task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Training task panicked: {:?}", e);
                let mut status = self.training.write().await;
                if let TrainingStatus::Running {
                    run_id, started_at, ..
                } = &*status
                {
                    *status = TrainingStatus::Failed {
                        run_id: run_id.clone(),
                        started_at: *started_at,
                        finished_at: Utc::now(),
                        message: format!("training task panicked: {}", e),
                    };
                }
            }
        }
        self.training_status().await
    }
}
