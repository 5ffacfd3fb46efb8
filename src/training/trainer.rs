//! Training pipeline for the dual-head classifier
//!
//! One call to [`Trainer::train`] walks the state machine
//! `Idle -> Splitting -> (Training -> Validating)* -> Saved -> Idle`:
//! - deterministic train/validation split
//! - staged unfreezing of the feature extractor
//! - joint crop + severity cross-entropy with Adam and gradient clipping
//! - reduce-on-plateau learning rate
//! - best-validation-loss checkpointing and an appended history file

use std::path::{Path, PathBuf};

use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

use super::clipping::clip_global_norm;
use super::config::TrainingConfig;
use super::history::{EpochRecord, TrainingHistory};
use super::scheduler::{PlateauMode, ReduceOnPlateauState};
use super::split::{epoch_rng, shuffled, TrainValSplit};
use crate::dataset::{Dataset, LeafBatch, LeafBatcher, SampleLoader, SampleRecord};
use crate::model::{DualHeadModel, LayerSelector, PlantDiseaseClassifier};
use crate::utils::error::{GreenThumbError, Result};
use crate::utils::logging::TrainingLogger;

/// Where a training run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TrainerPhase {
    Idle,
    Splitting,
    /// Zero-based epoch
    Training { epoch: usize },
    Validating { epoch: usize },
    Saved,
}

/// Progress hooks for a training run
pub trait TrainingObserver: Send {
    fn on_phase(&mut self, _phase: TrainerPhase) {}

    fn on_epoch_end(&mut self, _record: &EpochRecord, _learning_rate: f64) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub best_val_loss: f64,
    pub final_learning_rate: f64,
    pub checkpoint_path: PathBuf,
    /// Metrics of this run only
    pub history: TrainingHistory,
}

/// Loss and crop accuracy accumulated over one pass
#[derive(Debug, Default, Clone, Copy)]
struct PassMetrics {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    samples: usize,
}

impl PassMetrics {
    fn add(&mut self, loss: f64, correct: usize, samples: usize) {
        self.loss_sum += loss;
        self.batches += 1;
        self.correct += correct;
        self.samples += samples;
    }

    fn loss(&self) -> f64 {
        self.loss_sum / self.batches.max(1) as f64
    }

    fn accuracy(&self) -> f64 {
        self.correct as f64 / self.samples.max(1) as f64
    }
}

/// A run only succeeds if some epoch wrote the best checkpoint
fn ensure_checkpoint_written(best_val_loss: f64, epochs: usize) -> Result<()> {
    if best_val_loss.is_finite() {
        Ok(())
    } else {
        Err(GreenThumbError::Training(format!(
            "no epoch out of {} produced a finite validation loss; checkpoint not written",
            epochs
        )))
    }
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = logits.argmax(1).squeeze::<1>(1);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Trains a [`PlantDiseaseClassifier`] on an autodiff backend
pub struct Trainer<B: AutodiffBackend> {
    classifier: PlantDiseaseClassifier<B>,
    config: TrainingConfig,
    checkpoint_path: PathBuf,
    history_path: PathBuf,
    loader: SampleLoader,
    phase: TrainerPhase,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        classifier: PlantDiseaseClassifier<B>,
        config: TrainingConfig,
        checkpoint_path: P,
        history_path: Q,
    ) -> Self {
        let loader = SampleLoader::new(classifier.config().image_size);
        Self {
            classifier,
            config,
            checkpoint_path: checkpoint_path.as_ref().to_path_buf(),
            history_path: history_path.as_ref().to_path_buf(),
            loader,
            phase: TrainerPhase::Idle,
        }
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn classifier(&self) -> &PlantDiseaseClassifier<B> {
        &self.classifier
    }

    pub fn into_classifier(self) -> PlantDiseaseClassifier<B> {
        self.classifier
    }

    fn set_phase(&mut self, phase: TrainerPhase, observer: &mut dyn TrainingObserver) {
        self.phase = phase;
        observer.on_phase(phase);
    }

    /// Run a full training job on `dataset`.
    ///
    /// Any failure aborts the run; the best checkpoint written so far stays on disk.
    pub fn train(
        &mut self,
        dataset: &Dataset,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary> {
        let result = self.run(dataset, observer);
        self.set_phase(TrainerPhase::Idle, observer);
        result
    }

    fn run(
        &mut self,
        dataset: &Dataset,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(GreenThumbError::EmptyDataset);
        }

        self.set_phase(TrainerPhase::Splitting, observer);
        let split = TrainValSplit::new(dataset.len(), self.config.test_split, self.config.seed);
        if split.train.is_empty() {
            return Err(GreenThumbError::Config(format!(
                "test_split {} leaves no training samples out of {}",
                self.config.test_split,
                dataset.len()
            )));
        }

        info!(
            "Dataset split - Train: {}, Val: {}",
            split.train.len(),
            split.val.len()
        );
        if !split.has_validation() {
            info!("Validation split is empty; training loss drives scheduling and checkpointing");
        }

        self.classifier.freeze(LayerSelector::All);
        self.classifier
            .unfreeze(LayerSelector::LastN(self.config.trainable_tail));

        let mut optimizer = AdamConfig::new().init::<B, DualHeadModel<B>>();

        self.run_epochs(dataset.records(), &split, &mut optimizer, observer)
    }

    fn run_epochs<O: Optimizer<DualHeadModel<B>, B>>(
        &mut self,
        records: &[SampleRecord],
        split: &TrainValSplit,
        optimizer: &mut O,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainingSummary> {
        let epochs = self.config.epochs;
        let mut scheduler = ReduceOnPlateauState::new(
            self.config.learning_rate,
            self.config.plateau_factor,
            self.config.plateau_patience,
            self.config.min_learning_rate,
            PlateauMode::Min,
        );
        let mut logger = TrainingLogger::new(epochs);
        let mut history = TrainingHistory::new();
        let mut best_val_loss = f64::INFINITY;

        for epoch in 0..epochs {
            logger.start_epoch(epoch);
            let learning_rate = scheduler.get_lr();

            self.set_phase(TrainerPhase::Training { epoch }, observer);
            let train = self.train_epoch(records, &split.train, epoch, learning_rate, optimizer)?;

            let val = if split.has_validation() {
                self.set_phase(TrainerPhase::Validating { epoch }, observer);
                self.validate_epoch(records, &split.val)?
            } else {
                train
            };

            let record = EpochRecord {
                epoch: epoch + 1,
                train_loss: train.loss(),
                val_loss: val.loss(),
                train_accuracy: train.accuracy(),
                val_accuracy: val.accuracy(),
            };
            history.push(record);
            logger.end_epoch(
                record.train_loss,
                record.train_accuracy,
                record.val_loss,
                record.val_accuracy,
                learning_rate,
            );

            let next_lr = scheduler.step(record.val_loss);
            if next_lr < learning_rate {
                logger.log_lr_reduced(learning_rate, next_lr);
            }

            if record.val_loss < best_val_loss {
                best_val_loss = record.val_loss;
                self.classifier.save(&self.checkpoint_path)?;
                logger.log_new_best(best_val_loss);
            }

            if epoch == self.config.unfreeze_epoch {
                self.classifier.unfreeze(LayerSelector::All);
                logger.log_unfreeze();
            }

            observer.on_epoch_end(&record, next_lr);
        }

        ensure_checkpoint_written(best_val_loss, epochs)?;
        history.append_to_file(&self.history_path)?;
        info!("Training history saved to {:?}", self.history_path);
        self.set_phase(TrainerPhase::Saved, observer);
        logger.log_complete(epochs, best_val_loss);

        Ok(TrainingSummary {
            epochs_run: epochs,
            train_samples: split.train.len(),
            val_samples: split.val.len(),
            best_val_loss,
            final_learning_rate: scheduler.get_lr(),
            checkpoint_path: self.checkpoint_path.clone(),
            history,
        })
    }

    fn train_epoch<O: Optimizer<DualHeadModel<B>, B>>(
        &mut self,
        records: &[SampleRecord],
        indices: &[usize],
        epoch: usize,
        learning_rate: f64,
        optimizer: &mut O,
    ) -> Result<PassMetrics> {
        let device = self.classifier.device().clone();
        let batcher = LeafBatcher::new(self.loader.image_size());
        let loss_fn = CrossEntropyLossConfig::new().init::<B>(&device);

        let mut rng = epoch_rng(self.config.seed, epoch);
        let order = shuffled(indices, &mut rng);
        let num_batches = order.len().div_ceil(self.config.batch_size);
        let mut metrics = PassMetrics::default();

        for (batch_idx, chunk) in order.chunks(self.config.batch_size).enumerate() {
            let items = chunk
                .iter()
                .map(|&i| self.loader.load(&records[i], self.config.augment, &mut rng))
                .collect::<Result<Vec<_>>>()?;
            let batch: LeafBatch<B> = batcher.batch(items, &device);
            let batch_len = chunk.len();

            let model = self.classifier.model().clone();
            let output = model.forward(batch.images);

            let crop_loss = loss_fn.forward(output.crop_logits.clone(), batch.crop_targets.clone());
            let severity_loss = loss_fn.forward(output.severity_logits, batch.severity_targets);
            let loss = crop_loss + severity_loss;

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(GreenThumbError::Training(format!(
                    "loss diverged in epoch {} batch {}",
                    epoch + 1,
                    batch_idx + 1
                )));
            }
            metrics.add(
                loss_value,
                count_correct(output.crop_logits, batch.crop_targets),
                batch_len,
            );

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let max_norm = f64::from(self.config.gradient_clip);
            let grads = clip_global_norm::<B, _>(&model, grads, max_norm);
            let model = optimizer.step(learning_rate, model, grads);
            self.classifier.set_model(model);

            if (batch_idx + 1) % 10 == 0 || batch_idx + 1 == num_batches {
                debug!(
                    "  Batch {}/{}: loss = {:.4}, acc = {:.2}%",
                    batch_idx + 1,
                    num_batches,
                    loss_value,
                    100.0 * metrics.accuracy()
                );
            }
        }

        Ok(metrics)
    }

    fn validate_epoch(&self, records: &[SampleRecord], indices: &[usize]) -> Result<PassMetrics> {
        let model = self.classifier.model().valid();
        let device = self.classifier.device().clone();
        let batcher = LeafBatcher::new(self.loader.image_size());
        let loss_fn = CrossEntropyLossConfig::new().init::<B::InnerBackend>(&device);

        // never consumed: augmentation is off
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut metrics = PassMetrics::default();

        for chunk in indices.chunks(self.config.batch_size) {
            let items = chunk
                .iter()
                .map(|&i| self.loader.load(&records[i], false, &mut rng))
                .collect::<Result<Vec<_>>>()?;
            let batch: LeafBatch<B::InnerBackend> = batcher.batch(items, &device);

            let output = model.forward(batch.images);
            let crop_loss = loss_fn.forward(output.crop_logits.clone(), batch.crop_targets.clone());
            let severity_loss = loss_fn.forward(output.severity_logits, batch.severity_targets);
            let loss: f64 = (crop_loss + severity_loss).into_scalar().elem();

            metrics.add(
                loss,
                count_correct(output.crop_logits, batch.crop_targets),
                chunk.len(),
            );
        }

        Ok(metrics)
    }
}
