//! Training module
//!
//! - `clipping`: global-norm gradient clipping
//! - `config`: hyperparameters of a run
//! - `split`: deterministic train/validation partition and epoch shuffling
//! - `scheduler`: reduce-on-plateau learning rate
//! - `history`: persisted per-epoch metrics
//! - `trainer`: the training loop itself

pub mod clipping;
pub mod config;
pub mod history;
pub mod scheduler;
pub mod split;
pub mod trainer;

pub use config::TrainingConfig;
pub use history::{EpochRecord, TrainingHistory};
pub use scheduler::{PlateauMode, ReduceOnPlateauState};
pub use split::TrainValSplit;
pub use trainer::{NoopObserver, Trainer, TrainerPhase, TrainingObserver, TrainingSummary};
