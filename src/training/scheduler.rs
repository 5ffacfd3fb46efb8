//! Reduce-on-plateau learning rate schedule
//!
//! The learning rate is multiplied by `reduction_factor` once the monitored
//! metric has failed to improve for `patience` consecutive epochs.

use serde::{Deserialize, Serialize};

/// Mode for plateau detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateauMode {
    /// Metric should decrease (e.g., loss)
    Min,
    /// Metric should increase (e.g., accuracy)
    Max,
}

/// Plateau tracker with the current learning rate
#[derive(Debug, Clone)]
pub struct ReduceOnPlateauState {
    best_metric: f64,
    epochs_without_improvement: usize,
    current_lr: f64,
    reduction_factor: f64,
    patience: usize,
    min_lr: f64,
    mode: PlateauMode,
    reductions: usize,
}

impl ReduceOnPlateauState {
    pub fn new(
        initial_lr: f64,
        reduction_factor: f64,
        patience: usize,
        min_lr: f64,
        mode: PlateauMode,
    ) -> Self {
        let best_metric = match mode {
            PlateauMode::Min => f64::INFINITY,
            PlateauMode::Max => f64::NEG_INFINITY,
        };

        Self {
            best_metric,
            epochs_without_improvement: 0,
            current_lr: initial_lr,
            reduction_factor,
            patience,
            min_lr,
            mode,
            reductions: 0,
        }
    }

    /// Record one epoch's metric and return the learning rate for the next epoch
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.mode {
            PlateauMode::Min => metric < self.best_metric,
            PlateauMode::Max => metric > self.best_metric,
        };

        if improved {
            self.best_metric = metric;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;

            if self.epochs_without_improvement >= self.patience {
                let new_lr = (self.current_lr * self.reduction_factor).max(self.min_lr);
                if new_lr < self.current_lr {
                    self.current_lr = new_lr;
                    self.reductions += 1;
                }
                self.epochs_without_improvement = 0;
            }
        }

        self.current_lr
    }

    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }

    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    /// How many times the learning rate has been reduced
    pub fn reductions(&self) -> usize {
        self.reductions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_on_plateau() {
        let mut state = ReduceOnPlateauState::new(0.1, 0.5, 3, 1e-6, PlateauMode::Min);

        // Metric improves
        assert_eq!(state.step(1.0), 0.1);
        assert_eq!(state.step(0.9), 0.1);
        assert_eq!(state.step(0.8), 0.1);

        // Metric stagnates
        assert_eq!(state.step(0.85), 0.1);
        assert_eq!(state.step(0.86), 0.1);
        assert_eq!(state.step(0.87), 0.05);
    }

    #[test]
    fn test_single_halving_after_five_flat_epochs() {
        let mut state = ReduceOnPlateauState::new(0.001, 0.5, 5, 0.0, PlateauMode::Min);
        let losses = [1.0, 0.9, 0.95, 0.95, 0.95, 0.95, 0.95];

        let lrs: Vec<f64> = losses.iter().map(|&loss| state.step(loss)).collect();

        assert!(lrs[..6].iter().all(|&lr| lr == 0.001));
        assert_eq!(lrs[6], 0.0005);
        assert_eq!(state.reductions(), 1);
        assert_eq!(state.best_metric(), 0.9);
    }

    #[test]
    fn test_equal_metric_is_not_improvement() {
        let mut state = ReduceOnPlateauState::new(1.0, 0.5, 1, 0.0, PlateauMode::Min);
        state.step(0.5);
        assert_eq!(state.step(0.5), 0.5);
    }

    #[test]
    fn test_min_lr_floor() {
        let mut state = ReduceOnPlateauState::new(1.0, 0.5, 1, 0.6, PlateauMode::Max);
        state.step(0.9);
        assert_eq!(state.step(0.8), 0.6);
        assert_eq!(state.step(0.8), 0.6);
        assert_eq!(state.reductions(), 1);
    }
}
