//! Deterministic train/validation partition

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Indices into a record list, split into training and validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValSplit {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
}

impl TrainValSplit {
    /// Hold out `floor(n * test_split)` samples for validation.
    ///
    /// The partition depends only on `n`, `test_split` and `seed`, so identical
    /// configurations always see the same split.
    pub fn new(n: usize, test_split: f64, seed: u64) -> Self {
        let val_size = ((n as f64) * test_split).floor() as usize;
        let val_size = val_size.min(n);
        let train_size = n - val_size;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let val = indices.split_off(train_size);
        Self {
            train: indices,
            val,
        }
    }

    pub fn has_validation(&self) -> bool {
        !self.val.is_empty()
    }
}

/// Training order for one epoch, reproducible from (seed, epoch)
pub fn epoch_rng(seed: u64, epoch: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(epoch as u64 + 1);
    rng
}

pub fn shuffled(indices: &[usize], rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut order = indices.to_vec();
    order.shuffle(rng);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_four_samples_half_split() {
        let split = TrainValSplit::new(4, 0.5, 42);
        assert_eq!(split.train.len(), 2);
        assert_eq!(split.val.len(), 2);

        let all: HashSet<usize> = split.train.iter().chain(&split.val).copied().collect();
        assert_eq!(all, (0..4).collect());
    }

    #[test]
    fn test_split_is_reproducible() {
        assert_eq!(TrainValSplit::new(37, 0.2, 42), TrainValSplit::new(37, 0.2, 42));
        assert_eq!(TrainValSplit::new(37, 0.2, 42).val.len(), 7);
    }

    #[test]
    fn test_small_dataset_has_no_validation() {
        let split = TrainValSplit::new(3, 0.2, 42);
        assert!(!split.has_validation());
        assert_eq!(split.train.len(), 3);

        let split = TrainValSplit::new(0, 0.2, 42);
        assert!(split.train.is_empty());
    }

    #[test]
    fn test_epoch_order_depends_on_epoch() {
        let indices: Vec<usize> = (0..50).collect();
        let a = shuffled(&indices, &mut epoch_rng(42, 0));
        let b = shuffled(&indices, &mut epoch_rng(42, 0));
        let c = shuffled(&indices, &mut epoch_rng(42, 1));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
