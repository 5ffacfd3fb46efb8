//! Convolutional feature extractor
//!
//! A stack of conv blocks (Conv2d + BatchNorm + ReLU) grouped into stages. The
//! last block of every stage halves the spatial resolution with a 2x2 max-pool,
//! and a global average pool turns the final feature map into a vector of size
//! `F = stage_filters.last()`.
//!
//! Parameter tensors are addressed in declaration order (per block: conv
//! weight, conv bias, batch-norm gamma, batch-norm beta), which is what
//! [`LayerSelector`] indexes into for freezing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use burn::{
    config::Config,
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::Backend, Tensor},
};
use tracing::info;

use crate::utils::error::{self, GreenThumbError};

/// Configuration for the feature extractor
#[derive(Config, Debug, PartialEq)]
pub struct FeatureExtractorConfig {
    /// Number of input channels (3 for RGB)
    #[config(default = 3)]
    pub in_channels: usize,

    /// Output channels of each stage
    #[config(default = "vec![64, 128, 256, 512]")]
    pub stage_filters: Vec<usize>,

    /// Conv blocks per stage
    #[config(default = 2)]
    pub blocks_per_stage: usize,
}

impl FeatureExtractorConfig {
    /// Dimensionality of the pooled feature vector
    pub fn output_dim(&self) -> usize {
        self.stage_filters.last().copied().unwrap_or(self.in_channels)
    }

    /// Spatial downsampling factor of the whole stack
    pub fn downsampling(&self) -> usize {
        1 << self.stage_filters.len()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        let mut blocks = Vec::with_capacity(self.stage_filters.len() * self.blocks_per_stage);
        let mut in_channels = self.in_channels;

        for &filters in &self.stage_filters {
            for i in 0..self.blocks_per_stage {
                let with_pool = i + 1 == self.blocks_per_stage;
                blocks.push(ConvBlock::new(in_channels, filters, 3, with_pool, device));
                in_channels = filters;
            }
        }

        FeatureExtractor {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }
}

/// Which feature-extractor parameter tensors an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerSelector {
    /// Every parameter tensor
    All,
    /// Every tensor except the last `n`
    AllButLast(usize),
    /// Only the last `n` tensors
    LastN(usize),
}

impl LayerSelector {
    /// Whether the tensor at `index` (out of `total`) is selected
    pub fn selects(&self, index: usize, total: usize) -> bool {
        match *self {
            LayerSelector::All => true,
            LayerSelector::AllButLast(n) => index + n < total,
            LayerSelector::LastN(n) => index + n >= total,
        }
    }
}

fn toggle<B: Backend, const D: usize>(
    param: Param<Tensor<B, D>>,
    require_grad: Option<bool>,
) -> Param<Tensor<B, D>> {
    match require_grad {
        Some(flag) => param.set_require_grad(flag),
        None => param,
    }
}

/// A CNN block with Conv2d, BatchNorm, ReLU, and optional MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub relu: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        with_pool: bool,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        let bn = BatchNormConfig::new(out_channels).init(device);

        let pool = if with_pool {
            Some(MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init())
        } else {
            None
        };

        Self {
            conv,
            bn,
            relu: Relu::new(),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        let x = self.relu.forward(x);

        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }

    /// Number of learnable parameter tensors in this block
    pub fn param_tensor_count(&self) -> usize {
        3 + usize::from(self.conv.bias.is_some())
    }

    fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = vec![self.conv.weight.dims().to_vec()];
        if let Some(bias) = &self.conv.bias {
            shapes.push(bias.dims().to_vec());
        }
        shapes.push(self.bn.gamma.dims().to_vec());
        shapes.push(self.bn.beta.dims().to_vec());
        shapes
    }

    fn trainable_mask(&self) -> Vec<bool> {
        let mut mask = vec![self.conv.weight.is_require_grad()];
        if let Some(bias) = &self.conv.bias {
            mask.push(bias.is_require_grad());
        }
        mask.push(self.bn.gamma.is_require_grad());
        mask.push(self.bn.beta.is_require_grad());
        mask
    }

    /// Apply one require-grad decision per parameter tensor, in declaration order
    fn with_require_grad(mut self, flags: &mut impl Iterator<Item = Option<bool>>) -> Self {
        self.conv.weight = toggle(self.conv.weight, flags.next().flatten());
        self.conv.bias = self.conv.bias.map(|bias| toggle(bias, flags.next().flatten()));
        self.bn.gamma = toggle(self.bn.gamma, flags.next().flatten());
        self.bn.beta = toggle(self.bn.beta, flags.next().flatten());
        self
    }
}

/// Shared convolutional feature extractor
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
}

impl<B: Backend> FeatureExtractor<B> {
    /// [batch, 3, H, W] -> [batch, F]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.blocks.iter().fold(x, |x, block| block.forward(x));
        let x = self.global_pool.forward(x);

        let [batch_size, channels, _, _] = x.dims();
        x.reshape([batch_size, channels])
    }

    pub fn param_tensor_count(&self) -> usize {
        self.blocks.iter().map(ConvBlock::param_tensor_count).sum()
    }

    /// Shapes of every learnable tensor, in declaration order
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        self.blocks.iter().flat_map(ConvBlock::param_shapes).collect()
    }

    /// Trainability of every learnable tensor, in declaration order
    pub fn trainable_mask(&self) -> Vec<bool> {
        self.blocks.iter().flat_map(ConvBlock::trainable_mask).collect()
    }

    /// Set `require_grad` on the selected tensors and leave the others unchanged
    pub fn set_require_grad(self, selector: LayerSelector, require_grad: bool) -> Self {
        let total = self.param_tensor_count();
        let mut flags = (0..total).map(|i| selector.selects(i, total).then_some(require_grad));

        let blocks = self
            .blocks
            .into_iter()
            .map(|block| block.with_require_grad(&mut flags))
            .collect();

        Self { blocks, ..self }
    }

    /// Initialize from a weights file written by [`FeatureExtractor::save_weights`]
    pub fn load_weights(self, path: &Path, device: &B::Device) -> error::Result<Self> {
        let expected = self.param_shapes();
        let loaded = load_module_file(self, path, device)?;

        if loaded.param_shapes() != expected {
            return Err(GreenThumbError::Load(format!(
                "feature extractor weights in {} do not match the configured architecture",
                path.display()
            )));
        }

        info!("Loaded feature extractor weights from {:?}", path);
        Ok(loaded)
    }

    pub fn save_weights(&self, path: &Path) -> error::Result<()> {
        save_module_file(self, path)
    }
}

/// Recorder used for every weights file
pub type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub(crate) fn save_module_file<B: Backend, M: Module<B>>(module: &M, path: &Path) -> error::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    module
        .clone()
        .save_file(path.to_path_buf(), &WeightsRecorder::new())
        .map_err(|e| GreenThumbError::Io(std::io::Error::other(format!("{:?}", e))))
}

/// Load a module record; mismatched records can panic inside burn, so the
/// load runs under `catch_unwind` and any failure becomes a load error.
pub(crate) fn load_module_file<B: Backend, M: Module<B>>(
    module: M,
    path: &Path,
    device: &B::Device,
) -> error::Result<M> {
    let path_buf = path.to_path_buf();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        module.load_file(path_buf, &WeightsRecorder::new(), device)
    }));

    match outcome {
        Ok(Ok(loaded)) => Ok(loaded),
        Ok(Err(e)) => Err(GreenThumbError::Load(format!("{}: {:?}", path.display(), e))),
        Err(_) => Err(GreenThumbError::Load(format!(
            "{}: record does not match the model architecture",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;
    type TestAutodiff = Autodiff<NdArray>;

    fn small_config() -> FeatureExtractorConfig {
        FeatureExtractorConfig::new()
            .with_stage_filters(vec![4, 8, 8, 8])
            .with_blocks_per_stage(2)
    }

    #[test]
    fn test_default_config() {
        let config = FeatureExtractorConfig::new();
        assert_eq!(config.stage_filters, vec![64, 128, 256, 512]);
        assert_eq!(config.output_dim(), 512);
        assert_eq!(config.downsampling(), 16);
    }

    #[test]
    fn test_config_serializes() {
        let config = small_config();
        let json = serde_json::to_vec(&config).unwrap();
        let restored = FeatureExtractorConfig::load_binary(&json).unwrap();
        assert_eq!(restored, config);
        assert_eq!(restored.output_dim(), 8);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let extractor = small_config().init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
        let output = extractor.forward(input);

        assert_eq!(output.dims(), [2, 8]);
        assert_eq!(extractor.blocks.len(), 8);
        assert_eq!(extractor.param_tensor_count(), 32);
    }

    #[test]
    fn test_layer_selector() {
        assert!(LayerSelector::All.selects(0, 5));
        assert!(LayerSelector::AllButLast(2).selects(2, 5));
        assert!(!LayerSelector::AllButLast(2).selects(3, 5));
        assert!(LayerSelector::LastN(2).selects(3, 5));
        assert!(!LayerSelector::LastN(2).selects(2, 5));
        assert!(LayerSelector::LastN(20).selects(0, 5));
        assert!(!LayerSelector::AllButLast(20).selects(0, 5));
    }

    #[test]
    fn test_freeze_all_but_tail() {
        let device = Default::default();
        let extractor = small_config().init::<TestAutodiff>(&device);
        assert!(extractor.trainable_mask().iter().all(|t| *t));

        let extractor = extractor
            .set_require_grad(LayerSelector::All, false)
            .set_require_grad(LayerSelector::LastN(20), true);
        let mask = extractor.trainable_mask();

        assert_eq!(mask.len(), 32);
        assert!(mask[..12].iter().all(|t| !*t));
        assert!(mask[12..].iter().all(|t| *t));

        let extractor = extractor.set_require_grad(LayerSelector::All, true);
        assert!(extractor.trainable_mask().iter().all(|t| *t));
    }

    #[test]
    fn test_weights_round_trip_and_mismatch() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("backbone.mpk");
        let device = Default::default();

        let original = small_config().init::<TestBackend>(&device);
        original.save_weights(&path).unwrap();

        let restored = small_config()
            .init::<TestBackend>(&device)
            .load_weights(&path, &device)
            .unwrap();
        let a: Vec<f32> = original.blocks[0].conv.weight.val().into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.blocks[0].conv.weight.val().into_data().to_vec().unwrap();
        assert_eq!(a, b);

        let wider = FeatureExtractorConfig::new()
            .with_stage_filters(vec![6, 8, 8, 8])
            .init::<TestBackend>(&device);
        assert!(matches!(
            wider.load_weights(&path, &device),
            Err(GreenThumbError::Load(_))
        ));
    }
}
