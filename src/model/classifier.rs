//! Dual-head plant disease classifier
//!
//! [`DualHeadModel`] composes the feature extractor, the shared trunk and the
//! crop/severity heads. [`PlantDiseaseClassifier`] owns one model instance
//! together with its configuration and device, and provides weight
//! management: reset, save/load and layer (un)freezing.

use std::path::Path;

use burn::{
    module::{AutodiffModule, Module},
    tensor::{
        backend::{AutodiffBackend, Backend},
        Tensor,
    },
};
use serde::Serialize;
use tracing::info;

use super::backbone::{load_module_file, save_module_file, FeatureExtractor, LayerSelector};
use super::config::ClassifierConfig;
use super::heads::{linear_shapes, CropHead, SeverityHead, SharedTrunk};
use crate::dataset::labels::{crop_names, severity_levels};
use crate::utils::error::{GreenThumbError, Result};

/// Logits of both heads for one batch
#[derive(Debug, Clone)]
pub struct DualHeadOutput<B: Backend> {
    /// [batch, 10]
    pub crop_logits: Tensor<B, 2>,
    /// [batch, 6]
    pub severity_logits: Tensor<B, 2>,
}

/// Feature extractor -> shared trunk -> (crop head, severity head)
#[derive(Module, Debug)]
pub struct DualHeadModel<B: Backend> {
    pub backbone: FeatureExtractor<B>,
    pub trunk: SharedTrunk<B>,
    pub crop_head: CropHead<B>,
    pub severity_head: SeverityHead<B>,
}

impl<B: Backend> DualHeadModel<B> {
    /// Build untrained weights for the given architecture
    pub fn new(config: &ClassifierConfig, device: &B::Device) -> Self {
        let trunk = config.trunk();
        Self {
            backbone: config.backbone.init(device),
            crop_head: CropHead::new(trunk.output_dim, device),
            severity_head: SeverityHead::new(trunk.output_dim, device),
            trunk: trunk.init(device),
        }
    }

    /// Forward pass on normalized images [batch, 3, H, W]
    pub fn forward(&self, images: Tensor<B, 4>) -> DualHeadOutput<B> {
        let features = self.backbone.forward(images);
        let shared = self.trunk.forward(features);

        DualHeadOutput {
            crop_logits: self.crop_head.forward(shared.clone()),
            severity_logits: self.severity_head.forward(shared),
        }
    }

    /// Shapes of every learnable tensor; two models can exchange weights iff these match
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = self.backbone.param_shapes();
        shapes.extend(self.trunk.param_shapes());
        shapes.extend(linear_shapes(&self.crop_head.linear));
        shapes.extend(linear_shapes(&self.severity_head.linear));
        shapes
    }
}

/// Summary of the live model, for the model-info boundary
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub architecture: String,
    pub crops_supported: Vec<String>,
    pub severity_levels: Vec<u32>,
    pub input_size: [usize; 2],
    pub feature_dim: usize,
    pub backend: String,
    pub total_parameters: usize,
    pub backbone_weights: Option<String>,
}

/// A classifier instance: model weights, architecture and device
#[derive(Debug, Clone)]
pub struct PlantDiseaseClassifier<B: Backend> {
    model: DualHeadModel<B>,
    config: ClassifierConfig,
    device: B::Device,
}

impl<B: Backend> PlantDiseaseClassifier<B> {
    /// Build a classifier with default (untrained) heads.
    ///
    /// When `backbone_weights` is configured the feature extractor starts from
    /// that file.
    pub fn new(config: ClassifierConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let model = Self::initial_model(&config, &device)?;
        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// Build a classifier and load a checkpoint into it
    pub fn from_checkpoint(config: ClassifierConfig, path: &Path, device: B::Device) -> Result<Self> {
        let mut classifier = Self::new(config, device)?;
        classifier.load(path)?;
        Ok(classifier)
    }

    fn initial_model(config: &ClassifierConfig, device: &B::Device) -> Result<DualHeadModel<B>> {
        let mut model = DualHeadModel::new(config, device);
        if let Some(weights) = &config.backbone_weights {
            model.backbone = model.backbone.load_weights(weights, device)?;
        }
        Ok(model)
    }

    pub fn model(&self) -> &DualHeadModel<B> {
        &self.model
    }

    /// Replace the weights, e.g. after an optimizer step
    pub fn set_model(&mut self, model: DualHeadModel<B>) {
        self.model = model;
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Discard the current weights and rebuild the untrained architecture
    pub fn reset(&mut self) -> Result<()> {
        self.model = Self::initial_model(&self.config, &self.device)?;
        info!("Model reset to initial state");
        Ok(())
    }

    /// Persist the learned weights (no optimizer state)
    pub fn save(&self, path: &Path) -> Result<()> {
        save_module_file(&self.model, path)?;
        info!("Model saved to {:?}", path);
        Ok(())
    }

    /// Restore weights saved by [`save`](Self::save).
    ///
    /// Fails with a load error when the file is missing or was written for a
    /// different architecture; the current weights stay in place on failure.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(GreenThumbError::Load(format!(
                "checkpoint {} does not exist",
                path.display()
            )));
        }

        let expected = self.model.param_shapes();
        let loaded = load_module_file(self.model.clone(), path, &self.device)?;

        if loaded.param_shapes() != expected {
            return Err(GreenThumbError::Load(format!(
                "checkpoint {} was saved for a different architecture",
                path.display()
            )));
        }

        self.model = loaded;
        info!("Model loaded from {:?}", path);
        Ok(())
    }

    /// Exclude the selected feature-extractor tensors from gradient updates
    pub fn freeze(&mut self, selector: LayerSelector) {
        self.set_backbone_require_grad(selector, false);
    }

    /// Let the selected feature-extractor tensors receive gradient updates
    pub fn unfreeze(&mut self, selector: LayerSelector) {
        self.set_backbone_require_grad(selector, true);
    }

    fn set_backbone_require_grad(&mut self, selector: LayerSelector, require_grad: bool) {
        let DualHeadModel {
            backbone,
            trunk,
            crop_head,
            severity_head,
        } = self.model.clone();

        self.model = DualHeadModel {
            backbone: backbone.set_require_grad(selector, require_grad),
            trunk,
            crop_head,
            severity_head,
        };
    }

    /// Per-tensor trainability of the feature extractor, in declaration order
    pub fn trainable_mask(&self) -> Vec<bool> {
        self.model.backbone.trainable_mask()
    }

    pub fn num_params(&self) -> usize {
        self.model.num_params()
    }

    pub fn model_info(&self) -> ModelInfo {
        let blocks = self.model.backbone.blocks.len();
        ModelInfo {
            architecture: format!(
                "{}-block CNN feature extractor + shared trunk ({}->{}->{}) + crop/severity heads",
                blocks,
                self.config.backbone.output_dim(),
                self.config.trunk_hidden,
                self.config.trunk_output
            ),
            crops_supported: crop_names().into_iter().map(String::from).collect(),
            severity_levels: severity_levels(),
            input_size: [self.config.image_size, self.config.image_size],
            feature_dim: self.config.backbone.output_dim(),
            backend: crate::backend::backend_name().to_string(),
            total_parameters: self.num_params(),
            backbone_weights: self
                .config
                .backbone_weights
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

impl<B: AutodiffBackend> PlantDiseaseClassifier<B> {
    /// Copy of the current weights on the inner backend: no gradient
    /// tracking, dropout and batch-norm in evaluation mode
    pub fn to_inference(&self) -> PlantDiseaseClassifier<B::InnerBackend> {
        PlantDiseaseClassifier {
            model: self.model.valid(),
            config: self.config.clone(),
            device: self.device.clone(),
        }
    }
}
