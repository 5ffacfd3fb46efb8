//! Shared projection trunk and the two classification heads

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    tensor::{backend::Backend, Tensor},
};

use crate::dataset::labels::{Crop, Severity};

/// Configuration for the shared trunk
#[derive(Config, Debug)]
pub struct SharedTrunkConfig {
    /// Width of the incoming feature vector (F)
    pub input_dim: usize,

    #[config(default = 512)]
    pub hidden_dim: usize,

    #[config(default = 256)]
    pub output_dim: usize,

    #[config(default = 0.3)]
    pub dropout: f64,
}

impl SharedTrunkConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SharedTrunk<B> {
        SharedTrunk {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.output_dim).init(device),
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Two-layer projection F -> 512 -> 256, each layer followed by ReLU and dropout
#[derive(Module, Debug)]
pub struct SharedTrunk<B: Backend> {
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    activation: Relu,
    dropout: Dropout,
}

impl<B: Backend> SharedTrunk<B> {
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.fc1.forward(features);
        let x = self.dropout.forward(self.activation.forward(x));
        let x = self.fc2.forward(x);
        self.dropout.forward(self.activation.forward(x))
    }

    pub(crate) fn param_shapes(&self) -> Vec<Vec<usize>> {
        linear_shapes(&self.fc1)
            .into_iter()
            .chain(linear_shapes(&self.fc2))
            .collect()
    }
}

/// Crop-type logits (10 classes)
#[derive(Module, Debug)]
pub struct CropHead<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> CropHead<B> {
    pub fn new(input_dim: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(input_dim, Crop::COUNT).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }
}

/// Severity-level logits (6 classes)
#[derive(Module, Debug)]
pub struct SeverityHead<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> SeverityHead<B> {
    pub fn new(input_dim: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(input_dim, Severity::COUNT).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }
}

pub(crate) fn linear_shapes<B: Backend>(linear: &Linear<B>) -> Vec<Vec<usize>> {
    let mut shapes = vec![linear.weight.dims().to_vec()];
    if let Some(bias) = &linear.bias {
        shapes.push(bias.dims().to_vec());
    }
    shapes
}
