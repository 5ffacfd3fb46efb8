//! Global L2-norm gradient clipping
//!
//! All gradients of one step are rescaled together by `min(1, max_norm / total_norm)`,
//! where `total_norm` is the L2 norm over every trainable parameter.

use std::marker::PhantomData;

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let squared: f64 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.total += squared;
        }
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    factor: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.factor));
        }
    }
}

/// L2 norm over every gradient in `grads` that belongs to `model`
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> {
        grads,
        total: 0.0,
        _backend: PhantomData,
    };
    model.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Scale all gradients jointly so their global L2 norm is at most `max_norm`
pub fn clip_global_norm<B, M>(
    model: &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> GradientsParams
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, &grads);
    if !norm.is_finite() || norm <= max_norm {
        return grads;
    }

    let mut visitor = Rescale::<B> {
        grads: &mut grads,
        factor: max_norm / norm,
        _backend: PhantomData,
    };
    model.visit(&mut visitor);
    grads
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::nn::{Linear, LinearConfig};
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;
    type Inner = NdArray;

    fn filled_grads(model: &Linear<TestBackend>, value: f32) -> GradientsParams {
        let device = Default::default();
        let mut grads = GradientsParams::new();
        grads.register(
            model.weight.id,
            Tensor::<Inner, 2>::full([2, 2], value, &device),
        );
        if let Some(bias) = &model.bias {
            grads.register(bias.id, Tensor::<Inner, 1>::full([2], value, &device));
        }
        grads
    }

    fn tensor_norm<const D: usize>(tensor: Tensor<Inner, D>) -> f64 {
        let squared: f64 = tensor.powf_scalar(2.0).sum().into_scalar().elem();
        squared.sqrt()
    }

    #[test]
    fn test_clip_bounds_norm_across_all_parameters() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 2).init(&device);
        // weight norm 1.8 and bias norm ~1.27: each over 1.0 on its own
        let grads = filled_grads(&model, 0.9);
        let before = global_grad_norm::<TestBackend, _>(&model, &grads);
        assert!((before - 0.9 * 6f64.sqrt()).abs() < 1e-4);

        let clipped = clip_global_norm::<TestBackend, _>(&model, grads, 1.0);
        let after = global_grad_norm::<TestBackend, _>(&model, &clipped);
        assert!(after <= 1.0 + 1e-4, "global norm {after} exceeds limit");
        assert!((after - 1.0).abs() < 1e-4);

        // direction is kept: weight and bias shrink by the same factor
        let weight = clipped
            .get::<Inner, 2>(model.weight.id)
            .expect("weight gradient");
        let bias_id = model.bias.as_ref().expect("bias").id;
        let bias = clipped.get::<Inner, 1>(bias_id).expect("bias gradient");
        let ratio = tensor_norm(weight) / tensor_norm(bias);
        assert!((ratio - 2f64.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_clip_leaves_small_gradients_untouched() {
        let device = Default::default();
        let model: Linear<TestBackend> = LinearConfig::new(2, 2).init(&device);
        let grads = filled_grads(&model, 0.1);

        let clipped = clip_global_norm::<TestBackend, _>(&model, grads, 1.0);
        let weight = clipped
            .get::<Inner, 2>(model.weight.id)
            .expect("weight gradient");
        let values: Vec<f32> = weight.into_data().to_vec().expect("f32 data");
        assert!(values.iter().all(|v| (v - 0.1).abs() < 1e-6));
    }
}
