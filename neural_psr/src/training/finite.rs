//! Finiteness checks on gradients and parameters.

use std::marker::PhantomData;

use burn::module::{Module, ModuleVisitor, ParamId};
use burn::optim::GradientsParams;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

fn all_finite<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> bool {
    tensor.into_data().iter::<f32>().all(f32::is_finite)
}

struct FiniteParams {
    finite: bool,
}

impl<B: Backend> ModuleVisitor<B> for FiniteParams {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        if self.finite {
            self.finite = all_finite(tensor.clone());
        }
    }
}

struct FiniteGradients<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    finite: bool,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for FiniteGradients<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if !self.finite {
            return;
        }
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.finite = all_finite(grad);
        }
    }
}

/// Whether every float parameter of `module` is finite.
pub(crate) fn params_are_finite<B: Backend, M: Module<B>>(module: &M) -> bool {
    let mut visitor = FiniteParams { finite: true };
    module.visit(&mut visitor);
    visitor.finite
}

/// Whether every gradient `grads` holds for a parameter of `module` is
/// finite.
pub(crate) fn grads_are_finite<B: AutodiffBackend, M: Module<B>>(
    module: &M,
    grads: &GradientsParams,
) -> bool {
    let mut visitor = FiniteGradients::<B> {
        grads,
        finite: true,
        _backend: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.finite
}
