use burn::module::Param;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, Linear};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Counts of learnable parameters by their gradient-tracking state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainableReport {
    pub trainable: usize,
    pub frozen: usize,
}

impl TrainableReport {
    pub fn total(&self) -> usize {
        self.trainable + self.frozen
    }

    pub fn all_trainable(&self) -> bool {
        self.frozen == 0 && self.trainable > 0
    }

    pub fn all_frozen(&self) -> bool {
        self.trainable == 0 && self.frozen > 0
    }

    fn record(&mut self, trainable: bool) {
        if trainable {
            self.trainable += 1;
        } else {
            self.frozen += 1;
        }
    }
}

/// Layers whose learnable parameters can be switched in and out of gradient tracking.
///
/// Batch-norm running statistics are buffers rather than parameters and are
/// never touched.
pub trait Learnable {
    fn set_trainable(self, trainable: bool) -> Self;

    fn report(&self, report: &mut TrainableReport);
}

fn toggle<B: Backend, const D: usize>(
    param: Param<Tensor<B, D>>,
    trainable: bool,
) -> Param<Tensor<B, D>> {
    param.map(|tensor| tensor.set_require_grad(trainable))
}

fn toggle_opt<B: Backend, const D: usize>(
    param: Option<Param<Tensor<B, D>>>,
    trainable: bool,
) -> Option<Param<Tensor<B, D>>> {
    param.map(|param| toggle(param, trainable))
}

fn is_trainable<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> bool {
    param.val().is_require_grad()
}

impl<B: Backend> Learnable for Conv2d<B> {
    fn set_trainable(mut self, trainable: bool) -> Self {
        self.weight = toggle(self.weight, trainable);
        self.bias = toggle_opt(self.bias, trainable);
        self
    }

    fn report(&self, report: &mut TrainableReport) {
        report.record(is_trainable(&self.weight));
        if let Some(bias) = &self.bias {
            report.record(is_trainable(bias));
        }
    }
}

impl<B: Backend> Learnable for Linear<B> {
    fn set_trainable(mut self, trainable: bool) -> Self {
        self.weight = toggle(self.weight, trainable);
        self.bias = toggle_opt(self.bias, trainable);
        self
    }

    fn report(&self, report: &mut TrainableReport) {
        report.record(is_trainable(&self.weight));
        if let Some(bias) = &self.bias {
            report.record(is_trainable(bias));
        }
    }
}

impl<B: Backend> Learnable for BatchNorm<B> {
    fn set_trainable(mut self, trainable: bool) -> Self {
        self.gamma = toggle(self.gamma, trainable);
        self.beta = toggle(self.beta, trainable);
        self
    }

    fn report(&self, report: &mut TrainableReport) {
        report.record(is_trainable(&self.gamma));
        report.record(is_trainable(&self.beta));
    }
}

impl<L: Learnable> Learnable for Option<L> {
    fn set_trainable(self, trainable: bool) -> Self {
        self.map(|layer| layer.set_trainable(trainable))
    }

    fn report(&self, report: &mut TrainableReport) {
        if let Some(layer) = self {
            layer.report(report);
        }
    }
}

impl<L: Learnable> Learnable for Vec<L> {
    fn set_trainable(self, trainable: bool) -> Self {
        self.into_iter()
            .map(|layer| layer.set_trainable(trainable))
            .collect()
    }

    fn report(&self, report: &mut TrainableReport) {
        for layer in self {
            layer.report(report);
        }
    }
}
