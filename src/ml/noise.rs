use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

use crate::error::ModelError;

pub const DEFAULT_NOISE_STD: f64 = 0.01;

/// Gaussian perturbation applied elementwise to a tensor.
///
/// Built through [`Noise::new`] or the presets; the standard deviation is
/// always finite and non-negative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Noise {
    mean: f64,
    std: f64,
}

impl Noise {
    pub fn new(mean: f64, std: f64) -> Result<Self, ModelError> {
        if !mean.is_finite() || !std.is_finite() || std < 0.0 {
            return Err(ModelError::InvalidNoise { mean, std });
        }
        Ok(Self { mean, std })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    /// Zero-centred noise for [`Noise::apply_add`].
    pub fn additive() -> Self {
        Self {
            mean: 0.0,
            std: DEFAULT_NOISE_STD,
        }
    }

    /// Unit-centred noise for [`Noise::apply_mul`].
    pub fn multiplicative() -> Self {
        Self {
            mean: 1.0,
            std: DEFAULT_NOISE_STD,
        }
    }

    fn sample_like<B: Backend, const D: usize>(&self, input: &Tensor<B, D>) -> Tensor<B, D> {
        Tensor::random(
            input.shape(),
            Distribution::Normal(self.mean, self.std),
            &input.device(),
        )
    }

    pub fn apply_add<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let noise = self.sample_like(&input);
        input + noise
    }

    pub fn apply_mul<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let noise = self.sample_like(&input);
        input * noise
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::additive()
    }
}

/// Returns `input + N(mean, std)`.
pub fn add_noise<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    mean: f64,
    std: f64,
) -> Result<Tensor<B, D>, ModelError> {
    Ok(Noise::new(mean, std)?.apply_add(input))
}

/// Returns `input * N(mean, std)`.
pub fn multiply_noise<B: Backend, const D: usize>(
    input: Tensor<B, D>,
    mean: f64,
    std: f64,
) -> Result<Tensor<B, D>, ModelError> {
    Ok(Noise::new(mean, std)?.apply_mul(input))
}
