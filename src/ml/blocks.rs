use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::activation::Activation;
use super::trainable::{Learnable, TrainableReport};
use crate::error::ModelError;
use crate::space::InputSpace;

pub const DEFAULT_KERNEL: usize = 3;
pub const DEFAULT_STRIDE: usize = 1;
pub const DEFAULT_PADDING: usize = 1;
const POOL_SIZE: usize = 2;

/// Settings for a `{convolution, activation, max-pool?, batch-norm?}` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvBlockConfig {
    pub channels_in: usize,
    pub channels_out: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub activation: Activation,
    pub max_pool: bool,
    pub batch_norm: bool,
}

impl ConvBlockConfig {
    pub fn new(channels_in: usize, channels_out: usize) -> Self {
        Self {
            channels_in,
            channels_out,
            kernel_size: DEFAULT_KERNEL,
            stride: DEFAULT_STRIDE,
            padding: DEFAULT_PADDING,
            activation: Activation::Relu,
            max_pool: false,
            batch_norm: true,
        }
    }

    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_activation_name(self, name: &str) -> Result<Self, ModelError> {
        Ok(self.with_activation(name.parse()?))
    }

    pub fn with_max_pool(mut self, max_pool: bool) -> Self {
        self.max_pool = max_pool;
        self
    }

    pub fn with_batch_norm(mut self, batch_norm: bool) -> Self {
        self.batch_norm = batch_norm;
        self
    }

    /// Shape of the block's output for a given input, or `None` when the
    /// feature map would collapse to nothing.
    pub fn output_space(&self, input: InputSpace) -> Option<InputSpace> {
        let height = self.spatial_output(input.height)?;
        let width = self.spatial_output(input.width)?;
        InputSpace::new(self.channels_out, height, width).ok()
    }

    fn spatial_output(&self, size: usize) -> Option<usize> {
        if self.stride == 0 {
            return None;
        }
        let padded = size + 2 * self.padding;
        let convolved = padded.checked_sub(self.kernel_size)? / self.stride + 1;
        let pooled = if self.max_pool {
            convolved / POOL_SIZE
        } else {
            convolved
        };
        (pooled > 0).then_some(pooled)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        let conv = Conv2dConfig::new(
            [self.channels_in, self.channels_out],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
        .init(device);
        let pool = self.max_pool.then(|| {
            MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
                .with_strides([POOL_SIZE, POOL_SIZE])
                .init()
        });
        let norm = self
            .batch_norm
            .then(|| BatchNormConfig::new(self.channels_out).init(device));
        ConvBlock {
            conv,
            activation: Ignored(self.activation),
            pool,
            norm,
        }
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    activation: Ignored<Activation>,
    pool: Option<MaxPool2d>,
    norm: Option<BatchNorm<B>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.activation.apply(x);
        let x = match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        };
        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }

    pub fn activation(&self) -> Activation {
        *self.activation
    }

    pub fn has_batch_norm(&self) -> bool {
        self.norm.is_some()
    }

    pub fn has_max_pool(&self) -> bool {
        self.pool.is_some()
    }
}

impl<B: Backend> Learnable for ConvBlock<B> {
    fn set_trainable(self, trainable: bool) -> Self {
        Self {
            conv: self.conv.set_trainable(trainable),
            activation: self.activation,
            pool: self.pool,
            norm: self.norm.set_trainable(trainable),
        }
    }

    fn report(&self, report: &mut TrainableReport) {
        self.conv.report(report);
        self.norm.report(report);
    }
}

/// Settings for a `{dropout, bias-free linear, activation?, batch-norm?}` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseBlockConfig {
    pub features_in: usize,
    pub features_out: usize,
    pub dropout: f64,
    pub activation: Activation,
    pub batch_norm: bool,
}

impl DenseBlockConfig {
    pub fn new(features_in: usize, features_out: usize) -> Self {
        Self {
            features_in,
            features_out,
            dropout: 0.0,
            activation: Activation::Relu,
            batch_norm: true,
        }
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_activation_name(self, name: &str) -> Result<Self, ModelError> {
        Ok(self.with_activation(name.parse()?))
    }

    pub fn with_batch_norm(mut self, batch_norm: bool) -> Self {
        self.batch_norm = batch_norm;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DenseBlock<B>, ModelError> {
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidDropout(self.dropout));
        }
        let linear = LinearConfig::new(self.features_in, self.features_out)
            .with_bias(false)
            .init(device);
        let norm = self
            .batch_norm
            .then(|| BatchNormConfig::new(self.features_out).init(device));
        Ok(DenseBlock {
            dropout: DropoutConfig::new(self.dropout).init(),
            linear,
            activation: Ignored(self.activation),
            norm,
        })
    }
}

/// Dropout is only active on autodiff backends, so the inference copy of a
/// module (`AutodiffModule::valid`) runs it as an identity.
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    dropout: Dropout,
    linear: Linear<B>,
    activation: Ignored<Activation>,
    norm: Option<BatchNorm<B>>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.apply_dropout(input);
        let x = self.linear.forward(x);
        let x = self.activation.apply(x);
        match &self.norm {
            Some(norm) => {
                let [batch, features] = x.dims();
                norm.forward(x.reshape([batch, features, 1]))
                    .reshape([batch, features])
            }
            None => x,
        }
    }

    // Burn rescales kept values by 1 / (1 - p), which is undefined at p = 1.
    fn apply_dropout(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        if B::ad_enabled() && self.dropout.prob >= 1.0 {
            return input.zeros_like();
        }
        self.dropout.forward(input)
    }

    pub fn features_in(&self) -> usize {
        let [features_in, _] = self.linear.weight.val().dims();
        features_in
    }

    pub fn features_out(&self) -> usize {
        let [_, features_out] = self.linear.weight.val().dims();
        features_out
    }

    pub fn activation(&self) -> Activation {
        *self.activation
    }
}

impl<B: Backend> Learnable for DenseBlock<B> {
    fn set_trainable(self, trainable: bool) -> Self {
        Self {
            dropout: self.dropout,
            linear: self.linear.set_trainable(trainable),
            activation: self.activation,
            norm: self.norm.set_trainable(trainable),
        }
    }

    fn report(&self, report: &mut TrainableReport) {
        self.linear.report(report);
        self.norm.report(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn::tensor::activation::relu;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;
    type TrainBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn conv_defaults_match_reference_block() {
        let config = ConvBlockConfig::new(3, 16);
        assert_eq!(config.kernel_size, 3);
        assert_eq!(config.stride, 1);
        assert_eq!(config.padding, 1);
        assert_eq!(config.activation, Activation::Relu);
        assert!(!config.max_pool);
        assert!(config.batch_norm);
    }

    #[test]
    fn conv_output_space_follows_stride_and_pooling() {
        let input = InputSpace::new(3, 32, 32).expect("space");
        let same = ConvBlockConfig::new(3, 16).output_space(input).expect("shape");
        assert_eq!(same.dims(), [16, 32, 32]);
        let strided = ConvBlockConfig::new(16, 24)
            .with_stride(2)
            .output_space(same)
            .expect("shape");
        assert_eq!(strided.dims(), [24, 16, 16]);
        let pooled = ConvBlockConfig::new(24, 36)
            .with_stride(2)
            .with_max_pool(true)
            .output_space(strided)
            .expect("shape");
        assert_eq!(pooled.dims(), [36, 4, 4]);
    }

    #[test]
    fn conv_output_space_detects_collapse() {
        let tiny = InputSpace::new(1, 1, 1).expect("space");
        let config = ConvBlockConfig::new(1, 4).with_max_pool(true);
        assert_eq!(config.output_space(tiny), None);
        let no_padding = ConvBlockConfig::new(1, 4).with_kernel_size(5).with_padding(0);
        assert_eq!(no_padding.output_space(InputSpace::new(1, 4, 4).expect("space")), None);
    }

    #[test]
    fn conv_block_forward_matches_analytic_shape() {
        let device = Default::default();
        let config = ConvBlockConfig::new(3, 8)
            .with_stride(2)
            .with_max_pool(true)
            .with_activation(Activation::Tanh);
        let block = config.init::<Backend>(&device);
        assert_eq!(block.activation(), Activation::Tanh);
        let input = Tensor::<Backend, 4>::random([2, 3, 20, 12], Distribution::Default, &device);
        let output = block.forward(input);
        let expected = config
            .output_space(InputSpace::new(3, 20, 12).expect("space"))
            .expect("shape");
        assert_eq!(output.dims(), [2, 8, expected.height, expected.width]);
    }

    #[test]
    fn conv_activation_name_is_checked() {
        assert!(ConvBlockConfig::new(1, 1).with_activation_name("elu").is_ok());
        assert_eq!(
            ConvBlockConfig::new(1, 1).with_activation_name("swish"),
            Err(ModelError::UnknownActivation("swish".to_string()))
        );
    }

    #[test]
    fn dense_block_produces_requested_features() {
        let device = Default::default();
        let block = DenseBlockConfig::new(10, 6)
            .with_batch_norm(false)
            .init::<Backend>(&device)
            .expect("block");
        assert_eq!(block.features_in(), 10);
        assert_eq!(block.features_out(), 6);
        let input = Tensor::<Backend, 2>::random([3, 10], Distribution::Default, &device);
        assert_eq!(block.forward(input).dims(), [3, 6]);
    }

    #[test]
    fn dense_block_with_batch_norm_keeps_shape() {
        let device = Default::default();
        let block = DenseBlockConfig::new(5, 4)
            .with_activation(Activation::Selu)
            .init::<Backend>(&device)
            .expect("block");
        let input = Tensor::<Backend, 2>::random([2, 5], Distribution::Default, &device);
        assert_eq!(block.forward(input).dims(), [2, 4]);
    }

    #[test]
    fn dense_block_without_activation_is_linear() {
        let device = Default::default();
        let block = DenseBlockConfig::new(4, 2)
            .with_activation(Activation::None)
            .with_batch_norm(false)
            .init::<Backend>(&device)
            .expect("block");
        let input = Tensor::<Backend, 2>::random([1, 4], Distribution::Default, &device);
        let doubled = block.forward(input.clone().mul_scalar(2.0));
        let single = block.forward(input).mul_scalar(2.0);
        let doubled = doubled.into_data().to_vec::<f32>().expect("data");
        let single = single.into_data().to_vec::<f32>().expect("data");
        for (a, b) in doubled.iter().zip(&single) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn dense_block_rejects_bad_dropout() {
        let device = Default::default();
        for dropout in [-0.1, 1.5, f64::NAN] {
            let result = DenseBlockConfig::new(4, 2)
                .with_dropout(dropout)
                .init::<Backend>(&device);
            assert!(matches!(result, Err(ModelError::InvalidDropout(_))));
        }
    }

    #[test]
    fn full_dropout_zeroes_training_activations() {
        let device = Default::default();
        let block = DenseBlockConfig::new(4, 3)
            .with_dropout(1.0)
            .with_batch_norm(false)
            .init::<TrainBackend>(&device)
            .expect("block");
        let input = Tensor::<TrainBackend, 2>::ones([2, 4], &device);
        let output = block.forward(input).into_data().to_vec::<f32>().expect("data");
        assert!(output.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn conv_block_runs_conv_then_activation_then_norm() {
        let device = Default::default();
        let block = ConvBlockConfig::new(2, 4).init::<TrainBackend>(&device);
        assert!(block.has_batch_norm());
        assert!(!block.has_max_pool());
        let input =
            Tensor::<TrainBackend, 4>::random([3, 2, 6, 6], Distribution::Default, &device);

        let norm = block.norm.as_ref().expect("batch norm");
        let expected = norm.forward(relu(block.conv.forward(input.clone())));
        let actual = block.forward(input);

        let expected = expected.into_data().to_vec::<f32>().expect("data");
        let actual = actual.into_data().to_vec::<f32>().expect("data");
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-5, "expected {e}, got {a}");
        }
        // batch statistics centre the post-activation maps, so the norm must come last
        assert!(actual.iter().any(|value| *value < 0.0));
    }
}
