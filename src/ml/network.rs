//! Convolutional actor-critic network.
//!
//! ```text
//! Input: [batch, C, H, W]
//!   ↓ BatchNorm(C)
//!   ↓ ConvBlock(C → 16)            conv 3x3 + ReLU + BatchNorm
//!   ↓ ConvBlock(16 → 24, stride 2) conv 3x3 + ReLU + BatchNorm
//!   ↓ ConvBlock(24 → 36, stride 2) conv 3x3 + ReLU + BatchNorm
//!   ↓ Flatten: [batch, F]
//!   ↓ DenseBlock(F → 200) + ReLU
//!   ↓ DenseBlock(200 → 200) + ReLU
//!   ├─→ Value:  DenseBlock(200 → 1)
//!   └─→ Policy: DenseBlock(200 → output_space)
//! ```
//!
//! Construction happens in two phases. [`ActorCriticNetwork::new`] builds the
//! feature extractor; [`ActorCriticNetwork::build`] adds the dense layers once
//! the flattened feature size is known. [`ActorCriticConfig::init`] runs both,
//! computing the feature size from the input space.

use burn::module::{Ignored, Module};
use burn::nn::{BatchNorm, BatchNormConfig};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::activation::Activation;
use super::blocks::{ConvBlock, ConvBlockConfig, DenseBlock, DenseBlockConfig};
use super::trainable::{Learnable, TrainableReport};
use crate::error::ModelError;
use crate::space::InputSpace;

pub const FEATURE_WIDTHS: [usize; 3] = [16, 24, 36];
pub const DEFAULT_PRECURSOR_WIDTH: usize = 200;
const DOWNSAMPLE_STRIDE: usize = 2;

fn default_precursor_width() -> usize {
    DEFAULT_PRECURSOR_WIDTH
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorCriticConfig {
    pub input_space: InputSpace,
    pub output_space: usize,
    #[serde(default = "default_precursor_width")]
    pub precursor_width: usize,
    #[serde(default)]
    pub dropout: f64,
}

impl ActorCriticConfig {
    pub fn new(input_space: InputSpace, output_space: usize) -> Self {
        Self {
            input_space,
            output_space,
            precursor_width: DEFAULT_PRECURSOR_WIDTH,
            dropout: 0.0,
        }
    }

    pub fn with_precursor_width(mut self, precursor_width: usize) -> Self {
        self.precursor_width = precursor_width;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// The three feature-extractor stages; the last two downsample.
    pub fn feature_blocks(&self) -> [ConvBlockConfig; 3] {
        let [first, second, third] = FEATURE_WIDTHS;
        [
            ConvBlockConfig::new(self.input_space.channels, first),
            ConvBlockConfig::new(first, second).with_stride(DOWNSAMPLE_STRIDE),
            ConvBlockConfig::new(second, third).with_stride(DOWNSAMPLE_STRIDE),
        ]
    }

    /// Shape of the extractor output for a single sample.
    pub fn feature_space(&self) -> Result<InputSpace, ModelError> {
        self.feature_blocks()
            .iter()
            .try_fold(self.input_space, |space, block| block.output_space(space))
            .ok_or(ModelError::DegenerateFeatures(self.input_space))
    }

    /// Flattened extractor output size, computed without running the network.
    pub fn feature_size(&self) -> Result<usize, ModelError> {
        Ok(self.feature_space()?.volume())
    }

    /// Precursor trunk followed by the policy and value heads, in that order.
    pub fn dense_blocks(&self, feature_size: usize) -> [DenseBlockConfig; 4] {
        let width = self.precursor_width;
        let trunk = |features_in| {
            DenseBlockConfig::new(features_in, width)
                .with_dropout(self.dropout)
                .with_batch_norm(false)
        };
        let head = |features_out| {
            DenseBlockConfig::new(width, features_out)
                .with_dropout(self.dropout)
                .with_activation(Activation::None)
                .with_batch_norm(false)
        };
        [
            trunk(feature_size),
            trunk(width),
            head(self.output_space),
            head(1),
        ]
    }

    fn validate(&self) -> Result<(), ModelError> {
        let space = self.input_space;
        InputSpace::new(space.channels, space.height, space.width)?;
        if self.output_space == 0 {
            return Err(ModelError::EmptyOutputSpace);
        }
        if self.precursor_width == 0 {
            return Err(ModelError::EmptyPrecursor);
        }
        if !(0.0..=1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidDropout(self.dropout));
        }
        Ok(())
    }

    /// Builds the extractor and the dense layers in one step.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<ActorCriticNetwork<B>, ModelError> {
        let mut network = ActorCriticNetwork::new(self.clone(), device)?;
        let feature_size = self.feature_size()?;
        network.build(feature_size, device)?;
        Ok(network)
    }
}

#[derive(Module, Debug)]
pub struct Heads<B: Backend> {
    precursor: Vec<DenseBlock<B>>,
    policy: DenseBlock<B>,
    value: DenseBlock<B>,
}

impl<B: Backend> Heads<B> {
    fn new(
        config: &ActorCriticConfig,
        feature_size: usize,
        device: &B::Device,
    ) -> Result<Self, ModelError> {
        let [first, second, policy, value] = config.dense_blocks(feature_size);
        Ok(Self {
            precursor: vec![first.init(device)?, second.init(device)?],
            policy: policy.init(device)?,
            value: value.init(device)?,
        })
    }

    fn feature_size(&self) -> usize {
        self.precursor
            .first()
            .map(DenseBlock::features_in)
            .unwrap_or_default()
    }

    /// Returns `(value, policy_logits)`.
    fn forward(&self, features: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let shared = self
            .precursor
            .iter()
            .fold(features, |x, block| block.forward(x));
        let value = self.value.forward(shared.clone());
        let policy = self.policy.forward(shared);
        (value, policy)
    }
}

impl<B: Backend> Learnable for Heads<B> {
    fn set_trainable(self, trainable: bool) -> Self {
        Self {
            precursor: self.precursor.set_trainable(trainable),
            policy: self.policy.set_trainable(trainable),
            value: self.value.set_trainable(trainable),
        }
    }

    fn report(&self, report: &mut TrainableReport) {
        self.precursor.report(report);
        self.policy.report(report);
        self.value.report(report);
    }
}

/// Actor-critic network producing a value estimate and policy logits per sample.
#[derive(Module, Debug)]
pub struct ActorCriticNetwork<B: Backend> {
    input_norm: BatchNorm<B>,
    features: Vec<ConvBlock<B>>,
    heads: Option<Heads<B>>,
    config: Ignored<ActorCriticConfig>,
}

impl<B: Backend> ActorCriticNetwork<B> {
    /// Builds the input normalization and the convolutional feature extractor.
    /// Call [`ActorCriticNetwork::build`] before evaluating the network.
    pub fn new(config: ActorCriticConfig, device: &B::Device) -> Result<Self, ModelError> {
        config.validate()?;
        let input_norm = BatchNormConfig::new(config.input_space.channels).init(device);
        let features = config
            .feature_blocks()
            .iter()
            .map(|block| block.init(device))
            .collect();
        debug!(
            input_space = %config.input_space,
            output_space = config.output_space,
            widths = ?FEATURE_WIDTHS,
            "built feature extractor"
        );
        Ok(Self {
            input_norm,
            features,
            heads: None,
            config: Ignored(config),
        })
    }

    /// Builds the precursor trunk and both heads for `feature_size` inputs.
    /// Succeeds at most once per network.
    pub fn build(&mut self, feature_size: usize, device: &B::Device) -> Result<(), ModelError> {
        if self.heads.is_some() {
            return Err(ModelError::AlreadyBuilt);
        }
        if feature_size == 0 {
            return Err(ModelError::EmptyFeatures);
        }
        let heads = Heads::new(&self.config, feature_size, device)?;
        debug!(
            feature_size,
            precursor_width = self.config.precursor_width,
            output_space = self.config.output_space,
            "built dense heads"
        );
        self.heads = Some(heads);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.heads.is_some()
    }

    pub fn config(&self) -> &ActorCriticConfig {
        &self.config
    }

    pub fn input_space(&self) -> InputSpace {
        self.config.input_space
    }

    pub fn output_space(&self) -> usize {
        self.config.output_space
    }

    /// Analytic flattened size of the extractor output.
    pub fn feature_size(&self) -> Result<usize, ModelError> {
        self.config.feature_size()
    }

    /// Feature size the dense layers were built for, if built.
    pub fn built_feature_size(&self) -> Option<usize> {
        self.heads.as_ref().map(Heads::feature_size)
    }

    /// Normalizes the input, runs the convolutional stages and flattens each sample.
    pub fn features(&self, input: Tensor<B, 4>) -> Result<Tensor<B, 2>, ModelError> {
        self.check_input(&input)?;
        let x = self.input_norm.forward(input);
        let x = self.features.iter().fold(x, |x, block| block.forward(x));
        let [batch, channels, height, width] = x.dims();
        Ok(x.reshape([batch, channels * height * width]))
    }

    /// Returns `(value [batch, 1], policy_logits [batch, output_space])`.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>), ModelError> {
        let heads = self.heads.as_ref().ok_or(ModelError::NotBuilt)?;
        let features = self.features(input)?;
        let [batch, found] = features.dims();
        let expected = heads.feature_size();
        if found != expected {
            return Err(ModelError::FeatureSizeMismatch { expected, found });
        }
        trace!(batch, features = found, "actor-critic forward");
        Ok(heads.forward(features))
    }

    /// Switches gradient tracking for every learnable parameter, heads included.
    pub fn set_trainable(self, trainable: bool) -> Self {
        debug!(trainable, "toggling gradient tracking");
        Learnable::set_trainable(self, trainable)
    }

    pub fn trainable_report(&self) -> TrainableReport {
        let mut report = TrainableReport::default();
        self.report(&mut report);
        report
    }

    fn check_input(&self, input: &Tensor<B, 4>) -> Result<(), ModelError> {
        let found = input.dims();
        let [_, channels, height, width] = found;
        let expected = self.config.input_space;
        if [channels, height, width] != expected.dims() {
            return Err(ModelError::ShapeMismatch { expected, found });
        }
        Ok(())
    }
}

impl<B: Backend> Learnable for ActorCriticNetwork<B> {
    fn set_trainable(self, trainable: bool) -> Self {
        Self {
            input_norm: self.input_norm.set_trainable(trainable),
            features: self.features.set_trainable(trainable),
            heads: self.heads.set_trainable(trainable),
            config: self.config,
        }
    }

    fn report(&self, report: &mut TrainableReport) {
        self.input_norm.report(report);
        self.features.report(report);
        self.heads.report(report);
    }
}
