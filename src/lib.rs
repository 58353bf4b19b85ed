//! Convolutional actor-critic network on Burn, with noise and gradient-toggling helpers.

pub mod error;
pub mod ml;
pub mod space;

pub use crate::error::ModelError;
pub use crate::ml::{
    Activation, ActorCriticConfig, ActorCriticNetwork, ConvBlockConfig, DEFAULT_PRECURSOR_WIDTH,
    DenseBlockConfig, Noise, TrainableReport, add_noise, multiply_noise,
};
pub use crate::space::InputSpace;
