pub mod activation;
pub mod blocks;
pub mod network;
pub mod noise;
pub mod trainable;

pub use activation::Activation;
pub use blocks::{ConvBlock, ConvBlockConfig, DenseBlock, DenseBlockConfig};
pub use network::{
    ActorCriticConfig, ActorCriticNetwork, DEFAULT_PRECURSOR_WIDTH, FEATURE_WIDTHS, Heads,
};
pub use noise::{DEFAULT_NOISE_STD, Noise, add_noise, multiply_noise};
pub use trainable::{Learnable, TrainableReport};
