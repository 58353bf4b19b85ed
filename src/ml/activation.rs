use std::fmt;
use std::str::FromStr;

use burn::tensor::Tensor;
use burn::tensor::activation::{relu, tanh};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const ELU_ALPHA: f64 = 1.0;
const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;

/// Non-linearity applied inside a convolutional or dense block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Elu,
    Selu,
    None,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(self, input: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => relu(input),
            Activation::Tanh => tanh(input),
            Activation::Elu => elu(input, ELU_ALPHA),
            Activation::Selu => elu(input, SELU_ALPHA).mul_scalar(SELU_SCALE),
            Activation::None => input,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Elu => "elu",
            Activation::Selu => "selu",
            Activation::None => "none",
        }
    }
}

// x for x > 0, alpha * (exp(x) - 1) otherwise
fn elu<B: Backend, const D: usize>(input: Tensor<B, D>, alpha: f64) -> Tensor<B, D> {
    let positive = input.clone().clamp_min(0.0);
    let negative = input.clamp_max(0.0).exp().sub_scalar(1.0).mul_scalar(alpha);
    positive + negative
}

impl FromStr for Activation {
    type Err = ModelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "elu" => Ok(Activation::Elu),
            "selu" => Ok(Activation::Selu),
            "none" | "identity" | "" => Ok(Activation::None),
            _ => Err(ModelError::UnknownActivation(name.to_string())),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
