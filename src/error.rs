use thiserror::Error;

use crate::space::InputSpace;

/// Errors raised while configuring, building or evaluating the network.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("unknown activation `{0}`")]
    UnknownActivation(String),
    #[error("dropout probability {0} is outside [0, 1]")]
    InvalidDropout(f64),
    #[error("noise parameters must be finite with a non-negative std (mean {mean}, std {std})")]
    InvalidNoise { mean: f64, std: f64 },
    #[error("invalid input space: {0}")]
    InvalidInputSpace(&'static str),
    #[error("output space must contain at least one category")]
    EmptyOutputSpace,
    #[error("feature extractor reduces input {0} to an empty map")]
    DegenerateFeatures(InputSpace),
    #[error("dense layers cannot be built for an empty feature vector")]
    EmptyFeatures,
    #[error("precursor width must be positive")]
    EmptyPrecursor,
    #[error("dense layers have already been built")]
    AlreadyBuilt,
    #[error("dense layers have not been built yet")]
    NotBuilt,
    #[error("expected input of shape [batch, {expected}], got {found:?}")]
    ShapeMismatch {
        expected: InputSpace,
        found: [usize; 4],
    },
    #[error("dense layers were built for {expected} features, extractor produced {found}")]
    FeatureSizeMismatch { expected: usize, found: usize },
}
