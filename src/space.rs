use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Channel/height/width descriptor of a single input sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSpace {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl InputSpace {
    pub fn new(channels: usize, height: usize, width: usize) -> Result<Self, ModelError> {
        if channels == 0 {
            return Err(ModelError::InvalidInputSpace("channel count must be positive"));
        }
        if height == 0 || width == 0 {
            return Err(ModelError::InvalidInputSpace("spatial dimensions must be positive"));
        }
        Ok(Self {
            channels,
            height,
            width,
        })
    }

    /// Reads the trailing `(channels, height, width)` of a shape, so a full
    /// `(batch, channels, height, width)` shape is accepted as well.
    pub fn from_shape(shape: &[usize]) -> Result<Self, ModelError> {
        match shape {
            [.., channels, height, width] => Self::new(*channels, *height, *width),
            _ => Err(ModelError::InvalidInputSpace(
                "shape needs at least three dimensions",
            )),
        }
    }

    /// Number of values in one flattened sample.
    pub fn volume(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

impl TryFrom<[usize; 3]> for InputSpace {
    type Error = ModelError;

    fn try_from(value: [usize; 3]) -> Result<Self, Self::Error> {
        let [channels, height, width] = value;
        Self::new(channels, height, width)
    }
}

impl fmt::Display for InputSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shape_uses_trailing_dimensions() {
        let space = InputSpace::from_shape(&[8, 3, 32, 24]).expect("space");
        assert_eq!(space.dims(), [3, 32, 24]);
        assert_eq!(space.volume(), 3 * 32 * 24);
    }

    #[test]
    fn rejects_short_or_empty_shapes() {
        assert!(InputSpace::from_shape(&[32, 32]).is_err());
        assert_eq!(
            InputSpace::new(0, 4, 4),
            Err(ModelError::InvalidInputSpace("channel count must be positive"))
        );
        assert!(InputSpace::try_from([1, 0, 4]).is_err());
    }

    #[test]
    fn displays_as_channel_height_width() {
        let space = InputSpace::new(3, 32, 16).expect("space");
        assert_eq!(space.to_string(), "3x32x16");
    }
}
