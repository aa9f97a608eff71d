use candle_core::{Module, ModuleT, Shape, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::VarBuilder;
use serde::{Deserialize, Serialize};

use crate::error::BoxedError;
use crate::layers::build_layer::{BuildLayer, LayerKind};

/// Activation functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Identity.
    #[default]
    Linear,

    /// Rectified Linear Unit.
    ///
    /// See [Fukushima, 1969](https://ieeexplore.ieee.org/document/4082265).
    Relu,

    /// Logistic sigmoid, used for single-output classification heads.
    Sigmoid,

    /// Softmax over the last axis, used for multi-output classification
    /// heads.
    Softmax,

    /// Hyperbolic tangent.
    Tanh,
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        use Activation::*;
        match self {
            Linear => Ok(xs.clone()),
            Relu => xs.relu(),
            // sigmoid(x) = (tanh(x / 2) + 1) / 2, this form does not
            // overflow for large negative inputs.
            Sigmoid => xs
                .affine(0.5, 0.)
                .and_then(|xs| xs.tanh())
                .and_then(|xs| xs.affine(0.5, 0.5)),
            Softmax => softmax(xs, D::Minus1),
            Tanh => xs.tanh(),
        }
    }
}

impl BuildLayer for Activation {
    fn kind(&self) -> LayerKind {
        LayerKind::Activation
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        Ok(input_shape.clone())
    }

    fn build(&self, _vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        Ok(Box::new(*self))
    }
}
