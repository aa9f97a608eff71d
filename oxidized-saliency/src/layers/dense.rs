use candle_core::{Module, ModuleT, Shape, Tensor};
use candle_nn::{linear, linear_no_bias, Linear, VarBuilder};
use snafu::ensure;

use crate::error::BoxedError;
use crate::layers::activation::Activation;
use crate::layers::build_layer::{BuildLayer, FeaturesSnafu, LayerKind, RankSnafu};

/// Densely-connected layer configuration.
///
/// Parameters: `weight` with shape `(units, in_features)` and optionally
/// `bias` with shape `(units)`.
#[derive(Clone, Debug)]
pub struct DenseConfig {
    activation: Activation,
    in_features: usize,
    units: usize,
    use_bias: bool,
}

impl DenseConfig {
    /// Activation applied to the layer output.
    ///
    /// Default: `Activation::Linear`
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Number of input features.
    ///
    /// Default: `1`
    pub fn in_features(mut self, in_features: usize) -> Self {
        self.in_features = in_features;
        self
    }

    /// Number of output units.
    ///
    /// Default: `1`
    pub fn units(mut self, units: usize) -> Self {
        self.units = units;
        self
    }

    /// Whether to add a bias.
    ///
    /// Default: `true`
    pub fn use_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self {
            activation: Activation::Linear,
            in_features: 1,
            units: 1,
            use_bias: true,
        }
    }
}

impl BuildLayer for DenseConfig {
    fn kind(&self) -> LayerKind {
        LayerKind::Dense
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        let (batch_size, features) = input_shape
            .dims2()
            .map_err(|_| RankSnafu { rank: 2usize, shape: input_shape.clone() }.build())?;
        ensure!(
            features == self.in_features,
            FeaturesSnafu {
                expected: self.in_features,
                got: features
            }
        );
        Ok(Shape::from((batch_size, self.units)))
    }

    fn build(&self, vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        let linear = if self.use_bias {
            linear(self.in_features, self.units, vb)?
        } else {
            linear_no_bias(self.in_features, self.units, vb)?
        };

        Ok(Box::new(Dense {
            activation: self.activation,
            linear,
        }))
    }
}

/// Densely-connected layer.
pub struct Dense {
    activation: Activation,
    linear: Linear,
}

impl Module for Dense {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        self.activation.forward(&self.linear.forward(xs)?)
    }
}
