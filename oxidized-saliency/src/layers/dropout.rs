use candle_core::{ModuleT, Shape};
use candle_nn::{Dropout, VarBuilder};

use crate::error::BoxedError;
use crate::layers::build_layer::{BuildLayer, LayerKind};

/// Dropout configuration.
///
/// Dropout is only active when the classifier is run in training mode,
/// explanations always run the classifier in inference mode.
#[derive(Clone, Debug)]
pub struct DropoutConfig {
    p: f32,
}

impl DropoutConfig {
    /// Dropout probability.
    ///
    /// Default: `0.0`
    pub fn p(mut self, p: f32) -> Self {
        self.p = p;
        self
    }
}

impl Default for DropoutConfig {
    fn default() -> Self {
        Self { p: 0.0 }
    }
}

impl BuildLayer for DropoutConfig {
    fn kind(&self) -> LayerKind {
        LayerKind::Dropout
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        Ok(input_shape.clone())
    }

    fn build(&self, _vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        Ok(Box::new(Dropout::new(self.p)))
    }
}
