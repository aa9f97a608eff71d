use std::fmt::Debug;

use candle_core::{ModuleT, Shape};
use candle_nn::VarBuilder;
use snafu::Snafu;

use crate::error::BoxedError;

/// Layer categories.
///
/// The category is used to introspect a classifier, e.g. to find the last
/// convolution-style layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Activation,
    AveragePooling2d,
    Conv2d,
    Dense,
    DepthwiseConv2d,
    Dropout,
    Flatten,
    GlobalAveragePooling2d,
    MaxPooling2d,
    SeparableConv2d,
}

impl LayerKind {
    /// Whether the layer is a standard, separable, or depthwise convolution.
    pub fn is_convolution(self) -> bool {
        matches!(
            self,
            LayerKind::Conv2d | LayerKind::SeparableConv2d | LayerKind::DepthwiseConv2d
        )
    }
}

/// Layer shape inference errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LayerShapeError {
    #[snafu(display("Expected {expected} input channels, got: {got}"))]
    Channels { expected: usize, got: usize },

    #[snafu(display("Expected {expected} input features, got: {got}"))]
    Features { expected: usize, got: usize },

    #[snafu(display("Input of size {input} is smaller than window of size {window}"))]
    Window { input: usize, window: usize },

    #[snafu(display("Expected input with rank {rank}, got shape: {shape:?}"))]
    Rank { rank: usize, shape: Shape },

    #[snafu(display("Stride must be larger than zero"))]
    ZeroStride,

    #[snafu(display("Window size must be larger than zero"))]
    ZeroWindow,
}

/// Traits for types that can build classifier layers.
pub trait BuildLayer: Debug {
    /// Layer category.
    fn kind(&self) -> LayerKind;

    /// Output shape of the layer.
    ///
    /// * `input_shape` - Shape of the layer input, including the batch axis.
    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError>;

    /// Build the layer.
    fn build(&self, vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError>;
}
