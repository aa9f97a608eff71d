use candle_core::{Module, ModuleT, Shape, Tensor};
use candle_nn::VarBuilder;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};

use crate::error::BoxedError;
use crate::layers::activation::Activation;
use crate::layers::build_layer::{
    BuildLayer, ChannelsSnafu, LayerKind, LayerShapeError, RankSnafu, WindowSnafu, ZeroStrideSnafu,
    ZeroWindowSnafu,
};

/// Padding of spatial axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// No padding, windows that do not fit are dropped.
    #[default]
    Valid,

    /// Zero-pad so that the output size is `ceil(input / stride)`.
    ///
    /// When the total padding is odd, the extra element goes after the
    /// input.
    Same,
}

impl Padding {
    /// Output size of a spatial axis.
    pub fn output_size(
        self,
        input: usize,
        window: usize,
        stride: usize,
    ) -> Result<usize, LayerShapeError> {
        ensure!(stride > 0, ZeroStrideSnafu);
        ensure!(window > 0, ZeroWindowSnafu);
        match self {
            Padding::Valid => {
                ensure!(input >= window, WindowSnafu { input, window });
                Ok((input - window) / stride + 1)
            }
            Padding::Same => Ok(input.div_ceil(stride)),
        }
    }

    /// Padding before and after a spatial axis.
    pub fn pads(self, input: usize, window: usize, stride: usize) -> (usize, usize) {
        match self {
            Padding::Valid => (0, 0),
            Padding::Same => {
                let output = input.div_ceil(stride.max(1));
                let total = ((output.saturating_sub(1)) * stride + window).saturating_sub(input);
                (total / 2, total - total / 2)
            }
        }
    }
}

/// Convolution variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvolutionKind {
    /// Dense convolution over all input channels.
    ///
    /// Parameters: `kernel` with shape `(filters, in_channels, k, k)`.
    Standard,

    /// Per-channel convolution.
    ///
    /// Parameters: `depthwise_kernel` with shape
    /// `(in_channels * depth_multiplier, 1, k, k)`.
    Depthwise,

    /// Depthwise convolution followed by a pointwise convolution.
    ///
    /// Parameters: `depthwise_kernel` with shape
    /// `(in_channels * depth_multiplier, 1, k, k)` and `pointwise_kernel`
    /// with shape `(filters, in_channels * depth_multiplier, 1, 1)`.
    Separable,
}

/// 2D convolution configuration.
///
/// Inputs and outputs are channels-last: `(batch_size, height, width,
/// channels)`. Kernels are stored channels-first (`(out, in, k, k)`).
#[derive(Clone, Debug)]
pub struct Conv2dConfig {
    activation: Activation,
    depth_multiplier: usize,
    filters: usize,
    in_channels: usize,
    kernel_size: usize,
    kind: ConvolutionKind,
    padding: Padding,
    stride: usize,
    use_bias: bool,
}

impl Conv2dConfig {
    /// Activation applied to the convolution output.
    ///
    /// Default: `Activation::Linear`
    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Number of output channels per input channel of depthwise and
    /// separable convolutions.
    ///
    /// Default: `1`
    pub fn depth_multiplier(mut self, depth_multiplier: usize) -> Self {
        self.depth_multiplier = depth_multiplier;
        self
    }

    /// Number of output channels. Not used by depthwise convolutions.
    ///
    /// Default: `1`
    pub fn filters(mut self, filters: usize) -> Self {
        self.filters = filters;
        self
    }

    /// Number of input channels.
    ///
    /// Default: `3`
    pub fn in_channels(mut self, in_channels: usize) -> Self {
        self.in_channels = in_channels;
        self
    }

    /// Height and width of the (square) kernel.
    ///
    /// Default: `3`
    pub fn kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Convolution variant.
    ///
    /// Default: `ConvolutionKind::Standard`
    pub fn kind(mut self, kind: ConvolutionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Padding of the spatial axes.
    ///
    /// Default: `Padding::Valid`
    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Stride along both spatial axes.
    ///
    /// Default: `1`
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Whether to add a bias to the convolution output.
    ///
    /// Default: `true`
    pub fn use_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    fn out_channels(&self) -> usize {
        match self.kind {
            ConvolutionKind::Depthwise => self.in_channels * self.depth_multiplier,
            ConvolutionKind::Standard | ConvolutionKind::Separable => self.filters,
        }
    }
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            activation: Activation::Linear,
            depth_multiplier: 1,
            filters: 1,
            in_channels: 3,
            kernel_size: 3,
            kind: ConvolutionKind::Standard,
            padding: Padding::Valid,
            stride: 1,
            use_bias: true,
        }
    }
}

impl BuildLayer for Conv2dConfig {
    fn kind(&self) -> LayerKind {
        match self.kind {
            ConvolutionKind::Standard => LayerKind::Conv2d,
            ConvolutionKind::Depthwise => LayerKind::DepthwiseConv2d,
            ConvolutionKind::Separable => LayerKind::SeparableConv2d,
        }
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        let (batch_size, height, width, channels) = match *input_shape.dims() {
            [batch_size, height, width, channels] => (batch_size, height, width, channels),
            _ => {
                return RankSnafu {
                    rank: 4usize,
                    shape: input_shape.clone(),
                }
                .fail()
                .boxed()
            }
        };
        ensure!(
            channels == self.in_channels,
            ChannelsSnafu {
                expected: self.in_channels,
                got: channels,
            }
        );

        let height = self
            .padding
            .output_size(height, self.kernel_size, self.stride)?;
        let width = self
            .padding
            .output_size(width, self.kernel_size, self.stride)?;

        Ok(Shape::from((batch_size, height, width, self.out_channels())))
    }

    fn build(&self, vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        // Shape inference failures are not fatal, so check again here.
        ensure!(self.stride > 0, ZeroStrideSnafu);
        ensure!(self.kernel_size > 0, ZeroWindowSnafu);

        let k = self.kernel_size;
        let depthwise_channels = self.in_channels * self.depth_multiplier;
        let weights = match self.kind {
            ConvolutionKind::Standard => ConvolutionWeights::Standard {
                kernel: vb.get((self.filters, self.in_channels, k, k), "kernel")?,
            },
            ConvolutionKind::Depthwise => ConvolutionWeights::Depthwise {
                kernel: vb.get((depthwise_channels, 1, k, k), "depthwise_kernel")?,
            },
            ConvolutionKind::Separable => ConvolutionWeights::Separable {
                depthwise: vb.get((depthwise_channels, 1, k, k), "depthwise_kernel")?,
                pointwise: vb.get(
                    (self.filters, depthwise_channels, 1, 1),
                    "pointwise_kernel",
                )?,
            },
        };

        let bias = if self.use_bias {
            Some(vb.get(self.out_channels(), "bias")?)
        } else {
            None
        };

        Ok(Box::new(Conv2d {
            activation: self.activation,
            bias,
            groups: self.in_channels,
            kernel_size: self.kernel_size,
            padding: self.padding,
            stride: self.stride,
            weights,
        }))
    }
}

enum ConvolutionWeights {
    Standard { kernel: Tensor },
    Depthwise { kernel: Tensor },
    Separable { depthwise: Tensor, pointwise: Tensor },
}

/// 2D convolution over channels-last inputs.
pub struct Conv2d {
    activation: Activation,
    bias: Option<Tensor>,
    groups: usize,
    kernel_size: usize,
    padding: Padding,
    stride: usize,
    weights: ConvolutionWeights,
}

impl Module for Conv2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        let (_batch_size, height, width, _channels) = xs.dims4()?;
        let (pad_top, pad_bottom) = self.padding.pads(height, self.kernel_size, self.stride);
        let (pad_left, pad_right) = self.padding.pads(width, self.kernel_size, self.stride);

        // Candle convolutions are channels-first.
        let xs = xs
            .permute((0, 3, 1, 2))?
            .pad_with_zeros(2, pad_top, pad_bottom)?
            .pad_with_zeros(3, pad_left, pad_right)?
            .contiguous()?;

        let xs = match &self.weights {
            ConvolutionWeights::Standard { kernel } => xs.conv2d(kernel, 0, self.stride, 1, 1)?,
            ConvolutionWeights::Depthwise { kernel } => {
                xs.conv2d(kernel, 0, self.stride, 1, self.groups)?
            }
            ConvolutionWeights::Separable {
                depthwise,
                pointwise,
            } => xs
                .conv2d(depthwise, 0, self.stride, 1, self.groups)?
                .conv2d(pointwise, 0, 1, 1, 1)?,
        };

        let xs = match &self.bias {
            Some(bias) => xs.broadcast_add(&bias.reshape((1, (), 1, 1))?)?,
            None => xs,
        };

        self.activation.forward(&xs.permute((0, 2, 3, 1))?.contiguous()?)
    }
}
