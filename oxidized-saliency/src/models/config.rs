use candle_core::Shape;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::error::BoxedError;
use crate::layers::activation::Activation;
use crate::layers::build_layer::BuildLayer;
use crate::layers::convolution::{Conv2dConfig, ConvolutionKind, Padding};
use crate::layers::dense::DenseConfig;
use crate::layers::dropout::DropoutConfig;
use crate::layers::flatten::Flatten;
use crate::layers::pooling::{GlobalAveragePooling2d, Pool2dConfig, PoolingKind};
use crate::models::SequentialClassifierConfig;

/// Serialized classifier configuration conversion errors.
#[derive(Debug, Snafu)]
pub enum SerializedClassifierConfigError {
    #[snafu(display("Cannot infer the input shape of layer: {name}"))]
    InputShape { source: BoxedError, name: String },

    #[snafu(display("Layer {name} expects input with rank {rank}, got shape: {shape:?}"))]
    InputRank {
        name: String,
        rank: usize,
        shape: Shape,
    },
}

/// Serialized classifier configuration (`config.json`).
///
/// Layers are listed in application order. Input channels and features are
/// not stored, they are inferred from the input shape when the configuration
/// is converted. Parameters are always loaded as `f32`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SerializedClassifierConfig {
    /// Input shape as `[height, width, channels]`.
    input_shape: [usize; 3],

    layers: Vec<SerializedLayer>,
}

/// Serialized layer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SerializedLayer {
    name: String,

    #[serde(flatten)]
    config: SerializedLayerConfig,
}

fn default_activation() -> Activation {
    Activation::Linear
}

fn default_one() -> usize {
    1
}

fn default_pool_size() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// Serialized layer configurations, tagged by `type`.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerializedLayerConfig {
    Activation {
        activation: Activation,
    },
    AveragePooling2d {
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        #[serde(default)]
        strides: Option<usize>,
    },
    Conv2d {
        #[serde(default = "default_activation")]
        activation: Activation,
        filters: usize,
        kernel_size: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default = "default_one")]
        strides: usize,
        #[serde(default = "default_true")]
        use_bias: bool,
    },
    Dense {
        #[serde(default = "default_activation")]
        activation: Activation,
        units: usize,
        #[serde(default = "default_true")]
        use_bias: bool,
    },
    DepthwiseConv2d {
        #[serde(default = "default_activation")]
        activation: Activation,
        #[serde(default = "default_one")]
        depth_multiplier: usize,
        kernel_size: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default = "default_one")]
        strides: usize,
        #[serde(default = "default_true")]
        use_bias: bool,
    },
    Dropout {
        rate: f32,
    },
    Flatten,
    GlobalAveragePooling2d,
    MaxPooling2d {
        #[serde(default = "default_pool_size")]
        pool_size: usize,
        #[serde(default)]
        strides: Option<usize>,
    },
    SeparableConv2d {
        #[serde(default = "default_activation")]
        activation: Activation,
        #[serde(default = "default_one")]
        depth_multiplier: usize,
        filters: usize,
        kernel_size: usize,
        #[serde(default)]
        padding: Padding,
        #[serde(default = "default_one")]
        strides: usize,
        #[serde(default = "default_true")]
        use_bias: bool,
    },
}

impl SerializedLayerConfig {
    /// Convert to a layer builder.
    ///
    /// * `name` - Layer name, used in errors.
    /// * `input_shape` - Shape of the layer input.
    fn to_build_layer(
        &self,
        name: &str,
        input_shape: &Shape,
    ) -> Result<Box<dyn BuildLayer>, SerializedClassifierConfigError> {
        let rank_error = |rank: usize| InputRankSnafu {
            name,
            rank,
            shape: input_shape.clone(),
        };

        let layer: Box<dyn BuildLayer> = match *self {
            Self::Activation { activation } => Box::new(activation),
            Self::AveragePooling2d { pool_size, strides } => Box::new(
                Pool2dConfig::default()
                    .kind(PoolingKind::Average)
                    .pool_size(pool_size)
                    .stride(strides),
            ),
            Self::Conv2d {
                activation,
                filters,
                kernel_size,
                padding,
                strides,
                use_bias,
            } => {
                let (_, _, _, in_channels) = input_shape.dims4().ok().context(rank_error(4))?;
                Box::new(
                    Conv2dConfig::default()
                        .activation(activation)
                        .filters(filters)
                        .in_channels(in_channels)
                        .kernel_size(kernel_size)
                        .padding(padding)
                        .stride(strides)
                        .use_bias(use_bias),
                )
            }
            Self::Dense {
                activation,
                units,
                use_bias,
            } => {
                let (_, in_features) = input_shape.dims2().ok().context(rank_error(2))?;
                Box::new(
                    DenseConfig::default()
                        .activation(activation)
                        .in_features(in_features)
                        .units(units)
                        .use_bias(use_bias),
                )
            }
            Self::DepthwiseConv2d {
                activation,
                depth_multiplier,
                kernel_size,
                padding,
                strides,
                use_bias,
            } => {
                let (_, _, _, in_channels) = input_shape.dims4().ok().context(rank_error(4))?;
                Box::new(
                    Conv2dConfig::default()
                        .activation(activation)
                        .depth_multiplier(depth_multiplier)
                        .in_channels(in_channels)
                        .kernel_size(kernel_size)
                        .kind(ConvolutionKind::Depthwise)
                        .padding(padding)
                        .stride(strides)
                        .use_bias(use_bias),
                )
            }
            Self::Dropout { rate } => Box::new(DropoutConfig::default().p(rate)),
            Self::Flatten => Box::new(Flatten),
            Self::GlobalAveragePooling2d => Box::new(GlobalAveragePooling2d),
            Self::MaxPooling2d { pool_size, strides } => Box::new(
                Pool2dConfig::default()
                    .kind(PoolingKind::Max)
                    .pool_size(pool_size)
                    .stride(strides),
            ),
            Self::SeparableConv2d {
                activation,
                depth_multiplier,
                filters,
                kernel_size,
                padding,
                strides,
                use_bias,
            } => {
                let (_, _, _, in_channels) = input_shape.dims4().ok().context(rank_error(4))?;
                Box::new(
                    Conv2dConfig::default()
                        .activation(activation)
                        .depth_multiplier(depth_multiplier)
                        .filters(filters)
                        .in_channels(in_channels)
                        .kernel_size(kernel_size)
                        .kind(ConvolutionKind::Separable)
                        .padding(padding)
                        .stride(strides)
                        .use_bias(use_bias),
                )
            }
        };

        Ok(layer)
    }
}

impl TryFrom<SerializedClassifierConfig> for SequentialClassifierConfig {
    type Error = BoxedError;

    fn try_from(config: SerializedClassifierConfig) -> Result<Self, Self::Error> {
        let [height, width, channels] = config.input_shape;
        let mut shape = Shape::from((1, height, width, channels));
        let mut layers = Vec::with_capacity(config.layers.len());
        for SerializedLayer { name, config } in config.layers {
            let layer = config.to_build_layer(&name, &shape)?;
            shape = layer
                .output_shape(&shape)
                .context(InputShapeSnafu { name: name.clone() })?;
            layers.push((name, layer));
        }

        Ok(SequentialClassifierConfig::default()
            .input_shape((height, width, channels))
            .layers(layers))
    }
}
