use candle_core::{Module, ModuleT, Shape, Tensor};
use candle_nn::VarBuilder;
use snafu::ensure;

use crate::error::BoxedError;
use crate::layers::build_layer::{
    BuildLayer, LayerKind, RankSnafu, ZeroStrideSnafu, ZeroWindowSnafu,
};
use crate::layers::convolution::Padding;

/// Pooling reductions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolingKind {
    Average,
    Max,
}

/// 2D pooling configuration.
///
/// Pooling windows never extend past the input (`valid` padding).
#[derive(Clone, Debug)]
pub struct Pool2dConfig {
    kind: PoolingKind,
    pool_size: usize,
    stride: Option<usize>,
}

impl Pool2dConfig {
    /// Pooling reduction.
    ///
    /// Default: `PoolingKind::Max`
    pub fn kind(mut self, kind: PoolingKind) -> Self {
        self.kind = kind;
        self
    }

    /// Height and width of the pooling window.
    ///
    /// Default: `2`
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Stride along both spatial axes. If `None`, the pool size is used.
    ///
    /// Default: `None`
    pub fn stride(mut self, stride: Option<usize>) -> Self {
        self.stride = stride;
        self
    }

    fn effective_stride(&self) -> usize {
        self.stride.unwrap_or(self.pool_size)
    }
}

impl Default for Pool2dConfig {
    fn default() -> Self {
        Self {
            kind: PoolingKind::Max,
            pool_size: 2,
            stride: None,
        }
    }
}

impl BuildLayer for Pool2dConfig {
    fn kind(&self) -> LayerKind {
        match self.kind {
            PoolingKind::Average => LayerKind::AveragePooling2d,
            PoolingKind::Max => LayerKind::MaxPooling2d,
        }
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        let (batch_size, height, width, channels) = input_shape
            .dims4()
            .map_err(|_| RankSnafu { rank: 4usize, shape: input_shape.clone() }.build())?;
        let stride = self.effective_stride();
        Ok(Shape::from((
            batch_size,
            Padding::Valid.output_size(height, self.pool_size, stride)?,
            Padding::Valid.output_size(width, self.pool_size, stride)?,
            channels,
        )))
    }

    fn build(&self, _vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        ensure!(self.effective_stride() > 0, ZeroStrideSnafu);
        ensure!(self.pool_size > 0, ZeroWindowSnafu);

        Ok(Box::new(Pool2d {
            kind: self.kind,
            pool_size: self.pool_size,
            stride: self.effective_stride(),
        }))
    }
}

/// 2D pooling over channels-last inputs.
pub struct Pool2d {
    kind: PoolingKind,
    pool_size: usize,
    stride: usize,
}

impl Module for Pool2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        let window = (self.pool_size, self.pool_size);
        let stride = (self.stride, self.stride);
        let xs = xs.permute((0, 3, 1, 2))?.contiguous()?;
        let xs = match self.kind {
            PoolingKind::Average => xs.avg_pool2d_with_stride(window, stride)?,
            PoolingKind::Max => xs.max_pool2d_with_stride(window, stride)?,
        };
        xs.permute((0, 2, 3, 1))?.contiguous()
    }
}

/// Global average pooling.
///
/// Averages over the spatial axes, `(batch_size, height, width, channels)`
/// becomes `(batch_size, channels)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalAveragePooling2d;

impl BuildLayer for GlobalAveragePooling2d {
    fn kind(&self) -> LayerKind {
        LayerKind::GlobalAveragePooling2d
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        let (batch_size, _height, _width, channels) = input_shape
            .dims4()
            .map_err(|_| RankSnafu { rank: 4usize, shape: input_shape.clone() }.build())?;
        Ok(Shape::from((batch_size, channels)))
    }

    fn build(&self, _vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        Ok(Box::new(*self))
    }
}

impl Module for GlobalAveragePooling2d {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        xs.mean((1, 2))
    }
}
