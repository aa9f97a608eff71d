use candle_core::{Module, ModuleT, Shape, Tensor};
use candle_nn::VarBuilder;

use crate::error::BoxedError;
use crate::layers::build_layer::{BuildLayer, LayerKind, RankSnafu};

/// Flatten all axes except the batch axis.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flatten;

impl BuildLayer for Flatten {
    fn kind(&self) -> LayerKind {
        LayerKind::Flatten
    }

    fn output_shape(&self, input_shape: &Shape) -> Result<Shape, BoxedError> {
        match input_shape.dims() {
            [batch_size, rest @ ..] => Ok(Shape::from((*batch_size, rest.iter().product::<usize>()))),
            [] => RankSnafu {
                rank: 2usize,
                shape: input_shape.clone(),
            }
            .fail()
            .map_err(Into::into),
        }
    }

    fn build(&self, _vb: VarBuilder) -> Result<Box<dyn ModuleT>, BoxedError> {
        Ok(Box::new(*self))
    }
}

impl Module for Flatten {
    fn forward(&self, xs: &Tensor) -> Result<Tensor, candle_core::Error> {
        xs.flatten_from(1)
    }
}
