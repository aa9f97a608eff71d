use std::collections::HashSet;

use candle_core::{ModuleT, Shape, Tensor, Var};
use candle_nn::VarBuilder;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::architectures::{ActivationOutput, ImageClassifier, LayerSummary};
use crate::error::BoxedError;
use crate::layers::build_layer::BuildLayer;

/// Sequential classifier errors.
#[derive(Debug, Snafu)]
pub enum SequentialClassifierError {
    #[snafu(display("Cannot build layer: {name}"))]
    BuildLayer { source: BoxedError, name: String },

    #[snafu(display("Layer name is used more than once: {name}"))]
    DuplicateLayer { name: String },

    #[snafu(display("Classifier does not have any layers"))]
    NoLayers,

    #[snafu(display("Cannot apply layer: {name}"))]
    Forward {
        source: candle_core::Error,
        name: String,
    },

    #[snafu(display("Classifier does not have a layer named: {name}"))]
    UnknownLayer { name: String },

    #[snafu(display("Cannot expose activations of layer: {name}"))]
    Variable {
        source: candle_core::Error,
        name: String,
    },
}

/// Sequential classifier configuration.
#[derive(Debug)]
pub struct SequentialClassifierConfig {
    input_shape: (usize, usize, usize),
    layers: Vec<(String, Box<dyn BuildLayer>)>,
}

impl SequentialClassifierConfig {
    /// Input image shape as `(height, width, channels)`.
    ///
    /// Default: `(224, 224, 3)`
    pub fn input_shape(mut self, input_shape: (usize, usize, usize)) -> Self {
        self.input_shape = input_shape;
        self
    }

    /// Append a layer.
    ///
    /// The layer's parameters are read with `name` as the prefix.
    pub fn layer(mut self, name: impl Into<String>, layer: Box<dyn BuildLayer>) -> Self {
        self.layers.push((name.into(), layer));
        self
    }

    /// Layers in application order.
    ///
    /// Default: `[]`
    pub fn layers(mut self, layers: Vec<(String, Box<dyn BuildLayer>)>) -> Self {
        self.layers = layers;
        self
    }

    /// Build the classifier.
    pub fn build(&self, vb: VarBuilder) -> Result<SequentialClassifier, SequentialClassifierError> {
        ensure!(!self.layers.is_empty(), NoLayersSnafu);

        let mut names = HashSet::new();
        for (name, _) in &self.layers {
            ensure!(names.insert(name.as_str()), DuplicateLayerSnafu { name });
        }

        let (height, width, channels) = self.input_shape;
        let mut shape = Some(Shape::from((1, height, width, channels)));
        let mut layers = Vec::with_capacity(self.layers.len());
        let mut summaries = Vec::with_capacity(self.layers.len());
        for (name, layer) in &self.layers {
            // Shape inference failures are not fatal, the shapes of this
            // layer and the layers after it are unknown.
            shape = shape.and_then(|input_shape| match layer.output_shape(&input_shape) {
                Ok(output_shape) => Some(output_shape),
                Err(err) => {
                    debug!("Cannot infer output shape of layer {name}: {err}");
                    None
                }
            });

            layers.push(
                layer
                    .build(vb.push_prefix(name))
                    .context(BuildLayerSnafu { name })?,
            );
            summaries.push(LayerSummary::new(name, layer.kind(), shape.clone()));
        }

        Ok(SequentialClassifier {
            input_shape: self.input_shape,
            layers,
            summaries,
        })
    }
}

impl Default for SequentialClassifierConfig {
    fn default() -> Self {
        Self {
            input_shape: (224, 224, 3),
            layers: Vec::new(),
        }
    }
}

/// Classifier that applies a sequence of layers.
pub struct SequentialClassifier {
    input_shape: (usize, usize, usize),
    layers: Vec<Box<dyn ModuleT>>,
    summaries: Vec<LayerSummary>,
}

impl SequentialClassifier {
    /// Input image shape as `(height, width, channels)`.
    pub fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    fn forward_layers(
        &self,
        input: &Tensor,
        layers: std::ops::Range<usize>,
        train: bool,
    ) -> Result<Tensor, SequentialClassifierError> {
        let mut xs = input.clone();
        for idx in layers {
            xs = self.layers[idx]
                .forward_t(&xs, train)
                .context(ForwardSnafu {
                    name: self.summaries[idx].name(),
                })?;
        }
        Ok(xs)
    }
}

impl ImageClassifier for SequentialClassifier {
    fn layers(&self) -> &[LayerSummary] {
        &self.summaries
    }

    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, BoxedError> {
        Ok(self.forward_layers(input, 0..self.layers.len(), train)?)
    }

    fn forward_with_activation(
        &self,
        input: &Tensor,
        layer: &str,
        train: bool,
    ) -> Result<ActivationOutput, BoxedError> {
        let idx = self
            .summaries
            .iter()
            .position(|summary| summary.name() == layer)
            .context(UnknownLayerSnafu { name: layer })?;

        // The activation becomes a leaf, so that gradients flow from the
        // scores back to the activation and no further.
        let activation = self.forward_layers(input, 0..idx + 1, train)?;
        let activation = Var::from_tensor(&activation).context(VariableSnafu { name: layer })?;
        let scores = self.forward_layers(activation.as_tensor(), idx + 1..self.layers.len(), train)?;

        Ok(ActivationOutput::new(activation, scores))
    }
}
