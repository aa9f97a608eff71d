use candle_core::{Shape, Tensor, Var};

use crate::error::BoxedError;
use crate::layers::build_layer::LayerKind;

/// Summary of a classifier layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerSummary {
    name: String,
    kind: LayerKind,
    output_shape: Option<Shape>,
}

impl LayerSummary {
    /// Create a layer summary.
    ///
    /// * `name` - Unique name of the layer within the classifier.
    /// * `kind` - Layer category.
    /// * `output_shape` - Output shape including the batch axis, `None` if
    ///   the shape could not be determined.
    pub fn new(name: impl Into<String>, kind: LayerKind, output_shape: Option<Shape>) -> Self {
        Self {
            name: name.into(),
            kind,
            output_shape,
        }
    }

    /// Layer category.
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output shape including the batch axis.
    pub fn output_shape(&self) -> Option<&Shape> {
        self.output_shape.as_ref()
    }
}

/// Output of a forward pass that exposes the activations of a layer.
pub struct ActivationOutput {
    activation: Var,
    scores: Tensor,
}

impl ActivationOutput {
    /// Create an activation output.
    ///
    /// The class scores must be computed from `activation`, so that the
    /// gradient of the scores with respect to the activation is defined.
    pub fn new(activation: Var, scores: Tensor) -> Self {
        Self { activation, scores }
    }

    /// Layer activations.
    pub fn activation(&self) -> &Var {
        &self.activation
    }

    /// Class scores.
    ///
    /// *Shape:* `(batch_size, n_outputs)`
    pub fn scores(&self) -> &Tensor {
        &self.scores
    }
}

/// Trait for differentiable image classifiers.
///
/// Inputs are channels-last images: `(batch_size, height, width,
/// channels)`. Outputs are class scores of shape `(batch_size, n_outputs)`,
/// where a single output is a sigmoid probability of class `1` and multiple
/// outputs are softmax probabilities.
pub trait ImageClassifier {
    /// Layers in declaration order.
    fn layers(&self) -> &[LayerSummary];

    /// Compute class scores.
    ///
    /// * `input` - Input images.
    ///   *Shape:* `(batch_size, height, width, channels)`
    /// * `train` - Whether to run the classifier in training mode.
    ///
    /// Returns the class scores.
    /// *Shape:* `(batch_size, n_outputs)`
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, BoxedError>;

    /// Compute class scores, exposing the activations of a layer.
    ///
    /// The activations are returned as a variable, the class scores are
    /// computed from that variable. Gradients of the scores with respect to
    /// the activations can be computed with `Tensor::backward`.
    ///
    /// * `input` - Input images.
    ///   *Shape:* `(batch_size, height, width, channels)`
    /// * `layer` - Name of the layer to expose.
    /// * `train` - Whether to run the classifier in training mode.
    fn forward_with_activation(
        &self,
        input: &Tensor,
        layer: &str,
        train: bool,
    ) -> Result<ActivationOutput, BoxedError>;
}
