use candle_core::{Shape, Tensor, D};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::architectures::{ClassScores, ClassScoresError, ImageClassifier};
use crate::error::BoxedError;
use crate::explain::{Explanation, ExplanationMethod, SaliencyMap};

/// Grad-CAM errors.
#[derive(Debug, Snafu)]
pub enum GradCamError {
    #[snafu(display(
        "Activations of layer {layer} must have shape (1, height, width, channels), got: {shape:?}"
    ))]
    ActivationShape { layer: String, shape: Shape },

    #[snafu(display("Cannot compute class activation map of layer: {layer}"))]
    Compute {
        source: candle_core::Error,
        layer: String,
    },

    #[snafu(display("Cannot run classifier with activations of layer: {layer}"))]
    Forward { source: BoxedError, layer: String },

    #[snafu(display("Gradient of class score is not defined for layer: {layer}"))]
    MissingGradient { layer: String },

    #[snafu(display("Cannot determine class score"))]
    Scores { source: ClassScoresError },
}

/// Gradient-weighted class activation mapping (Grad-CAM).
///
/// The activations of a spatial layer are weighted by the mean gradient of
/// the predicted class score per channel. Channels are summed and negative
/// values are clipped.
///
/// See [Selvaraju et al., 2017](https://arxiv.org/abs/1610.02391).
#[derive(Clone, Copy, Debug, Default)]
pub struct GradCam;

impl GradCam {
    /// Explain the prediction of a classifier.
    ///
    /// * `classifier` - The classifier.
    /// * `input` - Input image.
    ///   *Shape:* `(1, height, width, channels)`
    /// * `layer` - Name of the layer to explain. The layer must have
    ///   outputs of shape `(1, layer_height, layer_width, layer_channels)`.
    ///
    /// Returns the explanation with a map of shape
    /// `(layer_height, layer_width)`.
    pub fn explain(
        &self,
        classifier: &impl ImageClassifier,
        input: &Tensor,
        layer: &str,
    ) -> Result<Explanation, GradCamError> {
        let output = classifier
            .forward_with_activation(input, layer, false)
            .context(ForwardSnafu { layer })?;
        let activation = output.activation().as_tensor();
        ensure!(
            matches!(activation.dims(), [1, _, _, _]),
            ActivationShapeSnafu {
                layer,
                shape: activation.shape().clone(),
            }
        );

        let scores = ClassScores::new(output.scores().clone()).context(ScoresSnafu)?;
        let class_index = scores.predicted_class().context(ScoresSnafu)?;
        debug!("Computing Grad-CAM of class {class_index} on layer {layer}");

        let grads = scores
            .target_score(class_index)
            .context(ScoresSnafu)?
            .sum_all()
            .and_then(|score| score.backward())
            .context(ComputeSnafu { layer })?;
        let grad = grads
            .get(activation)
            .context(MissingGradientSnafu { layer })?;

        let cam = Self::class_activation_map(activation, grad).context(ComputeSnafu { layer })?;
        let map = SaliencyMap::normalize_tensor(&cam).context(ComputeSnafu { layer })?;

        Ok(Explanation::new(
            map,
            class_index,
            ExplanationMethod::GradCam,
            Some(layer.to_string()),
        ))
    }

    /// Weighted sum of activation channels, negative values clipped.
    ///
    /// * `activation` - Layer activations.
    ///   *Shape:* `(1, height, width, channels)`
    /// * `grad` - Gradient of the class score with respect to `activation`.
    ///   *Shape:* `(1, height, width, channels)`
    ///
    /// *Shape:* `(height, width)`
    fn class_activation_map(activation: &Tensor, grad: &Tensor) -> Result<Tensor, candle_core::Error> {
        // One weight per channel.
        let weights = grad.mean((0, 1, 2))?;
        activation
            .get(0)?
            .broadcast_mul(&weights)?
            .sum(D::Minus1)?
            .relu()
    }
}
