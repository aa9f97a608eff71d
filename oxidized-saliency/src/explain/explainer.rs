use candle_core::Tensor;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::architectures::ImageClassifier;
use crate::explain::integrated_gradients::check_input_shape;
use crate::explain::{
    last_spatial_layer, Explanation, GradCam, IntegratedGradients, IntegratedGradientsError,
};

/// Explanation errors.
#[derive(Debug, Snafu)]
pub enum ExplainError {
    #[snafu(display("Cannot explain prediction with integrated gradients"))]
    IntegratedGradients { source: IntegratedGradientsError },
}

/// Explains predictions, preferring Grad-CAM.
///
/// Grad-CAM is applied to the last spatial layer of the classifier. When
/// the classifier has no spatial layer or Grad-CAM fails, integrated
/// gradients are used instead. An error is only returned when integrated
/// gradients fail as well.
#[derive(Clone, Debug, Default)]
pub struct Explainer {
    integrated_gradients: IntegratedGradients,
}

impl Explainer {
    /// Integrated gradients used when Grad-CAM is not available.
    ///
    /// Default: `IntegratedGradients::default()`
    pub fn integrated_gradients(mut self, integrated_gradients: IntegratedGradients) -> Self {
        self.integrated_gradients = integrated_gradients;
        self
    }

    /// Explain the prediction of a classifier.
    ///
    /// * `classifier` - The classifier.
    /// * `input` - Input image.
    ///   *Shape:* `(1, height, width, channels)`
    pub fn explain(
        &self,
        classifier: &impl ImageClassifier,
        input: &Tensor,
    ) -> Result<Explanation, ExplainError> {
        // Both methods take the same input, reject it before trying Grad-CAM.
        check_input_shape(input).context(IntegratedGradientsSnafu)?;

        match last_spatial_layer(classifier) {
            Some(layer) => {
                debug!("Explaining with Grad-CAM on layer {}", layer.name());
                match GradCam.explain(classifier, input, layer.name()) {
                    Ok(explanation) => return Ok(explanation),
                    Err(err) => warn!(
                        "Grad-CAM on layer {} failed, falling back to integrated gradients: {err}",
                        layer.name()
                    ),
                }
            }
            None => info!("Classifier has no spatial layer, explaining with integrated gradients"),
        }

        self.integrated_gradients
            .explain(classifier, input)
            .context(IntegratedGradientsSnafu)
    }
}

/// Explain the prediction of a classifier with the default explainer.
///
/// * `classifier` - The classifier.
/// * `input` - Input image.
///   *Shape:* `(1, height, width, channels)`
pub fn explain_image(
    classifier: &impl ImageClassifier,
    input: &Tensor,
) -> Result<Explanation, ExplainError> {
    Explainer::default().explain(classifier, input)
}
