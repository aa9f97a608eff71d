use crate::architectures::{ImageClassifier, LayerSummary};

/// Find the last layer with a spatial output.
///
/// Layers are scanned from the output backwards. A layer qualifies when it
/// is a convolution (standard, separable, or depthwise) or when its output
/// has four axes `(batch_size, height, width, channels)`. Layers with an
/// unknown output shape only qualify through their kind.
///
/// Returns `None` when no layer qualifies, e.g. for fully-connected
/// classifiers.
pub fn last_spatial_layer(classifier: &impl ImageClassifier) -> Option<&LayerSummary> {
    classifier.layers().iter().rev().find(|layer| {
        layer.kind().is_convolution()
            || layer
                .output_shape()
                .is_some_and(|shape| shape.rank() == 4)
    })
}
