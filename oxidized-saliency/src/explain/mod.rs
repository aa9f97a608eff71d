//! Explanations of classifier predictions.

mod discovery;
pub use discovery::last_spatial_layer;

mod explainer;
pub use explainer::{explain_image, ExplainError, Explainer};

mod explanation;
pub use explanation::{Explanation, ExplanationMethod};

mod gradcam;
pub use gradcam::{GradCam, GradCamError};

mod integrated_gradients;
pub use integrated_gradients::{IntegratedGradients, IntegratedGradientsError};

mod saliency;
pub use saliency::{SaliencyMap, SaliencyMapError};
