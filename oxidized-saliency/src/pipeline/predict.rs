use std::path::{Path, PathBuf};

use candle_core::Device;
use image::RgbImage;
use snafu::{ResultExt, Snafu};
use tracing::{info, warn};

use crate::architectures::{ClassScores, ClassScoresError, ImageClassifier};
use crate::error::BoxedError;
use crate::explain::{Explainer, Explanation};
use crate::models::{LoadClassifier, LoadClassifierError, SequentialClassifier};
use crate::overlay::OverlayConfig;
use crate::pipeline::{ClassLabels, ImagePreprocessor, PreprocessError};
use crate::repository::local::{LocalRepo, LocalRepoError};
use crate::repository::repo::Repo;

/// Prediction errors.
#[derive(Debug, Snafu)]
pub enum PredictError {
    #[snafu(display("Cannot run classifier"))]
    Classify { source: BoxedError },

    #[snafu(display("Cannot load classifier"))]
    LoadClassifier { source: LoadClassifierError },

    #[snafu(display("Local repository error"))]
    LocalRepo { source: LocalRepoError },

    #[snafu(display("Cannot open image: {path:?}"))]
    OpenImage {
        source: image::ImageError,
        path: PathBuf,
    },

    #[snafu(display("Cannot preprocess image"))]
    Preprocess { source: PreprocessError },

    #[snafu(display("Cannot interpret class scores"))]
    Scores { source: ClassScoresError },
}

/// Prediction for an image, with an optional explanation.
#[derive(Clone, Debug)]
pub struct PredictionOutput {
    class_index: usize,
    confidence: f32,
    explanation: Option<Explanation>,
    label: String,
    overlay: Option<RgbImage>,
}

impl PredictionOutput {
    /// Predicted class index.
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Confidence in percent, rounded to two decimals.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Explanation of the prediction, `None` if it could not be computed.
    pub fn explanation(&self) -> Option<&Explanation> {
        self.explanation.as_ref()
    }

    /// Label of the predicted class.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Explanation blended over the image, `None` if it could not be
    /// computed.
    pub fn overlay(&self) -> Option<&RgbImage> {
        self.overlay.as_ref()
    }
}

/// Classifies images and explains the predictions.
///
/// Explanations are best-effort: when no explanation can be computed, a
/// warning is logged and the prediction is returned without one.
pub struct PredictionPipeline<C> {
    classifier: C,
    device: Device,
    explainer: Explainer,
    labels: ClassLabels,
    overlay: OverlayConfig,
    preprocessor: ImagePreprocessor,
}

impl<C> PredictionPipeline<C>
where
    C: ImageClassifier,
{
    /// Create a pipeline.
    ///
    /// * `classifier` - The classifier.
    /// * `device` - Device that the classifier is placed on.
    pub fn new(classifier: C, device: Device) -> Self {
        Self {
            classifier,
            device,
            explainer: Explainer::default(),
            labels: ClassLabels::default(),
            overlay: OverlayConfig::default().alpha(0.45),
            preprocessor: ImagePreprocessor::default(),
        }
    }

    /// Explainer of predictions.
    ///
    /// Default: `Explainer::default()`
    pub fn explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = explainer;
        self
    }

    /// Class labels.
    ///
    /// Default: `ClassLabels::default()`
    pub fn labels(mut self, labels: ClassLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Overlay of explanations.
    ///
    /// Default: `OverlayConfig::default().alpha(0.45)`
    pub fn overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    /// Image preprocessor.
    ///
    /// Default: `ImagePreprocessor::default()`
    pub fn preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Classify an image file and explain the prediction.
    ///
    /// * `path` - Path of the image.
    pub fn predict(&self, path: impl AsRef<Path>) -> Result<PredictionOutput, PredictError> {
        let path = path.as_ref();
        let image = image::open(path).context(OpenImageSnafu { path })?;
        let input = self
            .preprocessor
            .preprocess(&image, &self.device)
            .context(PreprocessSnafu)?;

        let scores = self
            .classifier
            .forward_t(&input, false)
            .context(ClassifySnafu)?;
        let prediction = ClassScores::new(scores)
            .and_then(|scores| scores.prediction())
            .context(ScoresSnafu)?;
        let label = self.labels.label(prediction.class_index()).to_string();
        let confidence = (prediction.confidence() * 10_000.).round() / 100.;
        info!("Prediction: {label} (confidence: {confidence:.2}%)");

        let (explanation, overlay) = match self.explainer.explain(&self.classifier, &input) {
            Ok(explanation) => {
                let overlay = match self.overlay.overlay(explanation.map(), &image.into_rgb8()) {
                    Ok(overlay) => Some(overlay),
                    Err(err) => {
                        warn!("Cannot overlay explanation: {err}");
                        None
                    }
                };
                (Some(explanation), overlay)
            }
            Err(err) => {
                warn!("Cannot explain prediction: {err}");
                (None, None)
            }
        };

        Ok(PredictionOutput {
            class_index: prediction.class_index(),
            confidence,
            explanation,
            label,
            overlay,
        })
    }
}

impl PredictionPipeline<SequentialClassifier> {
    /// Create a pipeline from a repository.
    ///
    /// The classifier is loaded from the repository, labels are read from
    /// its class index file when present. Images are resized to the
    /// classifier's input size.
    ///
    /// * `repo` - The repository.
    /// * `device` - The device to place the classifier on.
    pub fn from_repo(repo: &impl Repo, device: Device) -> Result<Self, PredictError> {
        let classifier = repo
            .load_classifier(&device)
            .context(LoadClassifierSnafu)?;
        let (height, width, _) = classifier.input_shape();
        let preprocessor = ImagePreprocessor::default()
            .height(height as u32)
            .width(width as u32);

        Ok(Self::new(classifier, device)
            .labels(ClassLabels::from_repo(repo))
            .preprocessor(preprocessor))
    }

    /// Create a pipeline from a local directory.
    ///
    /// See [PredictionPipeline::from_repo].
    pub fn from_dir(path: impl AsRef<Path>, device: Device) -> Result<Self, PredictError> {
        Self::from_repo(&LocalRepo::new(path).context(LocalRepoSnafu)?, device)
    }
}
