use candle_core::{DType, Shape, Tensor, Var, D};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::architectures::{ClassScores, ClassScoresError, ImageClassifier};
use crate::error::BoxedError;
use crate::explain::{Explanation, ExplanationMethod, SaliencyMap};

/// Integrated gradients errors.
#[derive(Debug, Snafu)]
pub enum IntegratedGradientsError {
    #[snafu(display("Baseline must have the input shape {input:?}, got: {baseline:?}"))]
    BaselineShape { baseline: Shape, input: Shape },

    #[snafu(display("Cannot compute integrated gradients"))]
    Compute { source: candle_core::Error },

    #[snafu(display("Cannot run classifier"))]
    Forward { source: BoxedError },

    #[snafu(display("Input must have shape (1, height, width, channels), got: {shape:?}"))]
    InputShape { shape: Shape },

    #[snafu(display("Gradient of class score with respect to the input is not defined"))]
    MissingGradient,

    #[snafu(display("Cannot determine class score"))]
    Scores { source: ClassScoresError },
}

/// Integrated gradients.
///
/// Gradients of the predicted class score are accumulated along the straight
/// path from a baseline to the input with the trapezoidal rule and scaled by
/// the difference between the input and the baseline.
///
/// See [Sundararajan et al., 2017](https://arxiv.org/abs/1703.01365).
#[derive(Clone, Debug)]
pub struct IntegratedGradients {
    baseline: Option<Tensor>,
    batch_size: Option<usize>,
    steps: usize,
}

impl IntegratedGradients {
    /// Baseline image. If `None`, a black (all-zero) image is used.
    ///
    /// *Shape:* `(1, height, width, channels)`
    ///
    /// Default: `None`
    pub fn baseline(mut self, baseline: Option<Tensor>) -> Self {
        self.baseline = baseline;
        self
    }

    /// Maximum number of interpolated images per classifier call. If `None`,
    /// all interpolated images are processed as a single batch.
    ///
    /// Default: `None`
    pub fn batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Number of intervals between the baseline and the input. `0` is
    /// treated as a single interval.
    ///
    /// Default: `50`
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Explain the prediction of a classifier.
    ///
    /// * `classifier` - The classifier.
    /// * `input` - Input image.
    ///   *Shape:* `(1, height, width, channels)`
    ///
    /// Returns the explanation with a map of shape `(height, width)`.
    pub fn explain(
        &self,
        classifier: &impl ImageClassifier,
        input: &Tensor,
    ) -> Result<Explanation, IntegratedGradientsError> {
        let input = Self::check_input(input)?;
        let scores =
            ClassScores::new(classifier.forward_t(&input, false).context(ForwardSnafu)?)
                .context(ScoresSnafu)?;
        let class_index = scores.predicted_class().context(ScoresSnafu)?;
        debug!(
            "Computing integrated gradients of class {class_index} with {} steps",
            self.n_intervals()
        );

        let map = self
            .attributions(classifier, &input, class_index)?
            .abs()
            .and_then(|attributions| attributions.mean(D::Minus1))
            .and_then(|map| SaliencyMap::normalize_tensor(&map))
            .context(ComputeSnafu)?;

        Ok(Explanation::new(
            map,
            class_index,
            ExplanationMethod::IntegratedGradients,
            None,
        ))
    }

    /// Compute attributions of the input to a class score.
    ///
    /// * `classifier` - The classifier.
    /// * `input` - Input image.
    ///   *Shape:* `(1, height, width, channels)`
    /// * `class_index` - Class to attribute. Single-output classifiers always
    ///   attribute their single output.
    ///
    /// Returns the attributions.
    /// *Shape:* `(height, width, channels)`
    pub fn attributions(
        &self,
        classifier: &impl ImageClassifier,
        input: &Tensor,
        class_index: usize,
    ) -> Result<Tensor, IntegratedGradientsError> {
        let input = Self::check_input(input)?;
        let baseline = self.baseline_for(&input)?;
        let delta = (&input - &baseline).context(ComputeSnafu)?;

        let n_intervals = self.n_intervals();
        let alphas = (0..=n_intervals)
            .map(|step| step as f32 / n_intervals as f32)
            .collect::<Vec<_>>();
        let batch_size = self.batch_size.unwrap_or(alphas.len()).max(1);

        let mut grads = Vec::with_capacity(alphas.len().div_ceil(batch_size));
        for batch_alphas in alphas.chunks(batch_size) {
            grads.push(self.path_gradients(
                classifier,
                &baseline,
                &delta,
                batch_alphas,
                class_index,
            )?);
        }

        let grads = Tensor::cat(&grads, 0).context(ComputeSnafu)?;
        Self::trapezoid_mean(&grads, n_intervals)
            .and_then(|avg_grads| delta.get(0)?.mul(&avg_grads))
            .context(ComputeSnafu)
    }

    fn check_input(input: &Tensor) -> Result<Tensor, IntegratedGradientsError> {
        check_input_shape(input)?;
        input.to_dtype(DType::F32).context(ComputeSnafu)
    }

    fn baseline_for(&self, input: &Tensor) -> Result<Tensor, IntegratedGradientsError> {
        match &self.baseline {
            Some(baseline) => {
                ensure!(
                    baseline.shape() == input.shape(),
                    BaselineShapeSnafu {
                        baseline: baseline.shape().clone(),
                        input: input.shape().clone(),
                    }
                );
                baseline
                    .to_dtype(DType::F32)
                    .and_then(|baseline| baseline.to_device(input.device()))
                    .context(ComputeSnafu)
            }
            None => input.zeros_like().context(ComputeSnafu),
        }
    }

    fn n_intervals(&self) -> usize {
        self.steps.max(1)
    }

    /// Gradients of the class score at points on the path.
    ///
    /// *Shape:* `(alphas.len(), height, width, channels)`
    fn path_gradients(
        &self,
        classifier: &impl ImageClassifier,
        baseline: &Tensor,
        delta: &Tensor,
        alphas: &[f32],
        class_index: usize,
    ) -> Result<Tensor, IntegratedGradientsError> {
        let interpolated = Tensor::from_slice(alphas, (alphas.len(), 1, 1, 1), baseline.device())
            .and_then(|alphas| delta.broadcast_mul(&alphas))
            .and_then(|scaled| scaled.broadcast_add(baseline))
            .and_then(|interpolated| Var::from_tensor(&interpolated))
            .context(ComputeSnafu)?;

        let scores = ClassScores::new(
            classifier
                .forward_t(interpolated.as_tensor(), false)
                .context(ForwardSnafu)?,
        )
        .context(ScoresSnafu)?;

        // Images are independent, so the gradient of the summed scores is
        // the gradient of each image's own score.
        let grads = scores
            .target_score(class_index)
            .context(ScoresSnafu)?
            .sum_all()
            .and_then(|score| score.backward())
            .context(ComputeSnafu)?;

        grads
            .get(interpolated.as_tensor())
            .cloned()
            .context(MissingGradientSnafu)
    }

    /// Average gradient over all intervals with the trapezoidal rule.
    ///
    /// *Shape:* `(height, width, channels)`
    fn trapezoid_mean(grads: &Tensor, n_intervals: usize) -> Result<Tensor, candle_core::Error> {
        let left = grads.narrow(0, 0, n_intervals)?;
        let right = grads.narrow(0, 1, n_intervals)?;
        (left + right)?.affine(0.5, 0.)?.mean(0)
    }
}

impl Default for IntegratedGradients {
    fn default() -> Self {
        Self {
            baseline: None,
            batch_size: None,
            steps: 50,
        }
    }
}

/// Check that the input is a single image of shape
/// `(1, height, width, channels)`.
pub(crate) fn check_input_shape(input: &Tensor) -> Result<(), IntegratedGradientsError> {
    ensure!(
        matches!(input.dims(), [1, _, _, _]),
        InputShapeSnafu {
            shape: input.shape().clone()
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use candle_core::{DType, Device, IndexOp, Tensor};
    use ndarray::ArrayD;
    use rstest::rstest;
    use snafu::{report, FromString, ResultExt, Whatever};

    use super::IntegratedGradients;
    use crate::architectures::ImageClassifier;
    use crate::explain::ExplanationMethod;
    use crate::models::util::tests::{
        conv_classifier, dense_classifier, linear_classifier, sample_image, softmax_classifier,
    };
    use crate::util::device::tests::test_devices;
    use crate::util::tests::{assert_tensor_eq, IntoArrayD};

    #[test]
    #[report]
    fn integrated_gradients_has_input_resolution() -> Result<(), Whatever> {
        for device in test_devices() {
            let classifier = dense_classifier((224, 224, 3), &device)?;
            let input = sample_image((224, 224, 3), 42, &device)?;

            let explanation = IntegratedGradients::default()
                .steps(8)
                .explain(&classifier, &input)
                .whatever_context("Cannot compute integrated gradients")?;
            assert_eq!(explanation.method(), ExplanationMethod::IntegratedGradients);
            assert_eq!(explanation.layer(), None);
            assert_eq!(explanation.map().dim(), (224, 224));

            let values = explanation.map().values();
            assert!(values.iter().all(|&v| (0. ..=1.).contains(&v)));
            assert_eq!(values.iter().copied().fold(f32::INFINITY, f32::min), 0.);
        }

        Ok(())
    }

    #[test]
    #[report]
    fn integrated_gradients_are_complete_for_linear_classifiers() -> Result<(), Whatever> {
        let device = Device::Cpu;
        let classifier = linear_classifier((4, 4, 3), &device)?;
        let input = sample_image((4, 4, 3), 5, &device)?;
        let scores = classifier
            .forward_t(&input, false)
            .map_err(|e| Whatever::with_source(e, "Cannot run classifier".to_string()))?;

        for class_index in 0..2 {
            let attributions = IntegratedGradients::default()
                .steps(4)
                .attributions(&classifier, &input, class_index)
                .whatever_context("Cannot compute attributions")?;
            assert_eq!(attributions.dims(), &[4, 4, 3]);

            // The baseline is black and the classifier has no bias, so the
            // attributions sum to the class score.
            let total = attributions
                .sum_all()
                .and_then(|total| total.to_scalar::<f32>())
                .whatever_context("Cannot sum attributions")?;
            let score = scores
                .i((0, class_index))
                .and_then(|score| score.to_scalar::<f32>())
                .whatever_context("Cannot read score")?;
            assert_relative_eq!(total, score, epsilon = 1e-4);
        }

        Ok(())
    }

    #[test]
    #[report]
    fn integrated_gradients_in_batches_match_single_batch() -> Result<(), Whatever> {
        let device = Device::Cpu;
        let classifier = softmax_classifier(&device)?;
        let input = sample_image((8, 8, 3), 11, &device)?;

        let single = IntegratedGradients::default()
            .steps(10)
            .attributions(&classifier, &input, 1)
            .whatever_context("Cannot compute attributions")?;
        let single: ArrayD<f32> = single
            .into_arrayd()
            .whatever_context("Cannot convert attributions")?;
        let batched = IntegratedGradients::default()
            .steps(10)
            .batch_size(Some(3))
            .attributions(&classifier, &input, 1)
            .whatever_context("Cannot compute batched attributions")?;
        assert_tensor_eq!(batched, single, epsilon = 1e-5);

        Ok(())
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(10)]
    #[case(50)]
    fn steps_do_not_change_class(#[case] steps: usize) {
        let device = Device::Cpu;
        let classifier = conv_classifier(&device).unwrap();
        let input = Tensor::full(0.5f32, (1, 224, 224, 3), &device).unwrap();

        let explanation = IntegratedGradients::default()
            .steps(steps)
            .batch_size(Some(16))
            .explain(&classifier, &input)
            .unwrap();
        assert_eq!(explanation.class_index(), 1);
        assert_eq!(explanation.map().dim(), (224, 224));
    }

    #[test]
    fn zero_steps_use_endpoint_gradients() {
        let device = Device::Cpu;
        let classifier = softmax_classifier(&device).unwrap();
        let input = sample_image((8, 8, 3), 13, &device).unwrap();

        let zero = IntegratedGradients::default()
            .steps(0)
            .attributions(&classifier, &input, 0)
            .unwrap();
        let one = IntegratedGradients::default()
            .steps(1)
            .attributions(&classifier, &input, 0)
            .unwrap();
        let one: ArrayD<f32> = one.into_arrayd().unwrap();
        assert_tensor_eq!(zero, one, epsilon = 1e-6);
    }

    #[test]
    #[report]
    fn input_equal_to_baseline_has_zero_attributions() -> Result<(), Whatever> {
        let device = Device::Cpu;
        let classifier = dense_classifier((224, 224, 3), &device)?;
        let input = Tensor::zeros((1, 224, 224, 3), DType::F32, &device)
            .whatever_context("Cannot create input")?;

        let ig = IntegratedGradients::default().steps(4);
        let attributions = ig
            .attributions(&classifier, &input, 1)
            .whatever_context("Cannot compute attributions")?
            .flatten_all()
            .and_then(|attributions| attributions.to_vec1::<f32>())
            .whatever_context("Cannot read attributions")?;
        assert!(attributions.iter().all(|&v| v == 0.));

        let explanation = ig
            .explain(&classifier, &input)
            .whatever_context("Cannot explain all-zero input")?;
        assert!(explanation.map().values().iter().all(|&v| v == 0.));

        Ok(())
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let device = Device::Cpu;
        let classifier = softmax_classifier(&device).unwrap();

        let input = sample_image((8, 8, 3), 1, &device).unwrap();
        let batch = Tensor::cat(&[&input, &input], 0).unwrap();
        assert!(IntegratedGradients::default()
            .explain(&classifier, &batch)
            .is_err());

        let baseline = Tensor::zeros((1, 4, 4, 3), DType::F32, &device).unwrap();
        assert!(IntegratedGradients::default()
            .baseline(Some(baseline))
            .explain(&classifier, &input)
            .is_err());
    }
}
