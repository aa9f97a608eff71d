use candle_core::{DType, IndexOp, Shape, Tensor};
use snafu::{ensure, ResultExt, Snafu};

/// Probability threshold of single-output (sigmoid) classifiers.
const SIGMOID_THRESHOLD: f32 = 0.5;

/// Class score errors.
#[derive(Debug, Snafu)]
pub enum ClassScoresError {
    #[snafu(display("Class index {index} is out of range for {n_outputs} outputs"))]
    ClassIndex { index: usize, n_outputs: usize },

    #[snafu(display("Cannot read class scores"))]
    ReadScores { source: candle_core::Error },

    #[snafu(display("Cannot select class score"))]
    SelectScore { source: candle_core::Error },

    #[snafu(display(
        "Class scores must have shape (batch_size, n_outputs) with non-zero sizes, got: {shape:?}"
    ))]
    Shape { shape: Shape },
}

/// Prediction of a classifier for a single image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    class_index: usize,
    confidence: f32,
}

impl Prediction {
    /// Predicted class index.
    pub fn class_index(&self) -> usize {
        self.class_index
    }

    /// Probability of the predicted class, in `[0, 1]`.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Class scores of a classifier.
///
/// Wraps scores of shape `(batch_size, n_outputs)` and applies the same
/// decision rule everywhere a class index is needed: a single output is
/// thresholded at `0.5`, multiple outputs use the index of the largest
/// score.
#[derive(Clone, Debug)]
pub struct ClassScores {
    scores: Tensor,
}

impl ClassScores {
    /// Wrap class scores.
    ///
    /// * `scores` - Class scores.
    ///   *Shape:* `(batch_size, n_outputs)`
    pub fn new(scores: Tensor) -> Result<Self, ClassScoresError> {
        let valid = matches!(scores.dims(), [batch_size, n_outputs] if *batch_size > 0 && *n_outputs > 0);
        ensure!(
            valid,
            ShapeSnafu {
                shape: scores.shape().clone()
            }
        );
        Ok(Self { scores })
    }

    /// Whether the scores come from a single-output (sigmoid) head.
    pub fn is_single_output(&self) -> bool {
        self.n_outputs() == 1
    }

    /// Number of outputs per image.
    pub fn n_outputs(&self) -> usize {
        self.scores.dims()[1]
    }

    /// Predicted class index of the first image.
    pub fn predicted_class(&self) -> Result<usize, ClassScoresError> {
        Ok(self.prediction()?.class_index)
    }

    /// Prediction for the first image.
    pub fn prediction(&self) -> Result<Prediction, ClassScoresError> {
        let scores = self
            .scores
            .get(0)
            .and_then(|scores| scores.to_dtype(DType::F32))
            .and_then(|scores| scores.to_vec1::<f32>())
            .context(ReadScoresSnafu)?;

        if let [probability] = scores[..] {
            Ok(if probability > SIGMOID_THRESHOLD {
                Prediction {
                    class_index: 1,
                    confidence: probability,
                }
            } else {
                Prediction {
                    class_index: 0,
                    confidence: 1. - probability,
                }
            })
        } else {
            // First maximum wins on ties.
            let (class_index, confidence) = scores.iter().copied().enumerate().fold(
                (0, f32::NEG_INFINITY),
                |(best_index, best), (index, score)| {
                    if score > best {
                        (index, score)
                    } else {
                        (best_index, best)
                    }
                },
            );
            Ok(Prediction {
                class_index,
                confidence,
            })
        }
    }

    /// Score that drives the explanation of a class.
    ///
    /// For single-output classifiers this is always the single output,
    /// otherwise it is the output of the given class.
    ///
    /// Returns the score of every image in the batch.
    /// *Shape:* `(batch_size,)`
    pub fn target_score(&self, class_index: usize) -> Result<Tensor, ClassScoresError> {
        let n_outputs = self.n_outputs();
        let output = if self.is_single_output() {
            0
        } else {
            ensure!(
                class_index < n_outputs,
                ClassIndexSnafu {
                    index: class_index,
                    n_outputs
                }
            );
            class_index
        };

        self.scores.i((.., output)).context(SelectScoreSnafu)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use candle_core::{DType, Device, Tensor};
    use ndarray::array;
    use rstest::rstest;

    use super::ClassScores;
    use crate::util::device::tests::test_devices;
    use crate::util::tests::assert_tensor_eq;

    #[rstest]
    #[case(&[0.8], 1, 0.8)]
    #[case(&[0.5], 0, 0.5)]
    #[case(&[0.2], 0, 0.8)]
    #[case(&[0.3, 0.7], 1, 0.7)]
    #[case(&[0.9, 0.1], 0, 0.9)]
    #[case(&[0.25, 0.5, 0.25], 1, 0.5)]
    #[case(&[0.5, 0.5], 0, 0.5)]
    fn prediction_follows_head_decision_rule(
        #[case] scores: &[f32],
        #[case] class_index: usize,
        #[case] confidence: f32,
    ) {
        for device in test_devices() {
            let scores =
                ClassScores::new(Tensor::from_slice(scores, (1, scores.len()), &device).unwrap())
                    .unwrap();
            let prediction = scores.prediction().unwrap();
            assert_eq!(prediction.class_index(), class_index);
            assert_relative_eq!(prediction.confidence(), confidence, epsilon = 1e-6);
        }
    }

    #[test]
    fn target_score_selects_output() {
        let device = Device::Cpu;
        let single = ClassScores::new(Tensor::new(&[[0.8f32], [0.4]], &device).unwrap()).unwrap();
        // Class 1 of a single-output head is the single output.
        assert_tensor_eq!(
            single.target_score(1).unwrap(),
            array![0.8f32, 0.4]
        );

        let multi =
            ClassScores::new(Tensor::new(&[[0.1f32, 0.9], [0.6, 0.4]], &device).unwrap()).unwrap();
        assert_tensor_eq!(multi.target_score(0).unwrap(), array![0.1f32, 0.6]);
        assert!(multi.target_score(2).is_err());
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let device = Device::Cpu;
        assert!(ClassScores::new(Tensor::new(&[0.8f32], &device).unwrap()).is_err());
        assert!(ClassScores::new(Tensor::zeros((1, 2, 2), DType::F32, &device).unwrap()).is_err());
    }
}
