mod classifier;
pub use classifier::{ActivationOutput, ImageClassifier, LayerSummary};

mod scores;
pub use scores::{ClassScores, ClassScoresError, Prediction};
