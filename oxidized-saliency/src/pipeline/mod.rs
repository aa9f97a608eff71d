/// Classification and explanation of image files.
mod labels;
pub use labels::{ClassLabels, ClassLabelsError, CLASS_INDICES};

mod predict;
pub use predict::{PredictError, PredictionOutput, PredictionPipeline};

mod preprocess;
pub use preprocess::{ImagePreprocessor, PreprocessError};
