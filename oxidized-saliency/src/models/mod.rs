mod config;
pub use config::{
    SerializedClassifierConfig, SerializedClassifierConfigError, SerializedLayer,
    SerializedLayerConfig,
};

mod loading;
pub use loading::{LoadClassifier, LoadClassifierError, CLASSIFIER_CONFIG, CLASSIFIER_WEIGHTS};

mod sequential;
pub use sequential::{SequentialClassifier, SequentialClassifierConfig, SequentialClassifierError};

pub mod util;
