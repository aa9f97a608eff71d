use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::info;

use crate::architectures::ImageClassifier;
use crate::error::BoxedError;
use crate::models::{
    SequentialClassifier, SequentialClassifierConfig, SequentialClassifierError,
    SerializedClassifierConfig,
};
use crate::repository::hf_hub::{HfHubRepo, HfHubRepoError};
use crate::repository::local::{LocalRepo, LocalRepoError};
use crate::repository::repo::Repo;

/// Classifier configuration file.
pub static CLASSIFIER_CONFIG: &str = "config.json";

/// Classifier parameter file.
pub static CLASSIFIER_WEIGHTS: &str = "model.safetensors";

/// Classifier loading errors.
#[derive(Debug, Snafu)]
pub enum LoadClassifierError {
    #[snafu(display("Cannot build classifier"))]
    BuildClassifier { source: SequentialClassifierError },

    #[snafu(display("Cannot convert classifier configuration"))]
    ConvertConfig { source: BoxedError },

    #[snafu(display("Cannot get repository file: {name}"))]
    Download { source: BoxedError, name: String },

    #[snafu(display("Hugging Face Hub repository error"))]
    HfHubRepo { source: HfHubRepoError },

    #[snafu(display("Cannot open or load parameters: {path:?}"))]
    LoadWeights {
        source: candle_core::Error,
        path: PathBuf,
    },

    #[snafu(display("Local repository error"))]
    LocalRepo { source: LocalRepoError },

    #[snafu(display("Repository file does not exist: {name}"))]
    NonExistentFile { name: String },

    #[snafu(display("Cannot open file for reading: {path:?}"))]
    Open {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("Cannot parse classifier configuration: {path:?}"))]
    ParseConfig {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Extension trait for loading classifiers from repositories.
///
/// The repository must contain the classifier configuration
/// ([CLASSIFIER_CONFIG]) and its parameters ([CLASSIFIER_WEIGHTS]).
pub trait LoadClassifier {
    /// Load the classifier.
    ///
    /// * `device` - The device to place the classifier on.
    fn load_classifier(&self, device: &Device) -> Result<SequentialClassifier, LoadClassifierError>;
}

impl<R> LoadClassifier for R
where
    R: Repo,
{
    fn load_classifier(&self, device: &Device) -> Result<SequentialClassifier, LoadClassifierError> {
        let config_path = repo_file(self, CLASSIFIER_CONFIG)?;
        let config_file = BufReader::new(
            File::open(&config_path).context(OpenSnafu {
                path: config_path.clone(),
            })?,
        );
        let serialized_config: SerializedClassifierConfig = serde_json::from_reader(config_file)
            .context(ParseConfigSnafu { path: config_path })?;
        let config =
            SequentialClassifierConfig::try_from(serialized_config).context(ConvertConfigSnafu)?;

        let weights_path = repo_file(self, CLASSIFIER_WEIGHTS)?;
        let weights = unsafe { MmapedSafetensors::new(&weights_path) }.context(LoadWeightsSnafu {
            path: weights_path.clone(),
        })?;
        let vb = VarBuilder::from_backend(Box::new(weights), DType::F32, device.clone());

        let classifier = config.build(vb).context(BuildClassifierSnafu)?;
        info!(
            "Loaded classifier with {} layers from {weights_path:?}",
            classifier.layers().len()
        );

        Ok(classifier)
    }
}

fn repo_file(repo: &impl Repo, name: &str) -> Result<PathBuf, LoadClassifierError> {
    repo.file(name)
        .context(DownloadSnafu { name })?
        .context(NonExistentFileSnafu { name })
}

impl SequentialClassifier {
    /// Load a classifier from a local directory.
    ///
    /// * `path` - Directory with the classifier configuration and parameters.
    /// * `device` - The device to place the classifier on.
    pub fn from_dir(path: impl AsRef<Path>, device: &Device) -> Result<Self, LoadClassifierError> {
        LocalRepo::new(path)
            .context(LocalRepoSnafu)?
            .load_classifier(device)
    }

    /// Load a classifier from Hugging Face Hub.
    ///
    /// * `name` - Model repository name.
    /// * `revision` - Model revision. If `None`, the main branch is used.
    /// * `device` - The device to place the classifier on.
    pub fn from_hf_hub(
        name: &str,
        revision: Option<&str>,
        device: &Device,
    ) -> Result<Self, LoadClassifierError> {
        HfHubRepo::new(name, revision)
            .context(HfHubRepoSnafu)?
            .load_classifier(device)
    }
}
