use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::warn;

use crate::repository::repo::Repo;

/// Class index file, mapping labels to class indices.
pub static CLASS_INDICES: &str = "class_indices.json";

/// Label of class indices without a label.
const UNKNOWN_LABEL: &str = "Unknown";

/// Class label errors.
#[derive(Debug, Snafu)]
pub enum ClassLabelsError {
    #[snafu(display("Cannot open class index file: {path:?}"))]
    Open {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("Cannot parse class index file: {path:?}"))]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Mapping from class indices to labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLabels {
    labels: HashMap<usize, String>,
}

impl ClassLabels {
    /// Create a label mapping.
    ///
    /// * `labels` - Label of each class index.
    pub fn new(labels: HashMap<usize, String>) -> Self {
        Self { labels }
    }

    /// Create a label mapping from class indices.
    ///
    /// * `class_indices` - Class index of each label.
    pub fn from_class_indices(class_indices: HashMap<String, usize>) -> Self {
        Self {
            labels: class_indices
                .into_iter()
                .map(|(label, idx)| (idx, label))
                .collect(),
        }
    }

    /// Read a class index file.
    ///
    /// The file is a JSON object from labels to class indices, e.g.
    /// `{"Normal": 1, "Tumor": 0}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassLabelsError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).context(OpenSnafu { path })?);
        let class_indices: HashMap<String, usize> =
            serde_json::from_reader(reader).context(ParseSnafu { path })?;
        Ok(Self::from_class_indices(class_indices))
    }

    /// Read the class index file of a repository.
    ///
    /// Falls back to the default labels when the repository does not have
    /// a usable class index file.
    pub fn from_repo(repo: &impl Repo) -> Self {
        let path = match repo.file(CLASS_INDICES) {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!("Repository does not have {CLASS_INDICES}, using default labels");
                return Self::default();
            }
            Err(err) => {
                warn!("Cannot get {CLASS_INDICES}, using default labels: {err}");
                return Self::default();
            }
        };

        Self::from_file(&path).unwrap_or_else(|err| {
            warn!("{err}, using default labels");
            Self::default()
        })
    }

    /// Label of a class index, `"Unknown"` for indices without a label.
    pub fn label(&self, class_index: usize) -> &str {
        self.labels
            .get(&class_index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::new(HashMap::from([
            (0, "Tumor".to_string()),
            (1, "Normal".to_string()),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ClassLabels, CLASS_INDICES};
    use crate::repository::local::LocalRepo;

    #[test]
    fn default_labels() {
        let labels = ClassLabels::default();
        assert_eq!(labels.label(0), "Tumor");
        assert_eq!(labels.label(1), "Normal");
        assert_eq!(labels.label(2), "Unknown");
    }

    #[test]
    fn labels_are_read_from_class_indices() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CLASS_INDICES),
            r#"{"Cyst": 0, "Normal": 1, "Stone": 2, "Tumor": 3}"#,
        )
        .unwrap();

        let labels = ClassLabels::from_repo(&LocalRepo::new(dir.path()).unwrap());
        assert_eq!(labels.label(0), "Cyst");
        assert_eq!(labels.label(3), "Tumor");
        assert_eq!(labels.label(4), "Unknown");
    }

    #[test]
    fn unusable_class_indices_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepo::new(dir.path()).unwrap();
        assert_eq!(ClassLabels::from_repo(&repo), ClassLabels::default());

        fs::write(dir.path().join(CLASS_INDICES), "[1, 2]").unwrap();
        assert!(ClassLabels::from_file(dir.path().join(CLASS_INDICES)).is_err());
        assert_eq!(ClassLabels::from_repo(&repo), ClassLabels::default());
    }
}
