use std::path::{Path, PathBuf};

use crate::error::BoxedError;

/// Repository that contains a classifier and its metadata.
pub trait Repo
where
    Self: Sized,
{
    /// Get a repository file.
    ///
    /// * `path` - The path to the file within the repository.
    ///
    /// Returns: The local file path, `None` if the file does not exist.
    fn file(&self, path: impl AsRef<Path>) -> Result<Option<PathBuf>, BoxedError>;

    /// Check if the path exists in the repository.
    ///
    /// * `path` - The path to the file within the repository.
    fn exists(&self, path: impl AsRef<Path>) -> bool;
}
