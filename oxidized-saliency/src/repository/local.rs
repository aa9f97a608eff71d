use std::path::{Path, PathBuf};

use snafu::{ensure, Snafu};

use super::repo::Repo;
use crate::error::BoxedError;

/// `LocalRepo` errors.
#[derive(Debug, Snafu)]
pub enum LocalRepoError {
    #[snafu(display("Repository path is not a directory: {path:?}"))]
    NotADirectory { path: PathBuf },
}

/// Repository in a directory on the local machine.
#[derive(Clone, Debug)]
pub struct LocalRepo {
    root: PathBuf,
}

impl LocalRepo {
    /// Open a local repository.
    ///
    /// * `root` - Directory that contains the repository files.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, LocalRepoError> {
        let root = root.as_ref().to_path_buf();
        ensure!(root.is_dir(), NotADirectorySnafu { path: root });
        Ok(Self { root })
    }
}

impl Repo for LocalRepo {
    fn file(&self, path: impl AsRef<Path>) -> Result<Option<PathBuf>, BoxedError> {
        let path = self.root.join(path);
        Ok(path.is_file().then_some(path))
    }

    fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.root.join(path).is_file()
    }
}
