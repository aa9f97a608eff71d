use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use hf_hub::api::sync::{ApiBuilder, ApiError, ApiRepo};
use hf_hub::{Repo as HuggingFaceRepo, RepoType as HuggingFaceRepoType};
use snafu::{ResultExt, Snafu};
use tracing::debug;

use super::repo::Repo;
use crate::error::BoxedError;

/// `HfHubRepo` errors.
#[derive(Debug, Snafu)]
pub enum HfHubRepoError {
    #[snafu(display("Cannot initialize Hugging Face Hub API"))]
    Api { source: ApiError },

    #[snafu(display("Cannot download '{name}' from Hugging Face Hub repo {repo}"))]
    Download {
        source: ApiError,
        name: String,
        repo: String,
    },

    #[snafu(display("Cannot list files of Hugging Face Hub repo {repo}"))]
    ListFiles { source: ApiError, repo: String },
}

/// Files of a remote repository.
///
/// Hub file names always use `/` as the separator, local paths are
/// converted before lookup.
#[derive(Clone, Debug, Default)]
pub(crate) struct RemoteFiles {
    names: HashSet<String>,
}

impl RemoteFiles {
    pub(crate) fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Remote name of a relative path, `None` if the repo does not have it.
    pub(crate) fn remote_name(&self, path: &Path) -> Option<String> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => (),
                // Absolute paths and parent directories are outside the
                // repository.
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
            }
        }

        let name = parts.join("/");
        self.names.contains(&name).then_some(name)
    }
}

/// Hugging Face Hub model repository.
///
/// Files are downloaded to the Hugging Face cache on first access.
pub struct HfHubRepo {
    api_repo: ApiRepo,
    files: RemoteFiles,
    name: String,
}

impl HfHubRepo {
    /// Open a Hugging Face Hub model repository.
    ///
    /// * `name` - Name of the model on the Hugging Face Hub.
    /// * `revision` - Revision of the model to load. If `None`, the main
    ///   branch is used.
    pub fn new(name: &str, revision: Option<&str>) -> Result<Self, HfHubRepoError> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .context(ApiSnafu)?;
        let api_repo = api.repo(HuggingFaceRepo::with_revision(
            name.to_owned(),
            HuggingFaceRepoType::Model,
            revision.unwrap_or("main").to_owned(),
        ));

        let info = api_repo
            .info()
            .context(ListFilesSnafu { repo: name })?;
        debug!("Repository {name} has {} files", info.siblings.len());

        Ok(Self {
            api_repo,
            files: RemoteFiles::new(info.siblings.into_iter().map(|file| file.rfilename)),
            name: name.to_owned(),
        })
    }
}

impl Repo for HfHubRepo {
    fn file(&self, path: impl AsRef<Path>) -> Result<Option<PathBuf>, BoxedError> {
        let Some(name) = self.files.remote_name(path.as_ref()) else {
            return Ok(None);
        };

        let local_path = self.api_repo.get(&name).context(DownloadSnafu {
            name: name.as_str(),
            repo: self.name.as_str(),
        })?;
        debug!("Using {name} from {}: {}", self.name, local_path.display());

        Ok(Some(local_path))
    }

    fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.files.remote_name(path.as_ref()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rstest::rstest;

    use super::RemoteFiles;

    fn remote_files() -> RemoteFiles {
        RemoteFiles::new(
            ["config.json", "model.safetensors", "labels/class_indices.json"]
                .into_iter()
                .map(str::to_owned),
        )
    }

    #[rstest]
    #[case("config.json", Some("config.json"))]
    #[case("./model.safetensors", Some("model.safetensors"))]
    #[case("labels/class_indices.json", Some("labels/class_indices.json"))]
    #[case("labels/./class_indices.json", Some("labels/class_indices.json"))]
    #[case("class_indices.json", None)]
    #[case("labels", None)]
    #[case("/config.json", None)]
    #[case("../config.json", None)]
    #[case("", None)]
    fn paths_resolve_to_remote_names(#[case] path: &str, #[case] name: Option<&str>) {
        assert_eq!(
            remote_files().remote_name(Path::new(path)).as_deref(),
            name
        );
    }
}
