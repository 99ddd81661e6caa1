// src/store/mod.rs

//! Artifact store collaborator interface.
//!
//! The engine never downloads artifacts itself; it depends on an
//! [`ArtifactStore`] implementation supplied by the caller. A store must
//! report "not found" distinctly from transport failures, because the
//! transitive module resolver probes several coordinate shapes and only a
//! not-found answer should advance the probe.

use crate::artifact::Artifact;
use crate::version::Version;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by an artifact store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No artifact exists at the given coordinates
    #[error("artifact {0} not found")]
    NotFound(String),

    /// The store was reachable but the transfer failed
    #[error("transport failure for {artifact}: {reason}")]
    Transport { artifact: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// External capability for fetching artifacts and listing their versions
pub trait ArtifactStore {
    /// Fetch the artifact into `dest`. When `unpack` is true the archive is
    /// extracted into `dest` and the directory is returned; otherwise the
    /// packed file is placed in `dest` and its path is returned.
    fn fetch(&self, artifact: &Artifact, dest: &Path, unpack: bool) -> StoreResult<PathBuf>;

    /// List every version available for `group_id:artifact_id`
    fn list_versions(&self, group_id: &str, artifact_id: &str) -> StoreResult<Vec<Version>>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory store used by unit tests across the crate.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::fs;

    #[derive(Default)]
    pub struct MockStore {
        artifacts: HashMap<String, Vec<(String, String)>>,
        versions: HashMap<String, Vec<Version>>,
        broken: HashSet<String>,
    }

    impl MockStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register an artifact with the given relative-path/content entries
        pub fn add_artifact(&mut self, artifact: &Artifact, files: &[(&str, &str)]) {
            self.artifacts.insert(
                artifact.to_string(),
                files
                    .iter()
                    .map(|(p, c)| (p.to_string(), c.to_string()))
                    .collect(),
            );
        }

        pub fn add_versions(&mut self, group_id: &str, artifact_id: &str, versions: &[&str]) {
            self.versions.insert(
                format!("{group_id}:{artifact_id}"),
                versions.iter().map(|v| Version::parse(v)).collect(),
            );
        }

        /// Make every fetch of this artifact fail with a transport error
        pub fn break_artifact(&mut self, artifact: &Artifact) {
            self.broken.insert(artifact.to_string());
        }
    }

    impl ArtifactStore for MockStore {
        fn fetch(&self, artifact: &Artifact, dest: &Path, unpack: bool) -> StoreResult<PathBuf> {
            let key = artifact.to_string();
            if self.broken.contains(&key) {
                return Err(StoreError::Transport {
                    artifact: key,
                    reason: "connection reset".to_string(),
                });
            }
            let files = self
                .artifacts
                .get(&key)
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            if unpack {
                for (rel, content) in files {
                    let path = dest.join(rel);
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, content)?;
                }
                Ok(dest.to_path_buf())
            } else {
                let path = dest.join(artifact.dest_file_name());
                fs::create_dir_all(dest)?;
                fs::write(&path, "")?;
                Ok(path)
            }
        }

        fn list_versions(&self, group_id: &str, artifact_id: &str) -> StoreResult<Vec<Version>> {
            Ok(self
                .versions
                .get(&format!("{group_id}:{artifact_id}"))
                .cloned()
                .unwrap_or_default())
        }
    }
}
