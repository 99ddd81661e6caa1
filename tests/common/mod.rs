// tests/common/mod.rs

//! Shared fixtures for integration tests.

use distroforge::{Artifact, ArtifactStore, StoreError, StoreResult, Version};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// In-memory artifact store seeded with file listings per artifact
#[derive(Default)]
pub struct FixtureStore {
    artifacts: HashMap<String, Vec<(String, String)>>,
    versions: HashMap<String, Vec<Version>>,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_artifact(&mut self, artifact: &Artifact, files: &[(&str, &str)]) {
        self.artifacts.insert(
            artifact.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }

    #[allow(dead_code)]
    pub fn add_versions(&mut self, group_id: &str, artifact_id: &str, versions: &[&str]) {
        self.versions.insert(
            format!("{group_id}:{artifact_id}"),
            versions.iter().map(|v| Version::parse(v)).collect(),
        );
    }
}

impl ArtifactStore for FixtureStore {
    fn fetch(&self, artifact: &Artifact, dest: &Path, unpack: bool) -> StoreResult<PathBuf> {
        let key = artifact.to_string();
        let files = self
            .artifacts
            .get(&key)
            .ok_or(StoreError::NotFound(key))?;
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
            fs::create_dir_all(dest)?;
            let path = dest.join(artifact.dest_file_name());
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
