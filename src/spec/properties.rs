// src/spec/properties.rs

//! The flat property bag backing a distribution spec.

use super::{
    CUSTOM_PREFIX, KEY_EXCLUSIONS, KEY_NAME, KEY_VERSION, PARENT_PREFIX, RESERVED_SUB_KEYS,
    SPEC_FILE_NAME, SUB_ARTIFACT_ID, SUB_GROUP_ID, SUB_NAMESPACE, SUB_TYPE, VAR_PREFIX,
};
use crate::artifact::{Artifact, ArtifactType, Category};
use crate::content::ContentPackage;
use crate::error::{Error, Result};
use java_properties::{PropertiesIter, PropertiesWriter};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// An ordered, namespaced property bag representing a distribution spec.
///
/// Entries are kept sorted so that serializing the same spec twice yields
/// byte-identical output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecProperties {
    entries: BTreeMap<String, String>,
}

impl SpecProperties {
    /// Create a minimal spec with just a name and version
    pub fn new(name: &str, version: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(KEY_NAME.to_string(), name.to_string());
        entries.insert(KEY_VERSION.to_string(), version.to_string());
        Self { entries }
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    pub fn from_reader<R: Read>(reader: R, context: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        PropertiesIter::new(reader)
            .read_into(|key, value| {
                entries.insert(key, value);
            })
            .map_err(|source| Error::PropertyFormat {
                context: format!("reading {context}"),
                source,
            })?;
        Ok(Self { entries })
    }

    /// Write the spec to `dir/distro.properties`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(SPEC_FILE_NAME);
        let file = File::create(&path)?;
        self.write_to(BufWriter::new(file), &path.display().to_string())
    }

    pub fn write_to<W: Write>(&self, writer: W, context: &str) -> Result<()> {
        let mut writer = PropertiesWriter::new(writer);
        let mut write = || -> std::result::Result<(), java_properties::PropertiesError> {
            for (key, value) in &self.entries {
                writer.write(key, value)?;
            }
            writer.finish()
        };
        write().map_err(|source| Error::PropertyFormat {
            context: format!("writing {context}"),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_none() {
            return Err(Error::Spec(format!("the property {key} was not found in the spec")));
        }
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.get(KEY_NAME)
    }

    pub fn version(&self) -> Option<&str> {
        self.get(KEY_VERSION)
    }

    /// Property keys to drop from inherited state, comma or newline separated
    pub fn exclusions(&self) -> Vec<String> {
        self.get(KEY_EXCLUSIONS)
            .map(|raw| {
                raw.split([',', '\n'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Produce a new spec with an additional exclusion appended
    pub fn with_exclusion(&self, exclusion: &str) -> Self {
        let mut ret = self.clone();
        let value = match self.get(KEY_EXCLUSIONS) {
            Some(existing) => format!("{existing},{exclusion}"),
            None => exclusion.to_string(),
        };
        ret.set(KEY_EXCLUSIONS, &value);
        ret
    }

    /// The parent distribution coordinates, if any. A parent artifact id
    /// requires both a group and a version.
    pub fn parent_artifact(&self) -> Result<Option<Artifact>> {
        let artifact_id = self.get(&format!("{PARENT_PREFIX}.{SUB_ARTIFACT_ID}"));
        let Some(artifact_id) = artifact_id.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let group_id = self.get(&format!("{PARENT_PREFIX}.{SUB_GROUP_ID}"));
        let version = self.get(&format!("{PARENT_PREFIX}.{KEY_VERSION}"));
        let (Some(group_id), Some(version)) = (
            group_id.filter(|s| !s.trim().is_empty()),
            version.filter(|s| !s.trim().is_empty()),
        ) else {
            return Err(Error::Spec(format!(
                "parent {artifact_id} must declare both a {PARENT_PREFIX}.{SUB_GROUP_ID} and a {PARENT_PREFIX}.{KEY_VERSION}"
            )));
        };
        let artifact_type = match self.get(&format!("{PARENT_PREFIX}.{SUB_TYPE}")) {
            Some(t) => parse_artifact_type(t)?,
            None => ArtifactType::Zip,
        };
        Ok(Some(Artifact::new(artifact_id, version, group_id, artifact_type)))
    }

    /// Classify a key as an artifact declaration: `<category>.<name>` where
    /// the final segment is not a reserved sub-key. Frontend keys are never
    /// declarations; the frontend artifact is assembled from its sub-keys.
    fn declaration(key: &str) -> Option<(Category, &str)> {
        let (prefix, name) = key.split_once('.')?;
        let category = Category::from_str(prefix).ok()?;
        if category == Category::Frontend || name.is_empty() {
            return None;
        }
        let last = name.rsplit('.').next().unwrap_or(name);
        if RESERVED_SUB_KEYS.contains(&last) {
            return None;
        }
        Some((category, name))
    }

    fn sub_key(&self, category: Category, name: &str, sub: &str) -> Option<&str> {
        self.get(&format!("{}.{name}.{sub}", category.prefix()))
    }

    /// All declarations for a category as (declared name, artifact) pairs,
    /// with suffix completion and default group/type inference applied.
    /// The declared name is the property key segment, which can differ from
    /// the artifact id when an `artifactId` sub-key overrides it; sub-key
    /// lookups and write-backs must use the declared name.
    pub fn declarations(&self, category: Category) -> Result<Vec<(String, Artifact)>> {
        let mut ret = Vec::new();
        for (key, version) in &self.entries {
            match Self::declaration(key) {
                Some((c, name)) if c == category => {
                    let artifact_id = match self.sub_key(category, name, SUB_ARTIFACT_ID) {
                        Some(id) => id.to_string(),
                        None => category.complete_name(name),
                    };
                    let group_id = self
                        .sub_key(category, name, SUB_GROUP_ID)
                        .unwrap_or_else(|| category.default_group());
                    let artifact_type = match self.sub_key(category, name, SUB_TYPE) {
                        Some(t) => parse_artifact_type(t)?,
                        None => category.default_type(),
                    };
                    ret.push((
                        name.to_string(),
                        Artifact::new(&artifact_id, version, group_id, artifact_type),
                    ));
                }
                _ => {}
            }
        }
        Ok(ret)
    }

    /// All artifacts declared for a category
    pub fn artifacts(&self, category: Category) -> Result<Vec<Artifact>> {
        Ok(self
            .declarations(category)?
            .into_iter()
            .map(|(_, artifact)| artifact)
            .collect())
    }

    /// The single core runtime artifact, if declared
    pub fn runtime_artifact(&self) -> Result<Option<Artifact>> {
        let mut artifacts = self.artifacts(Category::Runtime)?;
        if artifacts.len() > 1 {
            return Err(Error::Spec(
                "only a single runtime artifact can be declared".to_string(),
            ));
        }
        Ok(artifacts.pop())
    }

    /// The frontend bundle artifact, assembled from `frontend.*` sub-keys
    pub fn frontend_artifact(&self) -> Result<Option<Artifact>> {
        let prefix = Category::Frontend.prefix();
        let Some(artifact_id) = self.get(&format!("{prefix}.{SUB_ARTIFACT_ID}")) else {
            return Ok(None);
        };
        let Some(version) = self.get(&format!("{prefix}.{KEY_VERSION}")) else {
            return Err(Error::Spec(format!(
                "frontend artifact {artifact_id} must declare a {prefix}.{KEY_VERSION}"
            )));
        };
        let group_id = self
            .get(&format!("{prefix}.{SUB_GROUP_ID}"))
            .unwrap_or_else(|| Category::Frontend.default_group());
        let artifact_type = match self.get(&format!("{prefix}.{SUB_TYPE}")) {
            Some(t) => parse_artifact_type(t)?,
            None => Category::Frontend.default_type(),
        };
        Ok(Some(Artifact::new(artifact_id, version, group_id, artifact_type)))
    }

    /// Frontend build settings: every `frontend.*` key that is not part of
    /// the frontend artifact coordinates, with the prefix removed
    pub fn frontend_build_settings(&self) -> BTreeMap<String, String> {
        let artifact_keys = [SUB_ARTIFACT_ID, SUB_GROUP_ID, KEY_VERSION, SUB_TYPE, super::SUB_INCLUDES];
        let mut ret = self.with_prefix_removed(&format!("{}.", Category::Frontend.prefix()));
        ret.retain(|key, _| !artifact_keys.contains(&key.as_str()));
        ret
    }

    /// Content packages declared in this spec. The namespace defaults to
    /// the artifact id unless overridden (possibly to an empty value).
    pub fn content_packages(&self) -> Result<Vec<ContentPackage>> {
        let mut ret = Vec::new();
        for (name, artifact) in self.declarations(Category::Content)? {
            let namespace = match self.sub_key(Category::Content, &name, SUB_NAMESPACE) {
                Some(ns) => ns.to_string(),
                None => artifact.artifact_id.clone(),
            };
            ret.push(ContentPackage { artifact, namespace });
        }
        Ok(ret)
    }

    /// Template variable overrides (`var.*`), prefix removed
    pub fn variables(&self) -> BTreeMap<String, String> {
        self.with_prefix_removed(&format!("{VAR_PREFIX}."))
    }

    /// Free-form custom values (`property.*`), prefix removed
    pub fn custom_properties(&self) -> BTreeMap<String, String> {
        self.with_prefix_removed(&format!("{CUSTOM_PREFIX}."))
    }

    /// All properties starting with the given prefix, in a new map with the
    /// prefix removed
    pub fn with_prefix_removed(&self, prefix: &str) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect()
    }

    /// Declare an artifact, writing the sub-keys only when they differ from
    /// the category defaults
    pub fn set_artifact(&mut self, category: Category, artifact: &Artifact) {
        let base = format!("{}.{}", category.prefix(), artifact.base_name());
        self.set(&base, &artifact.version.to_string());
        if artifact.group_id != category.default_group() {
            self.set(&format!("{base}.{SUB_GROUP_ID}"), &artifact.group_id);
        } else {
            self.entries.remove(&format!("{base}.{SUB_GROUP_ID}"));
        }
        if artifact.artifact_type != category.default_type() {
            self.set(&format!("{base}.{SUB_TYPE}"), &artifact.artifact_type.to_string());
        } else {
            self.entries.remove(&format!("{base}.{SUB_TYPE}"));
        }
    }

    /// Drop an artifact declaration and all of its sub-keys
    pub fn remove_artifact(&mut self, category: Category, name: &str) {
        let base = format!("{}.{name}", category.prefix());
        let sub_prefix = format!("{base}.");
        self.entries
            .retain(|key, _| key != &base && !key.starts_with(&sub_prefix));
    }
}

fn parse_artifact_type(value: &str) -> Result<ArtifactType> {
    ArtifactType::from_str(value)
        .map_err(|_| Error::Spec(format!("unknown artifact type: {value}")))
}
