// src/distribution/mod.rs

//! Distribution resolution.
//!
//! A distribution spec can point at a parent distribution, inherit its
//! declarations, exclude some of them and override the rest. Resolution
//! walks the parent chain, merges the flat properties into a single
//! effective set, pins LATEST/LATEST-SNAPSHOT requirements to concrete
//! versions from the artifact store, and extracts the typed collections
//! the rest of the engine consumes.

use crate::artifact::{Artifact, Category};
use crate::content::ContentPackage;
use crate::error::{Error, Result};
use crate::spec::{SpecProperties, KEY_VERSION, PARENT_PREFIX, SPEC_FILE_NAME};
use crate::store::ArtifactStore;
use crate::version::{latest_released, latest_snapshot, VersionRequirement};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// A fully resolved distribution with its inheritance chain
#[derive(Debug, Clone)]
pub struct Distribution {
    pub name: String,
    pub version: Option<String>,
    /// Coordinates the spec was fetched from, when it came from the store
    pub artifact: Option<Artifact>,
    /// The spec as declared, before inheritance
    pub properties: SpecProperties,
    pub effective: EffectiveDistribution,
    pub parent: Option<Box<Distribution>>,
}

/// The typed view of a distribution after inheritance and version pinning
#[derive(Debug, Clone, Default)]
pub struct EffectiveDistribution {
    pub properties: SpecProperties,
    pub runtime: Option<Artifact>,
    pub modules: Vec<Artifact>,
    pub apps: Vec<Artifact>,
    pub frontend: Option<Artifact>,
    pub frontend_build: BTreeMap<String, String>,
    pub configs: Vec<Artifact>,
    pub content: Vec<ContentPackage>,
    pub variables: BTreeMap<String, String>,
    pub custom: BTreeMap<String, String>,
}

impl EffectiveDistribution {
    /// Extract the typed collections from an already merged and pinned
    /// property set. Pure; never touches the store.
    pub fn from_properties(properties: &SpecProperties) -> Result<Self> {
        Ok(Self {
            properties: properties.clone(),
            runtime: properties.runtime_artifact()?,
            modules: properties.artifacts(Category::Module)?,
            apps: properties.artifacts(Category::App)?,
            frontend: properties.frontend_artifact()?,
            frontend_build: properties.frontend_build_settings(),
            configs: properties.artifacts(Category::Config)?,
            content: properties.content_packages()?,
            variables: properties.variables(),
            custom: properties.custom_properties(),
        })
    }
}

/// Resolves distribution specs against an artifact store
pub struct DistributionResolver<'a, S: ArtifactStore> {
    store: &'a S,
}

impl<'a, S: ArtifactStore> DistributionResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve a spec file on disk
    pub fn resolve_file(&self, path: &Path) -> Result<Distribution> {
        let properties = SpecProperties::load(path)?;
        self.resolve_properties(properties, None, &mut Vec::new())
    }

    /// Resolve a distribution published in the artifact store. The artifact
    /// must unpack to a directory with a spec file at its root.
    pub fn resolve_artifact(&self, artifact: &Artifact) -> Result<Distribution> {
        self.resolve_artifact_chained(artifact, &mut Vec::new())
    }

    fn resolve_artifact_chained(
        &self,
        artifact: &Artifact,
        chain: &mut Vec<String>,
    ) -> Result<Distribution> {
        let scratch = TempDir::new()?;
        let root = self.store.fetch(artifact, scratch.path(), true)?;
        let spec_path = root.join(SPEC_FILE_NAME);
        if !spec_path.is_file() {
            return Err(Error::Spec(format!(
                "distribution {artifact} does not contain a {SPEC_FILE_NAME} file"
            )));
        }
        let properties = SpecProperties::load(&spec_path)?;
        self.resolve_properties(properties, Some(artifact.clone()), chain)
    }

    fn resolve_properties(
        &self,
        properties: SpecProperties,
        artifact: Option<Artifact>,
        chain: &mut Vec<String>,
    ) -> Result<Distribution> {
        let link = artifact
            .as_ref()
            .map(|a| a.key())
            .or_else(|| properties.name().map(String::from))
            .unwrap_or_else(|| "<unnamed>".to_string());
        if chain.contains(&link) {
            chain.push(link);
            return Err(Error::CyclicParentChain(chain.join(" -> ")));
        }
        chain.push(link);

        let parent = match properties.parent_artifact()? {
            Some(parent_artifact) => {
                debug!(parent = %parent_artifact, "resolving parent distribution");
                Some(Box::new(self.resolve_artifact_chained(&parent_artifact, chain)?))
            }
            None => None,
        };

        let merged = merge_with_parent(&properties, parent.as_deref());
        let pinned = self.pin_version_keywords(merged)?;
        let effective = EffectiveDistribution::from_properties(&pinned)?;

        Ok(Distribution {
            name: properties
                .name()
                .map(String::from)
                .unwrap_or_else(|| "<unnamed>".to_string()),
            version: properties.version().map(String::from),
            artifact,
            properties,
            effective,
            parent,
        })
    }

    /// Replace every LATEST/LATEST-SNAPSHOT artifact version with a concrete
    /// version from the store. Pinning writes back to the key the version
    /// was declared under, which is not derivable from the artifact id when
    /// an `artifactId` sub-key overrides it.
    fn pin_version_keywords(&self, properties: SpecProperties) -> Result<SpecProperties> {
        let mut pinned = properties.clone();
        for (key, artifact) in category_declarations(&properties)? {
            let requirement = VersionRequirement::parse(&artifact.version.to_string());
            if let VersionRequirement::Exact(_) = requirement {
                continue;
            }
            let available = self
                .store
                .list_versions(&artifact.group_id, &artifact.artifact_id)?;
            let selected = match requirement {
                VersionRequirement::LatestSnapshot => latest_snapshot(&available),
                _ => latest_released(&available),
            };
            let selected = selected
                .ok_or_else(|| Error::NoVersionAvailable(artifact.key()))?;
            debug!(artifact = %artifact.key(), version = %selected, "pinned version keyword");
            pinned.set(&key, &selected.to_string());
        }
        Ok(pinned)
    }
}

/// Every artifact declaration paired with the property key its version is
/// declared under
fn category_declarations(properties: &SpecProperties) -> Result<Vec<(String, Artifact)>> {
    let mut ret = Vec::new();
    for category in Category::ALL {
        if category == Category::Frontend {
            if let Some(artifact) = properties.frontend_artifact()? {
                ret.push((
                    format!("{}.{KEY_VERSION}", Category::Frontend.prefix()),
                    artifact,
                ));
            }
        } else {
            for (name, artifact) in properties.declarations(category)? {
                ret.push((format!("{}.{name}", category.prefix()), artifact));
            }
        }
    }
    Ok(ret)
}

/// Overlay a child spec onto its parent's effective properties. Inherited
/// keys named by the child's exclusions are dropped, then every key the
/// child physically declares wins. Parent pointer keys never propagate.
fn merge_with_parent(child: &SpecProperties, parent: Option<&Distribution>) -> SpecProperties {
    let Some(parent) = parent else {
        return strip_parent_keys(child);
    };

    let mut merged: BTreeMap<String, String> = parent
        .effective
        .properties
        .entries()
        .iter()
        .filter(|(key, _)| !is_parent_key(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for excluded in child.exclusions() {
        merged.remove(&excluded);
    }

    for (key, value) in child.entries() {
        if is_parent_key(key) {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }

    SpecProperties::from_entries(merged)
}

fn strip_parent_keys(properties: &SpecProperties) -> SpecProperties {
    SpecProperties::from_entries(
        properties
            .entries()
            .iter()
            .filter(|(key, _)| !is_parent_key(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn is_parent_key(key: &str) -> bool {
    key == PARENT_PREFIX || key.starts_with(&format!("{PARENT_PREFIX}."))
}
