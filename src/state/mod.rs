// src/state/mod.rs

//! Deployed state snapshot.
//!
//! After installation a deployment records the effective distribution it was
//! built from, in the same flat property format the spec uses. The snapshot
//! is the "old" side of every upgrade computation.

use crate::artifact::{Artifact, Category};
use crate::content::ContentPackage;
use crate::distribution::EffectiveDistribution;
use crate::error::Result;
use crate::spec::SpecProperties;
use std::collections::BTreeMap;
use std::path::Path;

/// The recorded state of a deployed distribution
#[derive(Debug, Clone, Default)]
pub struct DeployedState {
    pub runtime: Option<Artifact>,
    pub modules: Vec<Artifact>,
    pub apps: Vec<Artifact>,
    pub frontend: Option<Artifact>,
    pub frontend_build: BTreeMap<String, String>,
    pub configs: Vec<Artifact>,
    pub content: Vec<ContentPackage>,
    pub properties: SpecProperties,
}

impl DeployedState {
    /// Snapshot an effective distribution as the new deployed state
    pub fn from_effective(effective: &EffectiveDistribution) -> Self {
        Self {
            runtime: effective.runtime.clone(),
            modules: effective.modules.clone(),
            apps: effective.apps.clone(),
            frontend: effective.frontend.clone(),
            frontend_build: effective.frontend_build.clone(),
            configs: effective.configs.clone(),
            content: effective.content.clone(),
            properties: effective.properties.clone(),
        }
    }

    /// Load a previously saved snapshot
    pub fn load(path: &Path) -> Result<Self> {
        let properties = SpecProperties::load(path)?;
        Self::from_properties(properties)
    }

    fn from_properties(properties: SpecProperties) -> Result<Self> {
        Ok(Self {
            runtime: properties.runtime_artifact()?,
            modules: properties.artifacts(Category::Module)?,
            apps: properties.artifacts(Category::App)?,
            frontend: properties.frontend_artifact()?,
            frontend_build: properties.frontend_build_settings(),
            configs: properties.artifacts(Category::Config)?,
            content: properties.content_packages()?,
            properties,
        })
    }

    /// Persist the snapshot as `distro.properties` under `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.properties.save(dir)
    }

    /// True when nothing is deployed at all
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none()
            && self.frontend.is_none()
            && self.modules.is_empty()
            && self.apps.is_empty()
            && self.configs.is_empty()
            && self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        assert!(DeployedState::default().is_empty());
    }

    #[test]
    fn test_from_properties_extracts_collections() {
        let mut properties = SpecProperties::new("emr", "3.0.0");
        properties.set("runtime.platform", "2.7.0");
        properties.set("module.reporting", "1.0.0");
        properties.set("content.hiv", "1.2.0");
        let state = DeployedState::from_properties(properties).unwrap();
        assert!(!state.is_empty());
        assert!(state.runtime.is_some());
        assert_eq!(state.modules.len(), 1);
        assert_eq!(state.content.len(), 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut properties = SpecProperties::new("emr", "3.0.0");
        properties.set("module.reporting", "1.0.0");
        let state = DeployedState::from_properties(properties).unwrap();
        state.save(dir.path()).unwrap();

        let reloaded = DeployedState::load(&dir.path().join("distro.properties")).unwrap();
        assert_eq!(reloaded.modules.len(), 1);
        assert_eq!(reloaded.properties, state.properties);
    }
}
