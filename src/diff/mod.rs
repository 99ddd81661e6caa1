// src/diff/mod.rs

//! Upgrade differencing.
//!
//! Compares a deployed state against a target effective distribution and
//! produces, per category, the artifacts to add, remove, upgrade or
//! downgrade, plus the frontend build setting changes. Artifacts are keyed
//! by their group and base name, so a version bump is a single upgrade
//! entry rather than a remove/add pair.

use crate::artifact::{Artifact, Category};
use crate::distribution::EffectiveDistribution;
use crate::error::{Error, Result};
use crate::state::DeployedState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Artifact-level changes within one category
#[derive(Debug, Clone, Default)]
pub struct ArtifactChanges {
    pub added: Vec<Artifact>,
    pub removed: Vec<Artifact>,
    /// Pairs of (deployed, target) where the target version is higher, or
    /// where both sides are snapshots of the same version
    pub upgraded: Vec<(Artifact, Artifact)>,
    pub downgraded: Vec<(Artifact, Artifact)>,
}

impl ArtifactChanges {
    /// Diff two artifact collections keyed by `group:base-name`. Equal
    /// versions are unchanged.
    pub fn between(old: &[Artifact], new: &[Artifact]) -> Self {
        Self::between_with(old, new, false)
    }

    /// Like [`ArtifactChanges::between`], but when `refresh_snapshots` is
    /// set an identical snapshot version on both sides still counts as an
    /// upgrade, forcing a re-fetch of the moving artifact.
    pub fn between_with(old: &[Artifact], new: &[Artifact], refresh_snapshots: bool) -> Self {
        let old_by_key: BTreeMap<(String, String), &Artifact> = old
            .iter()
            .map(|a| ((a.group_id.clone(), a.base_name().to_string()), a))
            .collect();
        let new_by_key: BTreeMap<(String, String), &Artifact> = new
            .iter()
            .map(|a| ((a.group_id.clone(), a.base_name().to_string()), a))
            .collect();

        let mut changes = Self::default();
        for (key, target) in &new_by_key {
            match old_by_key.get(key) {
                None => changes.added.push((*target).clone()),
                Some(deployed) => {
                    if target.version > deployed.version {
                        changes.upgraded.push(((*deployed).clone(), (*target).clone()));
                    } else if target.version < deployed.version {
                        changes
                            .downgraded
                            .push(((*deployed).clone(), (*target).clone()));
                    } else if refresh_snapshots
                        && target.version.is_snapshot()
                        && deployed.version.is_snapshot()
                    {
                        changes.upgraded.push(((*deployed).clone(), (*target).clone()));
                    }
                }
            }
        }
        for (key, deployed) in &old_by_key {
            if !new_by_key.contains_key(key) {
                changes.removed.push((*deployed).clone());
            }
        }
        changes
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.upgraded.is_empty()
            || !self.downgraded.is_empty()
    }

    /// Deployed artifacts that must be deleted before installing
    pub fn artifacts_to_remove(&self) -> Vec<Artifact> {
        self.removed
            .iter()
            .chain(self.upgraded.iter().map(|(old, _)| old))
            .chain(self.downgraded.iter().map(|(old, _)| old))
            .cloned()
            .collect()
    }

    /// Target artifacts that must be fetched and installed
    pub fn artifacts_to_add(&self) -> Vec<Artifact> {
        self.added
            .iter()
            .chain(self.upgraded.iter().map(|(_, new)| new))
            .chain(self.downgraded.iter().map(|(_, new)| new))
            .cloned()
            .collect()
    }
}

/// Key-value changes between two flat setting maps
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    pub added: BTreeMap<String, String>,
    pub removed: BTreeMap<String, String>,
    /// Key to (deployed value, target value)
    pub changed: BTreeMap<String, (String, String)>,
}

impl PropertyChanges {
    pub fn between(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Self {
        let mut changes = Self::default();
        for (key, target) in new {
            match old.get(key) {
                None => {
                    changes.added.insert(key.clone(), target.clone());
                }
                Some(deployed) if deployed != target => {
                    changes
                        .changed
                        .insert(key.clone(), (deployed.clone(), target.clone()));
                }
                Some(_) => {}
            }
        }
        for (key, deployed) in old {
            if !new.contains_key(key) {
                changes.removed.insert(key.clone(), deployed.clone());
            }
        }
        changes
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.changed.is_empty()
    }

    /// True when any incoming value is a floating placeholder that will only
    /// settle at build time
    pub fn has_unresolved_versions(&self) -> bool {
        self.added
            .values()
            .chain(self.changed.values().map(|(_, new)| new))
            .any(|v| v.eq_ignore_ascii_case("next") || v.eq_ignore_ascii_case("snapshot"))
    }
}

/// Knobs controlling plan computation
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Remove deployed modules and apps the target no longer declares.
    /// Off by default; undeclared modules are left in place.
    pub remove_undeclared_modules: bool,
    /// Remove deployed config and content artifacts the target no longer
    /// declares. On by default, since the configuration tree is rebuilt
    /// from the target distribution.
    pub remove_undeclared_configs: bool,
    /// Treat an unchanged snapshot version as an upgrade so the artifact is
    /// fetched again. Off by default; identical collections then always
    /// yield an empty plan.
    pub refresh_snapshots: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            remove_undeclared_modules: false,
            remove_undeclared_configs: true,
            refresh_snapshots: false,
        }
    }
}

/// Direction of a single change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Add,
    Remove,
    Upgrade,
    Downgrade,
}

/// One human-readable line of an upgrade plan summary
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub category: Category,
    pub name: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub direction: ChangeDirection,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old_version, &self.new_version) {
            (Some(old), Some(new)) => {
                write!(f, "{} {} {} -> {}", self.category, self.name, old, new)
            }
            (None, Some(new)) => write!(f, "+ {} {} {}", self.category, self.name, new),
            (Some(old), None) => write!(f, "- {} {} {}", self.category, self.name, old),
            (None, None) => write!(f, "{} {}", self.category, self.name),
        }
    }
}

/// The complete set of changes needed to move a deployment to a target
/// distribution
#[derive(Debug, Clone, Default)]
pub struct UpgradePlan {
    pub runtime: ArtifactChanges,
    pub modules: ArtifactChanges,
    pub apps: ArtifactChanges,
    pub frontend: ArtifactChanges,
    pub frontend_build: PropertyChanges,
    pub configs: ArtifactChanges,
    pub content: ArtifactChanges,
}

impl UpgradePlan {
    /// Compute the plan from deployed state to target distribution. The core
    /// runtime can be replaced but never removed.
    pub fn compute(
        state: &DeployedState,
        target: &EffectiveDistribution,
        options: DiffOptions,
    ) -> Result<Self> {
        if state.runtime.is_some() && target.runtime.is_none() {
            return Err(Error::RuntimeRemoval);
        }

        let as_slice = |a: &Option<Artifact>| a.clone().into_iter().collect::<Vec<_>>();
        let target_content: Vec<Artifact> =
            target.content.iter().map(|c| c.artifact.clone()).collect();
        let state_content: Vec<Artifact> =
            state.content.iter().map(|c| c.artifact.clone()).collect();

        let refresh = options.refresh_snapshots;
        let mut plan = Self {
            runtime: ArtifactChanges::between_with(
                &as_slice(&state.runtime),
                &as_slice(&target.runtime),
                refresh,
            ),
            modules: ArtifactChanges::between_with(&state.modules, &target.modules, refresh),
            apps: ArtifactChanges::between_with(&state.apps, &target.apps, refresh),
            frontend: ArtifactChanges::between_with(
                &as_slice(&state.frontend),
                &as_slice(&target.frontend),
                refresh,
            ),
            frontend_build: PropertyChanges::between(&state.frontend_build, &target.frontend_build),
            configs: ArtifactChanges::between_with(&state.configs, &target.configs, refresh),
            content: ArtifactChanges::between_with(&state_content, &target_content, refresh),
        };

        if !options.remove_undeclared_modules {
            plan.modules.removed.clear();
            plan.apps.removed.clear();
        }
        if !options.remove_undeclared_configs {
            plan.configs.removed.clear();
            plan.content.removed.clear();
        }

        Ok(plan)
    }

    pub fn has_changes(&self) -> bool {
        self.runtime.has_changes()
            || self.modules.has_changes()
            || self.apps.has_changes()
            || self.frontend.has_changes()
            || self.frontend_build.has_changes()
            || self.configs.has_changes()
            || self.content.has_changes()
    }

    /// Flatten the plan into displayable change records, grouped by category
    pub fn summary(&self) -> Vec<ChangeRecord> {
        let mut records = Vec::new();
        let sections = [
            (Category::Runtime, &self.runtime),
            (Category::Module, &self.modules),
            (Category::App, &self.apps),
            (Category::Frontend, &self.frontend),
            (Category::Config, &self.configs),
            (Category::Content, &self.content),
        ];
        for (category, changes) in sections {
            for a in &changes.added {
                records.push(ChangeRecord {
                    category,
                    name: a.base_name().to_string(),
                    old_version: None,
                    new_version: Some(a.version.to_string()),
                    direction: ChangeDirection::Add,
                });
            }
            for a in &changes.removed {
                records.push(ChangeRecord {
                    category,
                    name: a.base_name().to_string(),
                    old_version: Some(a.version.to_string()),
                    new_version: None,
                    direction: ChangeDirection::Remove,
                });
            }
            for (old, new) in &changes.upgraded {
                records.push(ChangeRecord {
                    category,
                    name: new.base_name().to_string(),
                    old_version: Some(old.version.to_string()),
                    new_version: Some(new.version.to_string()),
                    direction: ChangeDirection::Upgrade,
                });
            }
            for (old, new) in &changes.downgraded {
                records.push(ChangeRecord {
                    category,
                    name: new.base_name().to_string(),
                    old_version: Some(old.version.to_string()),
                    new_version: Some(new.version.to_string()),
                    direction: ChangeDirection::Downgrade,
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactType, GROUP_MODULE, GROUP_WEB};

    fn module(name: &str, version: &str) -> Artifact {
        Artifact::new(
            &Category::Module.complete_name(name),
            version,
            GROUP_MODULE,
            ArtifactType::Jar,
        )
    }

    #[test]
    fn test_between_classifies_changes() {
        let old = vec![
            module("reporting", "1.0.0"),
            module("legacy", "0.9.0"),
            module("labs", "2.0.0"),
        ];
        let new = vec![
            module("reporting", "1.5.0"),
            module("labs", "1.0.0"),
            module("orders", "3.0.0"),
        ];
        let changes = ArtifactChanges::between(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added[0].base_name(), "orders");
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(changes.removed[0].base_name(), "legacy");
        assert_eq!(changes.upgraded.len(), 1);
        assert_eq!(changes.upgraded[0].1.version.to_string(), "1.5.0");
        assert_eq!(changes.downgraded.len(), 1);
        assert_eq!(changes.downgraded[0].1.version.to_string(), "1.0.0");
    }

    #[test]
    fn test_identical_collections_yield_no_changes() {
        let released = vec![module("reporting", "1.0.0")];
        assert!(!ArtifactChanges::between(&released, &released).has_changes());

        let snapshot = vec![module("reporting", "1.0.0-SNAPSHOT")];
        assert!(!ArtifactChanges::between(&snapshot, &snapshot).has_changes());
    }

    #[test]
    fn test_snapshot_refresh_forces_an_upgrade() {
        let snapshot = vec![module("reporting", "1.0.0-SNAPSHOT")];
        let changes = ArtifactChanges::between_with(&snapshot, &snapshot, true);
        assert_eq!(changes.upgraded.len(), 1);

        // Released versions are never refreshed.
        let released = vec![module("reporting", "1.0.0")];
        assert!(!ArtifactChanges::between_with(&released, &released, true).has_changes());
    }

    #[test]
    fn test_suffix_difference_does_not_split_identity() {
        // A deployed artifact recorded without its publishing suffix still
        // matches the completed declaration.
        let old = vec![Artifact::new("reporting", "1.0.0", GROUP_MODULE, ArtifactType::Jar)];
        let new = vec![module("reporting", "1.5.0")];
        let changes = ArtifactChanges::between(&old, &new);
        assert_eq!(changes.upgraded.len(), 1);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_to_add_and_to_remove() {
        let old = vec![module("reporting", "1.0.0"), module("legacy", "0.9.0")];
        let new = vec![module("reporting", "1.5.0"), module("orders", "3.0.0")];
        let changes = ArtifactChanges::between(&old, &new);
        let to_remove: Vec<String> = changes
            .artifacts_to_remove()
            .iter()
            .map(|a| a.dest_file_name())
            .collect();
        assert!(to_remove.contains(&"legacy-0.9.0.jar".to_string()));
        assert!(to_remove.contains(&"reporting-1.0.0.jar".to_string()));
        let to_add: Vec<String> = changes
            .artifacts_to_add()
            .iter()
            .map(|a| a.dest_file_name())
            .collect();
        assert!(to_add.contains(&"orders-3.0.0.jar".to_string()));
        assert!(to_add.contains(&"reporting-1.5.0.jar".to_string()));
    }

    #[test]
    fn test_property_changes() {
        let old = BTreeMap::from([
            ("apiUrl".to_string(), "/api".to_string()),
            ("gone".to_string(), "x".to_string()),
        ]);
        let new = BTreeMap::from([
            ("apiUrl".to_string(), "/ws/api".to_string()),
            ("fresh".to_string(), "y".to_string()),
        ]);
        let changes = PropertyChanges::between(&old, &new);
        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(
            changes.changed.get("apiUrl"),
            Some(&("/api".to_string(), "/ws/api".to_string()))
        );
        assert!(!changes.has_unresolved_versions());
    }

    #[test]
    fn test_unresolved_version_placeholders() {
        let old = BTreeMap::new();
        let new = BTreeMap::from([("frontendModules.@acme/esm-home".to_string(), "next".to_string())]);
        assert!(PropertyChanges::between(&old, &new).has_unresolved_versions());

        let new = BTreeMap::from([("core".to_string(), "SNAPSHOT".to_string())]);
        assert!(PropertyChanges::between(&old, &new).has_unresolved_versions());
    }

    #[test]
    fn test_runtime_removal_is_rejected() {
        let state = DeployedState {
            runtime: Some(Artifact::new(
                "platform-webapp",
                "2.6.0",
                GROUP_WEB,
                ArtifactType::War,
            )),
            ..Default::default()
        };
        let target = EffectiveDistribution::default();
        assert!(matches!(
            UpgradePlan::compute(&state, &target, DiffOptions::default()),
            Err(Error::RuntimeRemoval)
        ));
    }

    #[test]
    fn test_remove_undeclared_module_policy() {
        let state = DeployedState {
            modules: vec![module("legacy", "0.9.0")],
            ..Default::default()
        };
        let target = EffectiveDistribution::default();

        let keep = UpgradePlan::compute(&state, &target, DiffOptions::default()).unwrap();
        assert!(keep.modules.removed.is_empty());
        assert!(!keep.has_changes());

        let drop = UpgradePlan::compute(
            &state,
            &target,
            DiffOptions {
                remove_undeclared_modules: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(drop.modules.removed.len(), 1);
    }

    #[test]
    fn test_undeclared_configs_are_removed_by_default() {
        let state = DeployedState {
            configs: vec![Artifact::new(
                "legacy-config",
                "1.0.0",
                crate::artifact::GROUP_DISTRO,
                ArtifactType::Zip,
            )],
            ..Default::default()
        };
        let target = EffectiveDistribution::default();
        let plan = UpgradePlan::compute(&state, &target, DiffOptions::default()).unwrap();
        assert_eq!(plan.configs.removed.len(), 1);
    }

    #[test]
    fn test_summary_records() {
        let state = DeployedState {
            modules: vec![module("reporting", "1.0.0")],
            ..Default::default()
        };
        let mut target = EffectiveDistribution::default();
        target.modules = vec![module("reporting", "1.5.0"), module("orders", "3.0.0")];
        let plan = UpgradePlan::compute(&state, &target, DiffOptions::default()).unwrap();
        let summary = plan.summary();
        assert_eq!(summary.len(), 2);
        assert!(summary
            .iter()
            .any(|r| r.direction == ChangeDirection::Upgrade && r.name == "reporting"));
        assert!(summary
            .iter()
            .any(|r| r.direction == ChangeDirection::Add && r.name == "orders"));
        let upgrade = summary
            .iter()
            .find(|r| r.direction == ChangeDirection::Upgrade)
            .unwrap();
        assert_eq!(upgrade.to_string(), "module reporting 1.0.0 -> 1.5.0");
    }
}
