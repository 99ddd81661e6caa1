// src/resolver/mod.rs

//! Transitive module resolution.
//!
//! Starting from a set of requested modules, fetches each one, reads its
//! descriptor for required modules, and keeps going until the closure is
//! complete. Coordinates of a requirement are not fully known up front, so
//! each module is probed across a small set of candidate groups and
//! packaging types; only a not-found answer advances the probe. When the
//! same module is required at several versions the highest one wins.

use crate::artifact::{
    Artifact, ArtifactType, Category, GROUP_BASE, GROUP_MODULE,
};
use crate::error::{Error, Result};
use crate::spec::SpecProperties;
use crate::store::{ArtifactStore, StoreError};
use crate::version::Version;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

/// File inside a module artifact describing the module and its requirements
pub const MODULE_DESCRIPTOR_NAME: &str = "module.xml";

/// A module requirement read from a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequirement {
    /// Fully qualified module uid, e.g. `org.distroforge.module.reporting`
    pub uid: String,
    /// Minimum required version, when the descriptor declares one
    pub min_version: Option<Version>,
}

/// A module the resolver could not pin down, with the reason why
#[derive(Debug, Clone)]
pub struct UnresolvedModule {
    pub artifact: Artifact,
    pub reason: String,
}

/// Outcome of a transitive resolution
#[derive(Debug, Clone, Default)]
pub struct ResolvedModules {
    /// Resolved modules keyed by artifact id
    pub resolved: BTreeMap<String, Artifact>,
    /// Requirements that could not be located, keyed by artifact id
    pub unresolved: BTreeMap<String, UnresolvedModule>,
}

impl ResolvedModules {
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Synthesize a distribution spec declaring the resolved closure on top
    /// of the given core runtime
    pub fn to_spec_properties(&self, name: &str, version: &str, runtime: &Artifact) -> SpecProperties {
        let mut properties = SpecProperties::new(name, version);
        properties.set_artifact(Category::Runtime, runtime);
        for artifact in self.resolved.values() {
            properties.set_artifact(Category::Module, artifact);
        }
        properties
    }
}

/// Resolves module closures against an artifact store
pub struct ModuleResolver<'a, S: ArtifactStore> {
    store: &'a S,
    probe_groups: Vec<String>,
    probe_types: Vec<ArtifactType>,
}

// Uid prefixes mapped to the group their artifacts are published under,
// longest prefix first.
const UID_GROUPS: [(&str, &str); 2] = [
    ("org.distroforge.module.", GROUP_MODULE),
    ("org.distroforge.", GROUP_BASE),
];

impl<'a, S: ArtifactStore> ModuleResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            probe_groups: vec![GROUP_MODULE.to_string(), GROUP_BASE.to_string()],
            probe_types: vec![ArtifactType::Jar, ArtifactType::Zip],
        }
    }

    /// Override the candidate groups probed for requirements whose group is
    /// not fixed by their uid
    pub fn with_probe_groups(mut self, groups: Vec<String>) -> Self {
        self.probe_groups = groups;
        self
    }

    /// Resolve the transitive closure of the given starting modules
    pub fn resolve(&self, starting: &[Artifact]) -> Result<ResolvedModules> {
        let scratch = TempDir::new()?;
        let mut outcome = ResolvedModules::default();
        let mut queue: VecDeque<Artifact> = starting
            .iter()
            .map(|a| {
                let mut a = a.clone();
                a.artifact_id = Category::Module.complete_name(&a.artifact_id);
                a
            })
            .collect();

        while let Some(candidate) = queue.pop_front() {
            if let Some(existing) = outcome.resolved.get(&candidate.artifact_id) {
                if existing.version >= candidate.version {
                    debug!(module = %candidate.artifact_id, "already resolved at an equal or higher version");
                    continue;
                }
            }
            match self.probe(&candidate, scratch.path()) {
                Ok((located, requirements)) => {
                    outcome.unresolved.remove(&located.artifact_id);
                    outcome
                        .resolved
                        .insert(located.artifact_id.clone(), located);
                    for requirement in requirements {
                        match requirement_to_artifact(&requirement) {
                            Some(required) => queue.push_back(required),
                            None => {
                                warn!(uid = %requirement.uid, "requirement uid is not supported");
                                let id = requirement.uid.clone();
                                outcome.unresolved.entry(id).or_insert(UnresolvedModule {
                                    artifact: Artifact::new(
                                        &requirement.uid,
                                        &requirement
                                            .min_version
                                            .as_ref()
                                            .map(Version::to_string)
                                            .unwrap_or_default(),
                                        "",
                                        ArtifactType::Jar,
                                    ),
                                    reason: "unsupported module uid".to_string(),
                                });
                            }
                        }
                    }
                }
                Err(reason) => {
                    warn!(module = %candidate.artifact_id, %reason, "module could not be resolved");
                    outcome.unresolved.insert(
                        candidate.artifact_id.clone(),
                        UnresolvedModule {
                            artifact: candidate,
                            reason,
                        },
                    );
                }
            }
        }

        // A module may have been unresolvable at one point of the walk and
        // located later through another requirement.
        let resolved_ids: Vec<String> = outcome.resolved.keys().cloned().collect();
        for id in resolved_ids {
            outcome.unresolved.remove(&id);
        }
        Ok(outcome)
    }

    /// Try every candidate (group, type) pair until the module is found.
    /// Returns the located artifact and its descriptor requirements, or a
    /// human-readable reason on failure.
    fn probe(
        &self,
        candidate: &Artifact,
        scratch: &Path,
    ) -> std::result::Result<(Artifact, Vec<ModuleRequirement>), String> {
        // The declared group is only a first guess; modules have been
        // published under more than one group convention, so a miss falls
        // through to the remaining candidates.
        let mut groups: Vec<&str> = Vec::new();
        if !candidate.group_id.is_empty() {
            groups.push(candidate.group_id.as_str());
        }
        for group in &self.probe_groups {
            if !groups.contains(&group.as_str()) {
                groups.push(group.as_str());
            }
        }

        let mut last_miss = String::new();
        for group in groups {
            for artifact_type in &self.probe_types {
                let mut attempt = candidate.clone();
                attempt.group_id = group.to_string();
                attempt.artifact_type = *artifact_type;
                let dest = scratch.join(attempt.dest_file_name());
                match self.store.fetch(&attempt, &dest, true) {
                    Ok(root) => {
                        let descriptor = root.join(MODULE_DESCRIPTOR_NAME);
                        let requirements = if descriptor.is_file() {
                            parse_module_descriptor(&descriptor)
                                .map_err(|e| e.to_string())?
                        } else {
                            Vec::new()
                        };
                        return Ok((attempt, requirements));
                    }
                    Err(StoreError::NotFound(what)) => {
                        last_miss = what;
                    }
                    Err(other) => return Err(other.to_string()),
                }
            }
        }
        Err(format!("not found in any candidate location, last tried {last_miss}"))
    }
}

/// Map a descriptor requirement to probe-able coordinates. Returns None for
/// uids outside the supported namespaces.
fn requirement_to_artifact(requirement: &ModuleRequirement) -> Option<Artifact> {
    for (prefix, group) in UID_GROUPS {
        if let Some(name) = requirement.uid.strip_prefix(prefix) {
            if name.is_empty() {
                return None;
            }
            let artifact_id = Category::Module.complete_name(name);
            let version = requirement
                .min_version
                .as_ref()
                .map(Version::to_string)
                .unwrap_or_default();
            return Some(Artifact::new(&artifact_id, &version, group, ArtifactType::Jar));
        }
    }
    None
}

/// Parse the `<requires>` section of a module descriptor
pub fn parse_module_descriptor(path: &Path) -> Result<Vec<ModuleRequirement>> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let descriptor_error = |reason: String| Error::Descriptor {
        path: path.display().to_string(),
        reason,
    };

    let mut requirements = Vec::new();
    let mut buf = Vec::new();
    let mut in_requires = false;
    let mut pending_version: Option<Version> = None;
    let mut in_required_module = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| descriptor_error(e.to_string()))?
        {
            Event::Start(e) => match e.name().as_ref() {
                b"requires" => in_requires = true,
                b"module" if in_requires => {
                    in_required_module = true;
                    pending_version = e
                        .try_get_attribute("version")
                        .map_err(|e| descriptor_error(e.to_string()))?
                        .map(|attr| {
                            attr.unescape_value()
                                .map(|v| Version::parse(&v))
                                .map_err(|e| descriptor_error(e.to_string()))
                        })
                        .transpose()?;
                }
                _ => {}
            },
            Event::Text(text) if in_required_module => {
                let uid = text
                    .unescape()
                    .map_err(|e| descriptor_error(e.to_string()))?
                    .trim()
                    .to_string();
                if !uid.is_empty() {
                    requirements.push(ModuleRequirement {
                        uid,
                        min_version: pending_version.take(),
                    });
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"requires" => in_requires = false,
                b"module" if in_required_module => {
                    in_required_module = false;
                    pending_version = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(requirements)
}
