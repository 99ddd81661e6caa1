// src/content/validate.rs

//! Content dependency validation.
//!
//! Content packages declare semver ranges for the modules, apps and other
//! packages they need. Validation checks every declared range against what
//! the effective distribution actually provides.

use super::{ContentPackage, ContentProperties};
use crate::artifact::{Artifact, Category};
use crate::distribution::EffectiveDistribution;
use crate::error::{Error, Result};
use crate::version::Version;
use std::fmt;

/// One unsatisfied content dependency
#[derive(Debug, Clone)]
pub struct MissingDependency {
    /// The content package declaring the requirement
    pub dependent: String,
    pub required_category: Category,
    pub required: String,
    pub required_range: String,
    /// Version present in the distribution, when the artifact exists at all
    pub current_version: Option<String>,
}

impl fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requires {} {} version {} but found {}",
            self.dependent,
            self.required_category,
            self.required,
            self.required_range,
            self.current_version.as_deref().unwrap_or("nothing")
        )
    }
}

/// Check whether a version satisfies a declared range. A blank range never
/// matches and the `next` placeholder always does. Pre-release versions are
/// additionally matched with the pre-release stripped, since a range like
/// `>=1.2.0` is meant to admit `1.2.0-SNAPSHOT`.
pub fn version_satisfies_range(range: &str, version: &Version, declared_by: &str) -> Result<bool> {
    let range = range.trim();
    if range.is_empty() {
        return Ok(false);
    }
    if range.eq_ignore_ascii_case("next") {
        return Ok(true);
    }
    let requirement =
        semver::VersionReq::parse(range).map_err(|e| Error::VersionRange {
            range: range.to_string(),
            declared_by: declared_by.to_string(),
            reason: e.to_string(),
        })?;
    let candidate = version.to_semver();
    if requirement.matches(&candidate) {
        return Ok(true);
    }
    if !candidate.pre.is_empty() {
        let mut released = candidate.clone();
        released.pre = semver::Prerelease::EMPTY;
        return Ok(requirement.matches(&released));
    }
    Ok(false)
}

/// Collect every content dependency the effective distribution does not
/// satisfy. `descriptors` pairs each declared content package with its
/// fetched descriptor.
pub fn missing_dependencies(
    effective: &EffectiveDistribution,
    descriptors: &[(ContentPackage, ContentProperties)],
) -> Result<Vec<MissingDependency>> {
    let mut missing = Vec::new();
    for (package, properties) in descriptors {
        for dependency in properties.dependencies() {
            let found = find_provided(effective, dependency.category, &dependency.name);
            let satisfied = match found {
                Some(artifact) => version_satisfies_range(
                    &dependency.range,
                    &artifact.version,
                    &package.artifact.to_string(),
                )?,
                None => false,
            };
            if !satisfied {
                missing.push(MissingDependency {
                    dependent: package.artifact.base_name().to_string(),
                    required_category: dependency.category,
                    required: dependency.name.clone(),
                    required_range: dependency.range.clone(),
                    current_version: found.map(|a| a.version.to_string()),
                });
            }
        }
    }
    Ok(missing)
}

/// Validate every content package's declared dependencies, failing with the
/// full list of unsatisfied requirements
pub fn validate_distribution(
    effective: &EffectiveDistribution,
    descriptors: &[(ContentPackage, ContentProperties)],
) -> Result<()> {
    let missing = missing_dependencies(effective, descriptors)?;
    if missing.is_empty() {
        return Ok(());
    }
    let listing: String = missing
        .iter()
        .map(|m| format!("\n- {m}"))
        .collect();
    Err(Error::MissingDependencies(listing))
}

fn find_provided<'e>(
    effective: &'e EffectiveDistribution,
    category: Category,
    name: &str,
) -> Option<&'e Artifact> {
    let matches_name = |a: &&Artifact| a.base_name() == name || a.artifact_id == name;
    match category {
        Category::Runtime => effective.runtime.as_ref().filter(|a| matches_name(a)),
        Category::Module => effective.modules.iter().find(matches_name),
        Category::App => effective.apps.iter().find(matches_name),
        Category::Frontend => effective.frontend.as_ref().filter(|a| matches_name(a)),
        Category::Config => effective.configs.iter().find(matches_name),
        Category::Content => effective
            .content
            .iter()
            .map(|c| &c.artifact)
            .find(matches_name),
    }
}
