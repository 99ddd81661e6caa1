// src/artifact/mod.rs

//! Artifact coordinates and category model.
//!
//! An artifact is a single versioned, named, downloadable unit belonging to
//! one category of the distribution. Coordinates are normalized once during
//! resolution (suffix completion, default group and type inference) and the
//! normalization is idempotent.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::Serialize;
use std::fmt;
use strum_macros::{Display, EnumString};

pub const GROUP_WEB: &str = "org.distroforge.web";
pub const GROUP_MODULE: &str = "org.distroforge.module";
pub const GROUP_APP: &str = "org.distroforge.app";
pub const GROUP_DISTRO: &str = "org.distroforge.distro";
pub const GROUP_CONTENT: &str = "org.distroforge.content";
pub const GROUP_BASE: &str = "org.distroforge";

pub const MODULE_SUFFIX: &str = "-module";
pub const WEBAPP_SUFFIX: &str = "-webapp";

/// Packaging type of an artifact, which doubles as its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Jar,
    War,
    Zip,
}

/// The six artifact categories of a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Runtime,
    Module,
    App,
    Frontend,
    Config,
    Content,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Runtime,
        Category::Module,
        Category::App,
        Category::Frontend,
        Category::Config,
        Category::Content,
    ];

    /// The key prefix this category uses in the flat property format
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Runtime => "runtime",
            Category::Module => "module",
            Category::App => "app",
            Category::Frontend => "frontend",
            Category::Config => "config",
            Category::Content => "content",
        }
    }

    /// The group inferred for artifacts of this category when none is declared
    pub fn default_group(&self) -> &'static str {
        match self {
            Category::Runtime => GROUP_WEB,
            Category::Module => GROUP_MODULE,
            Category::App => GROUP_APP,
            Category::Frontend => GROUP_DISTRO,
            Category::Config => GROUP_DISTRO,
            Category::Content => GROUP_CONTENT,
        }
    }

    /// The packaging type inferred for artifacts of this category
    pub fn default_type(&self) -> ArtifactType {
        match self {
            Category::Runtime => ArtifactType::War,
            Category::Module => ArtifactType::Jar,
            Category::App | Category::Frontend | Category::Config | Category::Content => {
                ArtifactType::Zip
            }
        }
    }

    /// Complete a declared name into a full artifact id. Module artifacts
    /// are published with a `-module` suffix and the core runtime with a
    /// `-webapp` suffix; applying this twice is a no-op.
    pub fn complete_name(&self, name: &str) -> String {
        match self {
            Category::Module if !name.ends_with(MODULE_SUFFIX) => {
                format!("{name}{MODULE_SUFFIX}")
            }
            Category::Runtime if !name.ends_with(WEBAPP_SUFFIX) => {
                format!("{name}{WEBAPP_SUFFIX}")
            }
            _ => name.to_string(),
        }
    }
}

/// Coordinates of a downloadable artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Artifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
    pub artifact_type: ArtifactType,
    pub classifier: Option<String>,
}

impl Artifact {
    pub fn new(artifact_id: &str, version: &str, group_id: &str, artifact_type: ArtifactType) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: Version::parse(version),
            artifact_type,
            classifier: None,
        }
    }

    pub fn with_version(&self, version: Version) -> Self {
        let mut ret = self.clone();
        ret.version = version;
        ret
    }

    /// The `group:name` pair identifying this artifact across versions
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// The artifact id with any category publishing suffix removed. This is
    /// the stable identity used when diffing artifact collections.
    pub fn base_name(&self) -> &str {
        self.artifact_id
            .strip_suffix(MODULE_SUFFIX)
            .or_else(|| self.artifact_id.strip_suffix(WEBAPP_SUFFIX))
            .unwrap_or(&self.artifact_id)
    }

    /// File name the artifact is stored under once fetched
    pub fn dest_file_name(&self) -> String {
        format!("{}-{}.{}", self.base_name(), self.version, self.artifact_type)
    }

    pub fn is_valid(&self) -> bool {
        !self.group_id.is_empty()
            && !self.artifact_id.is_empty()
            && !self.version.to_string().is_empty()
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// Parse a coordinate string of the form `group:name:version` or
/// `name:version`, inferring the group when absent.
pub fn parse_coordinates(
    spec: &str,
    default_group: &str,
    artifact_type: ArtifactType,
) -> Result<Artifact> {
    let parts: Vec<&str> = spec.split(':').collect();
    let (group_id, artifact_id, version) = match parts.as_slice() {
        [artifact_id, version] => (default_group, *artifact_id, *version),
        [group_id, artifact_id, version] => (*group_id, *artifact_id, *version),
        _ => return Err(Error::Coordinates(spec.to_string())),
    };
    if artifact_id.is_empty() || version.is_empty() {
        return Err(Error::Coordinates(spec.to_string()));
    }
    Ok(Artifact::new(artifact_id, version, group_id, artifact_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_name_appends_suffix() {
        assert_eq!(Category::Module.complete_name("reporting"), "reporting-module");
        assert_eq!(Category::Runtime.complete_name("platform"), "platform-webapp");
        assert_eq!(Category::Config.complete_name("emr"), "emr");
    }

    #[test]
    fn test_complete_name_is_idempotent() {
        let once = Category::Module.complete_name("reporting");
        assert_eq!(Category::Module.complete_name(&once), once);
    }

    #[test]
    fn test_base_name_strips_suffix() {
        let a = Artifact::new("reporting-module", "1.0.0", GROUP_MODULE, ArtifactType::Jar);
        assert_eq!(a.base_name(), "reporting");
        let b = Artifact::new("platform-webapp", "2.7.0", GROUP_WEB, ArtifactType::War);
        assert_eq!(b.base_name(), "platform");
    }

    #[test]
    fn test_dest_file_name() {
        let a = Artifact::new("reporting-module", "1.0.0", GROUP_MODULE, ArtifactType::Jar);
        assert_eq!(a.dest_file_name(), "reporting-1.0.0.jar");
    }

    #[test]
    fn test_parse_coordinates_short_form() {
        let a = parse_coordinates("emr:3.0.0", GROUP_DISTRO, ArtifactType::Zip).unwrap();
        assert_eq!(a.group_id, GROUP_DISTRO);
        assert_eq!(a.artifact_id, "emr");
        assert_eq!(a.version.to_string(), "3.0.0");
    }

    #[test]
    fn test_parse_coordinates_full_form() {
        let a = parse_coordinates("org.acme:emr:3.0.0", GROUP_DISTRO, ArtifactType::Zip).unwrap();
        assert_eq!(a.group_id, "org.acme");
    }

    #[test]
    fn test_parse_coordinates_rejects_garbage() {
        assert!(parse_coordinates("a:b:c:d", GROUP_DISTRO, ArtifactType::Zip).is_err());
        assert!(parse_coordinates("justaname", GROUP_DISTRO, ArtifactType::Zip).is_err());
    }

    #[test]
    fn test_category_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.prefix());
        }
    }
}
