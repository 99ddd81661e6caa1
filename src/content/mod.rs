// src/content/mod.rs

//! Content package handling.
//!
//! A content package is a zip of configuration payloads, carrying its own
//! descriptor (`content.properties`) with template variables and version
//! ranges for the modules and packages it depends on. Installation orders
//! packages so dependencies land first, merges template variables with the
//! distribution's overrides, copies the backend and frontend payloads into
//! place (namespaced when requested), and substitutes variables into text
//! files.

mod validate;

pub use validate::{missing_dependencies, validate_distribution, version_satisfies_range, MissingDependency};

use crate::artifact::{Artifact, Category};
use crate::error::{Error, Result};
use crate::spec::SpecProperties;
use crate::store::ArtifactStore;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Descriptor file inside a content package
pub const CONTENT_PROPERTIES_NAME: &str = "content.properties";

/// File extensions that undergo variable substitution
pub const TEXT_EXTENSIONS: [&str; 8] = ["csv", "htm", "html", "json", "txt", "xml", "yaml", "yml"];

// Namespace values treated as "no namespace"
const EMPTY_NAMESPACES: [&str; 3] = [".", "/", "false"];

/// A content package declaration: its artifact plus the namespace its
/// payloads are installed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPackage {
    pub artifact: Artifact,
    pub namespace: String,
}

impl ContentPackage {
    /// The `group:name` pair identifying this package across versions
    pub fn key(&self) -> String {
        self.artifact.key()
    }

    /// True when the package installs directly into the shared tree
    pub fn has_empty_namespace(&self) -> bool {
        let ns = self.namespace.trim();
        ns.is_empty() || EMPTY_NAMESPACES.contains(&ns)
    }
}

/// A dependency declared by a content package descriptor: a version range
/// for an artifact of some category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDependency {
    pub category: Category,
    pub name: String,
    pub range: String,
}

/// Parsed content package descriptor
#[derive(Debug, Clone, Default)]
pub struct ContentProperties {
    properties: SpecProperties,
}

impl ContentProperties {
    pub fn new(properties: SpecProperties) -> Self {
        Self { properties }
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.properties.version()
    }

    /// Template variables declared by the package, possibly with blank
    /// defaults that the distribution must fill in
    pub fn variables(&self) -> BTreeMap<String, String> {
        self.properties.variables()
    }

    /// Version-range dependencies on artifacts of any category
    pub fn dependencies(&self) -> Vec<ContentDependency> {
        let mut ret = Vec::new();
        for category in Category::ALL {
            if category == Category::Frontend {
                continue;
            }
            let prefix = format!("{}.", category.prefix());
            for (key, range) in self.properties.entries() {
                if let Some(name) = key.strip_prefix(&prefix) {
                    if !name.contains('.') {
                        ret.push(ContentDependency {
                            category,
                            name: name.to_string(),
                            range: range.clone(),
                        });
                    }
                }
            }
        }
        ret
    }

    /// Dependencies on other content packages only
    pub fn content_dependencies(&self) -> Vec<ContentDependency> {
        self.dependencies()
            .into_iter()
            .filter(|d| d.category == Category::Content)
            .collect()
    }
}

/// Installs content packages from an artifact store
pub struct ContentInstaller<'a, S: ArtifactStore> {
    store: &'a S,
}

impl<'a, S: ArtifactStore> ContentInstaller<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Fetch a package and read its descriptor. A package without a
    /// descriptor has no variables and no dependencies.
    pub fn content_properties(&self, package: &ContentPackage) -> Result<ContentProperties> {
        let scratch = TempDir::new()?;
        let root = self.store.fetch(&package.artifact, scratch.path(), true)?;
        let path = root.join(CONTENT_PROPERTIES_NAME);
        if !path.is_file() {
            warn!(package = %package.artifact, "content package has no descriptor");
            return Ok(ContentProperties::default());
        }
        Ok(ContentProperties::new(SpecProperties::load(&path)?))
    }

    /// Order packages so every content dependency is installed before its
    /// dependents
    pub fn installation_order(&self, packages: &[ContentPackage]) -> Result<Vec<ContentPackage>> {
        let mut with_properties = Vec::new();
        for package in packages {
            let properties = self.content_properties(package)?;
            with_properties.push((package.clone(), properties));
        }
        order_with_properties(with_properties)
    }

    /// Merge a package's declared variables with the distribution's
    /// overrides. An override wins even when blank; a blank default with no
    /// override is an error.
    pub fn resolve_variables(
        &self,
        package: &ContentPackage,
        declared: &BTreeMap<String, String>,
        overrides: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();
        for (name, default) in declared {
            let value = match overrides.get(name) {
                Some(value) => value.clone(),
                None if !default.trim().is_empty() => default.clone(),
                None => {
                    return Err(Error::UnboundVariable {
                        package: package.artifact.to_string(),
                        variable: name.clone(),
                    })
                }
            };
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    /// Install the backend payloads of the given packages, in order, into
    /// `target`. Variables from the distribution spec override package
    /// defaults before substitution.
    pub fn install_backend_config(
        &self,
        ordered: &[ContentPackage],
        target: &Path,
        spec_variables: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.install_payloads(ordered, target, spec_variables, PayloadKind::Backend)
    }

    /// Install the frontend payloads of the given packages, in order, into
    /// `target`. Each package lands in a subdirectory named after its
    /// artifact.
    pub fn install_frontend_config(
        &self,
        ordered: &[ContentPackage],
        target: &Path,
        spec_variables: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.install_payloads(ordered, target, spec_variables, PayloadKind::Frontend)
    }

    fn install_payloads(
        &self,
        ordered: &[ContentPackage],
        target: &Path,
        spec_variables: &BTreeMap<String, String>,
        kind: PayloadKind,
    ) -> Result<()> {
        for package in ordered {
            let scratch = TempDir::new()?;
            let root = self.store.fetch(&package.artifact, scratch.path(), true)?;
            let Some(payload) = kind.locate(&root) else {
                debug!(package = %package.artifact, ?kind, "package carries no payload of this kind");
                continue;
            };

            let descriptor = root.join(CONTENT_PROPERTIES_NAME);
            let declared = if descriptor.is_file() {
                ContentProperties::new(SpecProperties::load(&descriptor)?).variables()
            } else {
                BTreeMap::new()
            };
            let variables = self.resolve_variables(package, &declared, spec_variables)?;

            // Substitution happens on the package's own payload before the
            // copy; another package's variables must never rewrite files
            // this one did not ship.
            apply_variable_replacements(&variables, &payload)?;
            match kind {
                PayloadKind::Backend => {
                    install_backend_payload(&payload, target, package)?;
                }
                PayloadKind::Frontend => {
                    let dest = target.join(&package.artifact.artifact_id);
                    copy_tree(&payload, &dest)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PayloadKind {
    Backend,
    Frontend,
}

impl PayloadKind {
    /// Locate the payload directory within an unpacked package, trying the
    /// conventional locations before falling back to the package root.
    fn locate(&self, root: &Path) -> Option<PathBuf> {
        let candidates: [&str; 2] = match self {
            PayloadKind::Backend => [
                "configuration/backend_configuration",
                "configs/backend_config",
            ],
            PayloadKind::Frontend => [
                "configuration/frontend_configuration",
                "configs/frontend_config",
            ],
        };
        for candidate in candidates {
            let path = root.join(candidate);
            if path.is_dir() {
                return Some(path);
            }
        }
        match self {
            // A package without the conventional layout is treated as a bare
            // backend payload.
            PayloadKind::Backend => Some(root.to_path_buf()),
            PayloadKind::Frontend => None,
        }
    }
}

/// Copy a backend payload into the shared configuration tree. Namespaced
/// packages nest each configuration domain under the namespace so that
/// several packages can ship the same domain without clobbering each other.
fn install_backend_payload(payload: &Path, target: &Path, package: &ContentPackage) -> Result<()> {
    if package.has_empty_namespace() {
        return copy_tree(payload, target);
    }
    for entry in fs::read_dir(payload)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy() == CONTENT_PROPERTIES_NAME {
            continue;
        }
        if entry.file_type()?.is_dir() {
            let dest = target.join(&name).join(&package.namespace);
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::create_dir_all(target)?;
            fs::copy(entry.path(), target.join(&name))?;
        }
    }
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io_from_walkdir)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        if rel.as_os_str().is_empty() || entry.file_name().to_string_lossy() == CONTENT_PROPERTIES_NAME
        {
            continue;
        }
        let to = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)?;
        } else {
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

fn io_from_walkdir(e: walkdir::Error) -> Error {
    Error::Io(e.into())
}

/// Substitute `${name}` placeholders with resolved variable values in every
/// text file under `dir`. Placeholders without a known variable are left
/// untouched.
pub fn apply_variable_replacements(
    variables: &BTreeMap<String, String>,
    dir: &Path,
) -> Result<()> {
    if variables.is_empty() {
        return Ok(());
    }
    // The pattern is fixed, so compilation cannot fail.
    let placeholder = match Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}") {
        Ok(re) => re,
        Err(_) => return Ok(()),
    };
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(io_from_walkdir)?;
        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }
        let content = fs::read_to_string(entry.path())?;
        let replaced = placeholder.replace_all(&content, |captures: &regex::Captures| {
            match variables.get(&captures[1]) {
                Some(value) => value.clone(),
                None => captures[0].to_string(),
            }
        });
        if replaced != content {
            fs::write(entry.path(), replaced.as_bytes())?;
        }
    }
    Ok(())
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Order packages so that each one is placed only after every content
/// package it depends on. Dependencies outside the given set do not block
/// placement; version-range validation covers them separately.
pub fn order_with_properties(
    packages: Vec<(ContentPackage, ContentProperties)>,
) -> Result<Vec<ContentPackage>> {
    let names: Vec<String> = packages
        .iter()
        .map(|(p, _)| p.artifact.base_name().to_string())
        .collect();

    let mut remaining = packages;
    let mut placed_names: Vec<String> = Vec::new();
    let mut ordered = Vec::new();

    while !remaining.is_empty() {
        let mut placed_this_pass = 0;
        let mut still_remaining = Vec::new();
        for (package, properties) in remaining {
            let blocked = properties.content_dependencies().iter().any(|dep| {
                names.iter().any(|n| n == &dep.name)
                    && !placed_names.iter().any(|n| n == &dep.name)
            });
            if blocked {
                still_remaining.push((package, properties));
            } else {
                placed_names.push(package.artifact.base_name().to_string());
                ordered.push(package);
                placed_this_pass += 1;
            }
        }
        if placed_this_pass == 0 {
            let stuck: Vec<String> = still_remaining
                .iter()
                .map(|(p, _)| p.artifact.key())
                .collect();
            return Err(Error::ContentOrdering(stuck.join(", ")));
        }
        remaining = still_remaining;
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactType, GROUP_CONTENT};
    use crate::store::mock::MockStore;

    fn package(name: &str, version: &str, namespace: &str) -> ContentPackage {
        ContentPackage {
            artifact: Artifact::new(name, version, GROUP_CONTENT, ArtifactType::Zip),
            namespace: namespace.to_string(),
        }
    }

    fn content_props(pairs: &[(&str, &str)]) -> ContentProperties {
        let mut properties = SpecProperties::default();
        for (k, v) in pairs {
            properties.set(k, v);
        }
        ContentProperties::new(properties)
    }

    #[test]
    fn test_empty_namespace_detection() {
        assert!(package("hiv", "1.0.0", "").has_empty_namespace());
        assert!(package("hiv", "1.0.0", ".").has_empty_namespace());
        assert!(package("hiv", "1.0.0", "/").has_empty_namespace());
        assert!(package("hiv", "1.0.0", "false").has_empty_namespace());
        assert!(!package("hiv", "1.0.0", "hiv").has_empty_namespace());
    }

    #[test]
    fn test_dependencies_parsing() {
        let props = content_props(&[
            ("name", "hiv"),
            ("module.reporting", ">=1.2.0"),
            ("content.commons", "^1.0.0"),
            ("var.concept.source", "CIEL"),
        ]);
        let deps = props.dependencies();
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().any(|d| d.category == Category::Module && d.name == "reporting"));
        assert_eq!(props.content_dependencies().len(), 1);
        assert_eq!(
            props.variables().get("concept.source").map(String::as_str),
            Some("CIEL")
        );
    }

    #[test]
    fn test_ordering_places_dependencies_first() {
        let commons = package("commons", "1.0.0", "commons");
        let hiv = package("hiv", "1.0.0", "hiv");
        let tb = package("tb", "1.0.0", "tb");
        let input = vec![
            (hiv.clone(), content_props(&[("content.commons", "^1.0.0")])),
            (tb.clone(), content_props(&[("content.hiv", "^1.0.0")])),
            (commons.clone(), content_props(&[])),
        ];
        let ordered = order_with_properties(input).unwrap();
        let names: Vec<&str> = ordered.iter().map(|p| p.artifact.base_name()).collect();
        assert_eq!(names, vec!["commons", "hiv", "tb"]);
    }

    #[test]
    fn test_ordering_ignores_absent_dependencies() {
        let hiv = package("hiv", "1.0.0", "hiv");
        let input = vec![(hiv, content_props(&[("content.elsewhere", "^1.0.0")]))];
        assert_eq!(order_with_properties(input).unwrap().len(), 1);
    }

    #[test]
    fn test_ordering_detects_cycles() {
        let a = package("a", "1.0.0", "a");
        let b = package("b", "1.0.0", "b");
        let input = vec![
            (a, content_props(&[("content.b", "^1.0.0")])),
            (b, content_props(&[("content.a", "^1.0.0")])),
        ];
        assert!(matches!(
            order_with_properties(input),
            Err(Error::ContentOrdering(_))
        ));
    }

    #[test]
    fn test_resolve_variables() {
        let store = MockStore::new();
        let installer = ContentInstaller::new(&store);
        let hiv = package("hiv", "1.0.0", "hiv");
        let declared = BTreeMap::from([
            ("concept.source".to_string(), "CIEL".to_string()),
            ("site.name".to_string(), String::new()),
        ]);

        let overrides = BTreeMap::from([("site.name".to_string(), "Springfield".to_string())]);
        let resolved = installer.resolve_variables(&hiv, &declared, &overrides).unwrap();
        assert_eq!(resolved.get("concept.source").map(String::as_str), Some("CIEL"));
        assert_eq!(resolved.get("site.name").map(String::as_str), Some("Springfield"));

        // An override beats a non-blank default, even when the override is blank.
        let blank = BTreeMap::from([
            ("concept.source".to_string(), String::new()),
            ("site.name".to_string(), "x".to_string()),
        ]);
        let resolved = installer.resolve_variables(&hiv, &declared, &blank).unwrap();
        assert_eq!(resolved.get("concept.source").map(String::as_str), Some(""));

        // A blank default with no override is unusable.
        let err = installer
            .resolve_variables(&hiv, &declared, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnboundVariable { .. }));
    }

    #[test]
    fn test_variable_replacement_only_touches_text_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("form.json"), r#"{"source": "${concept.source}"}"#).unwrap();
        fs::write(dir.path().join("blob.bin"), "${concept.source}").unwrap();
        fs::write(dir.path().join("unknown.xml"), "${not.defined}").unwrap();

        let variables = BTreeMap::from([("concept.source".to_string(), "CIEL".to_string())]);
        apply_variable_replacements(&variables, dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("form.json")).unwrap(),
            r#"{"source": "CIEL"}"#
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("blob.bin")).unwrap(),
            "${concept.source}"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("unknown.xml")).unwrap(),
            "${not.defined}"
        );
    }

    #[test]
    fn test_backend_install_namespaced() {
        let mut store = MockStore::new();
        let hiv = package("hiv", "1.0.0", "hiv");
        store.add_artifact(
            &hiv.artifact,
            &[
                ("content.properties", "name=hiv\n"),
                (
                    "configuration/backend_configuration/conceptclasses/classes.csv",
                    "uuid,name\n",
                ),
            ],
        );
        let installer = ContentInstaller::new(&store);
        let target = tempfile::tempdir().unwrap();
        installer
            .install_backend_config(&[hiv], target.path(), &BTreeMap::new())
            .unwrap();
        assert!(target
            .path()
            .join("conceptclasses/hiv/classes.csv")
            .is_file());
    }

    #[test]
    fn test_backend_install_without_namespace() {
        let mut store = MockStore::new();
        let hiv = package("hiv", "1.0.0", "");
        store.add_artifact(
            &hiv.artifact,
            &[(
                "configuration/backend_configuration/conceptclasses/classes.csv",
                "uuid,name\n",
            )],
        );
        let installer = ContentInstaller::new(&store);
        let target = tempfile::tempdir().unwrap();
        installer
            .install_backend_config(&[hiv], target.path(), &BTreeMap::new())
            .unwrap();
        assert!(target.path().join("conceptclasses/classes.csv").is_file());
    }

    #[test]
    fn test_frontend_install_lands_under_artifact_id() {
        let mut store = MockStore::new();
        let hiv = package("hiv", "1.0.0", "hiv");
        store.add_artifact(
            &hiv.artifact,
            &[
                ("content.properties", "name=hiv\nvar.site.name=\n"),
                (
                    "configuration/frontend_configuration/forms/intake.json",
                    r#"{"site": "${site.name}"}"#,
                ),
            ],
        );
        let installer = ContentInstaller::new(&store);
        let target = tempfile::tempdir().unwrap();
        let variables = BTreeMap::from([("site.name".to_string(), "Springfield".to_string())]);
        installer
            .install_frontend_config(&[hiv], target.path(), &variables)
            .unwrap();
        let installed = target.path().join("hiv/forms/intake.json");
        assert!(installed.is_file());
        assert_eq!(
            fs::read_to_string(installed).unwrap(),
            r#"{"site": "Springfield"}"#
        );
    }

    #[test]
    fn test_substitution_is_scoped_to_the_installing_package() {
        let mut store = MockStore::new();
        let first = package("first", "1.0.0", "");
        store.add_artifact(
            &first.artifact,
            &[(
                "configuration/backend_configuration/forms/first.json",
                r#"{"site": "${site.code}"}"#,
            )],
        );
        let second = package("second", "1.0.0", "");
        store.add_artifact(
            &second.artifact,
            &[
                ("content.properties", "var.site.code=SPR\n"),
                (
                    "configuration/backend_configuration/forms/second.json",
                    r#"{"site": "${site.code}"}"#,
                ),
            ],
        );
        let installer = ContentInstaller::new(&store);
        let target = tempfile::tempdir().unwrap();
        installer
            .install_backend_config(&[first, second], target.path(), &BTreeMap::new())
            .unwrap();
        // The second package's variable binds only in its own payload; the
        // first package's placeholder survives untouched.
        assert_eq!(
            fs::read_to_string(target.path().join("forms/first.json")).unwrap(),
            r#"{"site": "${site.code}"}"#
        );
        assert_eq!(
            fs::read_to_string(target.path().join("forms/second.json")).unwrap(),
            r#"{"site": "SPR"}"#
        );
    }

    #[test]
    fn test_content_properties_missing_descriptor() {
        let mut store = MockStore::new();
        let hiv = package("hiv", "1.0.0", "hiv");
        store.add_artifact(&hiv.artifact, &[("README.md", "nothing else")]);
        let installer = ContentInstaller::new(&store);
        let props = installer.content_properties(&hiv).unwrap();
        assert!(props.dependencies().is_empty());
        assert!(props.variables().is_empty());
    }
}
