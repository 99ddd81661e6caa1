// src/spec/mod.rs

//! Distribution specification model.
//!
//! A distribution spec is declared in a flat, namespaced key-value file
//! (`distro.properties`). Keys are category-prefixed
//! (`module.<name>`, `config.<name>`, ...) with optional sub-keys
//! (`.groupId`, `.type`, `.artifactId`, `.namespace`) overriding the
//! category defaults. Reserved keys carry the spec name and version, the
//! parent distribution coordinates, and the exclusion list.
//!
//! The flat format is parsed once at this boundary; the rest of the engine
//! works with the typed collections extracted here.

pub mod frontend;
mod properties;

pub use frontend::frontend_properties_from_json;
pub use properties::SpecProperties;

/// File name under which a distribution spec is stored, both standalone and
/// inside distribution artifacts
pub const SPEC_FILE_NAME: &str = "distro.properties";

pub const KEY_NAME: &str = "name";
pub const KEY_VERSION: &str = "version";
pub const KEY_EXCLUSIONS: &str = "exclusions";

pub const PARENT_PREFIX: &str = "parent";
pub const VAR_PREFIX: &str = "var";
pub const CUSTOM_PREFIX: &str = "property";

pub const SUB_ARTIFACT_ID: &str = "artifactId";
pub const SUB_GROUP_ID: &str = "groupId";
pub const SUB_TYPE: &str = "type";
pub const SUB_INCLUDES: &str = "includes";
pub const SUB_NAMESPACE: &str = "namespace";

/// Sub-keys that qualify an artifact declaration rather than declaring one
pub(crate) const RESERVED_SUB_KEYS: [&str; 5] = [
    SUB_ARTIFACT_ID,
    SUB_GROUP_ID,
    SUB_TYPE,
    SUB_INCLUDES,
    SUB_NAMESPACE,
];
