// src/spec/frontend.rs

//! Frontend assemble-config import.
//!
//! Frontend build tooling describes its bundle in a JSON document listing a
//! core version and a map of micro-frontend module versions. This converts
//! such a document into flat `frontend.*` spec properties.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

const CORE_VERSION_KEY: &str = "coreVersion";
const FRONTEND_MODULES_KEY: &str = "frontendModules";

/// Convert a frontend assemble-config JSON document into `frontend.*`
/// property entries. `coreVersion` maps to `frontend.core` and each entry
/// of `frontendModules` to `frontend.frontendModules.<name>`.
pub fn frontend_properties_from_json(json: &str) -> Result<BTreeMap<String, String>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Spec(format!("invalid frontend config: {e}")))?;
    let Value::Object(root) = value else {
        return Err(Error::Spec(
            "frontend config must be a JSON object".to_string(),
        ));
    };

    let mut ret = BTreeMap::new();
    if let Some(core) = root.get(CORE_VERSION_KEY) {
        let Value::String(core) = core else {
            return Err(Error::Spec(format!(
                "frontend config {CORE_VERSION_KEY} must be a string"
            )));
        };
        ret.insert("frontend.core".to_string(), core.clone());
    }
    if let Some(modules) = root.get(FRONTEND_MODULES_KEY) {
        let Value::Object(modules) = modules else {
            return Err(Error::Spec(format!(
                "frontend config {FRONTEND_MODULES_KEY} must be an object"
            )));
        };
        for (name, version) in modules {
            let Value::String(version) = version else {
                return Err(Error::Spec(format!(
                    "frontend module {name} version must be a string"
                )));
            };
            ret.insert(
                format!("frontend.{FRONTEND_MODULES_KEY}.{name}"),
                version.clone(),
            );
        }
    }
    Ok(ret)
}
