//! Persisted binding configuration
//!
//! One binding configuration lives per project directory, written by `init`
//! and read by every later command. Properties are stored as top-level keys
//! in a JSON file: a dedicated `<key>.json` wins when present, otherwise the
//! shared `config.json` is used.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Property key the binding configuration is stored under
pub const BINDING_KEY: &str = "alb";

/// Default runtime for freshly created functions
pub const DEFAULT_RUNTIME: &str = "nodejs22.x";

/// Configuration persistence errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config file '{path}' does not hold a JSON object")]
    NotAnObject { path: String },
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// The persisted binding configuration for a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BindingConfig {
    pub service_name: String,
    /// Route path template with `{service}`, `{stage}`, `{version}` placeholders
    pub path_template: String,
    /// Name of the load balancer all rules attach to
    pub load_balancer: String,
    pub region: String,
    pub lambda: FunctionConfig,
}

/// Function-related settings inside the binding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    /// Execution role recorded at creation time; unused afterwards
    pub role: String,
    pub name: String,
    /// Entry module base name, without extension
    pub module: String,
    /// Packaging directory, relative to the project directory
    pub dir: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

impl FunctionConfig {
    /// Handler string passed to the function control plane.
    pub fn handler(&self) -> String {
        format!("{}.handler", self.module)
    }
}

/// Resolve which file a property should be read from.
fn read_path(key: &str, dir: &Path) -> PathBuf {
    let dedicated = dir.join(format!("{key}.json"));
    if dedicated.exists() {
        dedicated
    } else {
        dir.join("config.json")
    }
}

/// Read a top-level property from the project's config store.
///
/// Returns `Ok(None)` when neither file nor key exists.
pub fn get_property(key: &str, dir: &Path) -> Result<Option<serde_json::Value>, ConfigError> {
    let path = read_path(key, dir);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::io(&path, e)),
    };
    let mut root: serde_json::Value = serde_json::from_str(&data)?;
    Ok(root.get_mut(key).map(serde_json::Value::take))
}

/// Write a top-level property into the project's config store.
///
/// An existing `<key>.json` or `config.json` is updated in place, preserving
/// unrelated keys; otherwise a fresh `<key>.json` is created.
pub fn set_property(key: &str, value: serde_json::Value, dir: &Path) -> Result<(), ConfigError> {
    let dedicated = dir.join(format!("{key}.json"));
    let shared = dir.join("config.json");

    let path = if dedicated.exists() {
        dedicated
    } else if shared.exists() {
        shared
    } else {
        dedicated
    };

    let mut root: serde_json::Value = match fs::read_to_string(&path) {
        Ok(data) => serde_json::from_str(&data)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            serde_json::Value::Object(serde_json::Map::new())
        }
        Err(e) => return Err(ConfigError::io(&path, e)),
    };
    let serde_json::Value::Object(map) = &mut root else {
        return Err(ConfigError::NotAnObject {
            path: path.display().to_string(),
        });
    };
    map.insert(key.to_string(), value);

    let rendered = serde_json::to_string_pretty(&root)?;
    fs::write(&path, rendered).map_err(|e| ConfigError::io(&path, e))
}

/// Load the binding configuration, if the project has one.
pub fn load_binding(dir: &Path) -> Result<Option<BindingConfig>, ConfigError> {
    match get_property(BINDING_KEY, dir)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Persist the binding configuration.
pub fn store_binding(dir: &Path, config: &BindingConfig) -> Result<(), ConfigError> {
    set_property(BINDING_KEY, serde_json::to_value(config)?, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> BindingConfig {
        BindingConfig {
            service_name: "orders".to_string(),
            path_template: "/{service}/{stage}/{version}".to_string(),
            load_balancer: "edge".to_string(),
            region: "us-east-1".to_string(),
            lambda: FunctionConfig {
                role: String::new(),
                name: "orders".to_string(),
                module: "index".to_string(),
                dir: "dist".to_string(),
                runtime: DEFAULT_RUNTIME.to_string(),
            },
        }
    }

    #[test]
    fn binding_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_binding(dir.path()).unwrap().is_none());

        let config = sample_config();
        store_binding(dir.path(), &config).unwrap();
        assert_eq!(load_binding(dir.path()).unwrap(), Some(config));
    }

    #[test]
    fn uses_camel_case_field_names_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        store_binding(dir.path(), &sample_config()).unwrap();

        let raw = fs::read_to_string(dir.path().join("alb.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let alb = &value["alb"];
        assert_eq!(alb["serviceName"], "orders");
        assert_eq!(alb["pathTemplate"], "/{service}/{stage}/{version}");
        assert_eq!(alb["loadBalancer"], "edge");
        assert_eq!(alb["lambda"]["module"], "index");
        assert_eq!(alb["lambda"]["dir"], "dist");
    }

    #[test]
    fn dedicated_file_wins_over_shared() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"alb": {"from": "shared"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("alb.json"),
            r#"{"alb": {"from": "dedicated"}}"#,
        )
        .unwrap();

        let value = get_property("alb", dir.path()).unwrap().unwrap();
        assert_eq!(value["from"], "dedicated");
    }

    #[test]
    fn set_preserves_unrelated_keys_in_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"other": 1}"#).unwrap();

        set_property("alb", serde_json::json!({"x": true}), dir.path()).unwrap();

        let raw = fs::read_to_string(dir.path().join("config.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["other"], 1);
        assert_eq!(value["alb"]["x"], true);
    }

    #[test]
    fn runtime_defaults_when_absent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("alb.json"),
            r#"{"alb": {
                "serviceName": "orders",
                "pathTemplate": "/{service}",
                "loadBalancer": "edge",
                "region": "us-east-1",
                "lambda": {"role": "", "name": "orders", "module": "index", "dir": "dist"}
            }}"#,
        )
        .unwrap();

        let config = load_binding(dir.path()).unwrap().unwrap();
        assert_eq!(config.lambda.runtime, DEFAULT_RUNTIME);
    }
}
