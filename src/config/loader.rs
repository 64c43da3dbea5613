//! Configuration loading from disk and the process environment.
//!
//! Layers are merged with Figment. Every layer is case-folded before merging
//! so `ConnectionStrings` in a file and `CONNECTIONSTRINGS__...` in the
//! environment address the same key.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::value::{Dict, Map, Value};
use figment::{Figment, Metadata, Profile, Provider};

use crate::config::settings::{Settings, KEY_DELIMITER};

/// Base settings file, relative to the content root.
pub const BASE_SETTINGS_FILE: &str = "appsettings.json";

/// Separator for nested keys in environment variable names.
pub const ENV_NESTING_SEPARATOR: &str = "__";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Invalid(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Invalid(Box::new(error))
    }
}

/// File name of the environment-specific layer, e.g. `appsettings.Development.json`.
pub fn environment_settings_file(environment_name: &str) -> String {
    format!("appsettings.{environment_name}.json")
}

/// Layered configuration resolver.
///
/// Precedence, lowest first: base file, environment file, environment
/// variables, in-process overrides.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    base_path: PathBuf,
    environment_name: String,
    env_vars: Option<Vec<(String, String)>>,
    overrides: Vec<(String, String)>,
}

impl ConfigResolver {
    pub fn new(base_path: impl Into<PathBuf>, environment_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            environment_name: environment_name.into(),
            env_vars: None,
            overrides: Vec::new(),
        }
    }

    /// Replace the process environment with an explicit variable set.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Add an in-process override. Overrides take precedence over every other layer.
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    /// Paths of the file layers in precedence order.
    pub fn file_layers(&self) -> [PathBuf; 2] {
        [
            self.base_path.join(BASE_SETTINGS_FILE),
            self.base_path
                .join(environment_settings_file(&self.environment_name)),
        ]
    }

    /// Merge every layer into one [`Settings`].
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let mut figment = Figment::new();

        for path in self.file_layers() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "Settings file loaded");
                figment = figment.merge(CaseFolded(Json::file(&path)));
            } else {
                tracing::debug!(path = %path.display(), "Optional settings file absent");
            }
        }

        figment = match &self.env_vars {
            Some(vars) => vars.iter().fold(figment, |figment, (name, value)| {
                match nested_key(name, ENV_NESTING_SEPARATOR) {
                    Some(key) => figment.merge(Serialized::default(&key, value)),
                    None => figment,
                }
            }),
            None => figment.merge(Env::raw().split(ENV_NESTING_SEPARATOR)),
        };

        for (key, value) in &self.overrides {
            if let Some(key) = nested_key(key, KEY_DELIMITER) {
                figment = figment.merge(Serialized::default(&key, value));
            }
        }

        let document: serde_json::Value = figment.extract()?;
        Ok(Settings::from_json(&document))
    }
}

/// Resolve configuration for `environment_name` rooted at `base_path`.
pub fn resolve(base_path: &Path, environment_name: &str) -> Result<Settings, ConfigError> {
    ConfigResolver::new(base_path, environment_name).resolve()
}

/// Figment key path (`a.b`) for a name nested with `separator`, lowercased.
fn nested_key(name: &str, separator: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase().replace(separator, "."))
}

/// Lowercases every dictionary key a provider emits.
struct CaseFolded<P>(P);

impl<P: Provider> Provider for CaseFolded<P> {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Ok(self
            .0
            .data()?
            .into_iter()
            .map(|(profile, dict)| (profile, fold_dict(dict)))
            .collect())
    }
}

fn fold_dict(dict: Dict) -> Dict {
    dict.into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), fold_value(value)))
        .collect()
}

fn fold_value(value: Value) -> Value {
    match value {
        Value::Dict(tag, dict) => Value::Dict(tag, fold_dict(dict)),
        Value::Array(tag, items) => Value::Array(tag, items.into_iter().map(fold_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_missing_files_are_optional() {
        let dir = TempDir::new().unwrap();
        let settings = ConfigResolver::new(dir.path(), "Production")
            .with_env_vars(Vec::<(String, String)>::new())
            .resolve()
            .unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn test_malformed_base_file_fails() {
        let dir = TempDir::new().unwrap();
        write(&dir, BASE_SETTINGS_FILE, "{ not json");

        let err = ConfigResolver::new(dir.path(), "Production")
            .with_env_vars(Vec::<(String, String)>::new())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_environment_file_fails() {
        let dir = TempDir::new().unwrap();
        write(&dir, BASE_SETTINGS_FILE, "{}");
        write(&dir, "appsettings.Staging.json", "[1,");

        let result = ConfigResolver::new(dir.path(), "Staging")
            .with_env_vars(Vec::<(String, String)>::new())
            .resolve();
        assert!(result.is_err());
    }

    #[test]
    fn test_layer_precedence() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            BASE_SETTINGS_FILE,
            r#"{ "A": "base", "B": "base", "C": "base", "D": "base" }"#,
        );
        write(
            &dir,
            "appsettings.Development.json",
            r#"{ "B": "env-file", "C": "env-file", "D": "env-file" }"#,
        );

        let settings = ConfigResolver::new(dir.path(), "Development")
            .with_env_vars([("C", "env-var"), ("D", "env-var")])
            .with_override("D", "override")
            .resolve()
            .unwrap();

        assert_eq!(settings.get("A"), Some("base"));
        assert_eq!(settings.get("B"), Some("env-file"));
        assert_eq!(settings.get("C"), Some("env-var"));
        assert_eq!(settings.get("D"), Some("override"));
    }

    #[test]
    fn test_environment_file_ignored_for_other_environment() {
        let dir = TempDir::new().unwrap();
        write(&dir, BASE_SETTINGS_FILE, r#"{ "A": "base" }"#);
        write(&dir, "appsettings.Development.json", r#"{ "A": "dev" }"#);

        let settings = ConfigResolver::new(dir.path(), "Production")
            .with_env_vars(Vec::<(String, String)>::new())
            .resolve()
            .unwrap();
        assert_eq!(settings.get("A"), Some("base"));
    }

    #[test]
    fn test_keys_merge_across_layers_regardless_of_case() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            BASE_SETTINGS_FILE,
            r#"{ "ConnectionStrings": { "DefaultConnection": "base", "Reporting": "kept" } }"#,
        );

        let settings = ConfigResolver::new(dir.path(), "Production")
            .with_env_vars([("CONNECTIONSTRINGS__DEFAULTCONNECTION", "env-var")])
            .resolve()
            .unwrap();

        assert_eq!(settings.connection_string("DefaultConnection"), Some("env-var"));
        assert_eq!(settings.connection_string("Reporting"), Some("kept"));
        assert_eq!(settings.len(), 2);
    }

    #[test]
    fn test_nested_json_is_flattened() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            BASE_SETTINGS_FILE,
            r#"{ "Logging": { "LogLevel": "debug", "Verbose": true }, "Hosts": ["a", "b"] }"#,
        );

        let settings = ConfigResolver::new(dir.path(), "Production")
            .with_env_vars(Vec::<(String, String)>::new())
            .with_override("Logging:Verbose", "false")
            .resolve()
            .unwrap();

        assert_eq!(settings.get("Logging:LogLevel"), Some("debug"));
        assert_eq!(settings.get("Logging:Verbose"), Some("false"));
        assert_eq!(settings.get("Hosts:1"), Some("b"));
    }
}
