//! Flattened, layered settings.
//!
//! Keys are `:`-separated paths (`ConnectionStrings:DefaultConnection`) and
//! compare case-insensitively. Layer merging happens in the loader; this is
//! the lookup surface over the merged result.

use std::collections::BTreeMap;

use serde_json::Value;

/// Separator between key path segments.
pub const KEY_DELIMITER: &str = ":";

/// Section holding named connection strings.
pub const CONNECTION_STRINGS_SECTION: &str = "ConnectionStrings";

/// A required key was not defined by any configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing configuration value for key '{key}'")]
pub struct MissingConfiguration {
    pub key: String,
}

/// Immutable view over the merged configuration layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    entries: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single key, replacing any value from an earlier layer.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key: String = key.into();
        self.entries.insert(normalize_key(&key), value.into());
    }

    /// Flatten a JSON document into a settings layer.
    ///
    /// Objects become `Parent:Child`, arrays `Parent:0`, scalars their string
    /// form and `null` an empty string.
    pub fn from_json(document: &Value) -> Self {
        let mut settings = Self::new();
        flatten_into(&mut settings, None, document);
        settings
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Look up a key that must be present.
    pub fn require(&self, key: &str) -> Result<&str, MissingConfiguration> {
        self.get(key).ok_or_else(|| MissingConfiguration {
            key: key.to_string(),
        })
    }

    /// Shorthand for `ConnectionStrings:{name}`.
    pub fn connection_string(&self, name: &str) -> Option<&str> {
        self.get(&format!("{CONNECTION_STRINGS_SECTION}{KEY_DELIMITER}{name}"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

fn flatten_into(settings: &mut Settings, prefix: Option<&str>, value: &Value) {
    let join = |child: &str| match prefix {
        Some(parent) => format!("{parent}{KEY_DELIMITER}{child}"),
        None => child.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten_into(settings, Some(&join(name)), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(settings, Some(&join(&index.to_string())), child);
            }
        }
        scalar => {
            // A bare scalar document has no key to live under.
            let Some(key) = prefix else { return };
            let rendered = match scalar {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            settings.insert(key, rendered);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_json() {
        let settings = Settings::from_json(&json!({
            "ConnectionStrings": { "DefaultConnection": "Server=s;Database=MyApp" },
            "Logging": { "LogLevel": "debug", "Verbose": true },
            "Hosts": ["a", "b"],
            "Empty": null
        }));

        assert_eq!(
            settings.get("ConnectionStrings:DefaultConnection"),
            Some("Server=s;Database=MyApp")
        );
        assert_eq!(settings.get("Logging:Verbose"), Some("true"));
        assert_eq!(settings.get("Hosts:1"), Some("b"));
        assert_eq!(settings.get("Empty"), Some(""));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut settings = Settings::new();
        settings.insert("ConnectionStrings:DefaultConnection", "X");
        assert_eq!(settings.get("connectionstrings:defaultconnection"), Some("X"));

        settings.insert("CONNECTIONSTRINGS:DEFAULTCONNECTION", "Y");
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.connection_string("DefaultConnection"), Some("Y"));
    }

    #[test]
    fn test_require_and_defaults() {
        let settings = Settings::from_json(&json!({ "Present": "yes" }));
        assert_eq!(settings.require("Present"), Ok("yes"));
        assert_eq!(
            settings.require("Absent"),
            Err(MissingConfiguration { key: "Absent".into() })
        );
        assert_eq!(settings.get_or("Absent", "fallback"), "fallback");
    }
}
