//! Configuration file loader.
//!
//! `--config-file PATH` points at a flat YAML mapping of option name to
//! value. The loader produces a plain `name → serde_json::Value` map; the
//! options aggregator then merges it beneath the command-line values,
//! restricted to options declared in the shared group.
//!
//! ```yaml
//! dbsize: 10000
//! readonly: true
//! endpoint: "127.0.0.1:55"
//! ```

use std::collections::HashMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Format, Yaml};
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Flat option defaults read from a configuration file.
pub type ConfigValues = HashMap<String, Value>;

/// Loads option defaults from a YAML file.
///
/// The path was named explicitly on the command line, so a missing file is
/// an error rather than an empty default set.
pub fn load_config_file(path: &Path) -> ConfigResult<ConfigValues> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Yaml::file(path))
        .extract()
        .map_err(|error| ConfigError::Parse(error.to_string()))
}

/// Loads option defaults from a YAML string.
pub fn load_config_str(yaml: &str) -> ConfigResult<ConfigValues> {
    Figment::new()
        .merge(Yaml::string(yaml))
        .extract()
        .map_err(|error| ConfigError::Parse(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_yaml_parses_into_values() {
        let values = load_config_str("dbsize: 10000\nreadonly: true\nendpoint: 127.0.0.1:55\n")
            .expect("valid yaml");
        assert_eq!(values["dbsize"], Value::from(10000));
        assert_eq!(values["readonly"], Value::Bool(true));
        assert_eq!(values["endpoint"], Value::String("127.0.0.1:55".into()));
    }

    #[test]
    fn test_empty_config_is_empty() {
        let values = load_config_str("").expect("empty yaml");
        assert!(values.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let error = load_config_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(error, ConfigError::FileNotFound(_)));
    }
}
