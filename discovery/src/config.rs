//! Tool configuration.
//!
//! Loaded from a YAML file passed with `--config`. Every field is optional.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! prefix_paths:
//!   - /opt/ros/humble
//!   - /home/me/ws/install/my_pkg
//! duplicate_entries: reject
//! format: json
//! ```

use std::env;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use nodl_core::{DuplicatePolicy, ParseOptions};
use serde::{Deserialize, Serialize};

use crate::discover::DiscoverError;
use crate::output::OutputFormat;

/// Environment variable listing package install prefixes.
pub const PREFIX_PATH_ENV: &str = "AMENT_PREFIX_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodlConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Install prefixes searched for packages. Empty means use
    /// `AMENT_PREFIX_PATH`.
    pub prefix_paths: Vec<PathBuf>,
    /// How repeated entries inside one node are handled.
    pub duplicate_entries: DuplicatePolicy,
    /// Default output format for `show`.
    pub format: OutputFormat,
}

impl Default for NodlConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            prefix_paths: Vec::new(),
            duplicate_entries: DuplicatePolicy::default(),
            format: OutputFormat::Table,
        }
    }
}

impl NodlConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoverError::Io`] if the file cannot be read, or
    /// [`DiscoverError::Config`] if it is not valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DiscoverError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        serde_yaml::from_reader(reader)
            .map_err(|err| DiscoverError::Config(format!("{}: {err}", path.display())))
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DiscoverError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_yaml::to_writer(writer, self).map_err(|err| DiscoverError::Config(err.to_string()))
    }

    /// Install prefixes to search, in priority order.
    ///
    /// Falls back to splitting `AMENT_PREFIX_PATH` when none are configured.
    pub fn prefixes(&self) -> Vec<PathBuf> {
        if !self.prefix_paths.is_empty() {
            return self.prefix_paths.clone();
        }
        env::var_os(PREFIX_PATH_ENV)
            .map(|raw| {
                env::split_paths(&raw)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            duplicates: self.duplicate_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
version: "1.0"
prefix_paths:
  - /opt/ros/humble
  - /ws/install/demo
duplicate_entries: reject
format: markdown
"#;
        let config: NodlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.prefix_paths,
            vec![PathBuf::from("/opt/ros/humble"), PathBuf::from("/ws/install/demo")]
        );
        assert_eq!(config.duplicate_entries, DuplicatePolicy::Reject);
        assert_eq!(config.format, OutputFormat::Markdown);
        assert_eq!(config.parse_options(), ParseOptions::strict());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: NodlConfig = serde_yaml::from_str("format: json\n").unwrap();
        assert_eq!(config.version, "1.0");
        assert!(config.prefix_paths.is_empty());
        assert_eq!(config.duplicate_entries, DuplicatePolicy::LastWins);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_configured_prefixes_win() {
        let config = NodlConfig {
            prefix_paths: vec![PathBuf::from("/somewhere")],
            ..NodlConfig::default()
        };
        assert_eq!(config.prefixes(), vec![PathBuf::from("/somewhere")]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodl.yaml");
        let config = NodlConfig {
            duplicate_entries: DuplicatePolicy::Reject,
            ..NodlConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(NodlConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_unknown_policy_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodl.yaml");
        std::fs::write(&path, "duplicate_entries: sometimes\n").unwrap();
        assert!(matches!(
            NodlConfig::load(&path),
            Err(DiscoverError::Config(_))
        ));
    }
}
