//! Rxn configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Rxn configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Async wait defaults
    pub wait: WaitConfig,

    /// Owner-site validation of mutation capabilities
    #[serde(rename = "owner-validation")]
    pub owner_validation: OwnerValidationConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .rxn.yml
        let local_config = PathBuf::from(".rxn.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/rxn/rxn.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("rxn").join("rxn.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Timeout applied by the `*_default` wait helpers
    pub fn default_timeout(&self) -> Duration {
        self.wait.default_timeout()
    }
}

/// Async wait defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Default wait timeout in milliseconds (0 waits forever)
    #[serde(rename = "default-timeout-ms")]
    pub default_timeout_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
        }
    }
}

impl WaitConfig {
    /// Get the default timeout as a Duration
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

/// Owner-site validation settings
///
/// Validation only exists in debug builds; in release builds this flag has no effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerValidationConfig {
    /// Check that mutation capabilities are requested from the constructing source file
    pub enabled: bool,
}

impl Default for OwnerValidationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.wait.default_timeout_ms, 10_000);
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert!(config.owner_validation.enabled);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
wait:
  default-timeout-ms: 2500

owner-validation:
  enabled: false
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.wait.default_timeout_ms, 2500);
        assert_eq!(config.default_timeout(), Duration::from_millis(2500));
        assert!(!config.owner_validation.enabled);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
wait:
  default-timeout-ms: 0
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.default_timeout(), Duration::ZERO);
        assert!(config.owner_validation.enabled);
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wait:\n  default-timeout-ms: 750").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.wait.default_timeout_ms, 750);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/rxn/config.yml");
        let result = Config::load(Some(&path));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_roundtrips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("default-timeout-ms"));
        assert!(yaml.contains("owner-validation"));
    }
}
