// ⚙️ Converter Configuration
//
// Loaded from an optional TOML file, then environment overrides
// (`NOTICE_RELEASE_OCID_PREFIX`, `NOTICE_RELEASE_PRETTY`) on top.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_OCID_PREFIX: &str = "NOTICE_RELEASE_OCID_PREFIX";
pub const ENV_PRETTY: &str = "NOTICE_RELEASE_PRETTY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Registered prefix prepended to the procedure identifier to form the ocid
    #[serde(default = "default_ocid_prefix")]
    pub ocid_prefix: String,

    /// Pretty-print JSON written by the CLI
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Emit `bids.statistics` (BT-710/711, BT-759/760)
    #[serde(default = "default_emit_bid_statistics")]
    pub emit_bid_statistics: bool,
}

fn default_ocid_prefix() -> String {
    "ocds-prefix".into()
}
fn default_pretty() -> bool {
    true
}
fn default_emit_bid_statistics() -> bool {
    true
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            ocid_prefix: default_ocid_prefix(),
            pretty: default_pretty(),
            emit_bid_statistics: default_emit_bid_statistics(),
        }
    }
}

impl ConverterConfig {
    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ConverterConfig =
            toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup(ENV_OCID_PREFIX) {
            self.ocid_prefix = prefix;
        }
        if let Some(pretty) = lookup(ENV_PRETTY) {
            self.pretty = match pretty.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => bail!("{} must be a boolean, got {:?}", ENV_PRETTY, other),
            };
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.ocid_prefix.trim().is_empty() {
            bail!("ocid_prefix must not be empty");
        }
        if self.ocid_prefix.chars().any(char::is_whitespace) {
            bail!("ocid_prefix must not contain whitespace: {:?}", self.ocid_prefix);
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConverterConfig::default();
        assert_eq!(config.ocid_prefix, "ocds-prefix");
        assert!(config.pretty);
        assert!(config.emit_bid_statistics);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConverterConfig::from_toml_str(r#"ocid_prefix = "ocds-abc123""#).unwrap();
        assert_eq!(config.ocid_prefix, "ocds-abc123");
        assert!(config.pretty);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(ConverterConfig::from_toml_str(r#"ocid_prefix = "  ""#).is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_OCID_PREFIX, "ocds-env"), (ENV_PRETTY, "false")]);
        let mut config = ConverterConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.ocid_prefix, "ocds-env");
        assert!(!config.pretty);
    }

    #[test]
    fn test_bad_boolean_override() {
        let mut config = ConverterConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_PRETTY).then(|| "maybe".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ocid_prefix = \"ocds-file\"\nemit_bid_statistics = false").unwrap();
        let config = ConverterConfig::load(file.path()).unwrap();
        assert_eq!(config.ocid_prefix, "ocds-file");
        assert!(!config.emit_bid_statistics);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(ConverterConfig::load(Path::new("/nonexistent/notice-release.toml")).is_err());
    }
}
