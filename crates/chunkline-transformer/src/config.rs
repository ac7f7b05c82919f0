use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};

/// Configuration for the payload splitter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Maximum payload bytes per physical object (default: 64 MiB).
    pub max_object_size: u64,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_object_size: 64 * 1024 * 1024, // 64 MiB
        }
    }
}

impl SplitterConfig {
    pub fn with_max_object_size(max_object_size: u64) -> Self {
        Self { max_object_size }
    }

    /// Parse a TOML document, e.g. `max_object_size = 1048576`.
    pub fn from_toml_str(s: &str) -> TransformResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TransformError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TransformResult<()> {
        if self.max_object_size == 0 {
            return Err(TransformError::InvalidMaxSize(self.max_object_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = SplitterConfig::default();
        assert_eq!(c.max_object_size, 64 * 1024 * 1024);
        c.validate().unwrap();
    }

    #[test]
    fn toml_overrides_size() {
        let c = SplitterConfig::from_toml_str("max_object_size = 1024").unwrap();
        assert_eq!(c.max_object_size, 1024);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let c = SplitterConfig::from_toml_str("").unwrap();
        assert_eq!(c, SplitterConfig::default());
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            SplitterConfig::from_toml_str("max_object_size = 0"),
            Err(TransformError::InvalidMaxSize(0))
        ));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            SplitterConfig::from_toml_str("max_object_size = \"big\""),
            Err(TransformError::Config(_))
        ));
    }
}
