//! Front-end configuration loaded from TOML

use crate::error::ExpandError;
use serde::{Deserialize, Serialize};

/// Settings shared by the expander and diagnostics
///
/// Every field has a default, so an empty document is a valid configuration:
///
/// ```toml
/// [expansion]
/// max_depth = 128
///
/// [diagnostics]
/// sample_len = 20
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Macro expansion settings
    pub expansion: ExpansionConfig,

    /// Error rendering settings
    pub diagnostics: DiagnosticsConfig,
}

/// Macro expansion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Deepest chain of nested expansions before giving up
    pub max_depth: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// Error rendering settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Characters of source text quoted in error samples
    pub sample_len: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { sample_len: 20 }
    }
}

impl FrontendConfig {
    /// Parse a configuration document
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::Config`] if the text is not valid TOML or a
    /// field has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ExpandError> {
        toml::from_str(text).map_err(|error| ExpandError::Config {
            message: error.to_string(),
        })
    }

    /// Render the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ExpandError> {
        toml::to_string(self).map_err(|error| ExpandError::Config {
            message: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FrontendConfig::from_toml_str("");
        assert_eq!(config.ok(), Some(FrontendConfig::default()));
        assert_eq!(FrontendConfig::default().expansion.max_depth, 128);
        assert_eq!(FrontendConfig::default().diagnostics.sample_len, 20);
    }

    #[test]
    fn test_partial_document() {
        let config = FrontendConfig::from_toml_str("[expansion]\nmax_depth = 4\n");
        let config = config.unwrap_or_default();
        assert_eq!(config.expansion.max_depth, 4);
        assert_eq!(config.diagnostics.sample_len, 20);
    }

    #[test]
    fn test_bad_document() {
        let config = FrontendConfig::from_toml_str("[expansion]\nmax_depth = \"deep\"\n");
        assert!(matches!(config, Err(ExpandError::Config { .. })));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = FrontendConfig::default();
        config.diagnostics.sample_len = 40;
        let text = config.to_toml_string().unwrap_or_default();
        assert_eq!(FrontendConfig::from_toml_str(&text).ok(), Some(config));
    }
}
