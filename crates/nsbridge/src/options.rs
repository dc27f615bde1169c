//! Bridge configuration
//!
//! Options can be built in code or loaded from a TOML table:
//!
//! ```toml
//! root_name = "clr"
//! preload = "auto"
//! wildcard = "*"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::reflect::NAMESPACE_SEPARATOR;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum OptionsError {
    /// Failed to read the options file
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid options: {0}")]
    Invalid(String),
}

/// When namespaces are enumerated eagerly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadMode {
    /// Preload iff the host runs an interactive session
    #[default]
    Auto,
    /// Always preload
    Enabled,
    /// Resolve just in time
    Disabled,
}

impl fmt::Display for PreloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreloadMode::Auto => write!(f, "auto"),
            PreloadMode::Enabled => write!(f, "enabled"),
            PreloadMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// Bridge options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeOptions {
    /// Reserved name of the root module (default: "clr")
    #[serde(default = "default_root_name")]
    pub root_name: String,

    /// Preload mode (default: auto)
    #[serde(default)]
    pub preload: PreloadMode,

    /// From-list marker meaning "everything" (default: "*")
    #[serde(default = "default_wildcard")]
    pub wildcard: String,
}

fn default_root_name() -> String {
    "clr".to_string()
}

fn default_wildcard() -> String {
    "*".to_string()
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            root_name: default_root_name(),
            preload: PreloadMode::default(),
            wildcard: default_wildcard(),
        }
    }
}

impl BridgeOptions {
    /// Parse options from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let options: BridgeOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Same options with a different preload mode
    pub fn with_preload(mut self, preload: PreloadMode) -> Self {
        self.preload = preload;
        self
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.root_name.is_empty() {
            return Err(OptionsError::Invalid(
                "root_name cannot be empty".to_string(),
            ));
        }

        if self.root_name.contains(NAMESPACE_SEPARATOR) {
            return Err(OptionsError::Invalid(format!(
                "root_name '{}' must be a single segment",
                self.root_name
            )));
        }

        if self.wildcard.is_empty() {
            return Err(OptionsError::Invalid("wildcard cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.root_name, "clr");
        assert_eq!(options.preload, PreloadMode::Auto);
        assert_eq!(options.wildcard, "*");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_table() {
        let options = BridgeOptions::from_toml_str(r#"preload = "enabled""#).unwrap();
        assert_eq!(options.preload, PreloadMode::Enabled);
        assert_eq!(options.root_name, "clr");
    }

    #[test]
    fn test_parse_full_table() {
        let toml = r#"
root_name = "dotnet"
preload = "disabled"
wildcard = "ALL"
"#;
        let options = BridgeOptions::from_toml_str(toml).unwrap();
        assert_eq!(options.root_name, "dotnet");
        assert_eq!(options.preload, PreloadMode::Disabled);
        assert_eq!(options.wildcard, "ALL");
    }

    #[test]
    fn test_invalid_root_name() {
        assert!(matches!(
            BridgeOptions::from_toml_str(r#"root_name = """#),
            Err(OptionsError::Invalid(_))
        ));
        assert!(matches!(
            BridgeOptions::from_toml_str(r#"root_name = "clr.sub""#),
            Err(OptionsError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_preload_mode() {
        assert!(matches!(
            BridgeOptions::from_toml_str(r#"preload = "sometimes""#),
            Err(OptionsError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            BridgeOptions::from_toml_str(r#"separator = "/""#),
            Err(OptionsError::Parse(_))
        ));
    }

    #[test]
    fn test_serialize_round_trip() {
        let options = BridgeOptions::default().with_preload(PreloadMode::Enabled);
        let content = toml::to_string(&options).unwrap();
        assert_eq!(BridgeOptions::from_toml_str(&content).unwrap(), options);
    }
}
