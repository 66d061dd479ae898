//! Interception stage configuration.
//!
//! Controls the name the interception stage is registered under and the
//! host stage it is inserted in front of.
//!
//! # Example
//!
//! ```ignore
//! use pipeline_tap::InterceptConfig;
//!
//! let config = InterceptConfig::new()
//!     .with_stage_name("audit_tap")
//!     .with_anchor("packet_handler");
//!
//! let config = InterceptConfig::from_json(r#"{ "stage_name": "audit_tap" }"#)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default name of the interception stage.
pub const DEFAULT_STAGE_NAME: &str = "pipeline_tap";

/// Default name of the host's terminal processing stage.
pub const DEFAULT_ANCHOR: &str = "packet_handler";

// ============================================================================
// InterceptConfig
// ============================================================================

/// Where and under which name an interception stage is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Name of the inserted interception stage.
    ///
    /// At most one stage with this name exists per pipeline.
    pub stage_name: String,

    /// Name of the stage the interception stage is inserted before.
    pub anchor: String,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl InterceptConfig {
    /// Creates a configuration with default stage and anchor names.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            anchor: DEFAULT_ANCHOR.to_string(),
        }
    }

    /// Parses a configuration from JSON.
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the input is not valid JSON
    /// - [`Error::Config`] if the resulting configuration is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl InterceptConfig {
    /// Sets the interception stage name.
    #[inline]
    #[must_use]
    pub fn with_stage_name(mut self, name: impl Into<String>) -> Self {
        self.stage_name = name.into();
        self
    }

    /// Sets the anchor stage name.
    #[inline]
    #[must_use]
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl InterceptConfig {
    /// Checks that both names are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a name is blank or both names are equal.
    pub fn validate(&self) -> Result<()> {
        if self.stage_name.trim().is_empty() {
            return Err(Error::config("stage_name must not be empty"));
        }
        if self.anchor.trim().is_empty() {
            return Err(Error::config("anchor must not be empty"));
        }
        if self.stage_name == self.anchor {
            return Err(Error::config(format!(
                "stage_name and anchor must differ (both are '{}')",
                self.anchor
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InterceptConfig::default();
        assert_eq!(config.stage_name, DEFAULT_STAGE_NAME);
        assert_eq!(config.anchor, DEFAULT_ANCHOR);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = InterceptConfig::new()
            .with_stage_name("audit")
            .with_anchor("host");
        assert_eq!(config.stage_name, "audit");
        assert_eq!(config.anchor, "host");
    }

    #[test]
    fn test_from_json_partial() {
        let config = InterceptConfig::from_json(r#"{ "stage_name": "audit" }"#).unwrap();
        assert_eq!(config.stage_name, "audit");
        assert_eq!(config.anchor, DEFAULT_ANCHOR);
    }

    #[test]
    fn test_from_json_rejects_same_names() {
        let err = InterceptConfig::from_json(
            r#"{ "stage_name": "packet_handler", "anchor": "packet_handler" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_from_json_invalid() {
        let err = InterceptConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_validate_blank() {
        let config = InterceptConfig::new().with_stage_name("  ");
        assert!(config.validate().is_err());
    }
}
