/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration.
//!
//! Loaded from TOML, with kebab-case keys:
//!
//! ```toml
//! trim = "on"
//! max-template-depth = 20
//! max-loop-items = 10000
//! strict = false
//! ```

use serde::Deserialize;

use crate::text::TrimMode;

/// Default limit on nested template instantiation.
pub const DEFAULT_MAX_TEMPLATE_DEPTH: usize = 50;

/// Default limit on the number of items one range loop may produce.
pub const DEFAULT_MAX_LOOP_ITEMS: usize = 100_000;

/// Options that shape one expansion run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Whitespace handling for text nodes. Attribute values are always
    /// trimmed at the ends.
    pub trim: TrimMode,

    /// How deeply `<use>` may nest before expansion fails.
    pub max_template_depth: usize,

    /// How many items a `<for range>` loop may produce before expansion
    /// fails.
    pub max_loop_items: usize,

    /// Ignore `nothrow` markers, so every error propagates.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trim: TrimMode::Off,
            max_template_depth: DEFAULT_MAX_TEMPLATE_DEPTH,
            max_loop_items: DEFAULT_MAX_LOOP_ITEMS,
            strict: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text. Missing keys keep their
    /// defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_kebab_case_keys() {
        let config = EngineConfig::from_toml_str(
            "trim = \"all\"\nmax-template-depth = 3\nmax-loop-items = 10\nstrict = true\n",
        )
        .unwrap();
        assert_eq!(
            config,
            EngineConfig {
                trim: TrimMode::All,
                max_template_depth: 3,
                max_loop_items: 10,
                strict: true,
            }
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(EngineConfig::from_toml_str("trimm = \"on\"").is_err());
        assert!(EngineConfig::from_toml_str("trim = \"sideways\"").is_err());
    }
}
