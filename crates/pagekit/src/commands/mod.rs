/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the PageKit CLI
//!
//! Each command module handles the CLI interface and delegates to
//! pagekit-builder for the actual work.

pub mod eval;
pub mod expand;
pub mod tokens;

use std::path::Path;

use anyhow::{Context, Result};
use pagekit_builder::EngineConfig;

/// Read host data from a JSON file. Without a file, formulas see an empty
/// object.
pub fn load_context(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        return Ok(serde_json::Value::Object(Default::default()));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Context file is not valid JSON: {}", path.display()))
}

/// Read engine configuration from a TOML file, or use the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    EngineConfig::from_toml_str(&text)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}
