/*
 * expand.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Expand command implementation
 */

//! Expand command implementation.
//!
//! Loads a markup document, registers its templates, expands it against
//! the host data and writes the resulting HTML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use pagekit_builder::{ContextStack, EngineState, parse_fragment, to_html};

use super::{load_config, load_context};

/// Arguments for the expand command
#[derive(Debug)]
pub struct ExpandArgs {
    /// Markup document
    pub input: PathBuf,
    /// JSON host data
    pub context: Option<PathBuf>,
    /// TOML engine configuration
    pub config: Option<PathBuf>,
    /// Output file; stdout when absent
    pub output: Option<PathBuf>,
}

/// Execute the expand command
pub fn execute(args: ExpandArgs) -> Result<()> {
    let html = expand_file(&args.input, args.context.as_deref(), args.config.as_deref())?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, html)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{html}"),
    }
    Ok(())
}

/// Expand one markup file to HTML.
pub fn expand_file(input: &Path, context: Option<&Path>, config: Option<&Path>) -> Result<String> {
    let markup = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input: {}", input.display()))?;
    let data = load_context(context)?;
    let config = load_config(config)?;

    let nodes = parse_fragment(&markup)
        .with_context(|| format!("Failed to parse markup: {}", input.display()))?;

    let mut state = EngineState::new(ContextStack::from_json(data)).with_config(config);
    let output = match state.expand_document(&nodes) {
        Ok(output) => output,
        Err(err) => {
            eprintln!("{}", err.to_report(&input.display().to_string(), true));
            if !err.elements().is_empty() {
                eprintln!("{}", err.render());
            }
            anyhow::bail!("Expansion of {} failed: {}", input.display(), err);
        }
    };

    for diagnostic in state.diagnostics() {
        warn!("{}", diagnostic.render());
    }
    Ok(to_html(&output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_file_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.xml");
        let context = dir.path().join("data.json");
        std::fs::write(&input, "<ul><for each=\"x\" in=\"xs\"><li>{x}</li></for></ul>").unwrap();
        std::fs::write(&context, "{\"xs\": [\"a\", \"b\"]}").unwrap();

        let html = expand_file(&input, Some(&context), None).unwrap();
        assert_eq!(html, "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn test_expand_writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.xml");
        let config = dir.path().join("pagekit.toml");
        let output = dir.path().join("page.html");
        std::fs::write(&input, "<p>  {1 + 2}  </p>").unwrap();
        std::fs::write(&config, "trim = \"on\"").unwrap();

        execute(ExpandArgs {
            input,
            context: None,
            config: Some(config),
            output: Some(output.clone()),
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "<p>3</p>");
    }

    #[test]
    fn test_expand_errors() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.xml");

        std::fs::write(&input, "<p>").unwrap();
        let err = expand_file(&input, None, None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse markup"));

        std::fs::write(&input, "<p>{a.b}</p>").unwrap();
        let err = expand_file(&input, None, None).unwrap_err();
        assert!(err.to_string().contains("Expansion of"));
    }
}
