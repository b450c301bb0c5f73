/*
 * eval.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Eval command implementation

use std::path::Path;

use anyhow::Result;

use pagekit_builder::{ContextStack, Value, evaluate_formula};

use super::load_context;

/// Execute the eval command
pub fn execute(formula: &str, context: Option<&Path>) -> Result<()> {
    let value = evaluate(formula, context)?;
    println!("{}", serde_json::to_string_pretty(&value.to_json())?);
    Ok(())
}

/// Evaluate `formula` against the host data in `context`.
pub fn evaluate(formula: &str, context: Option<&Path>) -> Result<Value> {
    let ctx = ContextStack::from_json(load_context(context)?);
    evaluate_formula(formula, &ctx).map_err(|err| {
        eprintln!("{}", err.to_report("formula", true));
        anyhow::anyhow!("{}", err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_evaluate_against_context_file() {
        let dir = tempfile::tempdir().unwrap();
        let context = dir.path().join("data.json");
        std::fs::write(&context, "{\"a\": {\"b\": [10, 20, 30]}}").unwrap();

        let value = evaluate("a.b.1 + 1", Some(&context)).unwrap();
        assert_eq!(value, Value::Number(21.0));
        let value = evaluate("a.b?9", Some(&context)).unwrap();
        assert_eq!(value, Value::empty());
    }

    #[test]
    fn test_evaluate_error() {
        let err = evaluate("a.b.9", None).unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
