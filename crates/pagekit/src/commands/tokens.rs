/*
 * tokens.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokens command implementation

use anyhow::Result;

use pagekit_builder::formula::tokenize_formula;

/// Execute the tokens command
pub fn execute(formula: &str) -> Result<()> {
    for line in token_lines(formula)? {
        println!("{line}");
    }
    Ok(())
}

/// One line per token: offset, kind and text.
pub fn token_lines(formula: &str) -> Result<Vec<String>> {
    let tokens = tokenize_formula(formula).map_err(|err| {
        eprintln!("{}", err.to_report("formula", true));
        anyhow::anyhow!("{}", err)
    })?;
    Ok(tokens
        .iter()
        .map(|token| {
            let kind = format!("{:?}", token.kind);
            format!("{:>4} {:<24} {:?}", token.span.offset(), kind, token.text)
        })
        .collect())
}
