/*
 * conditional.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `<if>`, `<elseif>` and `<else>` runs.
//!
//! Siblings form a run that starts at an `<if>`. The first branch whose test
//! passes expands its children; every later branch in the run yields
//! nothing. Any other element, or non-blank text, ends the run.
//!
//! Tests are one of:
//!
//! - `test="formula"` alone: passes when the value is `true`
//! - `test="formula"` with `eq`, `ne`, `lt`, `le`, `gt`, `ge`, `in`, `ni`
//!   or `regex`
//! - `not="formula"`: passes when the value is false or empty
//! - `exists="formula"`, `notex="formula"`

use regex::Regex;

use super::EngineState;
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::output::OutputNode;
use crate::source::{Attribute, SourceElement};
use crate::text::{TrimMode, complex_attribute, key_exists_in_context};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Branch {
    If,
    ElseIf,
    Else,
}

impl Branch {
    fn tag(self) -> &'static str {
        match self {
            Branch::If => "if",
            Branch::ElseIf => "elseif",
            Branch::Else => "else",
        }
    }
}

/// State of the current sibling run.
#[derive(Debug, Default)]
pub(super) struct BranchRun {
    /// An `<if>` started a run that has not been closed.
    open: bool,
    /// Some branch of the run has already passed.
    passed: bool,
}

impl BranchRun {
    pub(super) fn reset(&mut self) {
        *self = BranchRun::default();
    }
}

/// Comparison attributes, in the order they are looked for.
const COMPARISONS: &[&str] = &["eq", "ne", "lt", "le", "gt", "ge", "in", "ni", "regex"];

impl EngineState {
    pub(super) fn expand_branch(
        &mut self,
        branch: Branch,
        element: &SourceElement,
        run: &mut BranchRun,
    ) -> BuildResult<Vec<OutputNode>> {
        match branch {
            Branch::If => {
                run.open = true;
                run.passed = false;
            }
            Branch::ElseIf | Branch::Else if !run.open => {
                return Err(BuildError::new(ErrorCause::OrphanBranch(
                    branch.tag().to_string(),
                )));
            }
            Branch::ElseIf => {}
            Branch::Else => run.open = false,
        }
        if run.passed {
            return Ok(Vec::new());
        }

        let passed = self.branch_passes(branch, element).context("if_block", None)?;
        tracing::debug!(branch = branch.tag(), passed, "evaluated conditional");
        if !passed {
            return Ok(Vec::new());
        }
        run.passed = true;
        self.expand(&element.children)
    }

    fn branch_passes(&self, branch: Branch, element: &SourceElement) -> BuildResult<bool> {
        if branch == Branch::Else {
            return Ok(true);
        }
        if let Some(attr) = element.attribute("exists") {
            return Ok(self.exists(attr));
        }
        if let Some(attr) = element.attribute("notex") {
            return Ok(!self.exists(attr));
        }
        if let Some(attr) = element.attribute("not") {
            let value = self.implicit_formula(attr)?;
            return Ok(match &value {
                Value::Null => true,
                Value::Bool(b) => !b,
                Value::String(s) => s.is_empty() || s == "false",
                _ => false,
            });
        }
        let Some(test) = element.attribute("test") else {
            return Err(BuildError::new(ErrorCause::MissingTest(
                branch.tag().to_string(),
            )));
        };
        let value = self.implicit_formula(test)?;

        let Some((query, attr)) = element.first_attr(COMPARISONS) else {
            return Ok(matches!(&value, Value::Bool(true))
                || value.as_str() == Some("true"));
        };
        self.compare(&value, test, query, attr)
    }

    /// Does the formula evaluate to something non-empty? Bare names must
    /// resolve: `exists="missing"` is false rather than the word "missing".
    fn exists(&self, attr: &Attribute) -> bool {
        let formula = attr.value.trim();
        if formula.starts_with('{') {
            key_exists_in_context(formula, &self.context)
        } else {
            key_exists_in_context(&format!("{{{formula}}}"), &self.context)
        }
    }

    fn compare(&self, value: &Value, test: &Attribute, query: &str, attr: &Attribute) -> BuildResult<bool> {
        let other = complex_attribute(&attr.span(), TrimMode::Off, &self.context)?;
        let float = |v: &Value, at: &Attribute| {
            v.make_float()
                .map_err(|cause| BuildError::at(cause, &at.span()))
        };
        let text = |v: &Value, at: &Attribute| {
            v.make_string()
                .map_err(|cause| BuildError::at(cause, &at.span()))
        };

        match query {
            "eq" => Ok(values_equal(value, &other)),
            "ne" => Ok(!values_equal(value, &other)),
            "lt" => Ok(float(value, test)? < float(&other, attr)?),
            "le" => Ok(float(value, test)? <= float(&other, attr)?),
            "gt" => Ok(float(value, test)? > float(&other, attr)?),
            "ge" => Ok(float(value, test)? >= float(&other, attr)?),
            "in" | "ni" => {
                let found = match &other {
                    Value::List(items) => items.iter().any(|item| values_equal(item, value)),
                    Value::String(s) => s.contains(text(value, test)?.as_str()),
                    Value::Map(map) => map.contains_key(text(value, test)?.as_str()),
                    _ => {
                        return Err(BuildError::at(
                            ErrorCause::UnsupportedQuery {
                                kind: other.type_name(),
                                query: if query == "in" { "in" } else { "not-in" },
                            },
                            &attr.span(),
                        ));
                    }
                };
                Ok(found == (query == "in"))
            }
            _ => {
                let pattern = text(&other, attr)?;
                let regex = Regex::new(&pattern).map_err(|err| {
                    BuildError::at(
                        ErrorCause::InvalidRegex {
                            pattern: pattern.clone(),
                            message: err.to_string(),
                        },
                        &attr.span(),
                    )
                })?;
                Ok(regex.is_match(&text(value, test)?))
            }
        }
    }
}

/// Text forms are compared when both sides have one, so `5` equals `"5"`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.make_string(), b.make_string()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
