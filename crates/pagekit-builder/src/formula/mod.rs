/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The formula language: tokenizer, operator table, parser and evaluator.
//!
//! A formula is the text between `{` and `}` in an attribute or text node.
//! It is tokenized, reduced to an [`ExpressionNode`] tree by operator
//! precedence, and evaluated against a [`ContextStack`].

pub mod entity;
pub mod evaluator;
pub mod operator;
pub mod parser;
pub mod token;

use std::sync::Arc;

use crate::context::ContextStack;
use crate::error::{BuildResult, ResultExt};
use crate::span::Span;
use crate::value::Value;

pub use entity::{entitize, resolve_entities};
pub use operator::{Bracket, Operator};
pub use parser::{ExpressionNode, parse_formula, treeify};
pub use token::{Token, TokenKind, tokenize_formula};

/// Parse and evaluate a standalone formula.
pub fn evaluate_formula(formula: &str, ctx: &ContextStack) -> BuildResult<Value> {
    evaluate_span(&Span::whole(Arc::from(formula)), ctx)
}

/// Parse and evaluate the formula text covered by `span`.
pub fn evaluate_span(span: &Span, ctx: &ContextStack) -> BuildResult<Value> {
    let tree = parse_formula(span).context("parse", None)?;
    tracing::trace!(formula = span.text(), tree = %tree, "evaluating formula");
    tree.evaluate(ctx, true)
}
