/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression tree evaluation.

use crate::context::ContextStack;
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::value::{Value, format_number, is_integer_text};

use super::entity::resolve_entities;
use super::operator::{Apply, Bracket};
use super::parser::ExpressionNode;

impl ExpressionNode {
    /// Evaluate this node against `ctx`.
    ///
    /// `eval_text` controls what a bare word means when this node is a leaf:
    /// when set, the word is looked up in the current scope; otherwise it is
    /// taken as literal text (the right side of `.`, for instance).
    pub fn evaluate(&self, ctx: &ContextStack, eval_text: bool) -> BuildResult<Value> {
        let Some(op) = self.operator() else {
            return self.evaluate_leaf(ctx, eval_text);
        };
        let info = op.info();

        match info.apply {
            Apply::Binary(apply) => {
                let (Some(left), Some(right)) = (&self.left, &self.right) else {
                    return Err(BuildError::at(
                        ErrorCause::Internal(format!("binary {} without operands", info.symbol)),
                        &self.span,
                    ));
                };
                let result = (|| {
                    let a = left.evaluate(ctx, info.eval_left)?;
                    let b = right.evaluate(ctx, info.eval_right || right.re_roots())?;
                    let value = apply(&a, &b, &left.span, &right.span)?;
                    self.check_finite(value, || {
                        format!("{} {} {}", a.display_text(), info.symbol, b.display_text())
                    })
                })();
                result.context("evaluate:binary", Some(&self.span))
            }
            Apply::Unary(apply) => {
                let Some(right) = &self.right else {
                    return Err(BuildError::at(
                        ErrorCause::Internal(format!("unary {} without operand", info.symbol)),
                        &self.span,
                    ));
                };
                let result = (|| {
                    let a = right.evaluate(ctx, info.eval_right || right.re_roots())?;
                    let value = apply(&a, &right.span, ctx)?;
                    self.check_finite(value, || format!("{}{}", info.symbol, a.display_text()))
                })();
                result.context("evaluate:unary", Some(&self.span))
            }
        }
    }

    fn evaluate_leaf(&self, ctx: &ContextStack, eval_text: bool) -> BuildResult<Value> {
        let raw = &self.value.text;
        if self.bracket.is_some_and(Bracket::is_quote) || !eval_text {
            return Ok(Value::String(resolve_entities(raw)));
        }

        let resolved = resolve_entities(raw);
        let name = resolved.trim();
        if let Some(value) = ctx.lookup(name) {
            tracing::trace!(name, "resolved name from context");
            return Ok(match value {
                Value::String(s) => Value::String(resolve_entities(s)),
                other => other.clone(),
            });
        }
        if is_integer_text(name) {
            if let Ok(n) = name.parse::<i64>() {
                return Ok(Value::Number(n as f64));
            }
        }
        if self.bracket == Some(Bracket::Curly) {
            return Err(BuildError::at(
                ErrorCause::NameLookupFailed(name.to_string()),
                &self.span,
            ));
        }
        Ok(Value::String(resolved))
    }

    fn check_finite(&self, value: Value, detail: impl FnOnce() -> String) -> BuildResult<Value> {
        match value {
            Value::Number(n) if !n.is_finite() => Err(BuildError::at(
                ErrorCause::NonFiniteResult {
                    operator: self.value.text.clone(),
                    detail: format!("{} = {}", detail(), format_number(n)),
                },
                &self.span,
            )),
            other => Ok(other),
        }
    }
}
