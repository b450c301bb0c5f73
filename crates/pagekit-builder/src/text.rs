/*
 * text.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formulas embedded in document text.
//!
//! Attribute values and text nodes may mix literal text with `{formula}`
//! runs. [`tokenize_text`] splits the two apart; [`complex_attribute`] and
//! [`clone_text`] evaluate the formulas and stitch the result back together.
//!
//! A backtick escapes a brace (`` `{ ``) or itself (` `` `). Formula runs
//! keep their escapes, since the formula tokenizer interprets them itself.

use std::sync::Arc;

use serde::Deserialize;

use crate::context::ContextStack;
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::formula::evaluate_formula;
use crate::formula::evaluate_span;
use crate::formula::token::ESCAPE;
use crate::span::Span;
use crate::value::Value;

/// A run of literal text, or the interior of one `{formula}`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextToken {
    /// Literal text with brace escapes removed, or the raw formula interior.
    pub text: String,
    pub formula: bool,
    /// For formulas, the interior without the braces.
    pub span: Span,
}

/// Whitespace handling for text nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// Keep text as written.
    #[default]
    Off,
    /// Trim both ends of the whole text.
    On,
    /// Also trim every literal run between formulas.
    All,
}

/// Split the text covered by `span` into literal and formula tokens.
pub fn tokenize_text(span: &Span) -> BuildResult<Vec<TextToken>> {
    let raw = span.text();
    let base = span.offset();
    let source = span.source();
    let at = |offset: usize, length: usize| Span::new(source.clone(), base + offset, length);

    let mut list = Vec::new();
    let mut start = 0;
    while start < raw.len() {
        let open = find_non_escaped(raw, '{', start);
        if let Some(close) = find_non_escaped(raw, '}', start) {
            if open.is_none_or(|open| close < open) {
                return Err(BuildError::at(ErrorCause::StrayCloseDelimiter, &at(close, 1)));
            }
        }
        let Some(open) = open else {
            break;
        };

        if open > start {
            list.push(TextToken {
                text: unescape_braces(&raw[start..open]),
                formula: false,
                span: at(start, open - start),
            });
        }

        let mut depth = 1;
        let mut inner = open + 1;
        while depth > 0 {
            let Some(close) = find_non_escaped(raw, '}', inner) else {
                return Err(BuildError::at(ErrorCause::UnclosedDelimiter, &at(open, 1)));
            };
            match find_non_escaped(raw, '{', inner) {
                Some(nested) if nested < close => {
                    depth += 1;
                    inner = nested + 1;
                }
                _ => {
                    depth -= 1;
                    inner = close + 1;
                }
            }
        }

        let interior = open + 1..inner - 1;
        list.push(TextToken {
            text: raw[interior.clone()].to_string(),
            formula: true,
            span: at(interior.start, interior.len()),
        });
        start = inner;
    }

    if start < raw.len() {
        list.push(TextToken {
            text: unescape_braces(&raw[start..]),
            formula: false,
            span: at(start, raw.len() - start),
        });
    }
    Ok(list)
}

/// Find the next `find` at or after byte `start` that is not escaped.
///
/// An odd run of backticks before the character escapes it; an even run
/// is a sequence of escaped backticks.
pub fn find_non_escaped(raw: &str, find: char, start: usize) -> Option<usize> {
    let mut from = start;
    while from < raw.len() {
        let found = from + raw[from..].find(find)?;
        let escapes = raw[..found]
            .chars()
            .rev()
            .take_while(|&c| c == ESCAPE)
            .count();
        if escapes % 2 == 1 {
            from = found + find.len_utf8();
            continue;
        }
        return Some(found);
    }
    None
}

/// Drop the backtick before escaped braces and backticks. Any other
/// backtick is literal.
pub fn unescape_braces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            if let Some(&next) = chars.peek() {
                if next == ESCAPE || next == '{' || next == '}' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// Trim ASCII whitespace and control characters, but not non-breaking
/// spaces, which authors use to keep intended padding.
pub fn simple_trim(text: &str) -> &str {
    text.trim_matches(is_trimmable)
}

fn is_trimmable(ch: char) -> bool {
    ch > '\0' && ch <= ' '
}

fn trimmed_span(span: &Span) -> Span {
    let text = span.text();
    let leading = text.len() - text.trim_start_matches(is_trimmable).len();
    let kept = simple_trim(text).len();
    Span::new(span.source().clone(), span.offset() + leading, kept)
}

/// Evaluate text that may embed formulas.
///
/// Text that is exactly one formula yields that formula's native value.
/// Anything else yields a string, with each formula's value stringified.
pub fn complex_attribute(span: &Span, trim: TrimMode, ctx: &ContextStack) -> BuildResult<Value> {
    let span = match trim {
        TrimMode::Off => span.clone(),
        TrimMode::On | TrimMode::All => trimmed_span(span),
    };
    let tokens = tokenize_text(&span)?;

    if let [only] = tokens.as_slice() {
        if only.formula {
            return evaluate_span(&only.span, ctx).context("complex_attribute", Some(&only.span));
        }
    }

    let mut buffer = String::new();
    for token in &tokens {
        if !token.formula {
            match trim {
                TrimMode::All => buffer.push_str(simple_trim(&token.text)),
                _ => buffer.push_str(&token.text),
            }
            continue;
        }
        let text = evaluate_span(&token.span, ctx)
            .and_then(|value| {
                value
                    .make_string()
                    .map_err(|cause| BuildError::at(cause, &token.span))
            })
            .context("complex_attribute", Some(&token.span))?;
        buffer.push_str(&text);
    }
    Ok(Value::String(buffer))
}

/// Evaluate text that may embed formulas, always producing text. Ends are
/// always trimmed.
pub fn clone_text(span: &Span, trim: TrimMode, ctx: &ContextStack) -> BuildResult<String> {
    let value = complex_attribute(span, trim.max(TrimMode::On), ctx)?;
    Ok(value.display_text())
}

/// Evaluate a formula (without braces) and coerce the result to text.
pub fn text_from_context(formula: &str, ctx: &ContextStack) -> BuildResult<String> {
    let source: Arc<str> = Arc::from(formula);
    let value = evaluate_formula(formula, ctx)?;
    value
        .make_string()
        .map_err(|cause| BuildError::at(cause, &Span::whole(source)))
}

/// Does `formula` evaluate to something other than null or the empty
/// string? Evaluation errors count as "does not exist". Empty lists and
/// maps do exist.
pub fn key_exists_in_context(formula: &str, ctx: &ContextStack) -> bool {
    evaluate_formula(formula, ctx).is_ok_and(|value| !value.is_blank())
}

/// Look up a single key in the current scope. With `maybe`, a missing key
/// yields the empty string instead of an error.
pub fn value_from_context(key: &str, ctx: &ContextStack, maybe: bool) -> BuildResult<Value> {
    match ctx.scope_child(&Value::from(key)) {
        Ok(value) => Ok(value),
        Err(_) if maybe => Ok(Value::empty()),
        Err(cause) => Err(BuildError::at(cause, &Span::whole(Arc::from(key)))),
    }
}

/// Look up a single key in the host data, ignoring loop and template
/// bindings. With `maybe`, a missing key yields the empty string.
pub fn value_from_root(key: &str, ctx: &ContextStack, maybe: bool) -> BuildResult<Value> {
    match ctx.root_child(&Value::from(key)) {
        Ok(value) => Ok(value),
        Err(_) if maybe => Ok(Value::empty()),
        Err(cause) => Err(BuildError::at(cause, &Span::whole(Arc::from(key)))),
    }
}
