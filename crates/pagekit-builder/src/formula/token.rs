/*
 * token.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formula tokenizer.
//!
//! A single left-to-right scan splits a formula into operator, bracket and
//! text tokens, honoring backtick escapes and quotes. A second pass decides
//! whether each ambiguous operator is unary or binary and classifies text
//! runs as spaces, integers or words.

use std::sync::Arc;

use crate::error::{BuildError, BuildResult, ErrorCause};
use crate::span::Span;
use crate::value::is_integer_text;

use super::operator::{Bracket, Operator};

/// The escape character.
pub const ESCAPE: char = '`';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Operator(Operator),
    Open(Bracket),
    Close(Bracket),
    Word,
    Number,
    Space,
}

impl TokenKind {
    /// Word, number or close bracket: something an operator can follow.
    fn is_operand_end(self) -> bool {
        matches!(self, TokenKind::Word | TokenKind::Number | TokenKind::Close(_))
    }
}

/// A token with its location in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token text with escapes resolved.
    pub text: String,
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_space(&self) -> bool {
        self.kind == TokenKind::Space
    }
}

/// First-pass classification, before operator positions are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Raw {
    Symbol(char),
    Open(Bracket),
    Close(Bracket),
    Text,
}

struct RawToken {
    raw: Raw,
    text: String,
    start: usize,
    end: usize,
}

/// Tokenize a standalone formula.
pub fn tokenize_formula(formula: &str) -> BuildResult<Vec<Token>> {
    tokenize_span(&Span::whole(Arc::from(formula)))
}

/// Tokenize the text covered by `span`. Token spans point into the same
/// source, so errors can be reported against the surrounding text.
pub fn tokenize_span(span: &Span) -> BuildResult<Vec<Token>> {
    let source = span.source();
    let base = span.offset();
    let text = span.text();

    let mut raws: Vec<RawToken> = Vec::new();
    let mut stack: Vec<(Bracket, usize)> = Vec::new();
    let mut pending = String::new();
    let mut pending_start = base;
    let mut escape = false;

    let flush = |raws: &mut Vec<RawToken>, pending: &mut String, start: usize, end: usize| {
        if !pending.is_empty() {
            raws.push(RawToken {
                raw: Raw::Text,
                text: std::mem::take(pending),
                start,
                end,
            });
        }
    };

    for (i, ch) in text.char_indices() {
        let at = base + i;
        let next = at + ch.len_utf8();

        if ch == ESCAPE && !escape {
            if pending.is_empty() {
                pending_start = at;
            }
            escape = true;
            continue;
        }
        let escaped = std::mem::take(&mut escape);
        let in_quotes = stack.last().is_some_and(|(b, _)| b.is_quote());

        if !escaped && stack.last().is_some_and(|(b, _)| b.close() == ch) {
            flush(&mut raws, &mut pending, pending_start, at);
            let (bracket, _) = stack.pop().unwrap_or((Bracket::Round, at));
            raws.push(RawToken {
                raw: Raw::Close(bracket),
                text: ch.to_string(),
                start: at,
                end: next,
            });
            pending_start = next;
            continue;
        }

        if !escaped && !in_quotes {
            if let Some(bracket) = Bracket::from_open(ch) {
                flush(&mut raws, &mut pending, pending_start, at);
                raws.push(RawToken {
                    raw: Raw::Open(bracket),
                    text: ch.to_string(),
                    start: at,
                    end: next,
                });
                stack.push((bracket, at));
                pending_start = next;
                continue;
            }
            if Bracket::from_close(ch).is_some() {
                let span = Span::new(source.clone(), at, ch.len_utf8());
                return Err(BuildError::at(ErrorCause::UnmatchedClose, &span));
            }
            if Operator::is_symbol(ch) {
                flush(&mut raws, &mut pending, pending_start, at);
                raws.push(RawToken {
                    raw: Raw::Symbol(ch),
                    text: ch.to_string(),
                    start: at,
                    end: next,
                });
                pending_start = next;
                continue;
            }
        }

        // Anything else is text
        if pending.is_empty() && !escaped {
            pending_start = at;
        }
        if escaped && !super::operator::is_special(ch) && ch != ESCAPE {
            pending.push(ESCAPE);
        }
        pending.push(ch);
    }
    if escape {
        // A trailing escape has nothing to escape
        pending.push(ESCAPE);
    }
    flush(&mut raws, &mut pending, pending_start, base + text.len());

    if let Some((bracket, at)) = stack.pop() {
        let span = Span::new(source.clone(), at, bracket.open().len_utf8());
        return Err(BuildError::at(
            ErrorCause::MissingClose {
                what: bracket.describe(),
            },
            &span,
        ));
    }

    Ok(classify(raws, source))
}

/// Second pass: resolve operator positions and text sub-types.
fn classify(raws: Vec<RawToken>, source: &Arc<str>) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(raws.len());
    let mut prev: Option<TokenKind> = None;

    for raw in raws {
        let kind = match raw.raw {
            Raw::Symbol(ch) => {
                let unary = !prev.is_some_and(TokenKind::is_operand_end);
                // is_symbol() vetted every symbol in the first pass
                let op = Operator::resolve(ch, unary).unwrap_or(Operator::Concat);
                TokenKind::Operator(op)
            }
            Raw::Open(b) => TokenKind::Open(b),
            Raw::Close(b) => TokenKind::Close(b),
            Raw::Text => {
                if raw.text.trim().is_empty() {
                    TokenKind::Space
                } else if is_integer_text(&raw.text) {
                    TokenKind::Number
                } else {
                    TokenKind::Word
                }
            }
        };
        if kind != TokenKind::Space {
            prev = Some(kind);
        }
        tokens.push(Token {
            text: raw.text,
            kind,
            span: Span::new(source.clone(), raw.start, raw.end - raw.start),
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(formula: &str) -> Vec<String> {
        tokenize_formula(formula)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    fn kinds(formula: &str) -> Vec<TokenKind> {
        tokenize_formula(formula)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn error_offset(formula: &str) -> usize {
        tokenize_formula(formula).unwrap_err().spans()[0].offset()
    }

    #[test]
    fn test_spaces_stay_with_text() {
        assert_eq!(texts(" num + 3 "), vec![" num ", "+", " 3 "]);
        assert_eq!(
            kinds(" num + 3 "),
            vec![
                TokenKind::Word,
                TokenKind::Operator(Operator::Add),
                TokenKind::Number
            ]
        );
    }

    #[test]
    fn test_token_spans() {
        let tokens = tokenize_formula("ab+cd").unwrap();
        assert_eq!(tokens[0].span.offset(), 0);
        assert_eq!(tokens[0].span.len(), 2);
        assert_eq!(tokens[1].span.offset(), 2);
        assert_eq!(tokens[2].span.offset(), 3);
        assert_eq!(tokens[2].span.text(), "cd");
    }

    #[test]
    fn test_quotes_suppress_operators() {
        assert_eq!(texts("'a+(b'"), vec!["'", "a+(b", "'"]);
        assert_eq!(texts("\"x'y\""), vec!["\"", "x'y", "\""]);
    }

    #[test]
    fn test_escapes() {
        // Escaped operators and brackets are text
        assert_eq!(texts("a`+b"), vec!["a+b"]);
        assert_eq!(texts("`(x`)"), vec!["(x)"]);
        // Escaped quote inside quotes doesn't close
        assert_eq!(texts("'it`'s'"), vec!["'", "it's", "'"]);
        // A double escape is one literal backtick
        assert_eq!(texts("a``b"), vec!["a`b"]);
        // Before anything else the escape is literal
        assert_eq!(texts("`n"), vec!["`n"]);
        assert_eq!(texts("n`"), vec!["n`"]);
    }

    #[test]
    fn test_escaped_text_span_includes_escape() {
        let tokens = tokenize_formula("`(x").unwrap();
        assert_eq!(tokens[0].span.offset(), 0);
        assert_eq!(tokens[0].span.len(), 3);
    }

    #[test]
    fn test_unary_binary_disambiguation() {
        assert_eq!(
            kinds("-2"),
            vec![TokenKind::Operator(Operator::Negate), TokenKind::Number]
        );
        assert_eq!(
            kinds("3-2"),
            vec![
                TokenKind::Number,
                TokenKind::Operator(Operator::Subtract),
                TokenKind::Number
            ]
        );
        assert_eq!(
            kinds("3 - -2")[3],
            TokenKind::Operator(Operator::Negate)
        );
        assert_eq!(
            kinds("(1)-2")[3],
            TokenKind::Operator(Operator::Subtract)
        );
        assert_eq!(kinds("?a")[0], TokenKind::Operator(Operator::OptionalScope));
        assert_eq!(kinds("a?b")[1], TokenKind::Operator(Operator::OptionalChild));
    }

    #[test]
    fn test_bracket_balance() {
        assert!(tokenize_formula("((a)[b]{c})").is_ok());
        assert!(tokenize_formula("'(' ~ \"]\"").is_ok());
        assert_eq!(error_offset("(2+3"), 0);
        assert_eq!(error_offset("2+3)"), 3);
        assert_eq!(error_offset("[(]"), 2);
        assert_eq!(error_offset("\"hello`\""), 0);
        assert_eq!(error_offset("`'world'"), 7);
    }

    #[test]
    fn test_missing_close_names_quotes() {
        let err = tokenize_formula("'abc").unwrap_err();
        assert_eq!(err.cause(), &ErrorCause::MissingClose { what: "quotes" });
        let err = tokenize_formula("(abc").unwrap_err();
        assert_eq!(err.cause(), &ErrorCause::MissingClose { what: "brackets" });
    }

    #[test]
    fn test_tokenize_subspan_offsets() {
        let source: Arc<str> = Arc::from("this is {fonts.3}");
        let tokens = tokenize_span(&Span::new(source, 9, 7)).unwrap();
        assert_eq!(tokens[0].text, "fonts");
        assert_eq!(tokens[0].span.offset(), 9);
        assert_eq!(tokens[2].span.offset(), 15);
    }
}
