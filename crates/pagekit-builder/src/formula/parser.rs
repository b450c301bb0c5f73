/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formula parser.
//!
//! Parsing is a precedence-driven reduction: repeatedly find the leftmost
//! operator of highest precedence, bind it to its operand(s) and splice the
//! resulting node back into the list as a single item, until one item is
//! left. Brackets and quotes have the highest precedence, so groups always
//! collapse before the operators around them.

use std::fmt;

use crate::error::{BuildError, BuildResult, ErrorCause};
use crate::span::Span;

use super::operator::{Bracket, Operator};
use super::token::{Token, TokenKind, tokenize_span};

/// A node of a formula's expression tree.
///
/// Leaves hold plain text (a name, a number, or a quoted literal). Interior
/// nodes hold an operator token with one (`right`) or two operands.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    /// The operator token, or the leaf's text token.
    pub value: Token,
    pub left: Option<Box<ExpressionNode>>,
    pub right: Option<Box<ExpressionNode>>,
    /// The bracket this node was found directly inside, if any.
    pub bracket: Option<Bracket>,
    /// Everything this node covers, operands included.
    pub span: Span,
}

impl ExpressionNode {
    fn leaf(value: Token) -> Self {
        let span = value.span.clone();
        Self {
            value,
            left: None,
            right: None,
            bracket: None,
            span,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Square and curly groups start lookups over from the current scope.
    pub fn re_roots(&self) -> bool {
        self.bracket.is_some_and(Bracket::re_roots)
    }

    pub fn operator(&self) -> Option<Operator> {
        match self.value.kind {
            TokenKind::Operator(op) if !self.is_leaf() => Some(op),
            _ => None,
        }
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(b) = self.bracket {
            write!(f, "{}", b.open())?;
        }
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => write!(f, "{} {} {}", left, self.value.text, right)?,
            (None, Some(right)) => write!(f, "{} {}", self.value.text, right)?,
            _ => f.write_str(&self.value.text)?,
        }
        if let Some(b) = self.bracket {
            write!(f, "{}", b.close())?;
        }
        Ok(())
    }
}

/// A token not yet consumed, or a subtree already built.
#[derive(Debug)]
enum Item {
    Token(Token),
    Node(ExpressionNode),
}

impl Item {
    fn span(&self) -> &Span {
        match self {
            Item::Token(t) => &t.span,
            Item::Node(n) => &n.span,
        }
    }

    fn is_space(&self) -> bool {
        matches!(self, Item::Token(t) if t.is_space())
    }

    fn precedence(&self) -> Option<u8> {
        match self {
            Item::Token(t) => match t.kind {
                TokenKind::Operator(op) => Some(op.precedence()),
                TokenKind::Open(b) => Some(b.precedence()),
                TokenKind::Close(_) => Some(0),
                _ => None,
            },
            Item::Node(_) => None,
        }
    }

    fn unary_operator(&self) -> Option<Operator> {
        match self {
            Item::Token(Token {
                kind: TokenKind::Operator(op),
                ..
            }) if op.info().is_unary() => Some(*op),
            _ => None,
        }
    }

    fn into_node(self, bracket: Option<Bracket>) -> ExpressionNode {
        match self {
            Item::Node(n) => n,
            Item::Token(t) => {
                let mut node = ExpressionNode::leaf(t);
                node.bracket = bracket;
                node
            }
        }
    }
}

/// Tokenize and parse the formula text covered by `span`.
pub fn parse_formula(span: &Span) -> BuildResult<ExpressionNode> {
    let tokens = tokenize_span(span)?;
    treeify(tokens, span)
}

/// Reduce a token list to a single expression tree. `whole` locates the
/// formula when there are no tokens at all.
pub fn treeify(tokens: Vec<Token>, whole: &Span) -> BuildResult<ExpressionNode> {
    if tokens.is_empty() {
        return Err(BuildError::at(ErrorCause::NoValue, whole));
    }
    reduce(tokens.into_iter().map(Item::Token).collect(), None)
}

fn reduce(mut items: Vec<Item>, bracket: Option<&Token>) -> BuildResult<ExpressionNode> {
    let bracket_kind = bracket.and_then(|t| match t.kind {
        TokenKind::Open(b) => Some(b),
        _ => None,
    });

    if let (Some(open), Some(b)) = (bracket, bracket_kind) {
        if b.is_quote() {
            return Ok(quoted_leaf(items, open, b));
        }
    }

    while !items.is_empty() {
        let Some(index) = highest_precedence(&items) else {
            return single_value(items, bracket_kind);
        };

        let op_token = match &items[index] {
            Item::Token(token) => token.clone(),
            Item::Node(_) => return Err(internal("operator position holds a subtree")),
        };

        match op_token.kind {
            TokenKind::Operator(op) if op.info().is_unary() => {
                let Some(r) = next_value(&items, index) else {
                    return Err(missing_operand(&op_token, "following"));
                };
                let right_items: Vec<Item> = items.drain(index + 1..=r).collect();
                let right_span = right_items.last().map(|i| i.span().clone());
                let right = reduce(right_items, None)?;

                items.remove(index);
                let span = merge(&op_token.span, right_span.as_ref());
                let node = ExpressionNode {
                    value: op_token,
                    left: None,
                    right: Some(Box::new(right)),
                    bracket: None,
                    span,
                };
                items.insert(index, Item::Node(node));
            }

            TokenKind::Operator(_) => {
                let Some(r) = next_value(&items, index) else {
                    return Err(missing_operand(&op_token, "right"));
                };
                let Some(l) = previous_value(&items, index) else {
                    return Err(missing_operand(&op_token, "left"));
                };

                let right_items: Vec<Item> = items.drain(index + 1..=r).collect();
                let right_span = right_items.last().map(|i| i.span().clone());
                let right = reduce(right_items, None)?;

                items.remove(index);
                let left_items: Vec<Item> = items.drain(l..index).collect();
                let left_span = left_items[0].span().clone();
                let left = reduce(left_items, None)?;

                let span = merge(&left_span, right_span.as_ref());
                let node = ExpressionNode {
                    value: op_token,
                    left: Some(Box::new(left)),
                    right: Some(Box::new(right)),
                    bracket: None,
                    span,
                };
                items.insert(l, Item::Node(node));
            }

            TokenKind::Open(b) => {
                let close = find_close(&items, index)?;
                let close_item = items.remove(close);
                let nested: Vec<Item> = items.drain(index + 1..close).collect();
                items.remove(index);

                let mut node = reduce(nested, Some(&op_token))?;
                node.bracket = Some(b);
                node.span = op_token.span.merge(close_item.span());
                items.insert(index, Item::Node(node));
            }

            TokenKind::Close(_) => {
                return Err(BuildError::at(ErrorCause::UnmatchedClose, &op_token.span));
            }

            _ => {
                return Err(BuildError::at(
                    ErrorCause::UnknownOperator(op_token.text.clone()),
                    &op_token.span,
                ));
            }
        }
    }

    match bracket {
        Some(open) => Err(BuildError::at(ErrorCause::EmptyBrackets, &open.span)),
        None => Err(internal("reduced to an empty span")),
    }
}

/// Leftmost item of highest precedence. Within a run of unary operators of
/// equal precedence the last one wins, so `--2` binds as `-(-2)`.
fn highest_precedence(items: &[Item]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (i, item) in items.iter().enumerate() {
        if let Some(p) = item.precedence() {
            if best.is_none_or(|(_, bp)| p > bp) {
                best = Some((i, p));
            }
        }
    }
    let (mut index, precedence) = best?;

    if items[index].unary_operator().is_some() {
        while let Some(next) = next_value(items, index) {
            match items[next].unary_operator() {
                Some(op) if op.precedence() == precedence => index = next,
                _ => break,
            }
        }
    }
    Some(index)
}

fn next_value(items: &[Item], index: usize) -> Option<usize> {
    (index + 1..items.len()).find(|&i| !items[i].is_space())
}

fn previous_value(items: &[Item], index: usize) -> Option<usize> {
    (0..index).rev().find(|&i| !items[i].is_space())
}

fn find_close(items: &[Item], open: usize) -> BuildResult<usize> {
    let mut pending: Vec<(Bracket, &Span)> = Vec::new();
    for (i, item) in items.iter().enumerate().skip(open) {
        let Item::Token(token) = item else { continue };
        match token.kind {
            TokenKind::Open(b) => pending.push((b, &token.span)),
            TokenKind::Close(b) => match pending.last() {
                Some((top, _)) if *top == b => {
                    pending.pop();
                    if pending.is_empty() {
                        return Ok(i);
                    }
                }
                _ => return Err(BuildError::at(ErrorCause::UnmatchedClose, &token.span)),
            },
            _ => {}
        }
    }
    let (b, span) = pending
        .last()
        .ok_or_else(|| internal("close search started without an open bracket"))?;
    Err(BuildError::at(
        ErrorCause::MissingClose { what: b.describe() },
        span,
    ))
}

/// The final item of a reduction: exactly one non-space item must be left.
fn single_value(items: Vec<Item>, bracket: Option<Bracket>) -> BuildResult<ExpressionNode> {
    let whole = items
        .first()
        .map(|first| merge(first.span(), items.last().map(Item::span)));
    let mut found: Option<Item> = None;
    for item in items {
        if item.is_space() {
            continue;
        }
        if found.is_some() {
            return Err(BuildError::at(ErrorCause::ConsecutiveTokens, item.span()));
        }
        found = Some(item);
    }
    match (found, whole) {
        (Some(item), _) => Ok(item.into_node(bracket)),
        (None, Some(whole)) => Err(BuildError::at(ErrorCause::NoValue, &whole)),
        (None, None) => Err(internal("no items to reduce")),
    }
}

/// Everything inside quotes is one literal leaf.
fn quoted_leaf(items: Vec<Item>, open: &Token, quote: Bracket) -> ExpressionNode {
    let text: String = items
        .iter()
        .filter_map(|item| match item {
            Item::Token(t) => Some(t.text.as_str()),
            Item::Node(_) => None,
        })
        .collect();
    let span = match (items.first(), items.last()) {
        (Some(first), Some(last)) => first.span().merge(last.span()),
        _ => Span::point(open.span.source().clone(), open.span.end()),
    };
    let mut node = ExpressionNode::leaf(Token {
        text,
        kind: TokenKind::Word,
        span,
    });
    node.bracket = Some(quote);
    node
}

fn merge(first: &Span, last: Option<&Span>) -> Span {
    match last {
        Some(last) => first.merge(last),
        None => first.clone(),
    }
}

fn missing_operand(op_token: &Token, side: &'static str) -> BuildError {
    BuildError::at(
        ErrorCause::MissingOperand {
            operator: op_token.text.clone(),
            side,
        },
        &op_token.span,
    )
}

fn internal(message: &str) -> BuildError {
    BuildError::new(ErrorCause::Internal(format!("treeify {}", message)))
}
