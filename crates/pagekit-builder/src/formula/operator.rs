/*
 * operator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The static operator table.
//!
//! | Symbol | Operator | Precedence |
//! |---|---|---|
//! | `~` | concatenate | 1 |
//! | `@` | entity (unary) | 2 |
//! | `+` `-` | add, subtract | 3 |
//! | `*` `/` `\` `%` | multiply, divide, integer divide, modulo | 4 |
//! | `-` | negate (unary) | 5 |
//! | `.` `?` | required child, optional child | 6 |
//! | `:` `?` | root access, optional scope access (unary) | 7 |
//! | `(` `[` `{` | grouping | 8 |
//! | `'` `"` | quotes | 10 |
//!
//! `-` and `?` are positionally ambiguous; the tokenizer resolves them.

use crate::context::ContextStack;
use crate::error::{BuildError, BuildResult, ErrorCause};
use crate::span::Span;
use crate::value::Value;

use super::entity::entitize;

/// Precedence of every opening bracket.
pub const BRACKET_PRECEDENCE: u8 = 8;

/// Precedence of both quote characters.
pub const QUOTE_PRECEDENCE: u8 = 10;

/// Unary operators see their operand, its span and the context.
pub type UnaryFn = fn(&Value, &Span, &ContextStack) -> BuildResult<Value>;

/// Binary operators see both operands and their spans.
pub type BinaryFn = fn(&Value, &Value, &Span, &Span) -> BuildResult<Value>;

#[derive(Clone, Copy)]
pub enum Apply {
    Unary(UnaryFn),
    Binary(BinaryFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Concat,
    Entity,
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulo,
    Negate,
    Child,
    OptionalChild,
    Root,
    OptionalScope,
}

/// One row of the operator table.
pub struct OperatorInfo {
    pub operator: Operator,
    pub symbol: char,
    pub precedence: u8,
    /// Evaluate the left operand (as opposed to taking its literal text).
    pub eval_left: bool,
    /// Evaluate the right operand.
    pub eval_right: bool,
    pub apply: Apply,
}

impl OperatorInfo {
    pub fn is_unary(&self) -> bool {
        matches!(self.apply, Apply::Unary(_))
    }
}

static OPERATORS: &[OperatorInfo] = &[
    OperatorInfo {
        operator: Operator::Concat,
        symbol: '~',
        precedence: 1,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(concat),
    },
    OperatorInfo {
        operator: Operator::Entity,
        symbol: '@',
        precedence: 2,
        eval_left: false,
        eval_right: false,
        apply: Apply::Unary(entity),
    },
    OperatorInfo {
        operator: Operator::Add,
        symbol: '+',
        precedence: 3,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(add),
    },
    OperatorInfo {
        operator: Operator::Subtract,
        symbol: '-',
        precedence: 3,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(subtract),
    },
    OperatorInfo {
        operator: Operator::Multiply,
        symbol: '*',
        precedence: 4,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(multiply),
    },
    OperatorInfo {
        operator: Operator::Divide,
        symbol: '/',
        precedence: 4,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(divide),
    },
    OperatorInfo {
        operator: Operator::IntDivide,
        symbol: '\\',
        precedence: 4,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(int_divide),
    },
    OperatorInfo {
        operator: Operator::Modulo,
        symbol: '%',
        precedence: 4,
        eval_left: true,
        eval_right: true,
        apply: Apply::Binary(modulo),
    },
    OperatorInfo {
        operator: Operator::Negate,
        symbol: '-',
        precedence: 5,
        eval_left: false,
        eval_right: true,
        apply: Apply::Unary(negate),
    },
    OperatorInfo {
        operator: Operator::Child,
        symbol: '.',
        precedence: 6,
        eval_left: true,
        eval_right: false,
        apply: Apply::Binary(child),
    },
    OperatorInfo {
        operator: Operator::OptionalChild,
        symbol: '?',
        precedence: 6,
        eval_left: true,
        eval_right: false,
        apply: Apply::Binary(optional_child),
    },
    OperatorInfo {
        operator: Operator::Root,
        symbol: ':',
        precedence: 7,
        eval_left: false,
        eval_right: false,
        apply: Apply::Unary(root),
    },
    OperatorInfo {
        operator: Operator::OptionalScope,
        symbol: '?',
        precedence: 7,
        eval_left: false,
        eval_right: false,
        apply: Apply::Unary(optional_scope),
    },
];

impl Operator {
    pub fn info(self) -> &'static OperatorInfo {
        // Every variant has exactly one row.
        OPERATORS
            .iter()
            .find(|info| info.operator == self)
            .unwrap_or(&OPERATORS[0])
    }

    pub fn symbol(self) -> char {
        self.info().symbol
    }

    pub fn precedence(self) -> u8 {
        self.info().precedence
    }

    /// Is `ch` an operator symbol (not counting brackets and quotes)?
    pub fn is_symbol(ch: char) -> bool {
        OPERATORS.iter().any(|info| info.symbol == ch)
    }

    /// Pick the operator for `symbol` given its position. Ambiguous symbols
    /// become unary when no operand precedes them; symbols with a single
    /// meaning keep it regardless of position.
    pub fn resolve(symbol: char, unary_position: bool) -> Option<Operator> {
        let mut candidates = OPERATORS.iter().filter(|info| info.symbol == symbol);
        let first = candidates.next()?;
        let Some(second) = candidates.next() else {
            return Some(first.operator);
        };
        let pick = if first.is_unary() == unary_position {
            first
        } else {
            second
        };
        Some(pick.operator)
    }
}

/// Grouping brackets and quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bracket {
    Round,
    Square,
    Curly,
    Single,
    Double,
}

impl Bracket {
    pub fn from_open(ch: char) -> Option<Bracket> {
        match ch {
            '(' => Some(Bracket::Round),
            '[' => Some(Bracket::Square),
            '{' => Some(Bracket::Curly),
            '\'' => Some(Bracket::Single),
            '"' => Some(Bracket::Double),
            _ => None,
        }
    }

    pub fn from_close(ch: char) -> Option<Bracket> {
        match ch {
            ')' => Some(Bracket::Round),
            ']' => Some(Bracket::Square),
            '}' => Some(Bracket::Curly),
            _ => None,
        }
    }

    pub fn open(self) -> char {
        match self {
            Bracket::Round => '(',
            Bracket::Square => '[',
            Bracket::Curly => '{',
            Bracket::Single => '\'',
            Bracket::Double => '"',
        }
    }

    pub fn close(self) -> char {
        match self {
            Bracket::Round => ')',
            Bracket::Square => ']',
            Bracket::Curly => '}',
            Bracket::Single => '\'',
            Bracket::Double => '"',
        }
    }

    pub fn is_quote(self) -> bool {
        matches!(self, Bracket::Single | Bracket::Double)
    }

    /// Square and curly brackets restart lookups from the current scope.
    pub fn re_roots(self) -> bool {
        matches!(self, Bracket::Square | Bracket::Curly)
    }

    pub fn precedence(self) -> u8 {
        if self.is_quote() {
            QUOTE_PRECEDENCE
        } else {
            BRACKET_PRECEDENCE
        }
    }

    /// Word used in "missing close" messages.
    pub fn describe(self) -> &'static str {
        if self.is_quote() { "quotes" } else { "brackets" }
    }
}

/// Does `ch` need an escape to be literal inside a formula?
pub fn is_special(ch: char) -> bool {
    Operator::is_symbol(ch) || Bracket::from_open(ch).is_some() || Bracket::from_close(ch).is_some()
}

fn cast<T>(result: Result<T, ErrorCause>, span: &Span) -> BuildResult<T> {
    result.map_err(|cause| BuildError::at(cause, span))
}

fn concat(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let left = cast(a.make_string(), aa)?;
    let right = cast(b.make_string(), bb)?;
    Ok(Value::String(left + &right))
}

fn entity(a: &Value, aa: &Span, _ctx: &ContextStack) -> BuildResult<Value> {
    let ch = match a {
        Value::Number(n) => u32::try_from(*n as i64).ok().and_then(char::from_u32),
        _ => entitize(&cast(a.make_string(), aa)?),
    };
    ch.map(|c| Value::String(c.to_string()))
        .ok_or_else(|| BuildError::at(ErrorCause::UnknownEntity(a.display_text()), aa))
}

fn floats(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<(f64, f64)> {
    Ok((cast(a.make_float(), aa)?, cast(b.make_float(), bb)?))
}

fn add(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number(x + y))
}

fn subtract(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number(x - y))
}

fn multiply(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number(x * y))
}

fn divide(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number(x / y))
}

fn int_divide(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number((x / y).trunc()))
}

fn modulo(a: &Value, b: &Value, aa: &Span, bb: &Span) -> BuildResult<Value> {
    let (x, y) = floats(a, b, aa, bb)?;
    Ok(Value::Number(x % y))
}

fn negate(a: &Value, aa: &Span, _ctx: &ContextStack) -> BuildResult<Value> {
    Ok(Value::Number(-cast(a.make_float(), aa)?))
}

fn child(a: &Value, b: &Value, _aa: &Span, bb: &Span) -> BuildResult<Value> {
    cast(a.get_child(b), bb)
}

fn optional_child(a: &Value, b: &Value, _aa: &Span, _bb: &Span) -> BuildResult<Value> {
    Ok(a.get_child(b).unwrap_or_else(|_| Value::empty()))
}

fn root(a: &Value, aa: &Span, ctx: &ContextStack) -> BuildResult<Value> {
    cast(ctx.root_child(a), aa)
}

fn optional_scope(a: &Value, _aa: &Span, ctx: &ContextStack) -> BuildResult<Value> {
    Ok(ctx.scope_child(a).unwrap_or_else(|_| Value::empty()))
}
