/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for formula evaluation and tree expansion.
//!
//! Every failure is a [`BuildError`]: an [`ErrorCause`] plus the context
//! accumulated while the error travels outward through recursive expansion.
//! Spans are stored innermost first, so `spans()[0]` always points at the
//! characters that actually failed.

use std::fmt::{self, Write as _};

use thiserror::Error;

use crate::span::Span;

/// Broad classification of an [`ErrorCause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unbalanced brackets, quotes or formula delimiters.
    Lex,
    /// Missing operands, dangling tokens, empty groups.
    Parse,
    /// Failed lookups, bad casts, non-numeric operands.
    Evaluate,
    /// Unknown or malformed templates.
    Template,
    /// Orphan `elseif`/`else`, malformed loops and conditionals.
    ControlFlow,
    /// Engine invariant violations.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Evaluate => "EvaluateError",
            ErrorKind::Template => "TemplateError",
            ErrorKind::ControlFlow => "ControlFlowError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

/// The underlying reason an operation failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorCause {
    // Lex
    #[error("Missing close {what}")]
    MissingClose { what: &'static str },

    #[error("Close-curly brace without an open brace")]
    StrayCloseDelimiter,

    #[error("Unclosed curly braces")]
    UnclosedDelimiter,

    #[error("Unmatched close bracket")]
    UnmatchedClose,

    // Parse
    #[error("Operator {operator} is missing its {side} operand")]
    MissingOperand {
        operator: String,
        side: &'static str,
    },

    #[error("Unknown operator {0}")]
    UnknownOperator(String),

    #[error("Consecutive tokens with no operator")]
    ConsecutiveTokens,

    #[error("Empty brackets yield no value")]
    EmptyBrackets,

    #[error("No value tokens in span")]
    NoValue,

    // Evaluate
    #[error("Key not found in context: {0}")]
    KeyNotFound(String),

    #[error("Index out of range: {index} in {container}")]
    IndexOutOfRange { index: i64, container: String },

    #[error("Named fields are only available on objects: {key} in {container}")]
    NoChildren { key: String, container: String },

    #[error("Not a number: {0}")]
    NotANumber(String),

    #[error("Not an integer: {0}")]
    NotAnInteger(String),

    #[error("Bad cast to string: {0}")]
    BadCast(String),

    #[error("Name lookup failed: {0}")]
    NameLookupFailed(String),

    #[error("Not a recognized entity: {0}")]
    UnknownEntity(String),

    #[error("Operation {operator} resulted in a non-finite value: {detail}")]
    NonFiniteResult { operator: String, detail: String },

    #[error("Invalid regular expression {pattern}: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("{kind} value does not support '{query}' queries")]
    UnsupportedQuery { kind: &'static str, query: &'static str },

    // Template
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid template: {0}")]
    EmptyTemplate(String),

    #[error("Template nesting deeper than {limit}: {name}")]
    TemplateTooDeep { name: String, limit: usize },

    // Control flow
    #[error("<{0}> without preceding <if>")]
    OrphanBranch(String),

    #[error("<{0}> elements must have an evaluating attribute: test, not, exists, or notex")]
    MissingTest(String),

    #[error("Missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("{0}")]
    BadLoop(String),

    #[error("Input tags like <{0}/> should be empty elements")]
    NonEmptyInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCause {
    pub fn kind(&self) -> ErrorKind {
        use ErrorCause::*;
        match self {
            MissingClose { .. } | UnmatchedClose | StrayCloseDelimiter | UnclosedDelimiter => {
                ErrorKind::Lex
            }
            MissingOperand { .. }
            | UnknownOperator(_)
            | ConsecutiveTokens
            | EmptyBrackets
            | NoValue => ErrorKind::Parse,
            KeyNotFound(_)
            | IndexOutOfRange { .. }
            | NoChildren { .. }
            | NotANumber(_)
            | NotAnInteger(_)
            | BadCast(_)
            | NameLookupFailed(_)
            | UnknownEntity(_)
            | NonFiniteResult { .. }
            | InvalidRegex { .. }
            | UnsupportedQuery { .. } => ErrorKind::Evaluate,
            TemplateNotFound(_) | EmptyTemplate(_) | TemplateTooDeep { .. } => ErrorKind::Template,
            OrphanBranch(_) | MissingTest(_) | MissingAttribute(_) | BadLoop(_)
            | NonEmptyInput(_) => ErrorKind::ControlFlow,
            Internal(_) => ErrorKind::Internal,
        }
    }
}

/// An error raised while evaluating formulas or expanding a source tree.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{cause}")]
pub struct BuildError {
    cause: ErrorCause,
    spans: Vec<Span>,
    operations: Vec<&'static str>,
    elements: Vec<String>,
    /// Byte offset in the markup document of the innermost source node the
    /// error passed through.
    document_offset: Option<usize>,
    offered_to_handler: bool,
}

/// Result type for engine operations.
pub type BuildResult<T> = Result<T, BuildError>;

impl BuildError {
    pub fn new(cause: ErrorCause) -> Self {
        Self {
            cause,
            spans: Vec::new(),
            operations: Vec::new(),
            elements: Vec::new(),
            document_offset: None,
            offered_to_handler: false,
        }
    }

    /// Create an error located at `span`.
    pub fn at(cause: ErrorCause, span: &Span) -> Self {
        Self::new(cause).with_span(span.clone())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.spans.push(span);
        self
    }

    pub fn in_operation(mut self, operation: &'static str) -> Self {
        self.operations.push(operation);
        self
    }

    /// Record the start tag of an element the error passed through.
    pub fn in_element(mut self, start_tag: impl Into<String>) -> Self {
        self.elements.push(start_tag.into());
        self
    }

    /// Record where in the markup document the failing node starts. Only
    /// the first (innermost) offset is kept.
    pub fn at_document_offset(mut self, offset: usize) -> Self {
        self.document_offset.get_or_insert(offset);
        self
    }

    /// Mark the error as seen by the registered error handler. Returns
    /// `false` if it already was.
    pub(crate) fn offer_to_handler(&mut self) -> bool {
        !std::mem::replace(&mut self.offered_to_handler, true)
    }

    pub fn cause(&self) -> &ErrorCause {
        &self.cause
    }

    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    /// Source spans, innermost first.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Names of the operations the error propagated through, innermost first.
    pub fn operations(&self) -> &[&'static str] {
        &self.operations
    }

    /// Reconstructed start tags of enclosing source elements, innermost first.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn document_offset(&self) -> Option<usize> {
        self.document_offset
    }

    /// Render a plain-text report: each span's source with a caret line
    /// underneath, followed by the operation breadcrumb and element stack.
    pub fn render(&self) -> String {
        let mut out = format!("{}: {}", self.kind(), self.cause);
        for span in &self.spans {
            out.push('\n');
            out.push_str(span.source());
            out.push('\n');
            let pad = span.char_range().start;
            let carets = span.char_range().len().max(1);
            out.push_str(&" ".repeat(pad));
            out.push_str(&"^".repeat(carets));
        }
        if let Some(offset) = self.document_offset {
            let _ = write!(out, "\nAt byte {offset} of the document");
        }
        if !self.operations.is_empty() {
            out.push_str("\nOperations: ");
            out.push_str(&self.operations.join(" < "));
        }
        if !self.elements.is_empty() {
            out.push_str("\nSource element stack:");
            for element in &self.elements {
                out.push(' ');
                out.push_str(element);
            }
        }
        out
    }

    /// Render the innermost span as an `ariadne` report.
    ///
    /// `name` identifies the source in the report header. Returns the bare
    /// message if no span is attached.
    pub fn to_report(&self, name: &str, color: bool) -> String {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let Some(span) = self.spans.first() else {
            return format!("{}: {}", self.kind(), self.cause);
        };
        let range = span.char_range();
        let mut report = Report::build(ReportKind::Error, name.to_string(), range.start)
            .with_config(Config::default().with_color(color))
            .with_message(format!("{}: {}", self.kind(), self.cause))
            .with_label(
                Label::new((name.to_string(), range))
                    .with_message(self.cause.to_string())
                    .with_color(Color::Red),
            );
        if let Some(outer) = self.spans.last().filter(|outer| outer.source() != span.source()) {
            report = report.with_note(format!(
                "in {} at offset {} of {}",
                outer.text(),
                outer.offset(),
                outer.source()
            ));
        }
        if let Some(offset) = self.document_offset {
            report = report.with_note(format!("at byte {offset} of {name}"));
        }
        if !self.elements.is_empty() {
            report = report.with_note(format!("in {}", self.elements.join(" in ")));
        }

        let mut output = Vec::new();
        let written = report
            .finish()
            .write((name.to_string(), Source::from(span.source().as_ref())), &mut output);
        match written.ok().and_then(|_| String::from_utf8(output).ok()) {
            Some(text) => text,
            None => self.render(),
        }
    }
}

impl From<ErrorCause> for BuildError {
    fn from(cause: ErrorCause) -> Self {
        BuildError::new(cause)
    }
}

/// Extension trait that adds propagation context to a [`BuildResult`].
pub trait ResultExt<T> {
    /// Push an operation name and, if given, the span being processed.
    fn context(self, operation: &'static str, span: Option<&Span>) -> BuildResult<T>;

    /// Push the start tag of the element being expanded.
    fn element_context(self, start_tag: impl FnOnce() -> String) -> BuildResult<T>;
}

impl<T> ResultExt<T> for BuildResult<T> {
    fn context(self, operation: &'static str, span: Option<&Span>) -> BuildResult<T> {
        self.map_err(|err| {
            let err = err.in_operation(operation);
            match span {
                Some(span) => err.with_span(span.clone()),
                None => err,
            }
        })
    }

    fn element_context(self, start_tag: impl FnOnce() -> String) -> BuildResult<T> {
        self.map_err(|err| err.in_element(start_tag()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_kind_classification() {
        assert_eq!(ErrorCause::UnclosedDelimiter.kind(), ErrorKind::Lex);
        assert_eq!(ErrorCause::ConsecutiveTokens.kind(), ErrorKind::Parse);
        assert_eq!(
            ErrorCause::KeyNotFound("z".to_string()).kind(),
            ErrorKind::Evaluate
        );
        assert_eq!(
            ErrorCause::TemplateNotFound("t".to_string()).kind(),
            ErrorKind::Template
        );
        assert_eq!(
            ErrorCause::OrphanBranch("else".to_string()).kind(),
            ErrorKind::ControlFlow
        );
    }

    #[test]
    fn test_context_accumulates_innermost_first() {
        let inner: Arc<str> = Arc::from("pt.z");
        let outer: Arc<str> = Arc::from("<b title=\"{pt.z}\">");
        let result: BuildResult<()> = Err(BuildError::at(
            ErrorCause::KeyNotFound("z".to_string()),
            &Span::new(inner, 3, 1),
        ));
        let err = result
            .context("evaluate:binary", None)
            .context("clone_attributes", Some(&Span::new(outer, 3, 5)))
            .unwrap_err();

        assert_eq!(err.spans().len(), 2);
        assert_eq!(err.spans()[0].offset(), 3);
        assert_eq!(err.spans()[1].text(), "title");
        assert_eq!(err.operations(), &["evaluate:binary", "clone_attributes"]);
    }

    #[test]
    fn test_render_with_carets() {
        let err = BuildError::at(
            ErrorCause::KeyNotFound("z".to_string()),
            &Span::new(Arc::from("pt.z"), 3, 1),
        )
        .in_operation("evaluate:binary")
        .in_element("<span title=\"{pt.z}\" />");

        insta::assert_snapshot!(err.render(), @r#"
        EvaluateError: Key not found in context: z
        pt.z
           ^
        Operations: evaluate:binary
        Source element stack: <span title="{pt.z}" />
        "#);
    }

    #[test]
    fn test_report_mentions_cause() {
        let err = BuildError::at(
            ErrorCause::NotANumber("\"pt\"".to_string()),
            &Span::new(Arc::from("1+3*pt"), 4, 2),
        );
        let report = err.to_report("formula", false);
        assert!(report.contains("Not a number"));
        assert!(report.contains("1+3*pt"));
    }
}
