/*
 * input.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Input-area shorthand tags.
//!
//! `<letter>`, `<word>`, `<pattern>` and friends each become a single
//! `<span>` carrying the source attributes plus classes and data attributes
//! chosen from a per-tag rule set. A rule set may inherit another, whose
//! rules are applied after its own.

use std::sync::Arc;

use super::EngineState;
use crate::error::{BuildError, BuildResult, ErrorCause};
use crate::output::{OutputElement, OutputNode};
use crate::source::{InputTag, SourceElement, SourceNode};
use crate::span::Span;
use crate::text::{TrimMode, clone_text};

/// Extra processing triggered by an attribute (or, for the empty key, by
/// the element's inner text).
#[derive(Debug, Clone, Copy)]
enum Special {
    /// A positive number adds an under-number label.
    UnderNumber,
    /// Literal text shown in the cell. `¤` is a filled block.
    Literal,
}

/// Conversion rules for one tag. An empty key always applies.
struct Rules {
    inherit: Option<InputTag>,
    /// Classes added when the key attribute is present.
    span_class: &'static [(&'static str, &'static str)],
    /// Attributes copied to a new name when present.
    span_rename: &'static [(&'static str, &'static str)],
    /// Optional style group; the first present key wins.
    optional_style: &'static [(&'static str, &'static str)],
    special_cases: &'static [(&'static str, Special)],
}

const LETTER: Rules = Rules {
    inherit: None,
    span_class: &[
        ("", "letter-cell"),
        ("block", "block"),
        ("literal", "literal"),
        ("extract", "extract"),
        ("copy-id", "copy-extracter"),
    ],
    span_rename: &[
        ("extracted-id", "data-extracted-id"),
        ("copy-id", "data-copy-id"),
    ],
    optional_style: &[("", "letter"), ("literal", "literal"), ("extract", "extract")],
    special_cases: &[
        ("extract", Special::UnderNumber),
        ("literal", Special::Literal),
        ("block", Special::Literal),
    ],
};

const LETTERS: Rules = Rules {
    inherit: Some(InputTag::Letter),
    span_class: &[("", "multiple-letter")],
    span_rename: &[],
    optional_style: &[],
    special_cases: &[],
};

const NUMBER: Rules = Rules {
    inherit: Some(InputTag::Letter),
    span_class: &[("", "numeric")],
    span_rename: &[],
    optional_style: &[],
    special_cases: &[],
};

const NUMBERS: Rules = Rules {
    inherit: Some(InputTag::Number),
    span_class: &[("", "multiple-letter")],
    span_rename: &[],
    optional_style: &[],
    special_cases: &[],
};

const LITERAL: Rules = Rules {
    inherit: Some(InputTag::Letter),
    span_class: &[("", "literal")],
    span_rename: &[],
    optional_style: &[("", "literal")],
    special_cases: &[("", Special::Literal), ("block", Special::Literal)],
};

const WORD: Rules = Rules {
    inherit: None,
    span_class: &[
        ("", "word-cell"),
        ("literal", "literal"),
        ("copy-id", "copy-extracter"),
    ],
    span_rename: &[
        ("extract", "data-extract-index"),
        ("extracted-id", "data-extracted-id"),
        ("copy-id", "data-copy-id"),
    ],
    optional_style: &[("", "word")],
    special_cases: &[("literal", Special::Literal), ("block", Special::Literal)],
};

const PATTERN: Rules = Rules {
    inherit: None,
    span_class: &[
        ("", "letter-cell-block"),
        ("pattern", "create-from-pattern"),
        ("extracted", "create-from-pattern extracted"),
        ("extract-numbered", "create-from-pattern extracted"),
        ("extract-lettered", "create-from-pattern extracted"),
    ],
    span_rename: &[
        ("pattern", "data-letter-pattern"),
        ("extract", "data-extract-indeces"),
        ("numbers", "data-number-assignments"),
        ("extracted-id", "data-extracted-id"),
        ("extracted", "data-extracted-pattern"),
        ("extract-numbered", "data-extract-numbered"),
        ("extract-lettered", "data-extract-lettered"),
    ],
    optional_style: &[],
    special_cases: &[],
};

const EXTRACT: Rules = Rules {
    inherit: None,
    span_class: &[
        ("", "extract-literal"),
        ("word", "word-input"),
        ("letter", "extract-input"),
        ("letters", "extract-input"),
    ],
    span_rename: &[
        ("word", "value"),
        ("letter", "value"),
        ("letters", "value"),
        ("copy-id", "data-copy-id"),
    ],
    optional_style: &[("", "hidden")],
    special_cases: &[],
};

fn rules(tag: InputTag) -> &'static Rules {
    match tag {
        InputTag::Letter => &LETTER,
        InputTag::Letters => &LETTERS,
        InputTag::Literal => &LITERAL,
        InputTag::Number => &NUMBER,
        InputTag::Numbers => &NUMBERS,
        InputTag::Pattern => &PATTERN,
        InputTag::Word => &WORD,
        InputTag::Extract => &EXTRACT,
    }
}

impl Special {
    fn apply(self, text: &str, span: &mut OutputElement) {
        match self {
            Special::UnderNumber => {
                let digits: String = text.trim().chars().take_while(char::is_ascii_digit).collect();
                if digits.parse::<u64>().is_ok_and(|n| n > 0) {
                    span.add_class("numbered extract-numbered");
                    span.set_attribute("data-number", text);
                    let mut under = OutputElement::new("span");
                    under.add_class("under-number");
                    span.children.push(under.with_child(OutputNode::text(text)).into());
                }
            }
            Special::Literal => {
                let text = if text == "¤" {
                    span.add_class("block");
                    " "
                } else {
                    text
                };
                span.children.push(OutputNode::text(text));
            }
        }
    }
}

/// Concatenated text of every descendant text node.
fn inner_text(nodes: &[SourceNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            SourceNode::Text(text) => out.push_str(&text.text),
            _ => {
                if let Some(element) = node.as_element() {
                    out.push_str(&inner_text(&element.children));
                }
            }
        }
    }
    out
}

impl EngineState {
    pub(super) fn expand_input(&mut self, tag: InputTag, element: &SourceElement) -> BuildResult<OutputNode> {
        if tag != InputTag::Literal && !element.children.is_empty() {
            return Err(BuildError::new(ErrorCause::NonEmptyInput(
                tag.name().to_string(),
            )));
        }

        let mut span = OutputElement::new("span");
        self.clone_attributes(element, &mut span)?;

        let mut style: Option<&'static str> = None;
        let mut next = Some(rules(tag));
        while let Some(set) = next {
            for (key, classes) in set.span_class {
                if key.is_empty() || element.has_attr(key) {
                    span.add_class(classes);
                }
            }
            if style.is_none() {
                style = set
                    .optional_style
                    .iter()
                    .find(|(key, _)| !key.is_empty() && element.has_attr(key))
                    .or_else(|| set.optional_style.iter().find(|(key, _)| key.is_empty()))
                    .map(|(_, group)| *group);
            }
            for (key, target) in set.span_rename {
                if let Some(attr) = element.attribute(key) {
                    let value = clone_text(&attr.span(), TrimMode::On, &self.context)?;
                    span.set_attribute(*target, value);
                }
            }
            for (key, special) in set.special_cases {
                if key.is_empty() {
                    continue;
                }
                if let Some(attr) = element.attribute(key) {
                    let value = clone_text(&attr.span(), TrimMode::On, &self.context)?;
                    special.apply(&value, &mut span);
                }
            }
            if let Some((_, special)) = set.special_cases.iter().find(|(key, _)| key.is_empty()) {
                if let Some(value) = self.literal_text(element)? {
                    special.apply(&value, &mut span);
                }
            }
            next = set.inherit.map(rules);
        }

        if let Some(group) = style {
            let class = self.style_class(group)?;
            span.add_class(&class);
        }
        tracing::trace!(tag = tag.name(), "expanded input area");
        Ok(OutputNode::Element(span))
    }

    /// Evaluated inner text of a `<literal>`. A lone text child keeps its
    /// own span and document offset for error reports.
    fn literal_text(&self, element: &SourceElement) -> BuildResult<Option<String>> {
        let (span, offset) = match element.children.as_slice() {
            [SourceNode::Text(text)] => (text.span(), text.offset),
            children => {
                let text = inner_text(children);
                (Span::whole(Arc::from(text)), element.offset)
            }
        };
        if span.is_empty() {
            return Ok(None);
        }
        clone_text(&span, TrimMode::On, &self.context)
            .map(Some)
            .map_err(|err| err.at_document_offset(offset))
    }

    /// The class for an optional style group, read from the nearest element
    /// (this one included) that sets the group's data attribute.
    fn style_class(&self, group: &str) -> BuildResult<String> {
        Ok(match group {
            "letter" => {
                let style = match self.inherited_style("data-letter-style")? {
                    Some(style) => style,
                    None => self
                        .inherited_style("data-input-style")?
                        .unwrap_or_else(|| "underline".to_string()),
                };
                format!("letter-{style}")
            }
            "literal" => format!(
                "literal-{}",
                self.inherited_style("data-literal-style")?
                    .unwrap_or_else(|| "none".to_string())
            ),
            "extract" => format!(
                "extract-{}",
                self.inherited_style("data-extract-style")?
                    .unwrap_or_else(|| "box".to_string())
            ),
            "word" => format!(
                "word-{}",
                self.inherited_style("data-word-style")?
                    .unwrap_or_else(|| "underline".to_string())
            ),
            other => other.to_string(),
        })
    }

    fn inherited_style(&self, name: &str) -> BuildResult<Option<String>> {
        for attributes in self.ancestors.iter().rev() {
            if let Some(attr) = attributes.iter().find(|a| a.name == name) {
                return clone_text(&attr.span(), TrimMode::On, &self.context).map(Some);
            }
        }
        Ok(None)
    }
}
