/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source tree types.
//!
//! A source tree is what document authors write: elements whose attributes
//! and text embed formulas, plus directive elements (`<for>`, `<if>`,
//! `<use>`, ...) that the expander interprets. Directive tags are
//! classified once, when the node is built, so the expander can dispatch
//! with an exhaustive match.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::span::Span;

/// A node of a source tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    /// Text that may embed `{formulas}`.
    Text(SourceText),

    /// An ordinary element, cloned to the output.
    Element(SourceElement),

    /// `<for each|char|word|key|range|int="v" ...>`
    For(SourceElement),

    /// `<if test="..." ...>`
    If(SourceElement),

    /// `<elseif test="..." ...>`
    ElseIf(SourceElement),

    /// `<else>`
    Else(SourceElement),

    /// `<use template="name" arg="..." ...>`
    Use(SourceElement),

    /// A shorthand input-area tag, rewritten into a `<span>`.
    Input(InputTag, SourceElement),

    /// `<template id="name" ...>`, registered rather than output.
    Template(SourceElement),
}

impl SourceNode {
    /// Build an element node, classifying directive tags.
    pub fn element(element: SourceElement) -> Self {
        let tag = element.tag.to_ascii_lowercase();
        if let Some(input) = InputTag::from_tag(&tag) {
            return SourceNode::Input(input, element);
        }
        match tag.as_str() {
            "for" => SourceNode::For(element),
            "if" => SourceNode::If(element),
            "elseif" => SourceNode::ElseIf(element),
            "else" => SourceNode::Else(element),
            "use" => SourceNode::Use(element),
            "template" => SourceNode::Template(element),
            _ => SourceNode::Element(element),
        }
    }

    pub fn text(text: impl Into<Arc<str>>, offset: usize) -> Self {
        SourceNode::Text(SourceText {
            text: text.into(),
            offset,
        })
    }

    /// The element behind any non-text node.
    pub fn as_element(&self) -> Option<&SourceElement> {
        match self {
            SourceNode::Text(_) => None,
            SourceNode::Element(e)
            | SourceNode::For(e)
            | SourceNode::If(e)
            | SourceNode::ElseIf(e)
            | SourceNode::Else(e)
            | SourceNode::Use(e)
            | SourceNode::Input(_, e)
            | SourceNode::Template(e) => Some(e),
        }
    }

    /// Text nodes containing only whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, SourceNode::Text(t) if t.text.trim().is_empty())
    }
}

/// A text node.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceText {
    /// Text with markup entities already resolved.
    pub text: Arc<str>,
    /// Byte offset in the markup document.
    pub offset: usize,
}

impl SourceText {
    pub fn span(&self) -> Span {
        Span::whole(self.text.clone())
    }
}

/// One attribute. Values keep their formulas unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Arc<str>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Span covering the whole value, for tokenizing and error reports.
    pub fn span(&self) -> Span {
        Span::whole(self.value.clone())
    }
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceElement {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<SourceNode>,
    /// Byte offset of the `<` in the markup document.
    pub offset: usize,
}

impl SourceElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Arc<str>>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn with_child(mut self, child: SourceNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The raw value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.value.as_ref())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// The first of `names` present on this element, with its value.
    pub fn first_attr<'a>(&'a self, names: &[&'a str]) -> Option<(&'a str, &'a Attribute)> {
        names
            .iter()
            .find_map(|name| self.attribute(name).map(|a| (*name, a)))
    }

    /// The output tag: a trailing `_` is dropped, so `table_` becomes
    /// `table`.
    pub fn output_tag(&self) -> &str {
        self.tag.strip_suffix('_').unwrap_or(&self.tag)
    }

    /// Reconstruct the start tag, for error reports.
    pub fn start_tag(&self) -> String {
        self.start_tag_with_offsets().0
    }

    /// Span of `name="value"` for the attribute at `index`, inside the
    /// reconstructed start tag.
    pub fn attribute_span(&self, index: usize) -> Option<Span> {
        let (tag, offsets) = self.start_tag_with_offsets();
        let (offset, length) = *offsets.get(index)?;
        Some(Span::new(Arc::from(tag), offset, length))
    }

    fn start_tag_with_offsets(&self) -> (String, Vec<(usize, usize)>) {
        let mut out = format!("<{}", self.tag);
        let mut offsets = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            out.push(' ');
            let start = out.len();
            let _ = write!(out, "{}=\"{}\"", attr.name, attr.value);
            offsets.push((start, out.len() - start));
        }
        out.push_str(if self.children.is_empty() { " />" } else { ">" });
        (out, offsets)
    }
}

/// Shorthand tags for puzzle input areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputTag {
    Letter,
    Letters,
    Literal,
    Number,
    Numbers,
    Pattern,
    Word,
    Extract,
}

impl InputTag {
    pub const ALL: [InputTag; 8] = [
        InputTag::Letter,
        InputTag::Letters,
        InputTag::Literal,
        InputTag::Number,
        InputTag::Numbers,
        InputTag::Pattern,
        InputTag::Word,
        InputTag::Extract,
    ];

    pub fn from_tag(tag: &str) -> Option<InputTag> {
        Self::ALL.into_iter().find(|t| t.name() == tag)
    }

    pub fn name(self) -> &'static str {
        match self {
            InputTag::Letter => "letter",
            InputTag::Letters => "letters",
            InputTag::Literal => "literal",
            InputTag::Number => "number",
            InputTag::Numbers => "numbers",
            InputTag::Pattern => "pattern",
            InputTag::Word => "word",
            InputTag::Extract => "extract",
        }
    }
}
