/*
 * output.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output trees.
//!
//! Expansion produces [`OutputNode`]s: plain elements and text with every
//! formula already resolved. Hosts that keep their own node type implement
//! [`TreeBuilder`] and convert with [`OutputNode::build`]; [`OutputTree`] is
//! the bundled builder that keeps `OutputNode`s and renders them as HTML.

use indexmap::IndexMap;

/// The host's node factory.
pub trait TreeBuilder {
    type Node;

    /// Create an element from its tag, resolved attributes and children.
    fn element(&mut self, tag: &str, attributes: &[(&str, &str)], children: Vec<Self::Node>) -> Self::Node;

    /// Create a text node.
    fn text(&mut self, text: &str) -> Self::Node;
}

/// A fully resolved node.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputNode {
    Element(OutputElement),
    Text(String),
}

/// A fully resolved element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputElement {
    pub tag: String,
    /// Attributes in first-set order. `class` holds a single-space-joined,
    /// duplicate-free list.
    pub attributes: IndexMap<String, String>,
    pub children: Vec<OutputNode>,
}

impl OutputElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set an attribute, replacing any earlier value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attribute("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    /// Add every whitespace-separated class in `classes` not already
    /// present.
    pub fn add_class(&mut self, classes: &str) {
        let mut list: Vec<String> = self.classes().into_iter().map(str::to_string).collect();
        for class in classes.split_whitespace() {
            if !list.iter().any(|c| c == class) {
                list.push(class.to_string());
            }
        }
        if !list.is_empty() {
            self.set_attribute("class", list.join(" "));
        }
    }

    pub fn with_child(mut self, child: OutputNode) -> Self {
        self.children.push(child);
        self
    }
}

impl OutputNode {
    pub fn text(text: impl Into<String>) -> Self {
        OutputNode::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&OutputElement> {
        match self {
            OutputNode::Element(e) => Some(e),
            OutputNode::Text(_) => None,
        }
    }

    /// All text in this subtree, in document order.
    pub fn text_content(&self) -> String {
        match self {
            OutputNode::Text(t) => t.clone(),
            OutputNode::Element(e) => e.children.iter().map(OutputNode::text_content).collect(),
        }
    }

    /// Rebuild this node with a host's [`TreeBuilder`].
    pub fn build<B: TreeBuilder>(&self, builder: &mut B) -> B::Node {
        match self {
            OutputNode::Text(t) => builder.text(t),
            OutputNode::Element(e) => {
                let children = e.children.iter().map(|c| c.build(builder)).collect();
                let attributes: Vec<(&str, &str)> = e
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                builder.element(&e.tag, &attributes, children)
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

impl From<OutputElement> for OutputNode {
    fn from(element: OutputElement) -> Self {
        OutputNode::Element(element)
    }
}

/// The bundled builder: produces [`OutputNode`]s.
#[derive(Debug, Default)]
pub struct OutputTree;

impl TreeBuilder for OutputTree {
    type Node = OutputNode;

    fn element(&mut self, tag: &str, attributes: &[(&str, &str)], children: Vec<OutputNode>) -> OutputNode {
        let mut element = OutputElement::new(tag);
        for (name, value) in attributes {
            if *name == "class" {
                element.add_class(value);
            } else {
                element.set_attribute(*name, *value);
            }
        }
        element.children = children;
        OutputNode::Element(element)
    }

    fn text(&mut self, text: &str) -> OutputNode {
        OutputNode::text(text)
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Render a list of nodes as HTML.
pub fn to_html(nodes: &[OutputNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_html(node, &mut out);
    }
    out
}

fn write_html(node: &OutputNode, out: &mut String) {
    match node {
        OutputNode::Text(text) => escape_into(text, false, out),
        OutputNode::Element(e) => {
            out.push('<');
            out.push_str(&e.tag);
            for (name, value) in &e.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&e.tag.as_str()) {
                return;
            }
            for child in &e.children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(&e.tag);
            out.push('>');
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
