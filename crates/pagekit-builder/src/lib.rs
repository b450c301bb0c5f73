/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Formula language and declarative page builder for PageKit documents.
//!
//! Page documents are XML-syntax markup whose attributes and text embed
//! `{formulas}`, plus a handful of directive elements:
//!
//! - Formulas: `{pt.x + 1}`, `{'a' ~ name}`, `{list.[i]}`, `{:rootKey}`
//! - Loops: `<for each="item" in="list">`, `char`, `word`, `key`, `range`
//! - Conditionals: `<if test="n" gt="3">`, `<elseif>`, `<else>`
//! - Templates: `<template id="card" title="Untitled">` and
//!   `<use template="card" title="{heading}">`
//! - Input-area shorthand: `<letter/>`, `<word extract="2"/>`, ...
//!
//! # Architecture
//!
//! The engine never touches a concrete DOM. [`markup::parse_fragment`]
//! produces [`SourceNode`]s, [`EngineState`] expands them against host data
//! held in a [`ContextStack`], and the resulting [`OutputNode`]s can be
//! rendered as HTML or rebuilt by the host through [`TreeBuilder`].
//!
//! # Example
//!
//! ```ignore
//! use pagekit_builder::{ContextStack, EngineState, markup::parse_fragment, output::to_html};
//!
//! let nodes = parse_fragment("<for range=\"i\" from=\"1\" to=\"3\"><b>{i}</b></for>")?;
//! let mut state = EngineState::new(ContextStack::default());
//! let output = state.expand_document(&nodes)?;
//! assert_eq!(to_html(&output), "<b>1</b><b>2</b><b>3</b>");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod expand;
pub mod formula;
pub mod markup;
pub mod output;
pub mod source;
pub mod span;
pub mod template;
pub mod text;
pub mod value;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use context::{ContextStack, HasContext};
pub use error::{BuildError, BuildResult, ErrorCause, ErrorKind, ResultExt};
pub use expand::EngineState;
pub use formula::{evaluate_formula, evaluate_span};
pub use markup::{MarkupError, parse_fragment};
pub use output::{OutputElement, OutputNode, OutputTree, TreeBuilder, to_html};
pub use source::{Attribute, InputTag, SourceElement, SourceNode, SourceText};
pub use span::Span;
pub use template::{Template, TemplateRegistry};
pub use text::{
    TrimMode, clone_text, complex_attribute, key_exists_in_context, text_from_context,
    value_from_context, value_from_root,
};
pub use value::{Value, ValueMap};
