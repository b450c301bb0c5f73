/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The tree expander.
//!
//! [`EngineState`] walks a list of [`SourceNode`]s in document order and
//! produces [`OutputNode`]s. Plain elements and text are cloned with their
//! formulas evaluated; directive elements are interpreted:
//!
//! - `<for>` repeats its children once per item ([`for_loop`])
//! - `<if>`, `<elseif>`, `<else>` choose one sibling body ([`conditional`])
//! - `<use>` instantiates a template ([`use_template`])
//! - input-area shorthand tags become styled `<span>`s ([`input`])
//!
//! Errors propagate outward, gathering the start tag of each element they
//! pass through. A node carrying `nothrow` (or sitting below an ancestor that
//! does) turns its error into a diagnostic and yields no output instead.

mod conditional;
mod for_loop;
mod input;
mod use_template;

use std::fmt;

use crate::config::EngineConfig;
use crate::context::{ContextStack, HasContext};
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::output::{OutputElement, OutputNode};
use crate::source::{Attribute, SourceElement, SourceNode, SourceText};
use crate::template::TemplateRegistry;
use crate::text::{TrimMode, clone_text, complex_attribute};
use crate::value::{Value, ValueMap};

use conditional::{Branch, BranchRun};

/// Marker attribute that stops errors from propagating past a node.
pub const NOTHROW: &str = "nothrow";

type ErrorHandler = Box<dyn FnMut(&BuildError) -> bool>;

/// Everything one expansion run reads and mutates.
pub struct EngineState {
    context: ContextStack,
    templates: TemplateRegistry,
    config: EngineConfig,

    /// Errors suppressed by `nothrow` or the handler, in the order raised.
    diagnostics: Vec<BuildError>,

    error_handler: Option<ErrorHandler>,

    /// Attributes of the source elements currently being expanded,
    /// outermost first.
    ancestors: Vec<Vec<Attribute>>,

    /// Number of `<use template>` instantiations currently open.
    template_depth: usize,
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("context", &self.context)
            .field("templates", &self.templates)
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics)
            .field("error_handler", &self.error_handler.is_some())
            .field("template_depth", &self.template_depth)
            .finish()
    }
}

impl HasContext for EngineState {
    fn context_mut(&mut self) -> &mut ContextStack {
        &mut self.context
    }
}

impl EngineState {
    pub fn new(context: ContextStack) -> Self {
        Self {
            context,
            templates: TemplateRegistry::new(),
            config: EngineConfig::default(),
            diagnostics: Vec::new(),
            error_handler: None,
            ancestors: Vec::new(),
            template_depth: 0,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &ContextStack {
        &self.context
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.templates
    }

    /// Register a handler consulted before `nothrow` markers. It is offered
    /// each error once, at the innermost node that failed, and returns
    /// `true` to suppress it there. Errors it declines are left to `nothrow`
    /// markers further out.
    pub fn set_error_handler(&mut self, handler: impl FnMut(&BuildError) -> bool + 'static) {
        self.error_handler = Some(Box::new(handler));
    }

    /// Errors that were suppressed rather than propagated.
    pub fn diagnostics(&self) -> &[BuildError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<BuildError> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Expand a whole document: register its templates, then expand every
    /// top-level node.
    pub fn expand_document(&mut self, nodes: &[SourceNode]) -> BuildResult<Vec<OutputNode>> {
        self.templates.collect(nodes)?;
        self.ancestors.clear();
        self.template_depth = 0;

        let depth = self.context.depth();
        let result = self.expand(nodes);
        if self.context.depth() != depth {
            return Err(BuildError::new(ErrorCause::Internal(format!(
                "context stack depth changed from {} to {} during expansion",
                depth,
                self.context.depth()
            ))));
        }
        result
    }

    /// Expand a list of sibling nodes.
    pub fn expand(&mut self, nodes: &[SourceNode]) -> BuildResult<Vec<OutputNode>> {
        let mut output = Vec::new();
        let mut run = BranchRun::default();
        for node in nodes {
            match self.expand_node(node, &mut run) {
                Ok(produced) => output.extend(produced),
                Err(mut err) => {
                    if !self.suppresses(node, &mut err) {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "suppressed expansion error");
                    self.diagnostics.push(err);
                }
            }
        }
        Ok(output)
    }

    fn expand_node(&mut self, node: &SourceNode, run: &mut BranchRun) -> BuildResult<Vec<OutputNode>> {
        match node {
            SourceNode::Text(text) => {
                if !node.is_blank_text() {
                    run.reset();
                }
                Ok(self.expand_text(text)?.into_iter().collect())
            }
            SourceNode::Element(element) => {
                run.reset();
                Ok(vec![self.expand_element(element)?])
            }
            SourceNode::For(element) => {
                run.reset();
                self.within(element, |state| state.expand_for(element))
            }
            SourceNode::If(element) => {
                self.within(element, |state| state.expand_branch(Branch::If, element, run))
            }
            SourceNode::ElseIf(element) => {
                self.within(element, |state| state.expand_branch(Branch::ElseIf, element, run))
            }
            SourceNode::Else(element) => {
                self.within(element, |state| state.expand_branch(Branch::Else, element, run))
            }
            SourceNode::Use(element) => {
                run.reset();
                self.within(element, |state| state.expand_use(element))
            }
            SourceNode::Input(tag, element) => {
                run.reset();
                Ok(vec![self.within(element, |state| state.expand_input(*tag, element))?])
            }
            // Registered before expansion starts
            SourceNode::Template(_) => {
                run.reset();
                Ok(Vec::new())
            }
        }
    }

    /// Run `f` with `element` on the ancestor stack, recording its start tag
    /// on any error.
    fn within<T>(
        &mut self,
        element: &SourceElement,
        f: impl FnOnce(&mut Self) -> BuildResult<T>,
    ) -> BuildResult<T> {
        self.ancestors.push(element.attributes.clone());
        let result = f(self);
        self.ancestors.pop();
        result
            .map_err(|err| err.at_document_offset(element.offset))
            .element_context(|| element.start_tag())
    }

    /// Run `f` with a new context frame pushed.
    fn with_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> BuildResult<T>) -> BuildResult<T> {
        ContextStack::scoped(self, ValueMap::new(), f)
    }

    fn suppresses(&mut self, node: &SourceNode, err: &mut BuildError) -> bool {
        if let Some(handler) = self.error_handler.as_mut() {
            if err.offer_to_handler() && handler(&*err) {
                return true;
            }
        }
        if self.config.strict {
            return false;
        }
        let marked = |attributes: &[Attribute]| attributes.iter().any(|a| a.name == NOTHROW);
        node.as_element().is_some_and(|e| marked(&e.attributes))
            || self.ancestors.iter().any(|a| marked(a))
    }

    fn expand_text(&mut self, text: &SourceText) -> BuildResult<Option<OutputNode>> {
        let value = complex_attribute(&text.span(), self.config.trim, &self.context)
            .map_err(|err| err.at_document_offset(text.offset))?;
        let rendered = value.display_text();
        if rendered.is_empty() {
            return Ok(None);
        }
        Ok(Some(OutputNode::Text(rendered)))
    }

    fn expand_element(&mut self, element: &SourceElement) -> BuildResult<OutputNode> {
        self.within(element, |state| {
            let mut output = OutputElement::new(element.output_tag());
            state.clone_attributes(element, &mut output)?;
            output.children = state.expand(&element.children)?;
            Ok(OutputNode::Element(output))
        })
    }

    /// Copy every attribute to `output` with its formulas evaluated.
    fn clone_attributes(&mut self, element: &SourceElement, output: &mut OutputElement) -> BuildResult<()> {
        for (index, attr) in element.attributes.iter().enumerate() {
            if attr.name == NOTHROW || attr.name == "xmlns" || attr.name.starts_with("xmlns:") {
                continue;
            }
            let value = clone_text(&attr.span(), TrimMode::On, &self.context).map_err(|err| {
                let err = err.in_operation("clone_attributes");
                match element.attribute_span(index) {
                    Some(span) => err.with_span(span),
                    None => err,
                }
            })?;
            if attr.name == "class" {
                output.add_class(&value);
            } else {
                output.set_attribute(attr.name.as_str(), value);
            }
        }
        Ok(())
    }

    /// Evaluate an attribute whose whole value is a formula, braces optional.
    fn implicit_formula(&self, attr: &Attribute) -> BuildResult<Value> {
        if attr.value.trim_start().starts_with('{') {
            complex_attribute(&attr.span(), TrimMode::On, &self.context)
        } else {
            crate::formula::evaluate_span(&attr.span(), &self.context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::markup::parse_fragment;
    use crate::output::to_html;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(super) fn expand_with(markup: &str, data: serde_json::Value) -> BuildResult<String> {
        let nodes = parse_fragment(markup).unwrap();
        let mut state = EngineState::new(ContextStack::from_json(data));
        let output = state.expand_document(&nodes)?;
        Ok(to_html(&output))
    }

    #[test]
    fn test_plain_element_attributes_and_text() {
        let html = expand_with(
            "<div class=\"a {cls} a\" title=\" {n * 2} \">x {n}</div>",
            json!({"cls": "b", "n": 4}),
        )
        .unwrap();
        assert_eq!(html, "<div class=\"a b\" title=\"8\">x 4</div>");
    }

    #[test]
    fn test_underscore_tags_and_templates_are_not_output() {
        let html = expand_with(
            "<table_><template id=\"t\"><b/></template><tr_/></table_>",
            json!({}),
        )
        .unwrap();
        assert_eq!(html, "<table><tr></tr></table>");
    }

    #[test]
    fn test_error_carries_element_stack() {
        let err = expand_with(
            "<div><span title=\"{pt.z}\"/></div>",
            json!({"pt": {"x": 1}}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluate);
        assert_eq!(
            err.elements(),
            &["<span title=\"{pt.z}\" />".to_string(), "<div>".to_string()]
        );
        assert!(err.operations().contains(&"clone_attributes"));
    }

    #[test]
    fn test_nothrow_suppresses_one_node() {
        let nodes = parse_fragment(
            "<p><b nothrow=\"\" title=\"{missing.x}\">text</b><i>{ok}</i></p>",
        )
        .unwrap();
        let mut state = EngineState::new(ContextStack::from_json(json!({"ok": "fine"})));
        let output = state.expand_document(&nodes).unwrap();
        assert_eq!(to_html(&output), "<p><i>fine</i></p>");
        assert_eq!(state.diagnostics().len(), 1);
        assert_eq!(state.context().depth(), 0);
    }

    #[test]
    fn test_nothrow_on_ancestor() {
        let html = expand_with(
            "<section nothrow=\"\"><b>{a.b}</b><i>ok</i></section>",
            json!({}),
        )
        .unwrap();
        // The failing text node is dropped; its parent survives
        assert_eq!(html, "<section><b></b><i>ok</i></section>");
    }

    #[test]
    fn test_strict_ignores_nothrow() {
        let nodes = parse_fragment("<b nothrow=\"\">{a.b}</b>").unwrap();
        let config = EngineConfig {
            strict: true,
            ..Default::default()
        };
        let mut state = EngineState::new(ContextStack::default()).with_config(config);
        assert!(state.expand_document(&nodes).is_err());
    }

    #[test]
    fn test_error_handler_suppresses() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let nodes = parse_fragment("<b>{a.b}</b><i>after</i>").unwrap();
        let mut state = EngineState::new(ContextStack::default());
        let log = seen.clone();
        state.set_error_handler(move |err| {
            log.borrow_mut().push(err.kind());
            true
        });
        let output = state.expand_document(&nodes).unwrap();
        // Only the failing text node is dropped
        assert_eq!(to_html(&output), "<b></b><i>after</i>");
        assert_eq!(*seen.borrow(), vec![ErrorKind::Evaluate]);
        assert_eq!(state.take_diagnostics().len(), 1);
        assert!(state.diagnostics().is_empty());
    }

    #[test]
    fn test_error_handler_is_offered_each_error_once() {
        let calls = Rc::new(RefCell::new(0));
        let nodes = parse_fragment("<section><p><b>{a.b}</b></p></section>").unwrap();
        let mut state = EngineState::new(ContextStack::default());
        let count = calls.clone();
        state.set_error_handler(move |_| {
            *count.borrow_mut() += 1;
            false
        });
        assert!(state.expand_document(&nodes).is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_attribute_error_names_attribute() {
        let err = expand_with(
            "<p><div id=\"fine\" title=\"{obj.missing}\">x</div></p>",
            json!({"obj": {}}),
        )
        .unwrap_err();
        let attribute = err.spans().last().unwrap();
        assert_eq!(attribute.text(), "title=\"{obj.missing}\"");
        assert_eq!(attribute.offset(), 15);
        assert_eq!(attribute.source().as_ref(), "<div id=\"fine\" title=\"{obj.missing}\">");
        assert_eq!(err.document_offset(), Some(3));
        assert!(err.render().contains("At byte 3 of the document"));
    }

    #[test]
    fn test_text_error_records_document_offset() {
        let err = expand_with("<p>ab {x.y}</p>", json!({})).unwrap_err();
        assert_eq!(err.document_offset(), Some(3));
    }

    #[test]
    fn test_frames_popped_when_loop_body_fails() {
        let nodes = parse_fragment("<for each=\"x\" in=\"xs\">{x.missing}</for>").unwrap();
        let mut state = EngineState::new(ContextStack::from_json(json!({"xs": [{}]})));
        assert!(state.expand_document(&nodes).is_err());
        assert_eq!(state.context().depth(), 0);
    }

    #[test]
    fn test_trim_modes_for_text() {
        let nodes = parse_fragment("<p>  a {x}  b  </p>").unwrap();
        let data = json!({"x": "1"});
        let render = |trim| {
            let config = EngineConfig {
                trim,
                ..Default::default()
            };
            let mut state =
                EngineState::new(ContextStack::from_json(data.clone())).with_config(config);
            to_html(&state.expand_document(&nodes).unwrap())
        };
        assert_eq!(render(TrimMode::Off), "<p>  a 1  b  </p>");
        assert_eq!(render(TrimMode::On), "<p>a 1  b</p>");
        assert_eq!(render(TrimMode::All), "<p>a1b</p>");
    }
}
