/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Named templates.
//!
//! Documents declare templates with `<template id="name" arg="default">`
//! and instantiate them with `<use template="name">`. A few templates are
//! built in; a document template with the same name takes precedence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BuildError, BuildResult, ErrorCause};
use crate::markup::parse_fragment;
use crate::source::{Attribute, SourceElement, SourceNode};

/// A reusable source subtree with default arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    /// Declared defaults, applied for arguments a use-site omits. Values may
    /// embed formulas; they are evaluated at instantiation.
    pub defaults: Vec<Attribute>,
    pub body: Vec<SourceNode>,
}

impl Template {
    /// Build a template from a `<template>` element.
    pub fn from_element(element: &SourceElement) -> BuildResult<Template> {
        let name = element
            .attr("id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BuildError::new(ErrorCause::MissingAttribute("id".to_string())))?;
        Ok(Template {
            name: name.to_string(),
            defaults: element
                .attributes
                .iter()
                .filter(|a| a.name != "id")
                .cloned()
                .collect(),
            body: element.children.clone(),
        })
    }
}

/// Lookup table of templates by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any earlier one with the same name.
    pub fn register(&mut self, template: Template) {
        tracing::debug!(name = %template.name, "registered template");
        self.templates
            .insert(template.name.clone(), Arc::new(template));
    }

    /// Register every `<template>` element in `nodes`, at any depth.
    pub fn collect(&mut self, nodes: &[SourceNode]) -> BuildResult<()> {
        for node in nodes {
            match node {
                SourceNode::Template(element) => {
                    let template = Template::from_element(element)
                        .map_err(|err| err.in_element(element.start_tag()))?;
                    self.register(template);
                }
                SourceNode::Text(_) => {}
                _ => {
                    if let Some(element) = node.as_element() {
                        self.collect(&element.children)?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name) || BUILT_IN_NAMES.contains(&name)
    }

    /// Resolve a template: document templates first, then built-ins.
    pub fn get(&self, name: &str) -> BuildResult<Arc<Template>> {
        let template = match self.templates.get(name) {
            Some(template) => template.clone(),
            None => Arc::new(
                built_in_template(name)?
                    .ok_or_else(|| BuildError::new(ErrorCause::TemplateNotFound(name.to_string())))?,
            ),
        };
        if template.body.iter().all(SourceNode::is_blank_text) {
            return Err(BuildError::new(ErrorCause::EmptyTemplate(name.to_string())));
        }
        Ok(template)
    }
}

const BUILT_IN_NAMES: &[&str] = &["paintByNumbers"];

/// Nonogram grid. `colGroups` and `rowGroups` are lists of clue lists;
/// `cols` and `rows` name them for downstream validation.
const PAINT_BY_NUMBERS: &str = concat!(
    r#"<table_ class="paint-by-numbers bolden_5 bolden_10" data-col-context="{cols$}" data-row-context="{rows$}">"#,
    r#"<thead_>"#,
    r#"<tr_ class="pbn-col-headers">"#,
    r#"<th_ class="pbn-corner">&#160;</th_>"#,
    r#"<for each="col" in="colGroups">"#,
    r#"<td_ class="pbn-col-header">"#,
    r#"<for each="group" in="col"><span class="pbn-col-group">{group}</span></for>"#,
    r#"</td_>"#,
    r#"</for>"#,
    r#"</tr_>"#,
    r#"</thead_>"#,
    r#"<for each="row" in="rowGroups">"#,
    r#"<tr_ class="pbn-row">"#,
    r#"<td_ class="pbn-row-header">"#,
    r#"<for each="group" in="row"><span class="pbn-row-group">{group}</span></for>"#,
    r#"</td_>"#,
    r#"<for each="col" in="colGroups">"#,
    r#"<td_ id="{row#}_{col#}" class="pbn-cell stampable">&#215;</td_>"#,
    r#"</for>"#,
    r#"<td_ class="pbn-row-footer"><span id="rowSummary-{row#}" class="pbn-row-validation"></span></td_>"#,
    r#"</tr_>"#,
    r#"</for>"#,
    r#"<tfoot_>"#,
    r#"<tr_ class="pbn-col-footer">"#,
    r#"<th_ class="pbn-corner">&#160;</th_>"#,
    r#"<for each="col" in="colGroups">"#,
    r#"<td_ class="pbn-col-footer"><span id="colSummary-{col#}" class="pbn-col-validation"></span></td_>"#,
    r#"</for>"#,
    r#"</tr_>"#,
    r#"</tfoot_>"#,
    r#"</table_>"#,
);

/// The built-in template called `name`, if there is one.
pub fn built_in_template(name: &str) -> BuildResult<Option<Template>> {
    let markup = match name {
        "paintByNumbers" => PAINT_BY_NUMBERS,
        _ => return Ok(None),
    };
    let body = parse_fragment(markup).map_err(|err| {
        BuildError::new(ErrorCause::Internal(format!(
            "built-in template {name} is malformed: {err}"
        )))
    })?;
    Ok(Some(Template {
        name: name.to_string(),
        defaults: Vec::new(),
        body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_built_in_parses() {
        let template = built_in_template("paintByNumbers").unwrap().unwrap();
        assert_eq!(template.body.len(), 1);
        let table = template.body[0].as_element().unwrap();
        assert_eq!(table.output_tag(), "table");
        assert_eq!(table.attr("data-col-context"), Some("{cols$}"));
        assert!(built_in_template("nope").unwrap().is_none());
    }

    #[test]
    fn test_collect_registers_nested_templates() {
        let nodes = parse_fragment(
            "<div><template id=\"card\" title=\"Untitled\"><h2>{title}</h2></template></div>",
        )
        .unwrap();
        let mut registry = TemplateRegistry::new();
        registry.collect(&nodes).unwrap();

        let card = registry.get("card").unwrap();
        assert_eq!(card.defaults, vec![Attribute::new("title", "Untitled")]);
        assert_eq!(card.body.len(), 1);
        assert!(registry.contains("card"));
        assert!(registry.contains("paintByNumbers"));
    }

    #[test]
    fn test_lookup_errors() {
        let mut registry = TemplateRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert_eq!(err.cause(), &ErrorCause::TemplateNotFound("missing".to_string()));
        assert_eq!(err.kind(), ErrorKind::Template);

        registry.register(Template {
            name: "blank".to_string(),
            defaults: Vec::new(),
            body: vec![SourceNode::text("  ", 0)],
        });
        let err = registry.get("blank").unwrap_err();
        assert_eq!(err.cause(), &ErrorCause::EmptyTemplate("blank".to_string()));
    }

    #[test]
    fn test_template_requires_id() {
        let nodes = parse_fragment("<template><b/></template>").unwrap();
        let err = TemplateRegistry::new().collect(&nodes).unwrap_err();
        assert_eq!(err.cause(), &ErrorCause::MissingAttribute("id".to_string()));
        assert_eq!(err.elements(), &["<template>".to_string()]);
    }

    #[test]
    fn test_document_template_shadows_built_in() {
        let mut registry = TemplateRegistry::new();
        registry.register(Template {
            name: "paintByNumbers".to_string(),
            defaults: Vec::new(),
            body: vec![SourceNode::text("custom", 0)],
        });
        let template = registry.get("paintByNumbers").unwrap();
        assert_eq!(template.body, vec![SourceNode::text("custom", 0)]);
    }
}
