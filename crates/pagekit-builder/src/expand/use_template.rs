/*
 * use_template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `<use>` template instantiation.
//!
//! Every attribute other than `template` and `class` becomes an argument,
//! bound under three names in a new context frame:
//!
//! - `arg`: the native value. An attribute that starts with `{` keeps the
//!   formula's type; anything else is text.
//! - `arg$`: the raw attribute text, formulas unevaluated
//! - `arg$text`: the value coerced to text
//!
//! Template defaults fill in omitted arguments. Without a `template`
//! attribute, `<use>` expands its own children under the new frame.

use super::EngineState;
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::output::OutputNode;
use crate::source::{Attribute, SourceElement};
use crate::text::{TrimMode, clone_text, complex_attribute};
use crate::value::Value;

fn is_argument(attr: &Attribute) -> bool {
    !attr.name.eq_ignore_ascii_case("template") && !attr.name.eq_ignore_ascii_case("class")
}

impl EngineState {
    pub(super) fn expand_use(&mut self, element: &SourceElement) -> BuildResult<Vec<OutputNode>> {
        let template = match element.attribute("template") {
            Some(attr) => {
                let name = clone_text(&attr.span(), TrimMode::On, &self.context)?;
                if self.template_depth >= self.config.max_template_depth {
                    return Err(BuildError::at(
                        ErrorCause::TemplateTooDeep {
                            name,
                            limit: self.config.max_template_depth,
                        },
                        &attr.span(),
                    ));
                }
                Some(self.templates.get(&name).map_err(|err| err.with_span(attr.span()))?)
            }
            None => None,
        };

        self.with_frame(|state| {
            for attr in element.attributes.iter().filter(|a| is_argument(a)) {
                state.bind_argument(attr)?;
            }
            let Some(template) = template else {
                return state.expand(&element.children);
            };

            for default in &template.defaults {
                if !element.has_attr(&default.name) {
                    state.bind_argument(default)?;
                }
            }
            tracing::debug!(template = %template.name, depth = state.template_depth, "instantiating template");
            state.template_depth += 1;
            let result = state.expand(&template.body);
            state.template_depth -= 1;
            result.context("use_template", None)
        })
    }

    /// Bind one argument in the innermost frame. Later arguments see earlier
    /// ones.
    fn bind_argument(&mut self, attr: &Attribute) -> BuildResult<()> {
        let span = attr.span();
        let value = if attr.value.starts_with('{') {
            complex_attribute(&span, TrimMode::On, &self.context)?
        } else {
            Value::String(clone_text(&span, TrimMode::On, &self.context)?)
        };
        let text = value.display_text();
        let name = attr.name.as_str();
        self.context.bind(format!("{name}$"), Value::from(attr.value.as_ref()));
        self.context.bind(format!("{name}$text"), Value::String(text));
        self.context.bind(name, value);
        Ok(())
    }
}
