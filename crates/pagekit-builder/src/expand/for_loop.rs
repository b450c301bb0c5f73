/*
 * for_loop.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `<for>` loops.
//!
//! ```xml
//! <for each="item" in="list">...</for>
//! <for char="ch" in="{word}">...</for>
//! <for word="w" in="some words">...</for>
//! <for key="k" in="map">...</for>
//! <for range="i" from="1" to="3">...</for>
//! ```
//!
//! One context frame is pushed for the whole loop. Each iteration binds the
//! loop variable `v` and its index `v#`; key loops also bind `v!` to the
//! value under the key.

use unicode_segmentation::UnicodeSegmentation;

use super::EngineState;
use crate::error::{BuildError, BuildResult, ErrorCause, ResultExt};
use crate::output::OutputNode;
use crate::source::{Attribute, SourceElement};
use crate::value::Value;

/// Loop kinds, in the order they are looked for.
const LOOP_KINDS: &[&str] = &["each", "char", "word", "key", "range", "int"];

fn bad_loop(message: impl Into<String>, attr: Option<&Attribute>) -> BuildError {
    let err = BuildError::new(ErrorCause::BadLoop(message.into()));
    match attr {
        Some(attr) => err.with_span(attr.span()),
        None => err,
    }
}

impl EngineState {
    pub(super) fn expand_for(&mut self, element: &SourceElement) -> BuildResult<Vec<OutputNode>> {
        let (kind, attr) = element
            .first_attr(LOOP_KINDS)
            .ok_or_else(|| bad_loop("Unrecognized <for> tag type", None))?;
        let variable = attr.value.trim();
        if variable.is_empty() || !variable.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(bad_loop(
                format!("For loop iteration variable must be a single word: {variable}"),
                Some(attr),
            ));
        }

        let items = self.loop_items(kind, element).context("for_loop", None)?;
        tracing::debug!(kind, variable, count = items.len(), "expanding loop");

        self.with_frame(|state| {
            let mut output = Vec::new();
            for (index, (item, value)) in items.into_iter().enumerate() {
                state.context.bind(variable, item);
                state.context.bind(format!("{variable}#"), Value::from(index as i64));
                if let Some(value) = value {
                    state.context.bind(format!("{variable}!"), value);
                }
                output.extend(state.expand(&element.children)?);
            }
            Ok(output)
        })
    }

    /// The values a loop iterates over. Key loops pair each key with its
    /// value.
    fn loop_items(&self, kind: &str, element: &SourceElement) -> BuildResult<Vec<(Value, Option<Value>)>> {
        let plain = |values: Vec<Value>| -> Vec<(Value, Option<Value>)> {
            values.into_iter().map(|v| (v, None)).collect()
        };
        match kind {
            "each" => {
                let attr = required(element, "in")?;
                match self.implicit_formula(attr)? {
                    Value::List(items) => Ok(plain(items)),
                    _ => Err(bad_loop("For each's in attribute must indicate a list", Some(attr))),
                }
            }
            "char" => {
                let text = self.loop_text(required(element, "in")?)?;
                Ok(plain(text.graphemes(true).map(Value::from).collect()))
            }
            "word" => {
                let text = self.loop_text(required(element, "in")?)?;
                Ok(plain(text.split(' ').map(Value::from).collect()))
            }
            "key" => {
                let attr = required(element, "in")?;
                match self.implicit_formula(attr)? {
                    Value::Map(map) => Ok(map
                        .into_iter()
                        .map(|(key, value)| (Value::String(key), Some(value)))
                        .collect()),
                    _ => Err(bad_loop("Not an object with keys", Some(attr))),
                }
            }
            _ => Ok(plain(self.range_items(element)?)),
        }
    }

    fn loop_text(&self, attr: &Attribute) -> BuildResult<String> {
        self.implicit_formula(attr)?
            .make_string()
            .map_err(|cause| BuildError::at(cause, &attr.span()))
    }

    fn range_bound(&self, element: &SourceElement, name: &str) -> BuildResult<Option<i64>> {
        let Some(attr) = element.attribute(name) else {
            return Ok(None);
        };
        let value = self.implicit_formula(attr)?;
        value
            .make_int()
            .map(Some)
            .map_err(|cause| BuildError::at(cause, &attr.span()))
    }

    /// Numbers from `from` (default 0) towards `until` (exclusive), `to`
    /// (inclusive) or the length of `len`'s text, by `step`.
    ///
    /// Bounds are widened to `i128` so ranges ending at the edges of `i64`
    /// cannot overflow, and the item count is checked against
    /// `max-loop-items` before anything is allocated.
    fn range_items(&self, element: &SourceElement) -> BuildResult<Vec<Value>> {
        let start = i128::from(self.range_bound(element, "from")?.unwrap_or(0));
        let until = self.range_bound(element, "until")?;
        let step = i128::from(self.range_bound(element, "step")?.unwrap_or(1));
        if step == 0 {
            return Err(bad_loop(
                "Invalid loop step. Must be non-zero.",
                element.attribute("step"),
            ));
        }

        let (mut end, end_attr) = match until {
            Some(until) => (i128::from(until), element.attribute("until")),
            None => match self.range_bound(element, "to")? {
                Some(to) => (i128::from(to) + 1, element.attribute("to")),
                None => match element.attribute("len") {
                    Some(attr) => (self.loop_text(attr)?.graphemes(true).count() as i128, Some(attr)),
                    None => (start, None),
                },
            },
        };
        // Counting down, the inclusive end sits one below `to`
        if until.is_none() && step < 0 {
            end -= 2;
        }

        let span = end - start;
        let count = if (step > 0 && span > 0) || (step < 0 && span < 0) {
            (span.abs() + step.abs() - 1) / step.abs()
        } else {
            0
        };
        let limit = self.config.max_loop_items;
        if count > limit as i128 {
            return Err(bad_loop(
                format!("Range loop would produce {count} items, more than the limit of {limit}"),
                end_attr,
            ));
        }

        (0..count)
            .map(|k| {
                i64::try_from(start + k * step).map(Value::from).map_err(|_| {
                    BuildError::new(ErrorCause::Internal(format!(
                        "range item {k} left the bounds of its range"
                    )))
                })
            })
            .collect()
    }
}

fn required<'a>(element: &'a SourceElement, name: &str) -> BuildResult<&'a Attribute> {
    element
        .attribute(name)
        .ok_or_else(|| BuildError::new(ErrorCause::MissingAttribute(name.to_string())))
}

#[cfg(test)]
mod tests {
    use super::super::tests::expand_with;
    use crate::error::{ErrorCause, ErrorKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_each_loop_binds_item_and_index() {
        let html = expand_with(
            "<for each=\"x\" in=\"list\"><i>{x#}:{x}</i></for>",
            json!({"list": ["a", "b"]}),
        )
        .unwrap();
        assert_eq!(html, "<i>0:a</i><i>1:b</i>");
    }

    #[test]
    fn test_range_loops() {
        let data = json!({"n": 3});
        assert_eq!(
            expand_with("<for range=\"i\" from=\"1\" to=\"3\">{i},</for>", data.clone()).unwrap(),
            "1,2,3,"
        );
        assert_eq!(
            expand_with("<for range=\"i\" from=\"5\" to=\"0\" step=\"-2\">{i},</for>", data.clone())
                .unwrap(),
            "5,3,1,"
        );
        assert_eq!(
            expand_with("<for int=\"i\" until=\"n\">{i}</for>", data.clone()).unwrap(),
            "012"
        );
        assert_eq!(
            expand_with("<for range=\"i\" len=\"abcd\" from=\"2\">{i}</for>", data).unwrap(),
            "23"
        );
    }

    #[test]
    fn test_char_word_and_key_loops() {
        let data = json!({"word": "a👍🏽b", "map": {"k1": "v1", "k2": "v2"}});
        assert_eq!(
            expand_with("<for char=\"c\" in=\"word\">[{c}]</for>", data.clone()).unwrap(),
            "[a][👍🏽][b]"
        );
        assert_eq!(
            expand_with("<for word=\"w\" in=\"one two\">({w})</for>", data.clone()).unwrap(),
            "(one)(two)"
        );
        assert_eq!(
            expand_with("<for key=\"k\" in=\"map\">{k}={k!};</for>", data).unwrap(),
            "k1=v1;k2=v2;"
        );
    }

    #[test]
    fn test_nested_loops_see_outer_bindings() {
        let html = expand_with(
            "<for each=\"row\" in=\"rows\"><for each=\"c\" in=\"row\">{row#}{c}</for>|</for>",
            json!({"rows": [["a", "b"], ["c"]]}),
        )
        .unwrap();
        assert_eq!(html, "0a0b|1c|");
    }

    #[test]
    fn test_loop_errors() {
        let err = expand_with("<for each=\"x y\" in=\"list\"/>", json!({"list": []})).unwrap_err();
        assert_eq!(
            err.cause(),
            &ErrorCause::BadLoop("For loop iteration variable must be a single word: x y".to_string())
        );
        assert_eq!(err.kind(), ErrorKind::ControlFlow);

        let err = expand_with("<for in=\"list\"/>", json!({})).unwrap_err();
        assert_eq!(
            err.cause(),
            &ErrorCause::BadLoop("Unrecognized <for> tag type".to_string())
        );

        let err = expand_with("<for each=\"x\" in=\"s\"/>", json!({"s": "text"})).unwrap_err();
        assert_eq!(
            err.cause(),
            &ErrorCause::BadLoop("For each's in attribute must indicate a list".to_string())
        );

        let err = expand_with("<for range=\"i\" to=\"3\" step=\"0\"/>", json!({})).unwrap_err();
        assert_eq!(
            err.cause(),
            &ErrorCause::BadLoop("Invalid loop step. Must be non-zero.".to_string())
        );
    }

    #[test]
    fn test_range_bounds_at_integer_limits() {
        let range = |attrs: &str| expand_with(&format!("<for range=\"i\" {attrs}>{{i#}}</for>"), json!({}));

        // Formula numbers are doubles: both bounds round up to i64::MAX
        assert_eq!(
            range("from=\"9223372036854775806\" to=\"9223372036854775807\"").unwrap(),
            "0"
        );
        assert_eq!(
            range("from=\"9223372036854774784\" to=\"9223372036854775807\" step=\"512\"").unwrap(),
            "01"
        );
        assert_eq!(
            range("from=\"9223372036854775800\" to=\"9223372036854775807\" step=\"9223372036854775807\"")
                .unwrap(),
            "0"
        );
        assert_eq!(
            range("from=\"-9223372036854774784\" to=\"-9223372036854775808\" step=\"-1024\"").unwrap(),
            "01"
        );
    }

    #[test]
    fn test_range_item_limit() {
        let err = expand_with("<for range=\"i\" to=\"{big}\">{i}</for>", json!({"big": 1e18}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ControlFlow);
        assert!(err.to_string().contains("more than the limit of 100000"));
        assert_eq!(err.spans()[0].text(), "{big}");
    }
}
