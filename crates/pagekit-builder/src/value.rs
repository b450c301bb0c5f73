/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Values produced by formula evaluation.
//!
//! Host data arrives as JSON and is converted once into [`Value`]. Maps keep
//! their document order so that key loops iterate the way authors wrote them.

use std::fmt;

use indexmap::IndexMap;

use crate::error::ErrorCause;

/// Ordered map of named values.
pub type ValueMap = IndexMap<String, Value>;

/// A value visible to formulas.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// JSON null. Cannot be stringified.
    #[default]
    Null,

    Bool(bool),

    Number(f64),

    String(String),

    List(Vec<Value>),

    Map(ValueMap),
}

impl Value {
    /// The empty string, returned by optional lookups that found nothing.
    pub fn empty() -> Self {
        Value::String(String::new())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Null or the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Coerce to a float. Numbers pass through; strings must parse.
    pub fn make_float(&self) -> Result<f64, ErrorCause> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| !f.is_nan())
                .ok_or_else(|| ErrorCause::NotANumber(self.to_json_text())),
            _ => Err(ErrorCause::NotANumber(self.to_json_text())),
        }
    }

    /// Coerce to an integer. Numbers must be integral; strings must look like
    /// an integer.
    pub fn make_int(&self) -> Result<i64, ErrorCause> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(*n as i64),
            Value::String(s) if is_integer_text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ErrorCause::NotAnInteger(s.clone())),
            _ => Err(ErrorCause::NotAnInteger(self.display_text())),
        }
    }

    /// Coerce to text. Only scalars stringify.
    pub fn make_string(&self) -> Result<String, ErrorCause> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(format_number(*n)),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null | Value::List(_) | Value::Map(_) => {
                Err(ErrorCause::BadCast(self.to_json_text()))
            }
        }
    }

    /// Lossy text rendering for places that must always produce text, such
    /// as output attributes. Lists join with `,` and maps render as JSON.
    pub fn display_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::List(items) => items
                .iter()
                .map(Value::display_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => self.to_json_text(),
            _ => self.make_string().unwrap_or_default(),
        }
    }

    /// Integer key interpretation: integral numbers and integer-looking text.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            Value::String(s) if is_integer_text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Look up a named or indexed child.
    ///
    /// Integer keys index characters of a string or elements of a list.
    /// Any other key is trimmed and looked up in a map. Lookups are
    /// case-sensitive.
    pub fn get_child(&self, key: &Value) -> Result<Value, ErrorCause> {
        let index = key.as_index();

        if let Value::String(text) = self {
            let Some(index) = index else {
                return Err(ErrorCause::NoChildren {
                    key: key.display_text(),
                    container: self.to_json_text(),
                });
            };
            return usize::try_from(index)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(|ch| Value::String(ch.to_string()))
                .ok_or_else(|| ErrorCause::IndexOutOfRange {
                    index,
                    container: text.clone(),
                });
        }

        if let (Value::List(items), Some(index)) = (self, index) {
            return usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| ErrorCause::IndexOutOfRange {
                    index,
                    container: self.display_text(),
                });
        }

        let name = key.make_string()?;
        let name = name.trim();
        match self {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| ErrorCause::KeyNotFound(name.to_string())),
            Value::List(_) => Err(ErrorCause::KeyNotFound(name.to_string())),
            _ => Err(ErrorCause::NoChildren {
                key: name.to_string(),
                container: self.to_json_text(),
            }),
        }
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map_or(serde_json::Value::Null, serde_json::Value::Number)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    fn to_json_text(&self) -> String {
        self.to_json().to_string()
    }
}

/// Format a number the way page scripts print them: integral values have no
/// fractional part, others use the shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1.0e21 {
        if n == 0.0 {
            return "0".to_string();
        }
        return format!("{:.0}", n);
    }
    format!("{}", n)
}

/// Does this text look like an integer (`^\s*-?\d+\s*$`)?
pub fn is_integer_text(text: &str) -> bool {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Value {
        Value::from(json!({
            "fonts": ["bold", "italic"],
            "pt": {"x": 3, "y": 5},
            "sentence": "Unit tests are the best!"
        }))
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-12.0), "-12");
    }

    #[test]
    fn test_integer_text() {
        assert!(is_integer_text("12"));
        assert!(is_integer_text(" -3 "));
        assert!(!is_integer_text("-"));
        assert!(!is_integer_text("1.5"));
        assert!(!is_integer_text("x1"));
    }

    #[test]
    fn test_make_string_rejects_aggregates() {
        assert_eq!(Value::from(3.0).make_string(), Ok("3".to_string()));
        assert_eq!(Value::Bool(true).make_string(), Ok("true".to_string()));
        assert!(matches!(
            Value::Null.make_string(),
            Err(ErrorCause::BadCast(_))
        ));
        assert!(matches!(
            Value::List(vec![]).make_string(),
            Err(ErrorCause::BadCast(_))
        ));
    }

    #[test]
    fn test_make_float_and_int() {
        assert_eq!(Value::from(" 4 ").make_float(), Ok(4.0));
        assert_eq!(Value::from("2.5").make_float(), Ok(2.5));
        assert!(Value::from("pt").make_float().is_err());
        assert_eq!(Value::from("-7").make_int(), Ok(-7));
        assert!(Value::from(2.5).make_int().is_err());
    }

    #[test]
    fn test_get_child_dispatches_on_container() {
        let data = sample();
        let fonts = data.get_child(&Value::from("fonts")).unwrap();
        assert_eq!(fonts.get_child(&Value::from("1")), Ok(Value::from("italic")));
        assert_eq!(fonts.get_child(&Value::from(0.0)), Ok(Value::from("bold")));

        let sentence = data.get_child(&Value::from(" sentence ")).unwrap();
        assert_eq!(sentence.get_child(&Value::from("5")), Ok(Value::from("t")));
    }

    #[test]
    fn test_get_child_failures() {
        let data = sample();
        let fonts = data.get_child(&Value::from("fonts")).unwrap();
        assert!(matches!(
            fonts.get_child(&Value::from("2")),
            Err(ErrorCause::IndexOutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            fonts.get_child(&Value::from("zeroth")),
            Err(ErrorCause::KeyNotFound(_))
        ));
        assert!(matches!(
            Value::from("abc").get_child(&Value::from("x")),
            Err(ErrorCause::NoChildren { .. })
        ));
        assert!(matches!(
            data.get_child(&Value::from("Fonts")),
            Err(ErrorCause::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_display_text() {
        let data = sample();
        let fonts = data.get_child(&Value::from("fonts")).unwrap();
        assert_eq!(fonts.display_text(), "bold,italic");
        let pt = data.get_child(&Value::from("pt")).unwrap();
        assert_eq!(pt.display_text(), r#"{"x":3,"y":5}"#);
    }

    #[test]
    fn test_json_keeps_key_order() {
        let value = Value::from(json!({"b": 1, "a": 2}));
        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
