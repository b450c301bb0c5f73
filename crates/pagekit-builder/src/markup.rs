/*
 * markup.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Loading source trees from XML-syntax markup.
//!
//! Documents are fragments: any number of top-level nodes. Text is kept
//! exactly as written (whitespace included), apart from entity resolution.
//! Comments, processing instructions and declarations are skipped.

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::source::{Attribute, SourceElement, SourceNode};

/// HTML named entities that page documents use, beyond XML's own five.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("nbsp", "\u{a0}"),
    ("times", "\u{d7}"),
    ("ndash", "\u{2013}"),
    ("mdash", "\u{2014}"),
    ("hellip", "\u{2026}"),
    ("copy", "\u{a9}"),
];

fn resolve_html_entity(name: &str) -> Option<&'static str> {
    HTML_ENTITIES
        .iter()
        .find(|(entity, _)| *entity == name)
        .map(|(_, text)| *text)
}

/// Errors raised while loading markup.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupError {
    /// XML syntax error from quick-xml.
    Syntax { message: String, position: u64 },

    /// A close tag that doesn't match the innermost open element.
    MismatchedEndTag {
        expected: String,
        found: String,
        position: usize,
    },

    /// A close tag with no open element.
    UnexpectedEndTag { found: String, position: usize },

    /// Input ended inside an element.
    UnclosedElement { name: String, position: usize },
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupError::Syntax { message, position } => {
                write!(f, "Markup syntax error at byte {}: {}", position, message)
            }
            MarkupError::MismatchedEndTag {
                expected,
                found,
                position,
            } => write!(
                f,
                "Mismatched end tag at byte {}: expected </{}>, found </{}>",
                position, expected, found
            ),
            MarkupError::UnexpectedEndTag { found, position } => {
                write!(f, "Unexpected closing tag </{}> at byte {}", found, position)
            }
            MarkupError::UnclosedElement { name, position } => {
                write!(f, "Element <{}> at byte {} is never closed", name, position)
            }
        }
    }
}

impl std::error::Error for MarkupError {}

pub type MarkupResult<T> = Result<T, MarkupError>;

/// Parse a markup fragment into source nodes.
pub fn parse_fragment(content: &str) -> MarkupResult<Vec<SourceNode>> {
    MarkupParser::new(content).parse()
}

struct MarkupParser<'a> {
    reader: Reader<&'a [u8]>,

    /// Elements still open, innermost last.
    stack: Vec<SourceElement>,

    /// Finished top-level nodes.
    roots: Vec<SourceNode>,
}

impl<'a> MarkupParser<'a> {
    fn new(content: &'a str) -> Self {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        Self {
            reader,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn parse(mut self) -> MarkupResult<Vec<SourceNode>> {
        loop {
            // Capture position before reading the event
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.start_element(&e, event_start)?;
                    self.stack.push(element);
                }
                Ok(Event::End(e)) => {
                    let found = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    let Some(element) = self.stack.pop() else {
                        return Err(MarkupError::UnexpectedEndTag {
                            found,
                            position: event_start,
                        });
                    };
                    if element.tag != found {
                        return Err(MarkupError::MismatchedEndTag {
                            expected: element.tag,
                            found,
                            position: event_start,
                        });
                    }
                    self.append(SourceNode::element(element));
                }
                Ok(Event::Empty(e)) => {
                    let element = self.start_element(&e, event_start)?;
                    self.append(SourceNode::element(element));
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape_with(resolve_html_entity)
                        .map_err(|err| self.syntax_error(err, event_start))?;
                    self.append_text(&text, event_start);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    self.append_text(&text, event_start);
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(MarkupError::Syntax {
                        message: err.to_string(),
                        position: self.reader.error_position(),
                    });
                }
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(MarkupError::UnclosedElement {
                name: open.tag.clone(),
                position: open.offset,
            });
        }
        Ok(self.roots)
    }

    fn start_element(&self, e: &BytesStart<'_>, event_start: usize) -> MarkupResult<SourceElement> {
        let mut element = SourceElement::new(String::from_utf8_lossy(e.name().as_ref()));
        element.offset = event_start;

        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.syntax_error(err, event_start))?;
            let name = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value_with(resolve_html_entity)
                .map_err(|err| self.syntax_error(err, event_start))?;
            element.attributes.push(Attribute::new(name, value.as_ref()));
        }
        Ok(element)
    }

    fn syntax_error(&self, err: impl fmt::Display, position: usize) -> MarkupError {
        MarkupError::Syntax {
            message: err.to_string(),
            position: position as u64,
        }
    }

    fn append_text(&mut self, text: &str, offset: usize) {
        // Adjacent text and CDATA runs merge into one node
        let siblings = match self.stack.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        if let Some(SourceNode::Text(previous)) = siblings.last_mut() {
            let mut merged = previous.text.to_string();
            merged.push_str(text);
            previous.text = merged.into();
            return;
        }
        siblings.push(SourceNode::text(text, offset));
    }

    fn append(&mut self, node: SourceNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InputTag;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_fragment_keeps_order_and_text() {
        let nodes = parse_fragment("<p a=\"1\">x {y}</p>\n<br/>").unwrap();
        assert_eq!(nodes.len(), 3);

        let SourceNode::Element(p) = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(p.tag, "p");
        assert_eq!(p.attr("a"), Some("1"));
        assert_eq!(p.offset, 0);
        let SourceNode::Text(text) = &p.children[0] else {
            panic!("expected text");
        };
        assert_eq!(&*text.text, "x {y}");

        assert!(nodes[1].is_blank_text());
        assert_eq!(nodes[2].as_element().map(|e| e.offset), Some(19));
    }

    #[test]
    fn test_directives_are_classified() {
        let nodes =
            parse_fragment("<for each=\"x\" in=\"xs\"><letter/></for><if test=\"a\"/>").unwrap();
        let SourceNode::For(for_loop) = &nodes[0] else {
            panic!("expected for");
        };
        assert!(matches!(
            for_loop.children[0],
            SourceNode::Input(InputTag::Letter, _)
        ));
        assert!(matches!(nodes[1], SourceNode::If(_)));
    }

    #[test]
    fn test_entities_resolve() {
        let nodes = parse_fragment("<td title=\"a&amp;b\">&#215;&nbsp;&times;</td>").unwrap();
        let td = nodes[0].as_element().unwrap();
        assert_eq!(td.attr("title"), Some("a&b"));
        let SourceNode::Text(text) = &td.children[0] else {
            panic!("expected text");
        };
        assert_eq!(&*text.text, "\u{d7}\u{a0}\u{d7}");
    }

    #[test]
    fn test_comments_are_skipped() {
        let nodes = parse_fragment("<!-- note --><b>x</b>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_structure_errors() {
        assert!(matches!(
            parse_fragment("<a><b></a>"),
            Err(MarkupError::MismatchedEndTag { .. }) | Err(MarkupError::Syntax { .. })
        ));
        assert!(matches!(
            parse_fragment("<a>"),
            Err(MarkupError::UnclosedElement { .. }) | Err(MarkupError::Syntax { .. })
        ));
    }
}
