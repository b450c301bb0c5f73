/*
 * entity.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Character entities.
//!
//! The entity prefix is `@` rather than `&`, because the markup loader has
//! already resolved real `&` entities before formulas are seen. Supported
//! forms are decimal (`@34;`), hex (`@x22;`), decimal with a leading `#`
//! (`@#34;`) and a small named table (`@quot;`).

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("quot", '"'),
    ("apos", '\''),
    ("lt", '<'),
    ("gt", '>'),
    ("lb", '{'),
    ("rb", '}'),
    ("lbrace", '{'),
    ("rbrace", '}'),
    ("amp", '&'),
    ("tilde", '~'),
    ("at", '@'),
    ("nbsp", '\u{a0}'),
];

/// Resolve an entity body (the text after `@`, with an optional trailing
/// `;`) to a single character.
pub fn entitize(body: &str) -> Option<char> {
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body);

    if let Some(hex) = body.strip_prefix('x') {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    let decimal = body.strip_prefix('#').unwrap_or(body);
    if decimal.starts_with(|c: char| c.is_ascii_digit()) {
        return decimal.parse::<u32>().ok().and_then(char::from_u32);
    }

    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|(_, ch)| *ch)
}

/// Replace every well-formed `@body;` sequence in `raw`.
///
/// Malformed entities leave their `@` as plain text.
pub fn resolve_entities(raw: &str) -> String {
    if !raw.contains('@') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let Some(semi) = after.find(';') else {
            out.push_str(&rest[at..]);
            return out;
        };
        match entitize(&after[..=semi]) {
            Some(ch) => {
                out.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('@');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
