/*
 * span.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source spans for error reporting.
//!
//! A [`Span`] names a byte range inside a shared source string. Formula
//! tokens, text tokens and element attributes all carry one, so an error
//! raised deep inside evaluation can point back at the exact characters
//! that produced it.

use std::fmt;
use std::sync::Arc;

/// A (source text, offset, length) triple. Offsets are byte offsets.
#[derive(Clone, PartialEq, Eq)]
pub struct Span {
    source: Arc<str>,
    offset: usize,
    length: usize,
}

impl Span {
    /// Create a span, clamping it to the bounds of `source`.
    pub fn new(source: Arc<str>, offset: usize, length: usize) -> Self {
        let offset = offset.min(source.len());
        let length = length.min(source.len() - offset);
        Self {
            source,
            offset,
            length,
        }
    }

    /// A span covering the whole of `source`.
    pub fn whole(source: Arc<str>) -> Self {
        let length = source.len();
        Self::new(source, 0, length)
    }

    /// Zero-length span at `offset`.
    pub fn point(source: Arc<str>, offset: usize) -> Self {
        Self::new(source, offset, 0)
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// The covered text, or the empty string if the range splits a character.
    pub fn text(&self) -> &str {
        self.source.get(self.offset..self.end()).unwrap_or_default()
    }

    /// Smallest span covering both `self` and `other`.
    ///
    /// Both spans must share a source; otherwise `self` is returned.
    pub fn merge(&self, other: &Span) -> Span {
        if !Arc::ptr_eq(&self.source, &other.source) && self.source != other.source {
            return self.clone();
        }
        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        Span::new(self.source.clone(), start, end - start)
    }

    /// Character-based range, as expected by `ariadne`.
    pub fn char_range(&self) -> std::ops::Range<usize> {
        let to_chars = |byte: usize| {
            self.source
                .char_indices()
                .take_while(|(i, _)| *i < byte)
                .count()
        };
        let start = to_chars(self.offset);
        let end = to_chars(self.end()).max(start);
        start..end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({}..{} {:?})", self.offset, self.end(), self.text())
    }
}
