/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The context stack formulas are evaluated against.
//!
//! The bottom of the stack is the host data, supplied once and never
//! modified. Loops and templates push overlay frames on top of it. Lookups
//! against the *current scope* walk the overlays from the top down and then
//! fall back to the host data; lookups against the *root* only ever see the
//! host data.

use crate::error::ErrorCause;
use crate::value::{Value, ValueMap};

/// Anything that owns a [`ContextStack`] and can scope frames on it.
pub trait HasContext {
    fn context_mut(&mut self) -> &mut ContextStack;
}

impl HasContext for ContextStack {
    fn context_mut(&mut self) -> &mut ContextStack {
        self
    }
}

/// Nested named-value environments.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    /// Host data. Read-only for the lifetime of the stack.
    root: Value,

    /// Overlay frames pushed by loops and templates, innermost last.
    frames: Vec<ValueMap>,
}

impl ContextStack {
    pub fn new(root: Value) -> Self {
        Self {
            root,
            frames: Vec::new(),
        }
    }

    /// Build a stack from host JSON data.
    pub fn from_json(json: serde_json::Value) -> Self {
        Self::new(Value::from(json))
    }

    /// The host data.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Number of overlay frames currently pushed.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Look up a name in the current scope.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Some(value);
            }
        }
        match &self.root {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Look up a (trimmed) key in the current scope, failing with
    /// `KeyNotFound` when nothing binds it.
    pub fn scope_child(&self, key: &Value) -> Result<Value, ErrorCause> {
        let name = key.make_string()?;
        let name = name.trim();
        self.lookup(name)
            .cloned()
            .ok_or_else(|| ErrorCause::KeyNotFound(name.to_string()))
    }

    /// Look up a key in the host data only.
    pub fn root_child(&self, key: &Value) -> Result<Value, ErrorCause> {
        self.root.get_child(key)
    }

    pub fn push(&mut self, frame: ValueMap) {
        self.frames.push(frame);
    }

    /// Pop the innermost overlay. The host data is never popped.
    pub fn pop(&mut self) -> Option<ValueMap> {
        self.frames.pop()
    }

    /// Run `f` on `owner` with `frame` pushed onto the owner's stack. The
    /// stack is cut back to its previous depth whether `f` succeeds or fails,
    /// which also drops frames `f` pushed and forgot to pop.
    pub fn scoped<S: HasContext + ?Sized, T, E>(
        owner: &mut S,
        frame: ValueMap,
        f: impl FnOnce(&mut S) -> Result<T, E>,
    ) -> Result<T, E> {
        let depth = owner.context_mut().frames.len();
        owner.context_mut().frames.push(frame);
        let result = f(owner);
        owner.context_mut().frames.truncate(depth);
        result
    }

    /// Bind a name in the innermost overlay frame.
    ///
    /// Returns `false` if no overlay is pushed; the host data stays untouched.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name.into(), value);
                true
            }
            None => false,
        }
    }
}
