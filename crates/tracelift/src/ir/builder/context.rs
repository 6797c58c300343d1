//! Per-run conversion state.
//!
//! One [`ConversionContext`] lives exactly as long as one conversion. It owns
//! the monotonic name counter (shared by every scope, so names are globally
//! unique without per-scope prefixes), the value-id → name map, the stack of
//! visible scopes, the attribute path table, the state slots and the literal
//! side table.

use crate::ir::{LayerId, Literal, ScopeId};
use crate::source::ValueId;
use std::collections::{HashMap, HashSet};

/// What an attribute path is bound to after a `prim::SetAttr`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrBinding {
    /// The stored value was a known constant.
    Literal(Literal),
    /// The stored value is the named SSA value.
    Value(String),
}

#[derive(Debug)]
struct ScopeFrame {
    id: ScopeId,
    names: HashSet<String>,
}

/// Shared mutable state of one conversion run.
#[derive(Debug, Default)]
pub struct ConversionContext {
    next_name: u32,
    next_scope: u32,
    next_layer: u32,

    /// Source value id → IR name.
    names: HashMap<ValueId, String>,

    /// Innermost scope last.
    scopes: Vec<ScopeFrame>,

    attributes: HashMap<String, AttrBinding>,

    /// Attribute path → name of the mutable slot holding it.
    slots: HashMap<String, String>,

    /// Output name of every emitted constant → its value.
    literals: HashMap<String, Literal>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `x<N>`.
    pub fn fresh_name(&mut self) -> String {
        let name = format!("x{}", self.next_name);
        self.next_name += 1;
        name
    }

    /// Allocate `_x<N>` for a loop induction variable. Shares the counter
    /// with [`Self::fresh_name`].
    pub fn fresh_induction_name(&mut self) -> String {
        let name = format!("_x{}", self.next_name);
        self.next_name += 1;
        name
    }

    pub fn new_layer_id(&mut self) -> LayerId {
        let id = LayerId(self.next_layer);
        self.next_layer += 1;
        id
    }

    /// Open a new innermost scope in which `params` are visible.
    ///
    /// Returns the new scope id and the id of its parent.
    pub fn enter_scope(&mut self, params: &[String]) -> (ScopeId, Option<ScopeId>) {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        let parent = self.current_scope();
        self.scopes.push(ScopeFrame {
            id,
            names: params.iter().cloned().collect(),
        });
        (id, parent)
    }

    pub fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn current_scope(&self) -> Option<ScopeId> {
        self.scopes.last().map(|frame| frame.id)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Record the IR name of a source value without making it visible in any
    /// scope (block parameters become visible when their scope is entered).
    pub fn assign(&mut self, id: ValueId, name: String) {
        self.names.insert(id, name);
    }

    /// Record the IR name of a value produced in the current scope.
    pub fn define(&mut self, id: ValueId, name: String) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.names.insert(name.clone());
        }
        self.names.insert(id, name);
    }

    pub fn name_of(&self, id: ValueId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Whether `name` is produced in the current scope or an ancestor.
    pub fn is_visible(&self, name: &str) -> bool {
        self.scopes.iter().any(|frame| frame.names.contains(name))
    }

    pub fn set_attribute(&mut self, path: String, binding: AttrBinding) {
        self.attributes.insert(path, binding);
    }

    pub fn attribute(&self, path: &str) -> Option<&AttrBinding> {
        self.attributes.get(path)
    }

    /// Whether some bound attribute lives below `path`.
    pub fn has_attributes_below(&self, path: &str) -> bool {
        let prefix = format!("{path}.");
        self.attributes.keys().any(|key| key.starts_with(&prefix))
    }

    /// Bind `path` to the slot `name`, produced in the current scope.
    pub fn declare_slot(&mut self, path: String, name: String) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.names.insert(name.clone());
        }
        self.slots.insert(path, name);
    }

    pub fn slot(&self, path: &str) -> Option<&str> {
        self.slots.get(path).map(String::as_str)
    }

    pub fn record_literal(&mut self, name: &str, value: Literal) {
        self.literals.insert(name.to_string(), value);
    }

    pub fn literal(&self, name: &str) -> Option<&Literal> {
        self.literals.get(name)
    }
}
