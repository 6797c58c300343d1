//! IR type definitions.
//!
//! The IR is an ordered, scope-nested graph of named layers. Every layer
//! consumes values by name and produces new names; control-flow layers own
//! nested [`LayerGraph`]s (their blocks). Insertion order is execution order.

use crate::error::ConvertError;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Layer kinds emitted by the standard translation table.
pub mod kinds {
    pub const CONSTANT: &str = "prim.constant";
    pub const PARAM: &str = "prim.param";
    pub const EQUAL: &str = "prim.equal";
    pub const STATE: &str = "prim.state";
    pub const SET_ATTR: &str = "prim.set_attr";
    pub const IF: &str = "prim.if";
    pub const LOOP: &str = "prim.loop";
    pub const TUPLE: &str = "prim.tuple";
    pub const TUPLE_UNPACK: &str = "prim.tuple_unpack";
    pub const LIST: &str = "prim.list";
    pub const EXCEPTION: &str = "prim.exception";
    pub const ADD: &str = "prim.add";
    pub const SUB: &str = "prim.sub";
    pub const MUL: &str = "prim.mul";
    pub const DIV: &str = "prim.div";
    pub const EQ: &str = "prim.eq";
    pub const NE: &str = "prim.ne";
    pub const LT: &str = "prim.lt";
    pub const LE: &str = "prim.le";
    pub const GT: &str = "prim.gt";
    pub const GE: &str = "prim.ge";
    pub const AND: &str = "prim.and";
    pub const NEG: &str = "prim.neg";
    pub const NOT: &str = "prim.not";
    pub const LEN: &str = "prim.len";
    pub const GETITEM: &str = "prim.getitem";
    pub const APPEND: &str = "prim.append";
    pub const SIGMOID: &str = "nn.sigmoid";
    pub const SILU: &str = "nn.silu";
    pub const RELU: &str = "nn.relu";
    pub const HARDSIGMOID: &str = "nn.hardsigmoid";
    pub const CLAMP: &str = "nn.clamp";

    /// Every kind above.
    pub const ALL: &[&str] = &[
        CONSTANT, PARAM, EQUAL, STATE, SET_ATTR, IF, LOOP, TUPLE, TUPLE_UNPACK, LIST, EXCEPTION,
        ADD, SUB, MUL, DIV, EQ, NE, LT, LE, GT, GE, AND, NEG, NOT, LEN, GETITEM, APPEND, SIGMOID,
        SILU, RELU, HARDSIGMOID, CLAMP,
    ];
}

/// Identifier of a layer, unique within one conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer_{}", self.0)
    }
}

/// Identifier of a scope (the top-level graph or one block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope_{}", self.0)
    }
}

/// A literal attribute value, as found in the source trace.
///
/// Deserializes untagged: `null`, booleans, integers, floats, strings and
/// (nested) arrays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float(v) => Some(*v),
            Literal::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: LayerId,

    /// Operation tag, e.g. `prim.add` or `prim.loop`.
    pub kind: String,

    /// Parameter name → producer name, in operand order.
    pub inputs: IndexMap<String, String>,

    /// Names produced by this layer.
    pub outputs: Vec<String>,

    /// Literal attributes. A renderer may read an operand from here when it
    /// is not present in `inputs`.
    pub attrs: IndexMap<String, Literal>,

    /// Nested scopes, owned by this layer. Only control-flow kinds have them.
    pub blocks: Vec<LayerGraph>,
}

impl Layer {
    pub fn new(id: LayerId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            inputs: IndexMap::new(),
            outputs: Vec::new(),
            attrs: IndexMap::new(),
            blocks: Vec::new(),
        }
    }

    pub fn input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }

    pub fn attr(&self, key: &str) -> Option<&Literal> {
        self.attrs.get(key)
    }

    /// Short human-readable identity used in error messages.
    pub fn describe(&self) -> String {
        format!("{} `{}`", self.id, self.kind)
    }
}

/// An ordered, scope-nested graph of layers.
///
/// INVARIANTS (checked by [`LayerGraph::verify`]):
/// - every output name is produced once across this scope and all descendants;
/// - every input name is produced earlier in this scope or an ancestor scope,
///   or is a parameter of one of those scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGraph {
    pub scope: ScopeId,

    /// Scope of the owning layer's graph; `None` for the top-level graph.
    pub parent: Option<ScopeId>,

    /// Names bound by the owner before each execution of this scope.
    pub params: Vec<String>,

    /// Names handed back to the owner after each execution of this scope.
    pub results: Vec<String>,

    layers: IndexMap<LayerId, Layer>,
}

impl LayerGraph {
    pub fn new(scope: ScopeId, parent: Option<ScopeId>) -> Self {
        Self {
            scope,
            parent,
            params: Vec::new(),
            results: Vec::new(),
            layers: IndexMap::new(),
        }
    }

    /// Append a layer at the end of the scope and return it.
    pub fn append(&mut self, layer: Layer) -> &mut Layer {
        debug_assert!(
            !self.layers.contains_key(&layer.id),
            "duplicate layer id {}",
            layer.id
        );
        let (index, _) = self.layers.insert_full(layer.id, layer);
        &mut self.layers[index]
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn position(&self, id: LayerId) -> Option<usize> {
        self.layers.get_index_of(&id)
    }

    pub fn last(&self) -> Option<&Layer> {
        self.layers.last().map(|(_, layer)| layer)
    }

    /// The most recently appended layer.
    pub fn last_mut(&mut self) -> Option<&mut Layer> {
        self.layers.last_mut().map(|(_, layer)| layer)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers of this scope only, in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.values_mut()
    }

    /// Number of layers in this scope and every nested scope.
    pub fn layer_count(&self) -> usize {
        self.iter()
            .map(|layer| 1 + layer.blocks.iter().map(LayerGraph::layer_count).sum::<usize>())
            .sum()
    }

    /// Names referenced by this scope that it neither produces nor binds as
    /// a parameter, in first-reference order. Block results count as
    /// references.
    pub fn free_names(&self) -> Vec<String> {
        let mut defined: HashSet<&str> = self.params.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut free = Vec::new();

        for layer in self.iter() {
            for name in layer.inputs.values() {
                if !defined.contains(name.as_str()) && seen.insert(name) {
                    free.push(name.clone());
                }
            }
            defined.extend(layer.outputs.iter().map(String::as_str));
        }
        for name in &self.results {
            if !defined.contains(name.as_str()) && seen.insert(name) {
                free.push(name.clone());
            }
        }
        free
    }

    /// Map from each name consumed in this scope to the layers consuming it.
    ///
    /// Control-flow layers list the free names of their blocks as inputs, so
    /// uses inside nested blocks show up as uses by the owning layer.
    pub fn consumers(&self) -> HashMap<&str, Vec<LayerId>> {
        let mut map: HashMap<&str, Vec<LayerId>> = HashMap::new();
        for layer in self.iter() {
            for name in layer.inputs.values() {
                let users = map.entry(name.as_str()).or_default();
                if !users.contains(&layer.id) {
                    users.push(layer.id);
                }
            }
        }
        map
    }

    /// Replace `matched` with `replacement`, which takes the position (and
    /// should carry the id) of the latest matched layer.
    ///
    /// Either every matched layer is replaced or the graph is left untouched.
    pub fn replace_layers(&mut self, matched: &[LayerId], replacement: Layer) -> Result<()> {
        let mut anchor: Option<usize> = None;
        for id in matched {
            let Some(pos) = self.position(*id) else {
                bail!("cannot replace {id}: not part of {}", self.scope);
            };
            anchor = Some(anchor.map_or(pos, |a: usize| a.max(pos)));
        }
        let Some(anchor) = anchor else {
            bail!("cannot replace an empty set of layers in {}", self.scope);
        };

        let mut rebuilt = IndexMap::with_capacity(self.layers.len() + 1 - matched.len());
        let mut replacement = Some(replacement);
        for (pos, (id, layer)) in std::mem::take(&mut self.layers).into_iter().enumerate() {
            if pos == anchor {
                if let Some(new_layer) = replacement.take() {
                    rebuilt.insert(new_layer.id, new_layer);
                }
            } else if !matched.contains(&id) {
                rebuilt.insert(id, layer);
            }
        }
        self.layers = rebuilt;
        Ok(())
    }

    /// Check both naming invariants over this graph and all nested scopes.
    pub fn verify(&self) -> Result<()> {
        let mut visible: Vec<HashSet<String>> = Vec::new();
        let mut produced: HashSet<String> = HashSet::new();
        verify_scope(self, &mut visible, &mut produced)
    }
}

fn verify_scope(
    graph: &LayerGraph,
    visible: &mut Vec<HashSet<String>>,
    produced: &mut HashSet<String>,
) -> Result<()> {
    visible.push(graph.params.iter().cloned().collect());
    let is_visible =
        |visible: &[HashSet<String>], name: &str| visible.iter().any(|scope| scope.contains(name));

    for layer in graph.iter() {
        for name in layer.inputs.values() {
            if !is_visible(visible, name) {
                return Err(ConvertError::UnresolvedReference {
                    node: layer.describe(),
                    value: name.clone(),
                }
                .into());
            }
        }
        for block in &layer.blocks {
            verify_scope(block, visible, produced)?;
        }
        for name in &layer.outputs {
            if !produced.insert(name.clone()) {
                bail!("{} redefines `{name}`", layer.describe());
            }
            if let Some(scope) = visible.last_mut() {
                scope.insert(name.clone());
            }
        }
    }

    for name in &graph.results {
        if !is_visible(visible, name) {
            return Err(ConvertError::UnresolvedReference {
                node: format!("results of {}", graph.scope),
                value: name.clone(),
            }
            .into());
        }
    }
    visible.pop();
    Ok(())
}

/// Declared type of a graph input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Str,
    IntList,
    FloatList,
    /// The model object itself (`self`); never materialized as a value.
    Module,
}

/// Result of IR construction: the top-level graph plus its typed interface.
#[derive(Debug, Clone)]
pub struct ModelIr {
    /// Source model name.
    pub name: String,

    /// Graph inputs that become `forward` parameters, in order. Module-typed
    /// inputs are not listed.
    pub inputs: Vec<(String, Option<ValueType>)>,

    /// Declared types of the graph results, parallel to `graph.results`.
    pub outputs: Vec<Option<ValueType>>,

    pub graph: LayerGraph,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(id: u32, kind: &str, inputs: &[(&str, &str)], outputs: &[&str]) -> Layer {
        let mut layer = Layer::new(LayerId(id), kind);
        for (key, name) in inputs {
            layer.inputs.insert(key.to_string(), name.to_string());
        }
        layer.outputs = outputs.iter().map(|s| s.to_string()).collect();
        layer
    }

    fn top() -> LayerGraph {
        let mut graph = LayerGraph::new(ScopeId(0), None);
        graph.params = vec!["x0".to_string()];
        graph
    }

    #[test]
    fn test_id_display() {
        assert_eq!(LayerId(7).to_string(), "layer_7");
        assert_eq!(ScopeId(2).to_string(), "scope_2");
    }

    #[test]
    fn test_literal_deserialize_untagged() {
        let lits: Vec<Literal> =
            serde_json::from_str(r#"[null, true, 3, 2.5, "hi", [1, 2.0]]"#).unwrap();
        assert_eq!(
            lits,
            vec![
                Literal::None,
                Literal::Bool(true),
                Literal::Int(3),
                Literal::Float(2.5),
                Literal::Str("hi".to_string()),
                Literal::List(vec![Literal::Int(1), Literal::Float(2.0)]),
            ]
        );
    }

    #[test]
    fn test_append_preserves_order_and_last_mut() {
        let mut graph = top();
        graph.append(layer(0, kinds::CONSTANT, &[], &["x1"]));
        graph.append(layer(1, kinds::ADD, &[("x", "x0"), ("y", "x1")], &["x2"]));
        graph.last_mut().unwrap().attrs.insert("note".into(), Literal::Bool(true));

        let kinds: Vec<&str> = graph.iter().map(|l| l.kind.as_str()).collect();
        assert_eq!(kinds, vec![kinds::CONSTANT, kinds::ADD]);
        assert_eq!(graph.get(LayerId(1)).unwrap().attr("note"), Some(&Literal::Bool(true)));
        assert_eq!(graph.position(LayerId(1)), Some(1));
    }

    #[test]
    fn test_free_names_first_reference_order() {
        let mut block = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        block.params = vec!["p".to_string()];
        block.append(layer(0, kinds::ADD, &[("x", "b"), ("y", "p")], &["t"]));
        block.append(layer(1, kinds::ADD, &[("x", "a"), ("y", "b")], &["u"]));
        block.append(layer(2, kinds::ADD, &[("x", "t"), ("y", "u")], &["v"]));
        block.results = vec!["v".to_string(), "c".to_string()];

        assert_eq!(block.free_names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_verify_accepts_ancestor_reference() {
        let mut graph = top();
        let mut owner = layer(0, kinds::IF, &[("input", "x0")], &["x2"]);
        let mut then_block = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        then_block.append(layer(1, kinds::NEG, &[("input", "x0")], &["x1"]));
        then_block.results = vec!["x1".to_string()];
        let mut else_block = LayerGraph::new(ScopeId(2), Some(ScopeId(0)));
        else_block.results = vec!["x0".to_string()];
        owner.blocks = vec![then_block, else_block];
        graph.append(owner);
        graph.results = vec!["x2".to_string()];

        graph.verify().unwrap();
        assert_eq!(graph.layer_count(), 2);
    }

    #[test]
    fn test_verify_rejects_sibling_reference() {
        let mut graph = top();
        let mut owner = layer(0, kinds::IF, &[("input", "x0")], &[]);
        let mut then_block = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        then_block.append(layer(1, kinds::NEG, &[("input", "x0")], &["x1"]));
        let mut else_block = LayerGraph::new(ScopeId(2), Some(ScopeId(0)));
        else_block.append(layer(2, kinds::NEG, &[("input", "x1")], &["x3"]));
        owner.blocks = vec![then_block, else_block];
        graph.append(owner);

        let err = graph.verify().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::UnresolvedReference { value, .. }) if value == "x1"
        ));
    }

    #[test]
    fn test_verify_rejects_duplicate_output() {
        let mut graph = top();
        graph.append(layer(0, kinds::NEG, &[("input", "x0")], &["x1"]));
        graph.append(layer(1, kinds::NEG, &[("input", "x0")], &["x1"]));
        assert!(graph.verify().is_err());
    }

    #[test]
    fn test_replace_layers_takes_latest_position() {
        let mut graph = top();
        graph.append(layer(0, kinds::SIGMOID, &[("x", "x0")], &["x1"]));
        graph.append(layer(1, kinds::CONSTANT, &[], &["x2"]));
        graph.append(layer(2, kinds::MUL, &[("x", "x0"), ("y", "x1")], &["x3"]));
        graph.append(layer(3, kinds::NEG, &[("input", "x3")], &["x4"]));

        let fused = layer(2, kinds::SILU, &[("x", "x0")], &["x3"]);
        graph
            .replace_layers(&[LayerId(0), LayerId(2)], fused)
            .unwrap();

        let ids: Vec<u32> = graph.iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(graph.get(LayerId(2)).unwrap().kind, kinds::SILU);
    }

    #[test]
    fn test_replace_layers_unknown_id_leaves_graph_untouched() {
        let mut graph = top();
        graph.append(layer(0, kinds::SIGMOID, &[("x", "x0")], &["x1"]));
        let before = graph.clone();

        let fused = layer(0, kinds::SILU, &[("x", "x0")], &["x1"]);
        assert!(graph.replace_layers(&[LayerId(0), LayerId(9)], fused).is_err());
        assert_eq!(graph, before);
    }

    #[test]
    fn test_consumers_deduplicates_per_layer() {
        let mut graph = top();
        graph.append(layer(0, kinds::MUL, &[("x", "x0"), ("y", "x0")], &["x1"]));
        let consumers = graph.consumers();
        assert_eq!(consumers["x0"], vec![LayerId(0)]);
    }
}
