//! Declarative topological patterns over one scope's layer sequence.
//!
//! A [`Pattern`] is a small DAG of layer kinds. Matching starts from every
//! layer whose kind equals the first (anchor) node's kind and then follows
//! consumer edges to bind the remaining nodes:
//!
//! ```text
//! silu:   n0 = nn.sigmoid(in0)
//!         n1 = prim.mul(in0, n0)      (commutative)
//!
//!   x ──► sigmoid ──► s ──┐
//!   │                     ├──► mul ──► y
//!   └─────────────────────┘
//! ```
//!
//! A match is only reported when every node but the last has its output
//! consumed exclusively inside the match (and not handed back as a scope
//! result), so deleting the matched layers cannot orphan a reader.

use crate::ir::{Layer, LayerGraph, LayerId};
use std::collections::HashMap;

/// Where a pattern node's operand comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The `i`-th external input of the match.
    Input(usize),
    /// The output of an earlier pattern node.
    Node(usize),
}

#[derive(Debug, Clone)]
pub struct PatternNode {
    pub kind: &'static str,
    pub operands: Vec<Operand>,
    /// Operands may match in either order (two-operand nodes only).
    pub commutative: bool,
}

impl PatternNode {
    pub fn new(kind: &'static str, operands: Vec<Operand>) -> Self {
        Self {
            kind,
            operands,
            commutative: false,
        }
    }

    pub fn commutative(mut self) -> Self {
        self.commutative = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub nodes: Vec<PatternNode>,
}

/// One occurrence of a pattern in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Matched layers, parallel to the pattern nodes.
    pub layers: Vec<LayerId>,
    /// Names bound to the pattern's external inputs.
    pub inputs: Vec<String>,
    /// Output name of the last pattern node.
    pub output: String,
    /// Matched layer at the latest position; the replacement goes there.
    pub last: LayerId,
}

#[derive(Debug, Clone, Default)]
struct Binding {
    layers: Vec<LayerId>,
    inputs: HashMap<usize, String>,
}

impl Pattern {
    pub fn new(nodes: Vec<PatternNode>) -> Self {
        Self { nodes }
    }

    /// All occurrences in `graph`'s own layer sequence, in anchor order.
    /// Nested blocks are not searched. Matches may overlap.
    pub fn find(&self, graph: &LayerGraph) -> Vec<Match> {
        let Some(anchor) = self.nodes.first() else {
            return Vec::new();
        };
        let consumers = graph.consumers();
        let mut found = Vec::new();

        for layer in graph.iter() {
            if layer.kind != anchor.kind || !is_candidate(layer) {
                continue;
            }
            let Some(binding) = self.bind(&self.nodes[0], layer, Binding::default(), graph) else {
                continue;
            };
            let Some(binding) = self.extend(1, binding, graph, &consumers) else {
                continue;
            };
            if let Some(m) = self.finish(binding, graph, &consumers) {
                found.push(m);
            }
        }
        found
    }

    /// Bind pattern nodes `k..` given the nodes already bound.
    fn extend(
        &self,
        k: usize,
        binding: Binding,
        graph: &LayerGraph,
        consumers: &HashMap<&str, Vec<LayerId>>,
    ) -> Option<Binding> {
        let Some(node) = self.nodes.get(k) else {
            return Some(binding);
        };
        // Candidates consume an earlier node's output.
        let source = node.operands.iter().find_map(|op| match op {
            Operand::Node(j) => Some(*j),
            Operand::Input(_) => None,
        })?;
        let produced = output_of(graph, *binding.layers.get(source)?)?;

        for id in consumers.get(produced).into_iter().flatten() {
            if binding.layers.contains(id) {
                continue;
            }
            let Some(layer) = graph.get(*id) else {
                continue;
            };
            if layer.kind != node.kind || !is_candidate(layer) {
                continue;
            }
            if let Some(next) = self.bind(node, layer, binding.clone(), graph) {
                if let Some(done) = self.extend(k + 1, next, graph, consumers) {
                    return Some(done);
                }
            }
        }
        None
    }

    /// Bind `layer` to `node`, trying the swapped operand order for
    /// commutative nodes.
    fn bind(
        &self,
        node: &PatternNode,
        layer: &Layer,
        binding: Binding,
        graph: &LayerGraph,
    ) -> Option<Binding> {
        let values: Vec<&str> = layer.inputs.values().map(String::as_str).collect();
        if values.len() != node.operands.len() {
            return None;
        }

        let mut orders = vec![values.clone()];
        if node.commutative && values.len() == 2 {
            orders.push(vec![values[1], values[0]]);
        }

        for order in orders {
            let mut candidate = binding.clone();
            let ok = node.operands.iter().zip(&order).all(|(op, value)| match op {
                Operand::Input(i) => match candidate.inputs.get(i) {
                    Some(bound) => bound == value,
                    None => {
                        candidate.inputs.insert(*i, value.to_string());
                        true
                    }
                },
                Operand::Node(j) => candidate
                    .layers
                    .get(*j)
                    .and_then(|id| output_of(graph, *id))
                    .is_some_and(|out| out == *value),
            });
            if ok {
                candidate.layers.push(layer.id);
                return Some(candidate);
            }
        }
        None
    }

    /// Apply the fan-out rule and package the binding.
    fn finish(
        &self,
        binding: Binding,
        graph: &LayerGraph,
        consumers: &HashMap<&str, Vec<LayerId>>,
    ) -> Option<Match> {
        let (last_node, inner) = binding.layers.split_last()?;
        for id in inner {
            let out = output_of(graph, *id)?;
            if graph.results.iter().any(|r| r == out) {
                return None;
            }
            let escapes = consumers
                .get(out)
                .into_iter()
                .flatten()
                .any(|user| !binding.layers.contains(user));
            if escapes {
                return None;
            }
        }

        let output = output_of(graph, *last_node)?.to_string();
        let last = *binding
            .layers
            .iter()
            .max_by_key(|id| graph.position(**id))?;

        let mut inputs = Vec::with_capacity(binding.inputs.len());
        for i in 0..binding.inputs.len() {
            inputs.push(binding.inputs.get(&i)?.clone());
        }

        Some(Match {
            layers: binding.layers,
            inputs,
            output,
            last,
        })
    }
}

/// Only plain single-output layers take part in fusion.
fn is_candidate(layer: &Layer) -> bool {
    layer.blocks.is_empty() && layer.outputs.len() == 1
}

fn output_of(graph: &LayerGraph, id: LayerId) -> Option<&str> {
    graph
        .get(id)
        .and_then(|layer| layer.outputs.first())
        .map(String::as_str)
}
