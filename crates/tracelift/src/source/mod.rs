//! Source graph adapter.
//!
//! A traced model is a JSON document holding an ordered, SSA-form node
//! sequence. Nodes may own nested blocks (loop bodies, conditional branches)
//! with their own node sequences and declared block parameters.
//!
//! ```json
//! {
//!   "name": "LoopAccumulate",
//!   "inputs": [{ "id": 0, "ty": "int" }, { "id": 1, "ty": "int" }],
//!   "outputs": [{ "id": 3, "ty": "int" }],
//!   "nodes": [
//!     { "kind": "prim::Loop", "inputs": [0, 1], "outputs": [3],
//!       "blocks": [{ "params": [10, 11],
//!                    "nodes": [{ "kind": "aten::add", "inputs": [11, 10], "outputs": [12] }],
//!                    "results": [12] }] }
//!   ]
//! }
//! ```

use crate::ir::{Literal, ValueType};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Unique id of one SSA value in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A typed graph input or output.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueRef {
    pub id: ValueId,

    /// Declared type; required for values that cross the `forward` boundary.
    #[serde(default)]
    pub ty: Option<ValueType>,
}

/// A complete traced model.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceGraph {
    /// Model name (used to derive the generated module name).
    pub name: String,

    pub inputs: Vec<ValueRef>,

    pub outputs: Vec<ValueRef>,

    pub nodes: Vec<SourceNode>,

    /// The model's static parameter tree, flattened to dotted paths
    /// (e.g. `"fc.bias"`).
    #[serde(default)]
    pub params: BTreeMap<String, Literal>,
}

/// One traced operation.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceNode {
    /// Operation kind, e.g. `aten::add` or `prim::If`.
    pub kind: String,

    #[serde(default)]
    pub inputs: Vec<ValueId>,

    #[serde(default)]
    pub outputs: Vec<ValueId>,

    #[serde(default)]
    pub attrs: BTreeMap<String, Literal>,

    #[serde(default)]
    pub blocks: Vec<SourceBlock>,
}

impl SourceNode {
    pub fn attr(&self, name: &str) -> Option<&Literal> {
        self.attrs.get(name)
    }

    /// String-valued attribute.
    pub fn s(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Literal::as_str)
    }
}

/// A nested node sequence owned by a control-flow node.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBlock {
    /// Values bound by the owner each time the block runs.
    #[serde(default)]
    pub params: Vec<ValueId>,

    pub nodes: Vec<SourceNode>,

    /// Values handed back to the owner when the block finishes.
    #[serde(default)]
    pub results: Vec<ValueId>,
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy)]
pub enum Producer<'g> {
    GraphInput,
    BlockParam,
    Node(&'g SourceNode),
}

/// Producer and consumer lookup over the whole trace, nested blocks
/// included.
#[derive(Debug)]
pub struct SourceIndex<'g> {
    producers: HashMap<ValueId, Producer<'g>>,

    /// Value → every `(consuming node, operand position)`.
    uses: HashMap<ValueId, Vec<(&'g SourceNode, usize)>>,
}

impl<'g> SourceIndex<'g> {
    /// Index every value definition. Rejects values defined twice.
    pub fn build(graph: &'g SourceGraph) -> Result<Self> {
        let mut index = SourceIndex {
            producers: HashMap::new(),
            uses: HashMap::new(),
        };
        for input in &graph.inputs {
            index.define(input.id, Producer::GraphInput)?;
        }
        index.index_nodes(&graph.nodes)?;
        Ok(index)
    }

    fn index_nodes(&mut self, nodes: &'g [SourceNode]) -> Result<()> {
        for node in nodes {
            for (pos, input) in node.inputs.iter().enumerate() {
                self.uses.entry(*input).or_default().push((node, pos));
            }
            for block in &node.blocks {
                for param in &block.params {
                    self.define(*param, Producer::BlockParam)?;
                }
                self.index_nodes(&block.nodes)?;
            }
            for output in &node.outputs {
                self.define(*output, Producer::Node(node))?;
            }
        }
        Ok(())
    }

    fn define(&mut self, id: ValueId, producer: Producer<'g>) -> Result<()> {
        if self.producers.insert(id, producer).is_some() {
            bail!("value {id} is defined more than once");
        }
        Ok(())
    }

    pub fn producer(&self, id: ValueId) -> Option<Producer<'g>> {
        self.producers.get(&id).copied()
    }

    /// The node producing `id`, if it was produced by a node.
    pub fn producer_node(&self, id: ValueId) -> Option<&'g SourceNode> {
        match self.producer(id)? {
            Producer::Node(node) => Some(node),
            Producer::GraphInput | Producer::BlockParam => None,
        }
    }

    /// Node operands consuming `id`. Block results are not listed.
    pub fn uses(&self, id: ValueId) -> &[(&'g SourceNode, usize)] {
        self.uses.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

/// Parse a JSON trace document.
pub fn parse_trace(json: &str) -> Result<SourceGraph> {
    let graph: SourceGraph = serde_json::from_str(json).context("invalid trace document")?;
    let kinds: HashSet<&str> = graph.nodes.iter().map(|n| n.kind.as_str()).collect();
    tracing::debug!(
        model = %graph.name,
        nodes = graph.nodes.len(),
        distinct_kinds = kinds.len(),
        "parsed trace"
    );
    Ok(graph)
}
