//! Core IR builder state and scope traversal.
//!
//! The `IrBuilder` walks one scope's node sequence depth-first, dispatching
//! every node through the [`TranslationTable`]. Block-owning handlers call
//! back into [`IrBuilder::build_block`] to recurse.

use super::context::ConversionContext;
use super::state::{self, ScopeKey, StatePlan};
use super::table::TranslationTable;
use crate::error::ConvertError;
use crate::ir::types::*;
use crate::source::{SourceBlock, SourceGraph, SourceIndex, SourceNode, ValueId};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;

/// IR builder state for one conversion run.
pub struct IrBuilder<'g> {
    pub(super) ctx: ConversionContext,

    pub(super) index: SourceIndex<'g>,

    /// Static parameter tree of the source model.
    pub(super) params: &'g BTreeMap<String, Literal>,

    /// Attribute paths lowered to mutable slots.
    pub(super) states: BTreeMap<String, StatePlan>,

    /// Key of the scope being built.
    pub(super) scope_key: ScopeKey,

    /// Index of the node being translated, per open scope.
    cursor: Vec<usize>,

    graph: &'g SourceGraph,

    table: TranslationTable,

    /// Position of the node being translated: node indices, with `b<k>`
    /// segments for nested blocks. Only used in error messages.
    path: Vec<String>,
}

impl<'g> IrBuilder<'g> {
    /// Create a builder with a fresh [`ConversionContext`].
    pub fn new(graph: &'g SourceGraph, table: TranslationTable) -> Result<Self> {
        let index = SourceIndex::build(graph).context("failed to index source graph")?;
        Ok(Self {
            ctx: ConversionContext::new(),
            index,
            params: &graph.params,
            states: BTreeMap::new(),
            scope_key: Vec::new(),
            cursor: Vec::new(),
            graph,
            table,
            path: Vec::new(),
        })
    }

    /// Translate the whole source graph.
    pub fn build(&mut self) -> Result<ModelIr> {
        if self.ctx.depth() != 0 || self.ctx.current_scope().is_some() {
            bail!("IrBuilder::build called while a scope is still open");
        }

        let source = self.graph;
        tracing::debug!(kinds = ?self.table.kinds(), "translation table");

        self.states = state::plan_states(self, &source.nodes);
        if !self.states.is_empty() {
            tracing::debug!(paths = ?self.states.keys().collect::<Vec<_>>(), "attribute state slots");
        }

        let mut params = Vec::new();
        let mut inputs = Vec::new();
        for input in &source.inputs {
            if input.ty == Some(ValueType::Module) {
                continue;
            }
            let name = self.ctx.fresh_name();
            params.push((input.id, name.clone()));
            inputs.push((name, input.ty));
        }

        let results: Vec<ValueId> = source.outputs.iter().map(|o| o.id).collect();
        let graph = self.build_scope(&source.nodes, params, &results)?;
        let outputs = source.outputs.iter().map(|o| o.ty).collect();

        tracing::info!(
            model = %source.name,
            layers = graph.layer_count(),
            "built layer graph"
        );

        Ok(ModelIr {
            name: source.name.clone(),
            inputs,
            outputs,
            graph,
        })
    }

    /// Translate block `k` of a control-flow node in a new child scope.
    ///
    /// `params` names must have been allocated by the caller, so that the
    /// body can reference them before the owning layer is complete.
    pub(super) fn build_block(
        &mut self,
        k: usize,
        block: &SourceBlock,
        params: Vec<(ValueId, String)>,
    ) -> Result<LayerGraph> {
        let owner = self.cursor.last().copied().unwrap_or_default();
        self.path.push(format!("b{k}"));
        self.scope_key.push((owner, k));
        let graph = self.build_scope(&block.nodes, params, &block.results);
        self.scope_key.pop();
        self.path.pop();
        graph
    }

    fn build_scope(
        &mut self,
        nodes: &[SourceNode],
        params: Vec<(ValueId, String)>,
        results: &[ValueId],
    ) -> Result<LayerGraph> {
        let names: Vec<String> = params.iter().map(|(_, name)| name.clone()).collect();
        for (id, name) in params {
            self.ctx.assign(id, name);
        }
        let (scope, parent) = self.ctx.enter_scope(&names);

        let mut graph = LayerGraph::new(scope, parent);
        graph.params = names;

        for (i, node) in nodes.iter().enumerate() {
            self.path.push(i.to_string());
            self.cursor.push(i);
            state::declare_due(self, &mut graph, i, node)?;
            self.translate_node(&mut graph, node)?;
            self.cursor.pop();
            self.path.pop();
        }

        for id in results {
            let name = self.ctx.name_of(*id).filter(|name| self.ctx.is_visible(name));
            let Some(name) = name else {
                return Err(ConvertError::UnresolvedReference {
                    node: format!("results of {scope}"),
                    value: id.to_string(),
                }
                .into());
            };
            graph.results.push(name.to_string());
        }

        self.ctx.exit_scope();
        Ok(graph)
    }

    /// Translate a single node via its registered handler.
    fn translate_node(&mut self, graph: &mut LayerGraph, node: &SourceNode) -> Result<()> {
        let Some(handler) = self.table.get(&node.kind) else {
            return Err(ConvertError::unsupported(
                node.kind.clone(),
                format!("no translation handler for {}", self.label(node)),
            )
            .into());
        };

        let (consumed, produced) = handler(self, graph, node)?;
        tracing::trace!(
            kind = %node.kind,
            ?consumed,
            ?produced,
            "translated node"
        );
        Ok(())
    }

    /// Human-readable node identity for errors: kind plus position.
    pub fn label(&self, node: &SourceNode) -> String {
        format!("`{}` at node {}", node.kind, self.path.join("/"))
    }

    /// Resolve a consumed value to the name of its producer.
    ///
    /// The producer must live in the current scope or an ancestor scope.
    pub fn resolve(&self, id: ValueId, node: &SourceNode) -> Result<String> {
        match self.ctx.name_of(id) {
            Some(name) if self.ctx.is_visible(name) => Ok(name.to_string()),
            _ => Err(ConvertError::UnresolvedReference {
                node: self.label(node),
                value: id.to_string(),
            }
            .into()),
        }
    }

    pub fn resolve_inputs(&self, node: &SourceNode) -> Result<Vec<String>> {
        node.inputs.iter().map(|id| self.resolve(*id, node)).collect()
    }

    /// Allocate and define a fresh name for every output of `node`.
    pub fn define_outputs(&mut self, node: &SourceNode) -> Vec<String> {
        node.outputs
            .iter()
            .map(|id| {
                let name = self.ctx.fresh_name();
                self.ctx.define(*id, name.clone());
                name
            })
            .collect()
    }

    /// Create an empty layer with a fresh id.
    pub fn new_layer(&mut self, kind: &str) -> Layer {
        Layer::new(self.ctx.new_layer_id(), kind)
    }

    /// Literal recorded for a constant's output name.
    pub fn literal_of(&self, name: &str) -> Option<&Literal> {
        self.ctx.literal(name)
    }

    /// Dotted attribute path of a `GetAttr`/`SetAttr` node.
    ///
    /// Walks input 0's producer chain while each producer carries a `name`
    /// attribute; the chain root (the model object) contributes nothing.
    pub fn attribute_path(&self, node: &SourceNode) -> Result<String> {
        let Some(name) = node.s("name") else {
            bail!("{} has no `name` attribute", self.label(node));
        };
        let mut segments = vec![name.to_string()];
        let mut current = node;
        while let Some(&owner) = current.inputs.first() {
            let Some(producer) = self.index.producer_node(owner) else {
                break;
            };
            let Some(segment) = producer.s("name") else {
                break;
            };
            segments.insert(0, segment.to_string());
            current = producer;
        }
        Ok(segments.join("."))
    }
}
