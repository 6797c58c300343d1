//! Code generation — emits Rust source code from the layer graph.
//!
//! # Overview
//!
//! The [`CodeGenerator`] walks a [`LayerGraph`] in execution order and hands
//! every layer to the renderer registered for its kind in the
//! [`RenderTable`]. A renderer returns [`Statements`]: module-level `init`
//! items (constants) and `forward` body statements. Control-flow renderers
//! recurse into their blocks one indent deeper.
//!
//! # Architecture
//!
//! ```text
//!                   ┌───────────────────────────────┐
//!                   │    ModelIr (layer graph)      │
//!                   └───────────────────────────────┘
//!                                   │
//!                                   ▼
//!                   ┌───────────────────────────────┐
//!                   │  CodeGenerator::render_graph  │◄──┐
//!                   │  RenderTable: kind → RenderFn │   │ blocks
//!                   └───────────────────────────────┘   │
//!                      │            │            │      │
//!                      ▼            ▼            ▼      │
//!                   layer::*    control::loop  control::if
//!                                   │
//!                                   ▼
//!                   ┌───────────────────────────────┐
//!                   │   Statements { init, forward }│
//!                   └───────────────────────────────┘
//!                                   │
//!                                   ▼
//!                   ┌───────────────────────────────┐
//!                   │  module::generate_module      │
//!                   │  pub mod { consts, forward }  │
//!                   └───────────────────────────────┘
//! ```
//!
//! # Sub-modules
//!
//! - **`layer`**: leaf renderers, one `let` statement per layer
//! - **`control`**: `prim.loop` / `prim.if` as native `for` / `if`
//! - **`module`**: wraps the statements into a Rust module
//! - **`types`**: literal and type conversions
//! - **`utils`**: indentation and operand lookup

use crate::error::ConvertError;
use crate::ir::{kinds, Layer, LayerGraph, Literal};
use anyhow::{bail, Result};
use indexmap::IndexSet;
use std::collections::HashMap;

pub mod control;
pub mod layer;
pub mod module;
pub mod types;
pub mod utils;

pub use module::generate_module;

/// Rendered statements of one layer or scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statements {
    /// Module-level items, unindented.
    pub init: Vec<String>,
    /// Indented `forward` body statements.
    pub forward: Vec<String>,
}

impl Statements {
    pub fn forward(lines: Vec<String>) -> Self {
        Self {
            init: Vec::new(),
            forward: lines,
        }
    }

    pub fn extend(&mut self, other: Statements) {
        self.init.extend(other.init);
        self.forward.extend(other.forward);
    }

    /// Drop repeated init items, keeping the first occurrence.
    pub fn dedup_init(&mut self) {
        let unique: IndexSet<String> = self.init.drain(..).collect();
        self.init = unique.into_iter().collect();
    }
}

/// Renders one layer at the given depth.
pub type RenderFn = fn(&CodeGenerator, &Layer, usize) -> Result<Statements>;

/// Explicit layer kind → renderer map.
#[derive(Clone, Default)]
pub struct RenderTable {
    renderers: HashMap<&'static str, RenderFn>,
}

impl RenderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderers for every kind in [`kinds::ALL`].
    pub fn standard() -> Self {
        let mut table = Self::new();

        table.register(kinds::CONSTANT, layer::constant);
        table.register(kinds::PARAM, layer::param);
        table.register(kinds::EQUAL, layer::equal);
        table.register(kinds::STATE, layer::state);
        table.register(kinds::SET_ATTR, layer::set_attr);
        table.register(kinds::IF, control::render_if);
        table.register(kinds::LOOP, control::render_loop);
        table.register(kinds::TUPLE, layer::tuple_construct);
        table.register(kinds::TUPLE_UNPACK, layer::tuple_unpack);
        table.register(kinds::LIST, layer::list);
        table.register(kinds::EXCEPTION, layer::exception);
        table.register(kinds::LEN, layer::len);
        table.register(kinds::GETITEM, layer::getitem);
        table.register(kinds::APPEND, layer::append);

        table.register(kinds::ADD, |_, l, d| layer::binary(l, d, "+"));
        table.register(kinds::SUB, |_, l, d| layer::binary(l, d, "-"));
        table.register(kinds::MUL, |_, l, d| layer::binary(l, d, "*"));
        table.register(kinds::DIV, |_, l, d| layer::binary(l, d, "/"));
        table.register(kinds::EQ, |_, l, d| layer::binary(l, d, "=="));
        table.register(kinds::NE, |_, l, d| layer::binary(l, d, "!="));
        table.register(kinds::LT, |_, l, d| layer::binary(l, d, "<"));
        table.register(kinds::LE, |_, l, d| layer::binary(l, d, "<="));
        table.register(kinds::GT, |_, l, d| layer::binary(l, d, ">"));
        table.register(kinds::GE, |_, l, d| layer::binary(l, d, ">="));
        table.register(kinds::AND, |_, l, d| layer::binary(l, d, "&&"));
        table.register(kinds::NEG, |_, l, d| layer::unary(l, d, "-"));
        table.register(kinds::NOT, |_, l, d| layer::unary(l, d, "!"));

        table.register(kinds::SIGMOID, layer::sigmoid);
        table.register(kinds::SILU, layer::silu);
        table.register(kinds::RELU, layer::relu);
        table.register(kinds::HARDSIGMOID, layer::hardsigmoid);
        table.register(kinds::CLAMP, layer::clamp);

        table
    }

    pub fn register(&mut self, kind: &'static str, render: RenderFn) {
        self.renderers.insert(kind, render);
    }

    pub fn get(&self, kind: &str) -> Option<RenderFn> {
        self.renderers.get(kind).copied()
    }

    /// Kinds of [`kinds::ALL`] without a renderer.
    pub fn missing_kinds(&self) -> Vec<&'static str> {
        kinds::ALL
            .iter()
            .copied()
            .filter(|kind| !self.renderers.contains_key(kind))
            .collect()
    }
}

/// Recursive layer graph renderer.
#[derive(Clone, Default)]
pub struct CodeGenerator {
    table: RenderTable,
}

impl CodeGenerator {
    pub fn new(table: RenderTable) -> Self {
        Self { table }
    }

    /// Render one layer through its registered renderer.
    pub fn render_layer(&self, layer: &Layer, depth: usize) -> Result<Statements> {
        let Some(render) = self.table.get(&layer.kind) else {
            return Err(ConvertError::unsupported(
                layer.kind.clone(),
                format!("no renderer for {}", layer.describe()),
            )
            .into());
        };
        render(self, layer, depth)
    }

    /// Render every layer of `graph`, in order, at `depth`.
    pub fn render_graph(&self, graph: &LayerGraph, depth: usize) -> Result<Statements> {
        let mut out = Statements::default();
        for layer in graph.iter() {
            out.extend(self.render_layer(layer, depth)?);
        }
        Ok(out)
    }

    /// Render a top-level graph as a function body (depth 1), with
    /// duplicate init items removed.
    pub fn generate(&self, graph: &LayerGraph) -> Result<Statements> {
        self.generate_at(graph, 1)
    }

    pub fn generate_at(&self, graph: &LayerGraph, depth: usize) -> Result<Statements> {
        check_const_names(graph, &mut HashMap::new())?;
        let mut out = self.render_graph(graph, depth)?;
        out.dedup_init();
        Ok(out)
    }
}

/// Distinct parameter paths must not share a const name (`fc.bias` and
/// `fc_bias` are both `FC_BIAS`).
fn check_const_names<'a>(
    graph: &'a LayerGraph,
    seen: &mut HashMap<String, &'a str>,
) -> Result<()> {
    for layer in graph.iter() {
        if layer.kind == kinds::PARAM {
            if let Some(path) = layer.attr("path").and_then(Literal::as_str) {
                let name = layer::const_name(path);
                match seen.get(&name) {
                    Some(other) if *other != path => {
                        bail!("parameters `{other}` and `{path}` both map to const `{name}`")
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(name, path);
                    }
                }
            }
        }
        for block in &layer.blocks {
            check_const_names(block, seen)?;
        }
    }
    Ok(())
}
