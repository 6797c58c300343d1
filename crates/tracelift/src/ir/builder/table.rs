//! Translation registry: source node kind → handler.

use super::core::IrBuilder;
use super::{attrs, control, translate};
use crate::ir::{kinds, LayerGraph, Literal};
use crate::source::SourceNode;
use anyhow::Result;
use std::collections::HashMap;

/// `(consumed input names, produced output names)` of one translated node.
pub type Translated = (Vec<String>, Vec<String>);

/// Translates one source node, appending its layers to the given graph.
pub type TranslateFn = fn(&mut IrBuilder<'_>, &mut LayerGraph, &SourceNode) -> Result<Translated>;

/// Explicit kind → handler map, built once before a run.
#[derive(Clone, Default)]
pub struct TranslationTable {
    handlers: HashMap<&'static str, TranslateFn>,
}

impl TranslationTable {
    /// An empty table. Every node kind is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard operator catalog.
    pub fn standard() -> Self {
        let mut table = Self::new();

        // Literals and attributes
        table.register("prim::Constant", |b, g, node| {
            let value = node.attr("value").cloned().unwrap_or(Literal::None);
            translate::emit_constant(b, g, node, value)
        });
        table.register("prim::Uninitialized", |b, g, node| {
            translate::emit_constant(b, g, node, Literal::None)
        });
        table.register("prim::GetAttr", attrs::translate_get_attr);
        table.register("prim::SetAttr", attrs::translate_set_attr);

        // Control flow
        table.register("prim::If", control::translate_if);
        table.register("prim::Loop", control::translate_loop);

        // Containers
        table.register("prim::TupleConstruct", |b, g, node| {
            translate::emit_variadic(b, g, node, kinds::TUPLE)
        });
        table.register("prim::ListConstruct", |b, g, node| {
            translate::emit_variadic(b, g, node, kinds::LIST)
        });
        table.register("prim::TupleUnpack", translate::translate_tuple_unpack);
        table.register("prim::RaiseException", translate::translate_exception);
        table.register("aten::len", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::LEN, &["input"])
        });
        table.register("aten::__getitem__", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::GETITEM, &["list", "index"])
        });
        table.register("aten::append", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::APPEND, &["list", "element"])
        });

        // Scalar arithmetic and logic
        table.register("aten::add", |b, g, node| translate::emit_binary(b, g, node, kinds::ADD));
        table.register("aten::sub", |b, g, node| translate::emit_binary(b, g, node, kinds::SUB));
        table.register("aten::mul", |b, g, node| translate::emit_binary(b, g, node, kinds::MUL));
        table.register("aten::div", |b, g, node| translate::emit_binary(b, g, node, kinds::DIV));
        table.register("aten::eq", |b, g, node| translate::emit_binary(b, g, node, kinds::EQ));
        table.register("aten::ne", |b, g, node| translate::emit_binary(b, g, node, kinds::NE));
        table.register("aten::lt", |b, g, node| translate::emit_binary(b, g, node, kinds::LT));
        table.register("aten::le", |b, g, node| translate::emit_binary(b, g, node, kinds::LE));
        table.register("aten::gt", |b, g, node| translate::emit_binary(b, g, node, kinds::GT));
        table.register("aten::ge", |b, g, node| translate::emit_binary(b, g, node, kinds::GE));
        table.register("aten::__and__", |b, g, node| {
            translate::emit_binary(b, g, node, kinds::AND)
        });
        table.register("aten::neg", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::NEG, &["input"])
        });
        table.register("aten::__not__", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::NOT, &["input"])
        });

        // Activations
        table.register("aten::sigmoid", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::SIGMOID, &["x"])
        });
        table.register("aten::silu", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::SILU, &["x"])
        });
        table.register("aten::relu", |b, g, node| {
            translate::emit_with_keys(b, g, node, kinds::RELU, &["x"])
        });
        table.register("aten::hardsigmoid", translate::translate_hardsigmoid);
        table.register("aten::clamp", translate::translate_clamp);

        table
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register(&mut self, kind: &'static str, handler: TranslateFn) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: &str) -> Option<TranslateFn> {
        self.handlers.get(kind).copied()
    }

    /// Registered source kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}
