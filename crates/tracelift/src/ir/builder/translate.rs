//! Leaf node translation - one source node becomes one layer.
//!
//! Each helper checks operand arity, resolves the consumed values to the
//! names of their producers, allocates output names and appends the layer.

use super::core::IrBuilder;
use super::table::Translated;
use crate::ir::{kinds, LayerGraph, Literal};
use crate::source::SourceNode;
use anyhow::{bail, Result};

/// Default slope and offset of `hardsigmoid`.
const HARDSIGMOID_ALPHA: f64 = 1.0 / 6.0;
const HARDSIGMOID_BETA: f64 = 0.5;

fn expect_outputs(b: &IrBuilder<'_>, node: &SourceNode, n: usize) -> Result<()> {
    if node.outputs.len() != n {
        bail!(
            "{} must produce {} output(s), found {}",
            b.label(node),
            n,
            node.outputs.len()
        );
    }
    Ok(())
}

/// Emit a single-output layer whose inputs are keyed by `keys`, in operand
/// order.
pub(super) fn emit_with_keys(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    kind: &str,
    keys: &[&str],
) -> Result<Translated> {
    if node.inputs.len() != keys.len() {
        bail!(
            "{} expects {} input(s), found {}",
            b.label(node),
            keys.len(),
            node.inputs.len()
        );
    }
    expect_outputs(b, node, 1)?;

    let inputs = b.resolve_inputs(node)?;
    let outputs = b.define_outputs(node);

    let mut layer = b.new_layer(kind);
    for (key, name) in keys.iter().zip(&inputs) {
        layer.inputs.insert(key.to_string(), name.clone());
    }
    layer.outputs = outputs.clone();
    g.append(layer);

    Ok((inputs, outputs))
}

pub(super) fn emit_binary(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    kind: &str,
) -> Result<Translated> {
    emit_with_keys(b, g, node, kind, &["x", "y"])
}

/// Tuple and list construction: any number of operands keyed `input<i>`.
pub(super) fn emit_variadic(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    kind: &str,
) -> Result<Translated> {
    let keys: Vec<String> = (0..node.inputs.len()).map(|i| format!("input{i}")).collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    emit_with_keys(b, g, node, kind, &keys)
}

/// Emit a `prim.constant` and remember its value for literal-operand lookups.
pub(super) fn emit_constant(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    value: Literal,
) -> Result<Translated> {
    expect_outputs(b, node, 1)?;
    let outputs = b.define_outputs(node);

    let mut layer = b.new_layer(kinds::CONSTANT);
    layer.attrs.insert("value".to_string(), value.clone());
    layer.outputs = outputs.clone();
    g.append(layer);

    if let [name] = outputs.as_slice() {
        b.ctx.record_literal(name, value);
    }
    Ok((vec![], outputs))
}

pub(super) fn translate_tuple_unpack(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [tuple] = node.inputs.as_slice() else {
        bail!("{} expects exactly one tuple input", b.label(node));
    };
    let input = b.resolve(*tuple, node)?;
    let outputs = b.define_outputs(node);

    let mut layer = b.new_layer(kinds::TUPLE_UNPACK);
    layer.inputs.insert("input".to_string(), input.clone());
    layer.outputs = outputs.clone();
    g.append(layer);

    Ok((vec![input], outputs))
}

pub(super) fn translate_exception(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [message] = node.inputs.as_slice() else {
        bail!("{} expects exactly one message input", b.label(node));
    };
    let input = b.resolve(*message, node)?;

    let mut layer = b.new_layer(kinds::EXCEPTION);
    layer.inputs.insert("input".to_string(), input.clone());
    g.append(layer);

    Ok((vec![input], vec![]))
}

/// `hardsigmoid(x)`; slope and offset come from node attributes when given.
pub(super) fn translate_hardsigmoid(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let alpha = node.attr("alpha").and_then(Literal::as_f64);
    let beta = node.attr("beta").and_then(Literal::as_f64);

    let translated = emit_with_keys(b, g, node, kinds::HARDSIGMOID, &["x"])?;
    if let Some(layer) = g.last_mut() {
        layer.attrs.insert(
            "alpha".to_string(),
            Literal::Float(alpha.unwrap_or(HARDSIGMOID_ALPHA)),
        );
        layer
            .attrs
            .insert("beta".to_string(), Literal::Float(beta.unwrap_or(HARDSIGMOID_BETA)));
    }
    Ok(translated)
}

/// `clamp(x, min, max)`. A bound produced by a known constant becomes an
/// attribute; a `None` bound is dropped; any other bound stays an input.
pub(super) fn translate_clamp(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [x, bounds @ ..] = node.inputs.as_slice() else {
        bail!("{} has no operand", b.label(node));
    };
    if bounds.len() > 2 {
        bail!("{} expects at most three inputs", b.label(node));
    }
    expect_outputs(b, node, 1)?;

    let x = b.resolve(*x, node)?;
    let mut consumed = vec![x.clone()];
    let mut layer = b.new_layer(kinds::CLAMP);
    layer.inputs.insert("x".to_string(), x);

    for (key, id) in ["min", "max"].into_iter().zip(bounds) {
        let name = b.resolve(*id, node)?;
        match b.literal_of(&name) {
            Some(Literal::None) => {}
            Some(value) => {
                layer.attrs.insert(key.to_string(), value.clone());
            }
            None => {
                layer.inputs.insert(key.to_string(), name.clone());
            }
        }
        consumed.push(name);
    }

    let outputs = b.define_outputs(node);
    layer.outputs = outputs.clone();
    g.append(layer);
    Ok((consumed, outputs))
}
