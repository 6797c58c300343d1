//! Structured control flow: `prim::Loop` and `prim::If`.
//!
//! Both handlers append the owner layer first, name the block parameters,
//! recurse, and only then complete the owner: free names of the blocks
//! become `input-<k>` inputs and the node's outputs get their names.

use super::core::IrBuilder;
use super::table::Translated;
use crate::ir::{kinds, Layer, LayerGraph, LayerId};
use crate::source::{SourceBlock, SourceNode};
use anyhow::{bail, Result};
use indexmap::IndexSet;

/// Counted loop.
///
/// ```text
/// source inputs : [bound, carried_init...]
/// block params  : [induction, carried...]
/// block results : [next carried...]
/// node outputs  : [final carried...]
///
/// layer inputs  : input = bound, carried-<k> = init, input-<k> = free name
/// layer outputs : [induction, final carried...]
/// ```
pub(super) fn translate_loop(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [block] = node.blocks.as_slice() else {
        bail!(
            "{} must own exactly one block, found {}",
            b.label(node),
            node.blocks.len()
        );
    };
    let Some((bound, carried)) = node.inputs.split_first() else {
        bail!("{} has no trip count input", b.label(node));
    };
    let Some((induction_id, carried_params)) = block.params.split_first() else {
        bail!("{} body binds no induction variable", b.label(node));
    };
    if carried_params.len() != carried.len()
        || block.results.len() != carried.len()
        || node.outputs.len() != carried.len()
    {
        bail!(
            "{} carries {} value(s) but its body binds {}, yields {} and the node produces {}",
            b.label(node),
            carried.len(),
            carried_params.len(),
            block.results.len(),
            node.outputs.len()
        );
    }

    let mut consumed = vec![b.resolve(*bound, node)?];
    for id in carried {
        consumed.push(b.resolve(*id, node)?);
    }

    let mut layer = b.new_layer(kinds::LOOP);
    layer.inputs.insert("input".to_string(), consumed[0].clone());
    for (k, name) in consumed[1..].iter().enumerate() {
        layer.inputs.insert(format!("carried-{k}"), name.clone());
    }
    let owner = layer.id;
    g.append(layer);

    let induction = b.ctx.fresh_induction_name();
    let mut params = vec![(*induction_id, induction.clone())];
    for id in carried_params {
        params.push((*id, b.ctx.fresh_name()));
    }
    let body = b.build_block(0, block, params)?;

    let free = body.free_names();
    let outputs = b.define_outputs(node);

    let layer = owner_mut(b, g, node, owner)?;
    for (k, name) in free.iter().enumerate() {
        layer.inputs.insert(format!("input-{k}"), name.clone());
    }
    layer.outputs = std::iter::once(induction).chain(outputs.iter().cloned()).collect();
    layer.blocks.push(body);

    consumed.extend(free);
    Ok((consumed, outputs))
}

/// Two-way conditional. Each block's results map positionally onto the
/// node's outputs.
pub(super) fn translate_if(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [then_block, else_block] = node.blocks.as_slice() else {
        bail!(
            "{} must own exactly two blocks, found {}",
            b.label(node),
            node.blocks.len()
        );
    };
    let [condition] = node.inputs.as_slice() else {
        bail!("{} expects exactly one condition input", b.label(node));
    };
    check_branch(b, node, "then", then_block)?;
    check_branch(b, node, "else", else_block)?;

    let condition = b.resolve(*condition, node)?;
    let mut layer = b.new_layer(kinds::IF);
    layer.inputs.insert("input".to_string(), condition.clone());
    let owner = layer.id;
    g.append(layer);

    let then_graph = b.build_block(0, then_block, vec![])?;
    let else_graph = b.build_block(1, else_block, vec![])?;

    let free: IndexSet<String> = then_graph
        .free_names()
        .into_iter()
        .chain(else_graph.free_names())
        .collect();
    let outputs = b.define_outputs(node);

    let layer = owner_mut(b, g, node, owner)?;
    for (k, name) in free.iter().enumerate() {
        layer.inputs.insert(format!("input-{k}"), name.clone());
    }
    layer.outputs = outputs.clone();
    layer.blocks.push(then_graph);
    layer.blocks.push(else_graph);

    let mut consumed = vec![condition];
    consumed.extend(free);
    Ok((consumed, outputs))
}

fn check_branch(
    b: &IrBuilder<'_>,
    node: &SourceNode,
    branch: &str,
    block: &SourceBlock,
) -> Result<()> {
    if !block.params.is_empty() {
        bail!("{} {branch} branch must not bind parameters", b.label(node));
    }
    if block.results.len() != node.outputs.len() {
        bail!(
            "{} {branch} branch yields {} value(s) but the node produces {}",
            b.label(node),
            block.results.len(),
            node.outputs.len()
        );
    }
    Ok(())
}

/// The owner layer, which must still be the last layer of its scope.
fn owner_mut<'a>(
    b: &IrBuilder<'_>,
    g: &'a mut LayerGraph,
    node: &SourceNode,
    owner: LayerId,
) -> Result<&'a mut Layer> {
    match g.last_mut() {
        Some(layer) if layer.id == owner => Ok(layer),
        _ => bail!("{} is no longer the last layer of its scope", b.label(node)),
    }
}
