//! `prim::GetAttr` / `prim::SetAttr` translation.
//!
//! Attribute nodes address values by dotted path (`fc.bias`). A set binds a
//! path in the run's attribute table; a get reads the table first and falls
//! back to the model's static parameter tree. Paths touched from several
//! scopes go through a mutable slot instead (see `state`).

use super::context::AttrBinding;
use super::core::IrBuilder;
use super::state;
use super::table::Translated;
use super::translate;
use crate::error::ConvertError;
use crate::ir::{kinds, LayerGraph, Literal};
use crate::source::SourceNode;
use anyhow::{bail, Result};

pub(super) fn translate_set_attr(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let [_, value] = node.inputs.as_slice() else {
        bail!("{} expects [object, value] inputs", b.label(node));
    };
    let path = b.attribute_path(node)?;
    let name = b.resolve(*value, node)?;

    if b.states.contains_key(&path) {
        return state::assign(b, g, node, path, name);
    }

    let binding = match b.literal_of(&name) {
        Some(literal) => AttrBinding::Literal(literal.clone()),
        None => AttrBinding::Value(name.clone()),
    };
    tracing::trace!(%path, ?binding, "bound attribute");
    b.ctx.set_attribute(path, binding);

    Ok((vec![name], vec![]))
}

pub(super) fn translate_get_attr(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
) -> Result<Translated> {
    let path = b.attribute_path(node)?;

    if let Some(slot) = b.ctx.slot(&path).map(str::to_string) {
        return emit_alias(b, g, node, slot);
    }

    if let Some(binding) = b.ctx.attribute(&path).cloned() {
        return match binding {
            AttrBinding::Literal(value) => translate::emit_constant(b, g, node, value),
            AttrBinding::Value(name) => emit_alias(b, g, node, name),
        };
    }

    if let Some(value) = b.params.get(&path).cloned() {
        return emit_param(b, g, node, path, value);
    }

    if is_submodule(b, node, &path) {
        // Only the path matters; chained gets rebuild it from the producer
        // chain, so no layer and no value.
        return Ok((vec![], vec![]));
    }

    Err(ConvertError::unsupported(
        node.kind.clone(),
        format!("no value bound to attribute path `{path}`"),
    )
    .into())
}

/// A path addresses a sub-module when it prefixes a parameter or bound path,
/// or when the value read is only ever used as the object of further
/// attribute nodes.
fn is_submodule(b: &IrBuilder<'_>, node: &SourceNode, path: &str) -> bool {
    let prefix = format!("{path}.");
    if b.params.keys().any(|key| key.starts_with(&prefix))
        || b.states.keys().any(|key| key.starts_with(&prefix))
        || b.ctx.has_attributes_below(path)
    {
        return true;
    }
    !node.outputs.is_empty()
        && node.outputs.iter().all(|id| {
            let uses = b.index.uses(*id);
            !uses.is_empty()
                && uses.iter().all(|(user, pos)| {
                    *pos == 0 && matches!(user.kind.as_str(), state::GET_ATTR | state::SET_ATTR)
                })
        })
}

/// Read of a path bound to a value or a slot: `prim.equal` of that name,
/// which must be visible from the reading scope.
fn emit_alias(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    name: String,
) -> Result<Translated> {
    if !b.ctx.is_visible(&name) {
        return Err(ConvertError::UnresolvedReference {
            node: b.label(node),
            value: name,
        }
        .into());
    }
    if node.outputs.len() != 1 {
        bail!("{} must produce exactly one output", b.label(node));
    }
    let outputs = b.define_outputs(node);

    let mut layer = b.new_layer(kinds::EQUAL);
    layer.inputs.insert("input".to_string(), name.clone());
    layer.outputs = outputs.clone();
    g.append(layer);

    Ok((vec![name], outputs))
}

fn emit_param(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    path: String,
    value: Literal,
) -> Result<Translated> {
    if node.outputs.len() != 1 {
        bail!("{} must produce exactly one output", b.label(node));
    }
    let outputs = b.define_outputs(node);

    let mut layer = b.new_layer(kinds::PARAM);
    layer.attrs.insert("path".to_string(), Literal::Str(path));
    layer.attrs.insert("value".to_string(), value.clone());
    layer.outputs = outputs.clone();
    g.append(layer);

    if let [name] = outputs.as_slice() {
        b.ctx.record_literal(name, value);
    }
    Ok((vec![], outputs))
}
