//! Attribute paths whose bindings cross scope boundaries.
//!
//! The run-wide attribute table only holds while every set and get of a path
//! happens in one scope: a set inside a block may or may not run. A path that
//! is set somewhere and touched from more than one scope is lowered to a
//! mutable slot instead:
//!
//! ```text
//! SetAttr(state, 0)              let mut x2 = x1.clone();    (prim.state)
//! If(c) { SetAttr(state, v) }    if x0 { x2 = x3.clone(); }  (prim.set_attr)
//! GetAttr(state)                 let x4 = x2.clone();        (prim.equal)
//! ```
//!
//! The slot lives in the innermost scope enclosing every touch, declared just
//! before the first node of that scope whose subtree touches the path. Nested
//! sets and gets reach it as a free name of their blocks.

use super::core::IrBuilder;
use super::table::Translated;
use crate::error::ConvertError;
use crate::ir::{kinds, LayerGraph};
use crate::source::SourceNode;
use anyhow::Result;
use std::collections::BTreeMap;

pub(super) const GET_ATTR: &str = "prim::GetAttr";
pub(super) const SET_ATTR: &str = "prim::SetAttr";

/// Position of a block: `(owner node index, block index)` per nesting level.
/// The top-level scope is the empty key.
pub(super) type ScopeKey = Vec<(usize, usize)>;

/// Where the slot of one path is declared.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct StatePlan {
    /// Innermost scope enclosing every touch of the path.
    pub home: ScopeKey,
    /// Index, within `home`, of the first node whose subtree touches it.
    pub first: usize,
}

#[derive(Debug, Default)]
struct Touches {
    set: bool,
    at: Vec<(ScopeKey, usize)>,
}

impl Touches {
    fn plan(&self) -> Option<StatePlan> {
        let (first_key, _) = self.at.first()?;
        if !self.set || self.at.iter().all(|(key, _)| key == first_key) {
            return None;
        }

        let mut home = first_key.clone();
        for (key, _) in &self.at {
            let common = home.iter().zip(key).take_while(|(a, b)| a == b).count();
            home.truncate(common);
        }
        let first = self
            .at
            .iter()
            .map(|(key, node)| key.get(home.len()).map_or(*node, |(owner, _)| *owner))
            .min()?;
        Some(StatePlan { home, first })
    }
}

/// Find the attribute paths that need a slot.
pub(super) fn plan_states(b: &IrBuilder<'_>, nodes: &[SourceNode]) -> BTreeMap<String, StatePlan> {
    let mut touches: BTreeMap<String, Touches> = BTreeMap::new();
    collect(b, nodes, &mut Vec::new(), &mut touches);
    touches
        .into_iter()
        .filter_map(|(path, t)| t.plan().map(|plan| (path, plan)))
        .collect()
}

fn collect(
    b: &IrBuilder<'_>,
    nodes: &[SourceNode],
    key: &mut ScopeKey,
    touches: &mut BTreeMap<String, Touches>,
) {
    for (i, node) in nodes.iter().enumerate() {
        let is_set = node.kind == SET_ATTR;
        if is_set || node.kind == GET_ATTR {
            // Nameless nodes are reported when they are translated.
            if let Ok(path) = b.attribute_path(node) {
                let entry = touches.entry(path).or_default();
                entry.set |= is_set;
                entry.at.push((key.clone(), i));
            }
        }
        for (k, block) in node.blocks.iter().enumerate() {
            key.push((i, k));
            collect(b, &block.nodes, key, touches);
            key.pop();
        }
    }
}

/// Declare the slots due before node `index` of the current scope.
///
/// A slot whose first touch is a set in this very scope is declared by that
/// set; any other slot starts from the path's static parameter value.
pub(super) fn declare_due(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    index: usize,
    node: &SourceNode,
) -> Result<()> {
    let due: Vec<String> = b
        .states
        .iter()
        .filter(|(path, plan)| {
            plan.first == index && plan.home == b.scope_key && b.ctx.slot(path).is_none()
        })
        .map(|(path, _)| path.clone())
        .collect();

    for path in due {
        if node.kind == SET_ATTR && b.attribute_path(node)? == path {
            continue;
        }
        let Some(value) = b.params.get(&path).cloned() else {
            return Err(ConvertError::unsupported(
                node.kind.clone(),
                format!(
                    "attribute path `{path}` is used inside blocks before any value is bound to it ({})",
                    b.label(node)
                ),
            )
            .into());
        };

        let slot = b.ctx.fresh_name();
        let mut layer = b.new_layer(kinds::STATE);
        layer.attrs.insert("value".to_string(), value);
        layer.outputs = vec![slot.clone()];
        g.append(layer);

        tracing::trace!(%path, %slot, "declared state slot from parameter");
        b.ctx.declare_slot(path, slot);
    }
    Ok(())
}

/// `SetAttr` of a slotted path: declare the slot, or assign it.
pub(super) fn assign(
    b: &mut IrBuilder<'_>,
    g: &mut LayerGraph,
    node: &SourceNode,
    path: String,
    value: String,
) -> Result<Translated> {
    let Some(slot) = b.ctx.slot(&path).map(str::to_string) else {
        let slot = b.ctx.fresh_name();
        let mut layer = b.new_layer(kinds::STATE);
        layer.inputs.insert("input".to_string(), value.clone());
        layer.outputs = vec![slot.clone()];
        g.append(layer);

        tracing::trace!(%path, %slot, "declared state slot");
        b.ctx.declare_slot(path, slot.clone());
        return Ok((vec![value], vec![slot]));
    };

    if !b.ctx.is_visible(&slot) {
        return Err(ConvertError::UnresolvedReference {
            node: b.label(node),
            value: slot,
        }
        .into());
    }
    let mut layer = b.new_layer(kinds::SET_ATTR);
    layer.inputs.insert("slot".to_string(), slot.clone());
    layer.inputs.insert("input".to_string(), value.clone());
    g.append(layer);

    Ok((vec![slot, value], vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touches(set: bool, at: &[(&[(usize, usize)], usize)]) -> Touches {
        Touches {
            set,
            at: at.iter().map(|(key, i)| (key.to_vec(), *i)).collect(),
        }
    }

    #[test]
    fn single_scope_needs_no_slot() {
        assert_eq!(touches(true, &[(&[], 0), (&[], 3)]).plan(), None);
        assert_eq!(touches(true, &[(&[(1, 0)], 0), (&[(1, 0)], 2)]).plan(), None);
    }

    #[test]
    fn read_only_path_needs_no_slot() {
        assert_eq!(touches(false, &[(&[], 0), (&[(1, 0)], 0)]).plan(), None);
    }

    #[test]
    fn home_is_the_common_ancestor() {
        // set at node 1, read inside block 0 of node 2, read at node 3
        let plan = touches(true, &[(&[], 1), (&[(2, 0)], 0), (&[], 3)]).plan();
        assert_eq!(
            plan,
            Some(StatePlan {
                home: vec![],
                first: 1
            })
        );

        // set in the then branch, read in the else branch of node 4 in a loop body
        let plan = touches(true, &[(&[(0, 0), (4, 0)], 0), (&[(0, 0), (4, 1)], 2)]).plan();
        assert_eq!(
            plan,
            Some(StatePlan {
                home: vec![(0, 0)],
                first: 4
            })
        );
    }
}
