//! Shared rewriting machinery for fusion passes.

use super::pattern::{Match, Pattern};
use crate::error::ConvertError;
use crate::ir::{Layer, LayerGraph};
use anyhow::Result;
use std::collections::HashSet;

/// Builds the fused layer for one match. The layer must carry `m.last` as
/// its id and produce exactly `m.output`.
pub type ReplaceFn = fn(&Match) -> Layer;

/// Rewrite every occurrence of `pattern` in `graph` and all nested scopes.
///
/// The whole tree is validated before the first mutation: overlapping
/// matches in one scope, or a replacement that does not keep the id and
/// output of the match, raise `MalformedPattern` with the graph untouched.
///
/// Returns the number of rewritten matches.
pub fn apply_pattern(
    pass: &str,
    pattern: &Pattern,
    graph: &mut LayerGraph,
    replace: ReplaceFn,
) -> Result<usize> {
    validate(pass, pattern, graph, replace)?;
    rewrite(pass, pattern, graph, replace)
}

fn validate(pass: &str, pattern: &Pattern, graph: &LayerGraph, replace: ReplaceFn) -> Result<()> {
    for layer in graph.iter() {
        for block in &layer.blocks {
            validate(pass, pattern, block, replace)?;
        }
    }

    let mut claimed = HashSet::new();
    for m in pattern.find(graph) {
        for id in &m.layers {
            if !claimed.insert(*id) {
                return Err(ConvertError::malformed(
                    pass,
                    format!("{id} in {} belongs to more than one match", graph.scope),
                )
                .into());
            }
        }
        let fused = replace(&m);
        if fused.id != m.last || fused.outputs != [m.output.clone()] {
            return Err(ConvertError::malformed(
                pass,
                format!(
                    "replacement {} must keep {} and produce only `{}`",
                    fused.describe(),
                    m.last,
                    m.output
                ),
            )
            .into());
        }
    }
    Ok(())
}

fn rewrite(pass: &str, pattern: &Pattern, graph: &mut LayerGraph, replace: ReplaceFn) -> Result<usize> {
    let mut count = 0;
    for layer in graph.iter_mut() {
        for block in &mut layer.blocks {
            count += rewrite(pass, pattern, block, replace)?;
        }
    }

    for m in pattern.find(graph) {
        let fused = replace(&m);
        tracing::debug!(
            pass,
            scope = %graph.scope,
            layers = ?m.layers,
            output = %m.output,
            "fused match"
        );
        graph.replace_layers(&m.layers, fused)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{kinds, LayerId, ScopeId};
    use crate::optimizer::pattern::{Operand, PatternNode};

    /// `x0 -> neg -> x1 -> neg -> ... -> x<n>`
    fn neg_chain(n: u32) -> LayerGraph {
        let mut graph = LayerGraph::new(ScopeId(0), None);
        graph.params = vec!["x0".to_string()];
        for i in 0..n {
            let mut layer = Layer::new(LayerId(i), kinds::NEG);
            layer.inputs.insert("input".to_string(), format!("x{i}"));
            layer.outputs = vec![format!("x{}", i + 1)];
            graph.append(layer);
        }
        graph.results = vec![format!("x{n}")];
        graph
    }

    fn double_neg() -> Pattern {
        Pattern::new(vec![
            PatternNode::new(kinds::NEG, vec![Operand::Input(0)]),
            PatternNode::new(kinds::NEG, vec![Operand::Node(0)]),
        ])
    }

    fn alias(m: &Match) -> Layer {
        let mut layer = Layer::new(m.last, kinds::EQUAL);
        layer.inputs.insert("input".to_string(), m.inputs[0].clone());
        layer.outputs = vec![m.output.clone()];
        layer
    }

    #[test]
    fn overlapping_matches_leave_graph_untouched() {
        let mut graph = neg_chain(3);
        let before = graph.clone();

        let err = apply_pattern("double_neg", &double_neg(), &mut graph, alias).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::MalformedPattern { pass, .. }) if pass == "double_neg"
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn replacement_must_keep_match_identity() {
        fn wrong_id(m: &Match) -> Layer {
            let mut layer = alias(m);
            layer.id = LayerId(99);
            layer
        }

        let mut graph = neg_chain(2);
        let before = graph.clone();
        assert!(apply_pattern("double_neg", &double_neg(), &mut graph, wrong_id).is_err());
        assert_eq!(graph, before);

        assert_eq!(
            apply_pattern("double_neg", &double_neg(), &mut graph, alias).unwrap(),
            1
        );
        let fused = graph.last().unwrap();
        assert_eq!(fused.kind, kinds::EQUAL);
        assert_eq!(fused.id, LayerId(1));
        assert_eq!(fused.input("input"), Some("x0"));
    }
}
