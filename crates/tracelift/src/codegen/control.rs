//! Control-flow rendering: blocks become native `for` / `if` statements.
//!
//! ```text
//! prim.loop                              prim.if
//!   let mut x3 = x1.clone();               let x5;
//!   for _x2 in 0..x0 {                     if x0 {
//!       <body>                                 <then>
//!       x3 = x4.clone();                       x5 = x3.clone();
//!   }                                      } else {
//!   let x5 = x3;                               <else>
//!                                              x5 = x4.clone();
//!                                          }
//! ```
//!
//! Block init statements are hoisted unchanged.

use super::utils::{indexed_inputs, line, tuple, value_of};
use super::{CodeGenerator, Statements};
use crate::ir::{Layer, LayerGraph};
use anyhow::{bail, Result};

pub fn render_loop(generator: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let [body] = layer.blocks.as_slice() else {
        bail!("{} must own exactly one block", layer.describe());
    };
    let Some((induction, carried)) = body.params.split_first() else {
        bail!("{} body binds no induction variable", layer.describe());
    };
    let bound = value_of(layer, "input")?;
    let inits = indexed_inputs(layer, "carried-");
    let finals = layer.outputs.get(1..).unwrap_or_default();
    if inits.len() != carried.len()
        || body.results.len() != carried.len()
        || finals.len() != carried.len()
    {
        bail!(
            "{} carries {} value(s) but binds {}, yields {} and produces {}",
            layer.describe(),
            inits.len(),
            carried.len(),
            body.results.len(),
            finals.len()
        );
    }

    let mut out = Statements::default();
    for (param, init) in carried.iter().zip(&inits) {
        out.forward
            .push(line(depth, format!("let mut {param} = {init}.clone();")));
    }
    out.forward
        .push(line(depth, format!("for {induction} in 0..{bound} {{")));
    out.extend(generator.render_graph(body, depth + 1)?);
    if let Some(update) = assign(carried, &body.results) {
        out.forward.push(line(depth + 1, update));
    }
    out.forward.push(line(depth, "}"));
    for (output, param) in finals.iter().zip(carried) {
        out.forward.push(line(depth, format!("let {output} = {param};")));
    }
    Ok(out)
}

pub fn render_if(generator: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let [then_block, else_block] = layer.blocks.as_slice() else {
        bail!("{} must own exactly two blocks", layer.describe());
    };
    let condition = value_of(layer, "input")?;

    let mut out = Statements::default();
    for output in &layer.outputs {
        out.forward.push(line(depth, format!("let {output};")));
    }
    out.forward.push(line(depth, format!("if {condition} {{")));
    out.extend(branch(generator, layer, then_block, depth + 1)?);
    if !else_block.is_empty() || !layer.outputs.is_empty() {
        out.forward.push(line(depth, "} else {"));
        out.extend(branch(generator, layer, else_block, depth + 1)?);
    }
    out.forward.push(line(depth, "}"));
    Ok(out)
}

fn branch(
    generator: &CodeGenerator,
    layer: &Layer,
    block: &LayerGraph,
    depth: usize,
) -> Result<Statements> {
    if block.results.len() != layer.outputs.len() {
        bail!(
            "{} branch yields {} value(s) for {} output(s)",
            layer.describe(),
            block.results.len(),
            layer.outputs.len()
        );
    }
    let mut out = generator.render_graph(block, depth)?;
    for (output, result) in layer.outputs.iter().zip(&block.results) {
        out.forward
            .push(line(depth, format!("{output} = {result}.clone();")));
    }
    Ok(out)
}

/// `a = r.clone();`, or one tuple assignment for several targets so that
/// swaps read the old values.
fn assign(targets: &[String], values: &[String]) -> Option<String> {
    match (targets, values) {
        ([], _) => None,
        ([target], [value]) => Some(format!("{target} = {value}.clone();")),
        _ => {
            let values: Vec<String> = values.iter().map(|v| format!("{v}.clone()")).collect();
            Some(format!("{} = {};", tuple(targets), tuple(&values)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::RenderTable;
    use crate::ir::{kinds, LayerId, ScopeId};

    fn generator() -> CodeGenerator {
        CodeGenerator::new(RenderTable::standard())
    }

    fn leaf(id: u32, kind: &str, inputs: &[(&str, &str)], output: &str) -> Layer {
        let mut layer = Layer::new(LayerId(id), kind);
        for (key, name) in inputs {
            layer.inputs.insert(key.to_string(), name.to_string());
        }
        layer.outputs = vec![output.to_string()];
        layer
    }

    #[test]
    fn counted_loop() {
        let mut body = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        body.params = vec!["_x2".to_string(), "x3".to_string()];
        body.append(leaf(1, kinds::ADD, &[("x", "x3"), ("y", "_x2")], "x4"));
        body.results = vec!["x4".to_string()];

        let mut owner = Layer::new(LayerId(0), kinds::LOOP);
        owner.inputs.insert("input".to_string(), "x0".to_string());
        owner.inputs.insert("carried-0".to_string(), "x1".to_string());
        owner.outputs = vec!["_x2".to_string(), "x5".to_string()];
        owner.blocks.push(body);

        let out = generator().render_layer(&owner, 1).unwrap();
        assert_eq!(
            out.forward,
            vec![
                "    let mut x3 = x1.clone();",
                "    for _x2 in 0..x0 {",
                "        let x4 = x3 + _x2;",
                "        x3 = x4.clone();",
                "    }",
                "    let x5 = x3;",
            ]
        );
    }

    #[test]
    fn swapping_loop_uses_tuple_assignment() {
        assert_eq!(
            assign(
                &["a".to_string(), "b".to_string()],
                &["b".to_string(), "a".to_string()]
            ),
            Some("(a, b) = (b.clone(), a.clone());".to_string())
        );
        assert_eq!(assign(&[], &[]), None);
    }

    #[test]
    fn conditional_with_output() {
        let mut then_block = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        then_block.append(leaf(1, kinds::NEG, &[("input", "x1")], "x2"));
        then_block.results = vec!["x2".to_string()];
        let mut else_block = LayerGraph::new(ScopeId(2), Some(ScopeId(0)));
        else_block.results = vec!["x1".to_string()];

        let mut owner = Layer::new(LayerId(0), kinds::IF);
        owner.inputs.insert("input".to_string(), "x0".to_string());
        owner.inputs.insert("input-0".to_string(), "x1".to_string());
        owner.outputs = vec!["x3".to_string()];
        owner.blocks = vec![then_block, else_block];

        let out = generator().render_layer(&owner, 1).unwrap();
        assert_eq!(
            out.forward,
            vec![
                "    let x3;",
                "    if x0 {",
                "        let x2 = -x1;",
                "        x3 = x2.clone();",
                "    } else {",
                "        x3 = x1.clone();",
                "    }",
            ]
        );
    }

    #[test]
    fn conditional_without_else_omits_branch() {
        let mut then_block = LayerGraph::new(ScopeId(1), Some(ScopeId(0)));
        then_block.append(leaf(1, kinds::NEG, &[("input", "x1")], "x2"));
        let else_block = LayerGraph::new(ScopeId(2), Some(ScopeId(0)));

        let mut owner = Layer::new(LayerId(0), kinds::IF);
        owner.inputs.insert("input".to_string(), "x0".to_string());
        owner.blocks = vec![then_block, else_block];

        let out = generator().render_layer(&owner, 0).unwrap();
        assert_eq!(out.forward, vec!["if x0 {", "    let x2 = -x1;", "}"]);
    }
}
