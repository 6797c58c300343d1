//! SiLU fusion.
//!
//! ```text
//! s = nn.sigmoid(x)
//! y = prim.mul(x, s)        ─►   y = nn.silu(x)
//! ```
//!
//! `s` must have no reader besides the multiply. The fused layer keeps the
//! multiply's id, position and output name.

use super::pattern::{Match, Operand, Pattern, PatternNode};
use super::utils::apply_pattern;
use crate::ir::{kinds, Layer, LayerGraph};
use anyhow::Result;

pub const NAME: &str = "silu_fuse";

fn pattern() -> Pattern {
    Pattern::new(vec![
        PatternNode::new(kinds::SIGMOID, vec![Operand::Input(0)]),
        PatternNode::new(kinds::MUL, vec![Operand::Input(0), Operand::Node(0)]).commutative(),
    ])
}

fn fused(m: &Match) -> Layer {
    let mut layer = Layer::new(m.last, kinds::SILU);
    if let Some(x) = m.inputs.first() {
        layer.inputs.insert("x".to_string(), x.clone());
    }
    layer.outputs = vec![m.output.clone()];
    layer
}

/// Fuse every sigmoid-multiply pair in `graph` and its nested scopes.
pub fn fuse(graph: &mut LayerGraph) -> Result<usize> {
    apply_pattern(NAME, &pattern(), graph, fused)
}
