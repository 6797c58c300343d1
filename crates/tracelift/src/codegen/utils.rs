//! General-purpose utility functions for code generation.

use super::types::literal_to_rust;
use crate::ir::Layer;
use anyhow::{bail, Result};

/// Four spaces per depth.
pub fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// One statement at `depth`.
pub fn line(depth: usize, text: impl AsRef<str>) -> String {
    format!("{}{}", indent(depth), text.as_ref())
}

/// Source text of operand `key`: the producer's name when `key` is an input,
/// otherwise the literal text of the attribute with the same key.
pub fn value_of(layer: &Layer, key: &str) -> Result<String> {
    if let Some(name) = layer.input(key) {
        return Ok(name.to_string());
    }
    if let Some(value) = layer.attr(key) {
        return Ok(literal_to_rust(value));
    }
    bail!("{} has no operand `{key}`", layer.describe())
}

/// Like [`value_of`], but `None` when the operand is absent.
pub fn operand(layer: &Layer, key: &str) -> Option<String> {
    value_of(layer, key).ok()
}

/// Output name at `index`.
pub fn output(layer: &Layer, index: usize) -> Result<&str> {
    match layer.outputs.get(index) {
        Some(name) => Ok(name),
        None => bail!("{} has no output {index}", layer.describe()),
    }
}

/// Values of `key0`, `key1`, ... until the first missing key.
pub fn indexed_inputs(layer: &Layer, prefix: &str) -> Vec<String> {
    (0..)
        .map_while(|i| layer.input(&format!("{prefix}{i}")).map(str::to_string))
        .collect()
}

/// A single item as is, anything else as a parenthesized tuple.
pub fn tuple(items: &[String]) -> String {
    match items {
        [single] => single.clone(),
        _ => format!("({})", items.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{kinds, LayerId, Literal};

    #[test]
    fn operands_fall_back_to_attrs() {
        let mut layer = Layer::new(LayerId(0), kinds::CLAMP);
        layer.inputs.insert("x".to_string(), "x1".to_string());
        layer.attrs.insert("max".to_string(), Literal::Float(6.0));

        assert_eq!(value_of(&layer, "x").unwrap(), "x1");
        assert_eq!(value_of(&layer, "max").unwrap(), "6.0f64");
        assert!(value_of(&layer, "min").is_err());
        assert_eq!(operand(&layer, "min"), None);
        assert!(output(&layer, 0).is_err());
    }

    #[test]
    fn indexed_and_tuple() {
        let mut layer = Layer::new(LayerId(0), kinds::TUPLE);
        layer.inputs.insert("input0".to_string(), "a".to_string());
        layer.inputs.insert("input1".to_string(), "b".to_string());
        assert_eq!(indexed_inputs(&layer, "input"), vec!["a", "b"]);
        assert_eq!(tuple(&indexed_inputs(&layer, "input")), "(a, b)");
        assert_eq!(tuple(&["a".to_string()]), "a");
        assert_eq!(indent(2), "        ");
    }
}
