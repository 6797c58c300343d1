//! Leaf layer rendering: one `let` statement per layer.

use super::types::{float_to_rust, literal_to_rust, param_to_rust};
use super::utils::{indexed_inputs, line, operand, output, tuple, value_of};
use super::{CodeGenerator, Statements};
use crate::ir::{Layer, Literal};
use anyhow::{bail, Result};
use heck::ToShoutySnakeCase;

fn bind(layer: &Layer, depth: usize, expr: impl AsRef<str>) -> Result<Statements> {
    let out = output(layer, 0)?;
    Ok(Statements::forward(vec![line(
        depth,
        format!("let {out} = {};", expr.as_ref()),
    )]))
}

/// `let y = x <op> y;`
pub fn binary(layer: &Layer, depth: usize, op: &str) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    let y = value_of(layer, "y")?;
    bind(layer, depth, format!("{x} {op} {y}"))
}

/// `let y = <op>x;`
pub fn unary(layer: &Layer, depth: usize, op: &str) -> Result<Statements> {
    let x = value_of(layer, "input")?;
    bind(layer, depth, format!("{op}{x}"))
}

pub fn constant(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let value = layer.attr("value").unwrap_or(&Literal::None);
    bind(layer, depth, literal_to_rust(value))
}

/// Static parameter: a module-level `pub const`, read in `forward`.
pub fn param(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let Some(path) = layer.attr("path").and_then(Literal::as_str) else {
        bail!("{} has no parameter path", layer.describe());
    };
    let Some(value) = layer.attr("value") else {
        bail!("{} has no parameter value", layer.describe());
    };
    let (ty, init) = param_to_rust(value)?;
    let name = const_name(path);

    let read = if matches!(value, Literal::List(_)) {
        format!("{name}.to_vec()")
    } else {
        name.clone()
    };
    let mut statements = bind(layer, depth, read)?;
    statements
        .init
        .push(format!("pub const {name}: {ty} = {init};"));
    Ok(statements)
}

/// Const identifier of a parameter path. Paths of indexed sub-modules
/// (`0.weight`) start with a digit and get a `P_` prefix.
pub fn const_name(path: &str) -> String {
    let name = path.to_shouty_snake_case();
    if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name
    } else {
        format!("P_{}", name.trim_start_matches('_'))
    }
}

pub fn equal(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "input")?;
    bind(layer, depth, format!("{x}.clone()"))
}

pub fn tuple_construct(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let items: Vec<String> = indexed_inputs(layer, "input")
        .iter()
        .map(|name| format!("{name}.clone()"))
        .collect();
    let expr = match items.as_slice() {
        [single] => format!("({single},)"),
        _ => tuple(&items),
    };
    bind(layer, depth, expr)
}

pub fn tuple_unpack(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let input = value_of(layer, "input")?;
    let pattern = match layer.outputs.as_slice() {
        [single] => format!("({single},)"),
        outputs => tuple(outputs),
    };
    Ok(Statements::forward(vec![line(
        depth,
        format!("let {pattern} = {input}.clone();"),
    )]))
}

pub fn list(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let out = output(layer, 0)?;
    let items: Vec<String> = indexed_inputs(layer, "input")
        .iter()
        .map(|name| format!("{name}.clone()"))
        .collect();
    Ok(Statements::forward(vec![line(
        depth,
        format!("let mut {out} = vec![{}];", items.join(", ")),
    )]))
}

pub fn len(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let list = value_of(layer, "input")?;
    bind(layer, depth, format!("{list}.len() as i64"))
}

pub fn getitem(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let list = value_of(layer, "list")?;
    let index = value_of(layer, "index")?;
    bind(layer, depth, format!("{list}[{index} as usize].clone()"))
}

/// The list is copied first, so the source binding need not be mutable.
pub fn append(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let list = value_of(layer, "list")?;
    let element = value_of(layer, "element")?;
    let out = output(layer, 0)?;
    Ok(Statements::forward(vec![
        line(depth, format!("let mut {out} = {list}.clone();")),
        line(depth, format!("{out}.push({element}.clone());")),
    ]))
}

/// Mutable slot of an attribute path, initialized from a value or from the
/// path's static parameter.
pub fn state(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let slot = output(layer, 0)?;
    let init = match (layer.input("input"), layer.attr("value")) {
        (Some(value), _) => format!("{value}.clone()"),
        (None, Some(value)) => literal_to_rust(value),
        (None, None) => bail!("{} has no initial value", layer.describe()),
    };
    Ok(Statements::forward(vec![line(
        depth,
        format!("let mut {slot} = {init};"),
    )]))
}

pub fn set_attr(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let Some(slot) = layer.input("slot") else {
        bail!("{} has no slot", layer.describe());
    };
    let value = value_of(layer, "input")?;
    Ok(Statements::forward(vec![line(
        depth,
        format!("{slot} = {value}.clone();"),
    )]))
}

pub fn exception(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let message = value_of(layer, "input")?;
    Ok(Statements::forward(vec![line(
        depth,
        format!("panic!(\"{{}}\", {message});"),
    )]))
}

pub fn sigmoid(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    bind(layer, depth, format!("1.0 / (1.0 + (-{x}).exp())"))
}

pub fn silu(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    bind(layer, depth, format!("{x} / (1.0 + (-{x}).exp())"))
}

pub fn relu(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    bind(layer, depth, format!("{x}.max(0.0)"))
}

pub fn hardsigmoid(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    let alpha = float_attr(layer, "alpha")?;
    let beta = float_attr(layer, "beta")?;
    bind(layer, depth, format!("({alpha} * {x} + {beta}).clamp(0.0, 1.0)"))
}

/// Missing bounds leave that side open.
pub fn clamp(_: &CodeGenerator, layer: &Layer, depth: usize) -> Result<Statements> {
    let x = value_of(layer, "x")?;
    let min = bound(layer, "min");
    let max = bound(layer, "max");
    let expr = match (min, max) {
        (Some(min), Some(max)) => format!("{x}.clamp({min}, {max})"),
        (Some(min), None) => format!("{x}.max({min})"),
        (None, Some(max)) => format!("{x}.min({max})"),
        (None, None) => x,
    };
    bind(layer, depth, expr)
}

fn float_attr(layer: &Layer, key: &str) -> Result<String> {
    match layer.attr(key).and_then(Literal::as_f64) {
        Some(v) => Ok(float_to_rust(v)),
        None => bail!("{} has no numeric `{key}`", layer.describe()),
    }
}

/// Clamp bounds apply to floats, so literal bounds are widened.
fn bound(layer: &Layer, key: &str) -> Option<String> {
    match layer.attr(key).and_then(Literal::as_f64) {
        Some(v) if layer.input(key).is_none() => Some(float_to_rust(v)),
        _ => operand(layer, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::RenderTable;
    use crate::ir::{kinds, LayerId};

    fn generator() -> CodeGenerator {
        CodeGenerator::new(RenderTable::standard())
    }

    fn layer(kind: &str, inputs: &[(&str, &str)], outputs: &[&str]) -> Layer {
        let mut layer = Layer::new(LayerId(0), kind);
        for (key, name) in inputs {
            layer.inputs.insert(key.to_string(), name.to_string());
        }
        layer.outputs = outputs.iter().map(|s| s.to_string()).collect();
        layer
    }

    fn forward(layer: &Layer) -> Vec<String> {
        generator().render_layer(layer, 1).unwrap().forward
    }

    #[test]
    fn arithmetic_and_logic() {
        let add = layer(kinds::ADD, &[("x", "x0"), ("y", "x1")], &["x2"]);
        assert_eq!(forward(&add), vec!["    let x2 = x0 + x1;"]);

        let not = layer(kinds::NOT, &[("input", "x0")], &["x1"]);
        assert_eq!(forward(&not), vec!["    let x1 = !x0;"]);

        let mut lt = layer(kinds::LT, &[("x", "x0")], &["x1"]);
        lt.attrs.insert("y".to_string(), Literal::Int(3));
        assert_eq!(forward(&lt), vec!["    let x1 = x0 < 3i64;"]);
    }

    #[test]
    fn param_emits_const_and_read() {
        let mut p = layer(kinds::PARAM, &[], &["x3"]);
        p.attrs.insert("path".to_string(), Literal::Str("fc.bias".into()));
        p.attrs.insert(
            "value".to_string(),
            Literal::List(vec![Literal::Float(0.5), Literal::Float(1.5)]),
        );
        let statements = generator().render_layer(&p, 1).unwrap();
        assert_eq!(
            statements.init,
            vec!["pub const FC_BIAS: &[f64] = &[0.5f64, 1.5f64];"]
        );
        assert_eq!(statements.forward, vec!["    let x3 = FC_BIAS.to_vec();"]);
    }

    #[test]
    fn const_names_are_identifiers() {
        assert_eq!(const_name("fc.bias"), "FC_BIAS");
        assert_eq!(const_name("0.weight"), "P_0_WEIGHT");
        assert_eq!(const_name("layers.0.weight"), "LAYERS_0_WEIGHT");

        let mut p = layer(kinds::PARAM, &[], &["x1"]);
        p.attrs.insert("path".to_string(), Literal::Str("0.weight".into()));
        p.attrs.insert("value".to_string(), Literal::Float(2.0));
        let statements = generator().render_layer(&p, 1).unwrap();
        assert_eq!(statements.init, vec!["pub const P_0_WEIGHT: f64 = 2.0f64;"]);
        assert_eq!(statements.forward, vec!["    let x1 = P_0_WEIGHT;"]);
    }

    #[test]
    fn state_slots() {
        let from_value = layer(kinds::STATE, &[("input", "x1")], &["x2"]);
        assert_eq!(forward(&from_value), vec!["    let mut x2 = x1.clone();"]);

        let mut from_param = layer(kinds::STATE, &[], &["x2"]);
        from_param.attrs.insert("value".to_string(), Literal::Int(3));
        assert_eq!(forward(&from_param), vec!["    let mut x2 = 3i64;"]);

        let set = layer(kinds::SET_ATTR, &[("slot", "x2"), ("input", "x5")], &[]);
        assert_eq!(forward(&set), vec!["    x2 = x5.clone();"]);

        let unset = layer(kinds::STATE, &[], &["x2"]);
        assert!(generator().render_layer(&unset, 1).is_err());
    }

    #[test]
    fn containers() {
        let t = layer(kinds::TUPLE, &[("input0", "a"), ("input1", "b")], &["t"]);
        assert_eq!(forward(&t), vec!["    let t = (a.clone(), b.clone());"]);

        let one = layer(kinds::TUPLE, &[("input0", "a")], &["t"]);
        assert_eq!(forward(&one), vec!["    let t = (a.clone(),);"]);

        let unpack = layer(kinds::TUPLE_UNPACK, &[("input", "t")], &["a", "b"]);
        assert_eq!(forward(&unpack), vec!["    let (a, b) = t.clone();"]);

        let push = layer(kinds::APPEND, &[("list", "l"), ("element", "e")], &["m"]);
        assert_eq!(
            forward(&push),
            vec!["    let mut m = l.clone();", "    m.push(e.clone());"]
        );

        let in_place = layer(kinds::APPEND, &[("list", "l"), ("element", "e")], &[]);
        assert!(generator().render_layer(&in_place, 1).is_err());

        let empty = layer(kinds::LIST, &[], &["l"]);
        assert_eq!(forward(&empty), vec!["    let mut l = vec![];"]);
    }

    #[test]
    fn activations() {
        let silu = layer(kinds::SILU, &[("x", "x0")], &["x1"]);
        assert_eq!(forward(&silu), vec!["    let x1 = x0 / (1.0 + (-x0).exp());"]);

        let mut clamp = layer(kinds::CLAMP, &[("x", "x0"), ("max", "x2")], &["x3"]);
        clamp.attrs.insert("min".to_string(), Literal::Int(0));
        assert_eq!(forward(&clamp), vec!["    let x3 = x0.clamp(0.0f64, x2);"]);

        let mut hs = layer(kinds::HARDSIGMOID, &[("x", "x0")], &["x1"]);
        hs.attrs.insert("alpha".to_string(), Literal::Float(0.25));
        hs.attrs.insert("beta".to_string(), Literal::Float(0.5));
        assert_eq!(
            forward(&hs),
            vec!["    let x1 = (0.25f64 * x0 + 0.5f64).clamp(0.0, 1.0);"]
        );
    }

    #[test]
    fn missing_output_is_an_error() {
        let neg = layer(kinds::NEG, &[("input", "x0")], &[]);
        assert!(generator().render_layer(&neg, 1).is_err());
    }
}
