//! Module-level code generation.
//!
//! Wraps the rendered statements of a model into one Rust module:
//!
//! ```text
//! pub mod <name> {
//!     #![allow(..)]
//!
//!     pub const <PARAM>: <ty> = <literal>;     (init items)
//!
//!     pub fn forward(<inputs>) -> <outputs> {
//!         <forward statements>
//!         <result expression>
//!     }
//! }
//! ```

use super::types::{is_list, value_type_to_rust};
use super::utils::{line, tuple};
use super::CodeGenerator;
use crate::ir::ModelIr;
use anyhow::{bail, Context, Result};

/// Lints the generated code trips by construction (every value is cloned
/// and bound, whether used or not).
const ALLOWED_LINTS: &str =
    "#![allow(unused_mut, unused_variables, unused_assignments, unused_parens, clippy::all)]";

/// Generate the complete module text for `model`.
pub fn generate_module(
    generator: &CodeGenerator,
    model: &ModelIr,
    module_name: &str,
) -> Result<String> {
    check_identifier(module_name)?;
    let params = forward_params(model)?;
    let (ret_ty, ret_expr) = forward_return(model)?;
    let body = generator
        .generate_at(&model.graph, 2)
        .with_context(|| format!("failed to render `{}`", model.name))?;

    let mut lines = vec![
        format!("pub mod {module_name} {{"),
        line(1, format!("//! Generated by tracelift from `{}`.", model.name)),
        line(1, ALLOWED_LINTS),
        String::new(),
    ];
    if !body.init.is_empty() {
        lines.extend(body.init.iter().map(|item| line(1, item)));
        lines.push(String::new());
    }
    lines.push(line(
        1,
        format!("pub fn forward({}){ret_ty} {{", params.join(", ")),
    ));
    lines.extend(body.forward);
    if let Some(expr) = ret_expr {
        lines.push(line(2, expr));
    }
    lines.push(line(1, "}"));
    lines.push("}".to_string());

    tracing::debug!(
        module = module_name,
        lines = lines.len(),
        "generated module"
    );
    let mut code = lines.join("\n");
    code.push('\n');
    Ok(code)
}

fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("`{name}` is not a valid module name");
    }
    Ok(())
}

/// `name: ty` per graph input; lists are taken `mut` so they can be pushed to.
fn forward_params(model: &ModelIr) -> Result<Vec<String>> {
    let mut params = Vec::with_capacity(model.inputs.len());
    for (name, ty) in &model.inputs {
        let Some(ty) = ty else {
            bail!("input `{name}` of `{}` has no declared type", model.name);
        };
        let rust_ty = value_type_to_rust(*ty)
            .with_context(|| format!("input `{name}` of `{}`", model.name))?;
        if is_list(*ty) {
            params.push(format!("mut {name}: {rust_ty}"));
        } else {
            params.push(format!("{name}: {rust_ty}"));
        }
    }
    Ok(params)
}

/// Return type suffix (` -> T`) and result expression.
fn forward_return(model: &ModelIr) -> Result<(String, Option<String>)> {
    let results = &model.graph.results;
    if results.len() != model.outputs.len() {
        bail!(
            "`{}` yields {} value(s) but declares {} output type(s)",
            model.name,
            results.len(),
            model.outputs.len()
        );
    }

    let mut types = Vec::with_capacity(results.len());
    for (i, ty) in model.outputs.iter().enumerate() {
        let Some(ty) = ty else {
            bail!("output {i} of `{}` has no declared type", model.name);
        };
        types.push(value_type_to_rust(*ty)?.to_string());
    }

    Ok(match results.as_slice() {
        [] => (String::new(), None),
        _ => (format!(" -> {}", tuple(&types)), Some(tuple(results))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::RenderTable;
    use crate::ir::{kinds, Layer, LayerGraph, LayerId, Literal, ScopeId, ValueType};

    fn model() -> ModelIr {
        let mut graph = LayerGraph::new(ScopeId(0), None);
        graph.params = vec!["x0".to_string()];

        let mut scale = Layer::new(LayerId(0), kinds::PARAM);
        scale.attrs.insert("path".to_string(), Literal::Str("scale".into()));
        scale.attrs.insert("value".to_string(), Literal::Float(2.0));
        scale.outputs = vec!["x1".to_string()];
        graph.append(scale);

        let mut mul = Layer::new(LayerId(1), kinds::MUL);
        mul.inputs.insert("x".to_string(), "x0".to_string());
        mul.inputs.insert("y".to_string(), "x1".to_string());
        mul.outputs = vec!["x2".to_string()];
        graph.append(mul);
        graph.results = vec!["x2".to_string(), "x0".to_string()];

        ModelIr {
            name: "Scale".to_string(),
            inputs: vec![("x0".to_string(), Some(ValueType::Float))],
            outputs: vec![Some(ValueType::Float), Some(ValueType::Float)],
            graph,
        }
    }

    #[test]
    fn writes_consts_and_forward() {
        let code = generate_module(
            &CodeGenerator::new(RenderTable::standard()),
            &model(),
            "scale",
        )
        .unwrap();
        let expected = "\
pub mod scale {
    //! Generated by tracelift from `Scale`.
    #![allow(unused_mut, unused_variables, unused_assignments, unused_parens, clippy::all)]

    pub const SCALE: f64 = 2.0f64;

    pub fn forward(x0: f64) -> (f64, f64) {
        let x1 = SCALE;
        let x2 = x0 * x1;
        (x2, x0)
    }
}
";
        assert_eq!(code, expected);
    }

    #[test]
    fn untyped_output_is_rejected() {
        let mut model = model();
        model.outputs[1] = None;
        let err = generate_module(&CodeGenerator::default(), &model, "scale").unwrap_err();
        assert!(err.to_string().contains("output 1"));
    }

    #[test]
    fn module_name_must_be_an_identifier() {
        let err = generate_module(
            &CodeGenerator::new(RenderTable::standard()),
            &model(),
            "3d-model",
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a valid module name"));
    }
}
