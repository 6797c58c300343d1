//! Type and literal conversion utilities for generating Rust source text.

use crate::ir::{Literal, ValueType};
use anyhow::{bail, Result};

/// Convert a declared value type to a Rust type string.
pub fn value_type_to_rust(ty: ValueType) -> Result<&'static str> {
    Ok(match ty {
        ValueType::Int => "i64",
        ValueType::Float => "f64",
        ValueType::Bool => "bool",
        ValueType::Str => "&'static str",
        ValueType::IntList => "Vec<i64>",
        ValueType::FloatList => "Vec<f64>",
        ValueType::Module => bail!("module values have no Rust type"),
    })
}

/// Whether values of `ty` are heap lists (passed as `mut` parameters).
pub fn is_list(ty: ValueType) -> bool {
    matches!(ty, ValueType::IntList | ValueType::FloatList)
}

/// Render an `f64` as a Rust expression.
///
/// Examples:
/// - `1.5` → `"1.5f64"`
/// - `NaN` → `"f64::NAN"`
pub fn float_to_rust(v: f64) -> String {
    if v.is_nan() {
        "f64::NAN".to_string()
    } else if v == f64::INFINITY {
        "f64::INFINITY".to_string()
    } else if v == f64::NEG_INFINITY {
        "f64::NEG_INFINITY".to_string()
    } else {
        format!("{v:?}f64")
    }
}

/// Render a literal as a Rust expression.
///
/// `None` becomes `()`; lists become `vec![..]`.
pub fn literal_to_rust(lit: &Literal) -> String {
    match lit {
        Literal::None => "()".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(v) => format!("{v}i64"),
        Literal::Float(v) => float_to_rust(*v),
        Literal::Str(s) => format!("{s:?}"),
        Literal::List(items) => {
            let items: Vec<String> = items.iter().map(literal_to_rust).collect();
            format!("vec![{}]", items.join(", "))
        }
    }
}

/// Convert a static parameter to a `(Rust type, const initializer)` pair.
///
/// Lists become slices (`&[i64]`, `&[f64]`); a list mixing integers and
/// floats is widened to `f64`.
pub fn param_to_rust(lit: &Literal) -> Result<(String, String)> {
    Ok(match lit {
        Literal::Bool(_) => ("bool".to_string(), literal_to_rust(lit)),
        Literal::Int(_) => ("i64".to_string(), literal_to_rust(lit)),
        Literal::Float(_) => ("f64".to_string(), literal_to_rust(lit)),
        Literal::Str(_) => ("&str".to_string(), literal_to_rust(lit)),
        Literal::List(items) => {
            if items.iter().all(|item| matches!(item, Literal::Int(_))) && !items.is_empty() {
                let items: Vec<String> = items.iter().map(literal_to_rust).collect();
                ("&[i64]".to_string(), format!("&[{}]", items.join(", ")))
            } else {
                let mut floats = Vec::with_capacity(items.len());
                for item in items {
                    let Some(v) = item.as_f64() else {
                        bail!("parameter list element {item:?} is not a number");
                    };
                    floats.push(float_to_rust(v));
                }
                ("&[f64]".to_string(), format!("&[{}]", floats.join(", ")))
            }
        }
        Literal::None => bail!("a `None` parameter has no Rust type"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(literal_to_rust(&Literal::Int(-3)), "-3i64");
        assert_eq!(literal_to_rust(&Literal::Float(1.0)), "1.0f64");
        assert_eq!(literal_to_rust(&Literal::Float(f64::NAN)), "f64::NAN");
        assert_eq!(
            literal_to_rust(&Literal::Float(f64::NEG_INFINITY)),
            "f64::NEG_INFINITY"
        );
        assert_eq!(literal_to_rust(&Literal::Str("a\"b".into())), r#""a\"b""#);
        assert_eq!(literal_to_rust(&Literal::None), "()");
        assert_eq!(
            literal_to_rust(&Literal::List(vec![Literal::Int(1), Literal::Bool(true)])),
            "vec![1i64, true]"
        );
    }

    #[test]
    fn params() {
        assert_eq!(
            param_to_rust(&Literal::Float(0.5)).unwrap(),
            ("f64".to_string(), "0.5f64".to_string())
        );
        assert_eq!(
            param_to_rust(&Literal::List(vec![Literal::Int(1), Literal::Int(2)])).unwrap(),
            ("&[i64]".to_string(), "&[1i64, 2i64]".to_string())
        );
        assert_eq!(
            param_to_rust(&Literal::List(vec![Literal::Int(1), Literal::Float(2.5)])).unwrap(),
            ("&[f64]".to_string(), "&[1.0f64, 2.5f64]".to_string())
        );
        assert!(param_to_rust(&Literal::None).is_err());
    }

    #[test]
    fn value_types() {
        assert_eq!(value_type_to_rust(ValueType::IntList).unwrap(), "Vec<i64>");
        assert!(value_type_to_rust(ValueType::Module).is_err());
    }
}
