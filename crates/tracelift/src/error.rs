//! Conversion errors.
//!
//! Every pipeline stage returns `anyhow::Result`; the three failure classes
//! that callers may want to tell apart travel inside it as a [`ConvertError`]
//! and can be recovered with `err.downcast_ref::<ConvertError>()`.

use thiserror::Error;

/// Fatal conversion failures. None of them is retried.
#[derive(Debug, Error, PartialEq)]
pub enum ConvertError {
    /// A node consumes a value that no enclosing scope produced.
    #[error("unresolved reference: {node} consumes `{value}`, which no enclosing scope produces")]
    UnresolvedReference { node: String, value: String },

    /// No translation handler, renderer or static value exists for `kind`.
    #[error("unsupported operation `{kind}` ({context})")]
    UnsupportedOperation { kind: String, context: String },

    /// A fusion pass found an overlapping or inconsistent match.
    #[error("malformed pattern in pass `{pass}`: {reason}")]
    MalformedPattern { pass: String, reason: String },
}

impl ConvertError {
    pub fn unsupported(kind: impl Into<String>, context: impl Into<String>) -> Self {
        ConvertError::UnsupportedOperation {
            kind: kind.into(),
            context: context.into(),
        }
    }

    pub fn malformed(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::MalformedPattern {
            pass: pass.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offender() {
        let err = ConvertError::UnresolvedReference {
            node: "aten::add (node 3)".to_string(),
            value: "%17".to_string(),
        };
        assert!(err.to_string().contains("aten::add (node 3)"));
        assert!(err.to_string().contains("`%17`"));

        let err = ConvertError::unsupported("aten::conv2d", "no translation handler");
        assert_eq!(
            err.to_string(),
            "unsupported operation `aten::conv2d` (no translation handler)"
        );
    }

    #[test]
    fn survives_anyhow_context() {
        let err: anyhow::Error = ConvertError::malformed("silu_fuse", "overlap").into();
        let err = err.context("failed to run fusion passes");
        assert_eq!(
            err.downcast_ref::<ConvertError>(),
            Some(&ConvertError::malformed("silu_fuse", "overlap"))
        );
    }
}
