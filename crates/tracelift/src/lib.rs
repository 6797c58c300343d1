//! tracelift — traced computation graph to Rust converter.
//!
//! This crate provides the conversion pipeline that turns a traced, SSA-form
//! model graph (with nested loop and conditional blocks) into a layer graph,
//! optionally fuses operator patterns, and renders the result as a Rust
//! module with a `forward` function.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod optimizer;
pub mod source;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use error::ConvertError;
use codegen::{generate_module, CodeGenerator, RenderTable};
use heck::ToSnakeCase;
use ir::{build_model, ModelIr, TranslationTable};
use optimizer::PassRegistry;
use source::{parse_trace, SourceGraph};

/// Configuration options for conversion
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Run the standard fusion passes
    pub fuse: bool,
    /// Name of the generated module (default: the trace name in snake case)
    pub module_name: Option<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            fuse: true,
            module_name: None,
        }
    }
}

impl ConvertOptions {
    /// The module name used for `graph`.
    pub fn module_name_for(&self, graph: &SourceGraph) -> String {
        self.module_name
            .clone()
            .unwrap_or_else(|| graph.name.to_snake_case())
    }
}

/// Build the layer graph of `graph` and run the fusion passes requested by
/// `options`.
pub fn build(graph: &SourceGraph, options: &ConvertOptions) -> Result<ModelIr> {
    let mut model = build_model(graph, TranslationTable::standard())
        .with_context(|| format!("failed to build layer graph for `{}`", graph.name))?;

    if options.fuse {
        let rewritten = PassRegistry::standard()
            .run(&mut model.graph)
            .context("failed to run fusion passes")?;
        tracing::info!(rewritten, "fused layers");
    }

    model
        .graph
        .verify()
        .context("layer graph failed verification")?;
    Ok(model)
}

/// Convert a traced model to Rust source code.
///
/// This is the main entry point for the conversion pipeline.
///
/// # Example
/// ```no_run
/// use tracelift::{convert_str, ConvertOptions};
///
/// let trace = std::fs::read_to_string("model.json").unwrap();
/// let rust_code = convert_str(&trace, &ConvertOptions::default()).unwrap();
/// std::fs::write("model.rs", rust_code).unwrap();
/// ```
pub fn convert(graph: &SourceGraph, options: &ConvertOptions) -> Result<String> {
    let model = build(graph, options)?;
    let module_name = options.module_name_for(graph);

    let generator = CodeGenerator::new(RenderTable::standard());
    let code = generate_module(&generator, &model, &module_name)
        .context("failed to generate Rust code")?;

    tracing::info!(
        model = %graph.name,
        module = %module_name,
        layers = model.graph.layer_count(),
        "converted"
    );
    Ok(code)
}

/// Parse a JSON trace and convert it.
pub fn convert_str(json: &str, options: &ConvertOptions) -> Result<String> {
    let graph = parse_trace(json)?;
    convert(&graph, options)
}
