//! Intermediate Representation (IR) for trace → Rust conversion.
//!
//! This module defines a scope-nested layer graph that sits between a traced
//! SSA node sequence and generated Rust source code. Fusion passes rewrite it
//! in place; the code generator renders it.

mod types;
pub use types::*;

pub mod builder;
pub use builder::{build_model, AttrBinding, ConversionContext, IrBuilder, TranslationTable};
