//! # IR Builder
//!
//! Translates a `SourceGraph` (a traced SSA node sequence) into a `ModelIr`
//! (a scope-nested layer graph).
//!
//! ## Pipeline overview
//!
//! ```text
//! SourceGraph
//!      │
//!      ├─ SourceIndex::build()  ─► value id → producing node
//!      │
//!      └─ IrBuilder::build()
//!           └── build_scope(top-level nodes)
//!                 └── for each SourceNode:
//!                       TranslationTable::get(kind)
//!                         ├── leaf handlers        (translate)
//!                         ├── constant handlers    (translate)
//!                         ├── GetAttr / SetAttr    (attrs)
//!                         └── Loop / If            (control)
//!                               └── build_block() ─► build_scope(block nodes)
//!                                     (child LayerGraph attached to the owner)
//!           ─► ModelIr ──► optimizer ──► codegen
//! ```
//!
//! ## Architecture
//!
//! | Module        | Responsibility                                             |
//! |---------------|------------------------------------------------------------|
//! | [`context`]   | Per-run state: name counter, scopes, attribute table       |
//! | [`core`]      | `IrBuilder` traversal, name resolution, scope recursion    |
//! | [`table`]     | Source kind → handler registry                             |
//! | `translate`   | Leaf and constant handlers                                 |
//! | `attrs`       | Attribute path resolution, get/set                         |
//! | `state`       | Slots for attribute paths touched from several scopes      |
//! | `control`     | Loop and conditional reconstruction                        |
//!
//! ### Naming
//!
//! Every produced value gets a name from one counter shared by all scopes
//! (`x0`, `x1`, ...; loop induction variables get `_x<N>`), so names are
//! unique for the whole run and nested blocks can refer to outer values by
//! name. A block's free names (referenced, not produced inside, not a block
//! parameter) are registered as `input-<k>` inputs of the owning layer.

pub mod context;
pub mod core;
pub mod table;

mod attrs;
mod control;
mod state;
mod translate;

pub use self::context::{AttrBinding, ConversionContext};
pub use self::core::IrBuilder;
pub use self::table::{TranslateFn, Translated, TranslationTable};

use super::types::ModelIr;
use crate::source::SourceGraph;
use anyhow::Result;

/// Build the layer graph of `graph` with a fresh conversion context.
///
/// This is the main entry point for IR construction.
pub fn build_model(graph: &SourceGraph, table: TranslationTable) -> Result<ModelIr> {
    let mut builder = IrBuilder::new(graph, table)?;
    builder.build()
}
