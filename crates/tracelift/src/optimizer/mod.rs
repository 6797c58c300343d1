//! IR fusion passes.
//!
//! A fusion pass matches a declarative topological [`pattern::Pattern`] in a
//! layer graph and atomically replaces every match with one fused layer.
//! Passes live in a [`PassRegistry`] and run once each, in registration
//! order; they are idempotent, so a second run would change nothing.

use crate::ir::LayerGraph;
use anyhow::{Context, Result};

pub mod pattern;
pub mod utils;

// ── Passes ───────────────────────────────────────────────────────────────────
pub mod silu;

/// A named graph rewrite. `run` returns the number of rewritten matches.
#[derive(Debug, Clone, Copy)]
pub struct FusionPass {
    pub name: &'static str,
    pub run: fn(&mut LayerGraph) -> Result<usize>,
}

/// Ordered list of fusion passes.
#[derive(Debug, Clone, Default)]
pub struct PassRegistry {
    passes: Vec<FusionPass>,
}

impl PassRegistry {
    /// An empty registry: running it is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard passes: `silu_fuse`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(FusionPass {
            name: silu::NAME,
            run: silu::fuse,
        });
        registry
    }

    pub fn register(&mut self, pass: FusionPass) {
        self.passes.push(pass);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name).collect()
    }

    /// Apply every pass once, in order. Returns the total number of rewrites.
    pub fn run(&self, graph: &mut LayerGraph) -> Result<usize> {
        let mut total = 0;
        for pass in &self.passes {
            let rewritten =
                (pass.run)(graph).with_context(|| format!("fusion pass `{}` failed", pass.name))?;
            tracing::debug!(pass = pass.name, rewritten, "ran fusion pass");
            total += rewritten;
        }
        Ok(total)
    }
}

// ── PassRegistry integration tests ───────────────────────────────────────────
