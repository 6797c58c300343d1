//! Converts every trace under `data/traces/` into a Rust module in
//! `OUT_DIR/mod.rs`, so the tests can call the generated `forward`s.
//!
//! The module is named after the file stem. Traces whose stem ends in
//! `_unfused` are converted without the fusion passes.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracelift::{convert_str, ConvertOptions};

fn main() -> Result<()> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let traces_dir = manifest_dir.join("data/traces");

    println!("cargo:rerun-if-changed={}", traces_dir.display());

    let mut traces: Vec<PathBuf> = fs::read_dir(&traces_dir)
        .with_context(|| format!("failed to list {}", traces_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    traces.sort();

    let mut modules = String::new();
    for path in &traces {
        println!("cargo:rerun-if-changed={}", path.display());
        modules.push_str(&convert_trace(path)?);
        modules.push('\n');
    }

    fs::write(out_dir.join("mod.rs"), modules).context("failed to write mod.rs")?;
    Ok(())
}

fn convert_trace(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("bad trace file name {}", path.display()))?;
    let trace =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let options = ConvertOptions {
        fuse: !stem.ends_with("_unfused"),
        module_name: Some(stem.to_string()),
    };
    convert_str(&trace, &options).with_context(|| format!("failed to convert {}", path.display()))
}
