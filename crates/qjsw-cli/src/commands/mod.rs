//! CLI command implementations.

pub mod compile;
pub mod eval;
pub mod exec;
pub mod run;

use anyhow::Result;
use qjsw_runtime::{ConsoleLevel, Context, JsObject};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;
use crate::loader::FileModuleLoader;

/// Create a context that prints console output, loads modules from disk and
/// logs leaked handles.
pub fn create_context(config: &Config) -> Result<Context> {
    let context = Context::with_config(config.context_config().console(print_console))?;
    context.set_leak_listener(|handle: &JsObject, formatted: &str| {
        match handle.stack_trace() {
            Some(trace) => warn!(target: "qjsw::leak", "leaked {formatted}, acquired at\n{trace}"),
            None => warn!(target: "qjsw::leak", "leaked {formatted}"),
        }
    })?;

    let root = match &config.modules.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    context.set_module_loader(FileModuleLoader::new(root))?;
    Ok(context)
}

fn print_console(level: ConsoleLevel, text: &str) {
    match level {
        ConsoleLevel::Warn | ConsoleLevel::Error => eprintln!("{text}"),
        _ => println!("{text}"),
    }
}

/// Read a source file; returns its absolute path (the module name) and text.
fn read_source(path: &Path) -> Result<(PathBuf, String)> {
    let absolute = std::fs::canonicalize(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let source = std::fs::read_to_string(&absolute)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok((absolute, source))
}

/// `.mjs` files are modules unless told otherwise
fn is_module(path: &Path, forced: bool) -> bool {
    forced || path.extension().is_some_and(|ext| ext == "mjs")
}
