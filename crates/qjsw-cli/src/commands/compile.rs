//! Compile command - turn a script or module into bytecode.

use anyhow::Result;
use clap::Args;
use qjsw_runtime::Context;
use std::path::PathBuf;
use tracing::info;

use super::{create_context, is_module, read_source};
use crate::config::Config;

#[derive(Args)]
pub struct CompileCommand {
    /// File to compile
    pub entry: PathBuf,

    /// Output file (default: the entry with a .qjsc extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Compile the file as an ES module (implied for .mjs)
    #[arg(long)]
    pub module: bool,
}

impl CompileCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let context = create_context(config)?;
        let (output, len) = self.compile_in(&context)?;
        info!(output = %output.display(), bytes = len, "compiled");
        context.destroy()?;
        Ok(())
    }

    /// Compile and write the bytecode; returns where it went and its size
    pub fn compile_in(&self, context: &Context) -> Result<(PathBuf, usize)> {
        let (path, source) = read_source(&self.entry)?;
        let name = path.to_string_lossy();

        let bytecode = if is_module(&path, self.module) {
            context.compile_module(&source, &name)?
        } else {
            context.compile(&source, &name)?
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.entry.with_extension("qjsc"));
        std::fs::write(&output, &bytecode)
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", output.display(), e))?;
        Ok((output, bytecode.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("app.js");
        std::fs::write(&entry, "var x = 1;").unwrap();

        let context = Context::create().unwrap();
        let (output, len) = CompileCommand {
            entry,
            output: None,
            module: false,
        }
        .compile_in(&context)
        .unwrap();

        assert_eq!(output, dir.path().join("app.qjsc"));
        assert!(len > 0);
        assert_eq!(std::fs::read(&output).unwrap().len(), len);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("bad.js");
        std::fs::write(&entry, "var = ;").unwrap();

        let context = Context::create().unwrap();
        let result = CompileCommand {
            entry,
            output: None,
            module: false,
        }
        .compile_in(&context);
        assert!(result.is_err());
        assert!(!dir.path().join("bad.qjsc").exists());
    }
}
