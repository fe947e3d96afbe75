//! Run command - execute a script or module file.

use anyhow::Result;
use clap::Args;
use qjsw_runtime::Context;
use std::path::PathBuf;

use super::{create_context, is_module, read_source};
use crate::config::Config;

#[derive(Args)]
pub struct RunCommand {
    /// File to execute
    pub entry: PathBuf,

    /// Evaluate the file as an ES module (implied for .mjs)
    #[arg(long)]
    pub module: bool,
}

impl RunCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let context = create_context(config)?;
        self.run_in(&context)?;
        context.destroy()?;
        Ok(())
    }

    pub fn run_in(&self, context: &Context) -> Result<()> {
        let (path, source) = read_source(&self.entry)?;
        let name = path.to_string_lossy();

        let result = if is_module(&path, self.module) {
            context.evaluate_module(&source, &name)?
        } else {
            context.evaluate_with_name(&source, &name)?
        };
        result.release()?;
        Ok(())
    }
}
