//! Exec command - run bytecode produced by `qjsw compile`.

use anyhow::Result;
use clap::Args;
use qjsw_runtime::Context;
use std::path::PathBuf;

use super::create_context;
use crate::config::Config;

#[derive(Args)]
pub struct ExecCommand {
    /// Bytecode file
    pub bytecode: PathBuf,
}

impl ExecCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let context = create_context(config)?;
        self.exec_in(&context)?;
        context.destroy()?;
        Ok(())
    }

    pub fn exec_in(&self, context: &Context) -> Result<()> {
        let bytecode = std::fs::read(&self.bytecode)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", self.bytecode.display(), e))?;
        context.execute(&bytecode)?.release()?;
        Ok(())
    }
}
