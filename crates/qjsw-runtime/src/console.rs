//! Console output bridge
//!
//! Script `console.log` and friends format their arguments with the engine's
//! `format` helper and hand `(level, text)` to the context's [`ConsoleSink`].
//! The default sink routes each level to the tracing crate.

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    /// Level from the script method name, unknown names log
    pub fn from_name(name: &str) -> Self {
        match name {
            "info" => Self::Info,
            "debug" => Self::Debug,
            "warn" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Log,
        }
    }
}

/// Receives console output of one context
pub trait ConsoleSink {
    fn write(&self, level: ConsoleLevel, message: &str);
}

impl<F> ConsoleSink for F
where
    F: Fn(ConsoleLevel, &str),
{
    fn write(&self, level: ConsoleLevel, message: &str) {
        self(level, message)
    }
}

/// Default sink: one tracing event per console call
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => info!(target: "qjsw", "{}", message),
            ConsoleLevel::Debug => debug!(target: "qjsw", "{}", message),
            ConsoleLevel::Warn => warn!(target: "qjsw", "{}", message),
            ConsoleLevel::Error => error!(target: "qjsw", "{}", message),
        }
    }
}
