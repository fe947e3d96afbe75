//! Configuration types for contexts.

use std::fmt;
use std::rc::Rc;

use qjsw_engine::EngineOptions;

use crate::console::ConsoleSink;

/// File name reported for sources evaluated without one
pub const DEFAULT_FILE_NAME: &str = "unknown.js";

/// Context configuration.
///
/// Controls engine limits and host-side diagnostics.
#[derive(Clone)]
pub struct ContextConfig {
    /// Max stack size in bytes, `Some(0)` disables the check.
    /// Default: engine default (256 KiB)
    pub max_stack_size: Option<usize>,

    /// Memory limit in bytes.
    /// Default: none
    pub memory_limit: Option<usize>,

    /// Record a backtrace on every acquired handle, reported by the leak
    /// sweep. Default: false
    pub capture_stack_traces: bool,

    /// Where `console.*` output goes.
    /// Default: `tracing` under the `qjsw` target
    pub console: Option<Rc<dyn ConsoleSink>>,

    /// File name used by `evaluate` when none is given.
    /// Default: "unknown.js"
    pub default_file_name: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_stack_size: None,
            memory_limit: None,
            capture_stack_traces: false,
            console: None,
            default_file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("max_stack_size", &self.max_stack_size)
            .field("memory_limit", &self.memory_limit)
            .field("capture_stack_traces", &self.capture_stack_traces)
            .field("console", &self.console.is_some())
            .field("default_file_name", &self.default_file_name)
            .finish()
    }
}

impl ContextConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the max stack size in bytes.
    pub fn max_stack_size(mut self, size: usize) -> Self {
        self.max_stack_size = Some(size);
        self
    }

    /// Set the memory limit in bytes.
    pub fn memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Enable or disable backtraces on acquired handles.
    pub fn capture_stack_traces(mut self, enabled: bool) -> Self {
        self.capture_stack_traces = enabled;
        self
    }

    /// Route console output to `sink`.
    pub fn console(mut self, sink: impl ConsoleSink + 'static) -> Self {
        self.console = Some(Rc::new(sink));
        self
    }

    /// Set the default file name for evaluated sources.
    pub fn default_file_name(mut self, name: impl Into<String>) -> Self {
        self.default_file_name = name.into();
        self
    }

    pub(crate) fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_stack_size: self.max_stack_size,
            memory_limit: self.memory_limit,
        }
    }
}
