//! Error types for engine operations
//!
//! Script failures keep the text the engine produced (message followed by the
//! stack, one per line) so callers can surface it unchanged.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Which static limit the engine ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    StackOverflow,
    OutOfMemory,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow => f.write_str("stack overflow"),
            Self::OutOfMemory => f.write_str("out of memory"),
        }
    }
}

/// Errors raised by the engine capability
#[derive(Debug, Error)]
pub enum EngineError {
    /// Exception thrown by script code (syntax errors included)
    #[error("{}", join_stack(message, stack))]
    Script {
        message: String,
        stack: Option<String>,
    },

    /// Promise rejections nobody handled before the job queue ran dry
    #[error("UnhandledPromiseRejectionException: {0}")]
    UnhandledRejection(String),

    /// Max stack size or memory limit exceeded
    #[error("{kind}: {message}")]
    ResourceLimit { kind: LimitKind, message: String },

    /// Module resolution or loading failed
    #[error("{0}")]
    ModuleLoad(String),

    /// Pointer is not retained by the host
    #[error("Invalid native pointer: {0:#x}")]
    InvalidPointer(usize),

    /// Bytecode could not be produced or read back
    #[error("Bytecode error: {0}")]
    Bytecode(String),

    /// Internal/unexpected error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_stack(message: &str, stack: &Option<String>) -> String {
    match stack {
        Some(stack) if !stack.is_empty() => format!("{message}\n{stack}"),
        _ => message.to_string(),
    }
}

impl EngineError {
    /// Create a script error, folding limit messages into `ResourceLimit`
    pub fn script(message: impl Into<String>, stack: Option<String>) -> Self {
        let message = message.into();
        match limit_kind(&message) {
            Some(kind) => Self::ResourceLimit {
                kind,
                message: join_stack(&message, &stack),
            },
            None => Self::Script { message, stack },
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the error originated in script code rather than the host
    pub fn is_script_error(&self) -> bool {
        matches!(
            self,
            Self::Script { .. } | Self::UnhandledRejection(_) | Self::ResourceLimit { .. }
        )
    }
}

fn limit_kind(message: &str) -> Option<LimitKind> {
    if message.contains("stack overflow") || message.contains("Maximum call stack size exceeded")
    {
        Some(LimitKind::StackOverflow)
    } else if message.contains("out of memory") {
        Some(LimitKind::OutOfMemory)
    } else {
        None
    }
}

impl From<rquickjs::Error> for EngineError {
    fn from(e: rquickjs::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
