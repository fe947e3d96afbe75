//! Error types for qjsw-runtime
//!
//! Engine failures are folded into the bridge taxonomy: script errors carry
//! the engine's text, usage errors describe host misuse and never reach
//! script code.

use thiserror::Error;

pub use qjsw_engine::{EngineError, EngineResult};

/// Host misuse of a context or handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// Operation attempted off the thread that created the context
    #[error("Must be call same thread in QuickJSContext.create!")]
    WrongThread,

    /// Operation attempted after the context was torn down
    #[error("Can not called this after QuickJSContext was destroyed!")]
    Destroyed,

    /// Handle used after its reference count reached zero
    #[error(
        "The call threw an exception, the reference count of the current object has already reached zero."
    )]
    Released,

    /// A required argument was empty
    #[error("{0}")]
    NullArgument(String),

    /// `parse_json` input that does not describe an object
    #[error(
        "Only parse json with valid format, must be start with '{{', if it contains other case, use parse(String) replace."
    )]
    NotAJsonObject,

    /// Script called a callback id that is no longer registered
    #[error("Callback {0} is not registered")]
    UnknownCallback(String),
}

/// Errors surfaced by bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Exception raised by script code
    #[error("{message}")]
    Script { message: String },

    /// Host misuse
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Module loader missing or returning nothing
    #[error("{0}")]
    ModuleLoad(String),

    /// Stack or memory limit exceeded
    #[error("{0}")]
    ResourceLimit(String),

    /// Host-side value conversion failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing a diagnostic dump failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal/unexpected engine error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// True for errors raised by the engine on behalf of script code
    pub fn is_js_error(&self) -> bool {
        matches!(self, Self::Script { .. } | Self::ResourceLimit(_))
    }

    /// Create a script error
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a null argument usage error
    pub fn null_argument(message: impl Into<String>) -> Self {
        Self::Usage(UsageError::NullArgument(message.into()))
    }
}

impl From<EngineError> for BridgeError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Script { .. } | EngineError::UnhandledRejection(_) => {
                Self::script(e.to_string())
            }
            EngineError::ResourceLimit { .. } => Self::ResourceLimit(e.to_string()),
            EngineError::ModuleLoad(message) => Self::ModuleLoad(message),
            EngineError::InvalidPointer(_) => Self::Usage(UsageError::Released),
            EngineError::Bytecode(_) | EngineError::Internal(_) => Self::Internal(e.to_string()),
        }
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
