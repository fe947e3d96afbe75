//! Script engine capability for qjsw.
//!
//! This crate exposes the engine as an opaque set of operations on native
//! value pointers: evaluate source, compile and execute bytecode, get, set and
//! call through a pointer, parse JSON, drain pending jobs. Object results
//! come back as [`RawValue::Object`] carrying one host retain, which the
//! caller hands back with [`Engine::free`].
//!
//! # Example
//!
//! ```
//! use qjsw_engine::{Engine, EngineOptions, EvalMode, QuickJsEngine, RawValue};
//!
//! let engine = QuickJsEngine::new(&EngineOptions::default()).unwrap();
//! let result = engine.eval("1 + 1", "example.js", EvalMode::Global).unwrap();
//! assert_eq!(result, RawValue::Int(2));
//! ```
//!
//! # Thread Safety
//!
//! [`QuickJsEngine`] is `!Send` and `!Sync`.
//!
//! ```compile_fail
//! use qjsw_engine::{EngineOptions, QuickJsEngine};
//!
//! let engine = QuickJsEngine::new(&EngineOptions::default()).unwrap();
//! std::thread::spawn(move || {
//!     drop(engine); // Error: QuickJsEngine is !Send
//! });
//! ```

mod engine;
mod error;
mod quickjs;
mod value;

pub use engine::{CallbackDispatcher, Engine, EngineOptions, FinalizeListener, ModuleProvider};
pub use error::{EngineError, EngineResult, LimitKind};
pub use quickjs::QuickJsEngine;
pub use value::{
    ArgValue, CallbackId, EvalMode, MemoryStats, ModuleSource, NativePtr, RawValue, ValueKind,
};
