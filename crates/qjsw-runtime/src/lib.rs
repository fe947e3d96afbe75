//! qjsw-runtime - host bridge for embedded QuickJS.
//!
//! This crate turns the engine's native value pointers into host handles
//! with an explicit, checked reference count, and routes script calls back
//! into host callbacks.
//!
//! # Features
//!
//! - **Checked refcounts**: releasing a handle twice is an error, not a crash
//! - **Leak reports**: handles still referenced at teardown reach a listener
//! - **Callbacks**: generational ids, dropped when the script function is collected
//! - **Modules**: per-context loader serving source text or bytecode
//! - **Promises**: pending jobs run before every entry point returns
//!
//! # Example
//!
//! ```
//! use qjsw_runtime::{Context, JsCallback, JsValue};
//!
//! let context = Context::create().unwrap();
//! let global = context.get_global_object().unwrap();
//! global
//!     .set_property(
//!         "twice",
//!         JsCallback::new("twice", |_, args| {
//!             Ok(JsValue::from(args[0].as_i64().unwrap_or(0) * 2))
//!         }),
//!     )
//!     .unwrap();
//!
//! assert_eq!(context.evaluate("twice(21)").unwrap(), JsValue::Int(42));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Runtime                                      │
//! │   └── Context (owner thread, destroyed flag) │
//! │         ├── ObjectRegistry   (live handles)  │
//! │         ├── CallbackRegistry (slots + gens)  │
//! │         └── ModuleLoader                     │
//! └──────────────────────────────────────────────┘
//!                       ↓
//! ┌──────────────────────────────────────────────┐
//! │ Engine (qjsw-engine)                         │
//! │   NativePtr retains, eval, jobs, modules     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Thread Safety
//!
//! A [`Context`] may be moved or shared across threads, but every operation
//! off its creating thread fails with [`UsageError::WrongThread`]. Handles
//! are `!Send`.

mod callback;
pub mod config;
pub mod console;
mod context;
mod convert;
pub mod error;
mod handle;
pub mod loader;
pub mod numeric;
mod registry;
mod runtime;
mod thread;
mod value;

pub use config::ContextConfig;
pub use console::{ConsoleLevel, ConsoleSink, TracingConsole};
pub use context::Context;
pub use convert::{MapFilter, MapValue};
pub use error::{BridgeError, BridgeResult, UsageError};
pub use handle::{JsArray, JsFunction, JsObject};
pub use loader::{BytecodeModuleLoader, ModuleLoader, SourceModuleLoader};
pub use qjsw_engine::{MemoryStats, NativePtr, ValueKind};
pub use registry::LeakListener;
pub use runtime::Runtime;
pub use value::{JsCallback, JsValue};
