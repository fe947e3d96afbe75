//! The engine capability consumed by the host bridge

use std::rc::Rc;

use crate::error::EngineResult;
use crate::value::{ArgValue, CallbackId, EvalMode, MemoryStats, ModuleSource, NativePtr, RawValue};

/// Host entry point for script calls into callbacks.
///
/// Object arguments arrive retained once each. A returned
/// [`ArgValue::Owned`] hands one host retain to the script side; an `Err`
/// is thrown into script as an `Error` with that message.
pub type CallbackDispatcher = dyn Fn(CallbackId, Vec<RawValue>) -> Result<ArgValue, String>;

/// Notified once a script function wrapping a callback has been collected
pub type FinalizeListener = dyn Fn(CallbackId);

/// Resolves and loads modules imported by script code.
///
/// Errors carry the exact message that should reach the host.
pub trait ModuleProvider {
    /// Turn an import specifier into a module name, relative to `base`
    fn normalize(&self, base: &str, name: &str) -> Result<String, String>;

    /// Produce the source or bytecode of a normalized module name
    fn load(&self, name: &str) -> Result<ModuleSource, String>;
}

/// Engine construction options
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Max stack size in bytes, 0 means unlimited
    pub max_stack_size: Option<usize>,
    /// Memory limit in bytes
    pub memory_limit: Option<usize>,
}

/// Opaque script engine: one runtime plus one context.
///
/// All operations take `&self`: script code re-enters the engine through
/// host callbacks while an outer call is still running.
pub trait Engine {
    fn eval(&self, source: &str, file_name: &str, mode: EvalMode) -> EngineResult<RawValue>;

    fn compile(&self, source: &str, file_name: &str, is_module: bool) -> EngineResult<Vec<u8>>;

    fn execute(&self, bytecode: &[u8]) -> EngineResult<RawValue>;

    /// Parse JSON-like text (`{}` and `[]` included)
    fn parse_json(&self, text: &str) -> EngineResult<RawValue>;

    /// The global object, retained once
    fn global_object(&self) -> EngineResult<RawValue>;

    fn get_property(&self, ptr: NativePtr, name: &str) -> EngineResult<RawValue>;

    fn set_property(&self, ptr: NativePtr, name: &str, value: ArgValue) -> EngineResult<()>;

    fn get_index(&self, ptr: NativePtr, index: u32) -> EngineResult<RawValue>;

    fn set_index(&self, ptr: NativePtr, index: u32, value: ArgValue) -> EngineResult<()>;

    fn length(&self, ptr: NativePtr) -> EngineResult<u32>;

    /// Own enumerable string keys, as a script array
    fn own_property_names(&self, ptr: NativePtr) -> EngineResult<RawValue>;

    fn call(
        &self,
        func: NativePtr,
        this: Option<NativePtr>,
        args: Vec<ArgValue>,
    ) -> EngineResult<RawValue>;

    /// `JSON.stringify`; `None` when the value has no JSON form
    fn stringify(&self, ptr: NativePtr) -> EngineResult<Option<String>>;

    /// Script-side `String(value)`
    fn to_string(&self, ptr: NativePtr) -> EngineResult<String>;

    /// Inspection text from the global `format` helper
    fn format(&self, ptr: NativePtr) -> EngineResult<Option<String>>;

    /// Add one host retain
    fn dup(&self, ptr: NativePtr) -> EngineResult<()>;

    /// Drop one host retain; a pointer with no retains is ignored
    fn free(&self, ptr: NativePtr);

    /// Whether the host still retains `ptr`
    fn is_live(&self, ptr: NativePtr) -> bool;

    /// Outstanding host retains on `ptr`
    fn retain_count(&self, ptr: NativePtr) -> u32;

    /// Run pending jobs until the queue is empty
    fn drain_jobs(&self) -> EngineResult<()>;

    fn run_gc(&self);

    fn set_max_stack_size(&self, size: usize);

    fn set_memory_limit(&self, limit: usize);

    fn memory_usage(&self) -> MemoryStats;

    fn set_callback_dispatcher(&self, dispatcher: Rc<CallbackDispatcher>);

    fn set_finalize_listener(&self, listener: Rc<FinalizeListener>);

    fn set_module_provider(&self, provider: Option<Rc<dyn ModuleProvider>>);
}
