//! Script contexts
//!
//! A [`Context`] owns one engine instance together with the registries that
//! track what the host holds inside it. All operations must come from the
//! thread that created the context and fail once it has been destroyed.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use qjsw_engine::{
    ArgValue, CallbackId, Engine, EvalMode, MemoryStats, QuickJsEngine, RawValue, ValueKind,
};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::callback::CallbackRegistry;
use crate::config::ContextConfig;
use crate::console::{ConsoleLevel, ConsoleSink, TracingConsole};
use crate::error::{BridgeError, BridgeResult, UsageError};
use crate::handle::{HandleCore, JsArray, JsFunction, JsObject};
use crate::loader::{LoaderBridge, ModuleLoader};
use crate::numeric::{self, Number};
use crate::registry::{LeakListener, ObjectRegistry};
use crate::thread::ThreadGuard;
use crate::value::{JsCallback, JsValue};

/// Context state shared by the owning [`Context`], its handles and the
/// engine hooks
pub(crate) struct ContextShared {
    guard: ThreadGuard,
    weak_self: Weak<ContextShared>,
    engine: RefCell<Option<Rc<dyn Engine>>>,
    objects: ObjectRegistry,
    callbacks: CallbackRegistry,
    module_loader: RefCell<Option<Rc<dyn ModuleLoader>>>,
    leak_listener: RefCell<Option<Rc<dyn LeakListener>>>,
    console: RefCell<Rc<dyn ConsoleSink>>,
    global: RefCell<Option<Rc<HandleCore>>>,
    destroyed: Arc<AtomicBool>,
    capture_stack_traces: Cell<bool>,
    default_file_name: String,
}

impl ContextShared {
    fn new(config: ContextConfig) -> BridgeResult<Rc<Self>> {
        let engine: Rc<dyn Engine> = Rc::new(QuickJsEngine::new(&config.engine_options())?);
        let console = config
            .console
            .clone()
            .unwrap_or_else(|| Rc::new(TracingConsole));

        let shared = Rc::new_cyclic(|weak_self| Self {
            guard: ThreadGuard::current(),
            weak_self: weak_self.clone(),
            engine: RefCell::new(Some(Rc::clone(&engine))),
            objects: ObjectRegistry::default(),
            callbacks: CallbackRegistry::default(),
            module_loader: RefCell::new(None),
            leak_listener: RefCell::new(None),
            console: RefCell::new(console),
            global: RefCell::new(None),
            destroyed: Arc::new(AtomicBool::new(false)),
            capture_stack_traces: Cell::new(config.capture_stack_traces),
            default_file_name: config.default_file_name,
        });

        let weak = Rc::downgrade(&shared);
        engine.set_callback_dispatcher(Rc::new({
            let weak = weak.clone();
            move |id, args| match weak.upgrade() {
                Some(shared) => shared.dispatch(id, args),
                None => Err(UsageError::Destroyed.to_string()),
            }
        }));
        engine.set_finalize_listener(Rc::new({
            let weak = weak.clone();
            move |id| {
                if let Some(shared) = weak.upgrade()
                    && shared.callbacks.remove(id)
                {
                    trace!(callback = %id, "callback finalized");
                }
            }
        }));
        engine.set_module_provider(Some(Rc::new(LoaderBridge { context: weak })));

        let RawValue::Object { ptr, kind, .. } = engine.global_object()? else {
            return Err(BridgeError::Internal("global object is not an object".into()));
        };
        *shared.global.borrow_mut() = Some(Rc::new(HandleCore {
            id: shared.objects.next_id(),
            context: Rc::downgrade(&shared),
            ptr,
            kind,
            this: None,
            refcount: Cell::new(1),
            global: true,
            stack_trace: None,
        }));
        shared.install_console()?;

        debug!(
            max_stack_size = ?config.max_stack_size,
            memory_limit = ?config.memory_limit,
            "context created"
        );
        Ok(shared)
    }

    /// Route script `console.*` output to the context's sink
    fn install_console(&self) -> BridgeResult<()> {
        let global = self.global_object()?;
        let Some(console) = global.get_object("console")? else {
            return Ok(());
        };
        let stdout = JsCallback::new("stdout", |context: &Context, args: &[JsValue]| {
            let level = args
                .first()
                .and_then(JsValue::as_str)
                .map_or(ConsoleLevel::Log, ConsoleLevel::from_name);
            let text = args.get(1).and_then(JsValue::as_str).unwrap_or_default();
            context.write_console(level, text)?;
            Ok(JsValue::Undefined)
        });
        let result = console.set_property("stdout", stdout);
        console.release()?;
        result
    }

    /// Engine of a running context, checked against the owner thread
    pub(crate) fn check(&self) -> BridgeResult<Rc<dyn Engine>> {
        self.guard.check()?;
        if self.destroyed.load(Ordering::Acquire) {
            return Err(UsageError::Destroyed.into());
        }
        self.engine
            .borrow()
            .clone()
            .ok_or_else(|| UsageError::Destroyed.into())
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn module_loader(&self) -> Option<Rc<dyn ModuleLoader>> {
        self.module_loader.borrow().clone()
    }

    fn global_object(&self) -> BridgeResult<JsObject> {
        self.global
            .borrow()
            .clone()
            .map(JsObject::from_core)
            .ok_or_else(|| UsageError::Destroyed.into())
    }

    // ---- refcount bridge ----------------------------------------------

    /// Wrap an engine result; object values become registered handles with
    /// a count of one
    pub(crate) fn acquire(&self, raw: RawValue) -> JsValue {
        match raw {
            RawValue::Undefined => JsValue::Undefined,
            RawValue::Null => JsValue::Null,
            RawValue::Bool(b) => JsValue::Bool(b),
            RawValue::Int(i) => JsValue::Int(i),
            RawValue::Float(f) => match numeric::classify_double(f) {
                Number::Long(l) => JsValue::Long(l),
                Number::Double(d) => JsValue::Double(d),
            },
            RawValue::BigInt(l) => JsValue::Long(l),
            RawValue::String(s) => JsValue::String(s),
            RawValue::Bytes(b) => JsValue::Bytes(b),
            RawValue::Object { ptr, kind, this } => {
                let core = Rc::new(HandleCore {
                    id: self.objects.next_id(),
                    context: self.weak_self.clone(),
                    ptr,
                    kind,
                    this,
                    refcount: Cell::new(1),
                    global: false,
                    stack_trace: self
                        .capture_stack_traces
                        .get()
                        .then(Backtrace::force_capture),
                });
                self.objects.register(Rc::clone(&core));
                trace!(?ptr, ?kind, "acquire");

                let object = JsObject::from_core(core);
                match kind {
                    ValueKind::Object => JsValue::Object(object),
                    ValueKind::Array => JsValue::Array(JsArray(object)),
                    ValueKind::Function => JsValue::Function(JsFunction(object)),
                }
            }
        }
    }

    /// Host value to engine argument; callbacks get a fresh registry entry
    pub(crate) fn to_arg(&self, value: &JsValue) -> BridgeResult<ArgValue> {
        Ok(match value {
            JsValue::Undefined => ArgValue::Undefined,
            JsValue::Null => ArgValue::Null,
            JsValue::Bool(b) => ArgValue::Bool(*b),
            JsValue::Int(i) => ArgValue::Int(*i),
            JsValue::Long(l) => numeric::long_to_arg(*l),
            JsValue::Double(d) => ArgValue::Float(*d),
            JsValue::String(s) => ArgValue::String(s.clone()),
            JsValue::Bytes(b) => ArgValue::Bytes(b.clone()),
            JsValue::Object(o) => ArgValue::Object(self.own_handle(o)?.ptr),
            JsValue::Array(a) => ArgValue::Object(self.own_handle(a)?.ptr),
            JsValue::Function(f) => ArgValue::Object(self.own_handle(f)?.ptr),
            JsValue::Callback(callback) => {
                let id = self.callbacks.register(callback.clone());
                trace!(callback = %id, name = callback.name(), "callback registered");
                ArgValue::Callback(id, callback.name().to_string())
            }
        })
    }

    /// Undo the registry side of `to_arg` when the engine rejected it
    pub(crate) fn forget_arg(&self, arg: &ArgValue) {
        if let ArgValue::Callback(id, _) = arg {
            self.callbacks.remove(*id);
        }
    }

    /// Core of a live handle created by this context
    fn own_handle<'a>(&self, object: &'a JsObject) -> BridgeResult<&'a HandleCore> {
        let core = &*object.core;
        if !Weak::ptr_eq(&core.context, &self.weak_self) {
            return Err(BridgeError::Internal(
                "handle belongs to another context".into(),
            ));
        }
        if !core.global && core.refcount.get() == 0 {
            return Err(UsageError::Released.into());
        }
        Ok(core)
    }

    /// Drop one host reference and its native retain
    pub(crate) fn release_core(&self, engine: &dyn Engine, core: &HandleCore) {
        let count = core.refcount.get();
        if core.global || count == 0 {
            return;
        }
        debug_assert!(engine.is_live(core.ptr), "host refcount without a native retain");
        engine.free(core.ptr);
        core.refcount.set(count - 1);
        trace!(ptr = ?core.ptr, refcount = count - 1, "release");
        if count == 1 {
            self.retire(engine, core);
        }
    }

    /// Hand one host reference to the engine without freeing it natively.
    ///
    /// Only the callback return path uses this: the returned object's retain
    /// becomes the script's reference.
    fn decrement_ref_count(&self, engine: &dyn Engine, object: &JsObject) -> BridgeResult<ArgValue> {
        let core = self.own_handle(object)?;
        if core.global {
            return Ok(ArgValue::Object(core.ptr));
        }
        let count = core.refcount.get() - 1;
        core.refcount.set(count);
        trace!(ptr = ?core.ptr, refcount = count, "handed to script");
        if count == 0 {
            self.retire(engine, core);
        }
        Ok(ArgValue::Owned(core.ptr))
    }

    fn retire(&self, engine: &dyn Engine, core: &HandleCore) {
        if let Some(this) = core.this {
            engine.free(this);
        }
        self.objects.deregister(core.id);
    }

    /// Drain pending jobs after an entry point, then wrap its result.
    /// A failing job releases the result.
    pub(crate) fn finish(&self, engine: &dyn Engine, raw: RawValue) -> BridgeResult<JsValue> {
        if let Err(e) = engine.drain_jobs() {
            free_raw(engine, &raw);
            return Err(e.into());
        }
        Ok(self.acquire(raw))
    }

    pub(crate) fn new_object(&self) -> BridgeResult<JsObject> {
        let engine = self.check()?;
        match self.acquire(engine.parse_json("{}")?) {
            JsValue::Object(object) => Ok(object),
            other => {
                other.release()?;
                Err(BridgeError::Internal("'{}' did not parse to an object".into()))
            }
        }
    }

    // ---- callbacks ----------------------------------------------------

    /// Script called into callback `id`
    fn dispatch(self: &Rc<Self>, id: CallbackId, args: Vec<RawValue>) -> Result<ArgValue, String> {
        let engine = self.check().map_err(|e| e.to_string())?;
        let Some(callback) = self.callbacks.get(id) else {
            args.iter().for_each(|raw| free_raw(engine.as_ref(), raw));
            return Err(UsageError::UnknownCallback(id.to_string()).to_string());
        };

        let args: Vec<JsValue> = args.into_iter().map(|raw| self.acquire(raw)).collect();
        let context = Context::borrowed(Rc::clone(self));
        let result = callback.invoke(&context, &args);
        // an argument handed straight back already gave up its reference
        let returned = result
            .as_ref()
            .ok()
            .and_then(JsValue::as_object)
            .map(|object| Rc::clone(&object.core));
        let result = result.and_then(|ret| self.return_to_script(engine.as_ref(), ret));

        for object in args.iter().filter_map(JsValue::as_object) {
            if returned
                .as_ref()
                .is_some_and(|core| Rc::ptr_eq(core, &object.core))
            {
                continue;
            }
            self.release_core(engine.as_ref(), &object.core);
        }
        result.map_err(|e| e.to_string())
    }

    fn return_to_script(&self, engine: &dyn Engine, value: JsValue) -> BridgeResult<ArgValue> {
        match value.as_object() {
            Some(object) => self.decrement_ref_count(engine, object),
            None => self.to_arg(&value),
        }
    }

    // ---- leaks and teardown -------------------------------------------

    /// Report handles that are still referenced; with `force`, free them.
    /// Returns how many were found.
    fn sweep(&self, force: bool) -> usize {
        let Some(engine) = self.engine.borrow().clone() else {
            return 0;
        };
        let listener = self.leak_listener.borrow().clone();

        let mut leaked = 0;
        for core in self.objects.snapshot() {
            if core.global || core.refcount.get() == 0 {
                continue;
            }
            leaked += 1;

            if let Some(listener) = &listener {
                let formatted = describe(engine.as_ref(), &core);
                let handle = JsObject::from_core(Rc::clone(&core));
                let notified = panic::catch_unwind(AssertUnwindSafe(|| {
                    listener.notify_leak_detected(&handle, &formatted)
                }));
                if notified.is_err() {
                    warn!(ptr = ?core.ptr, "leak listener panicked");
                }
            }

            // the listener may have released it
            let remaining = core.refcount.get();
            if force && remaining > 0 {
                for _ in 0..remaining {
                    engine.free(core.ptr);
                }
                core.refcount.set(0);
                self.retire(engine.as_ref(), &core);
            }
        }

        if leaked > 0 {
            warn!(leaked, force, "handles still referenced");
        }
        leaked
    }

    /// Release everything the host still holds and drop the engine
    pub(crate) fn teardown(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        self.sweep(true);

        let engine = self.engine.borrow().clone();
        let global = self.global.borrow_mut().take();
        if let (Some(engine), Some(global)) = (engine, global) {
            engine.free(global.ptr);
            global.refcount.set(0);
        }
        self.callbacks.clear();
        self.destroyed.store(true, Ordering::Release);

        let engine = self.engine.borrow_mut().take();
        drop(engine);
        debug!("context destroyed");
    }
}

/// Inspection text of a handle, falling back to its string conversion
fn describe(engine: &dyn Engine, core: &HandleCore) -> String {
    engine
        .format(core.ptr)
        .ok()
        .flatten()
        .or_else(|| engine.to_string(core.ptr).ok())
        .unwrap_or_default()
}

/// Give back the retains an engine result carries
fn free_raw(engine: &dyn Engine, raw: &RawValue) {
    if let RawValue::Object { ptr, this, .. } = raw {
        engine.free(*ptr);
        if let Some(this) = this {
            engine.free(*this);
        }
    }
}

/// A script context.
///
/// Created with [`Context::create`] or [`Runtime::create_context`](crate::Runtime::create_context);
/// destroyed explicitly with [`destroy`](Context::destroy) or when dropped.
///
/// # Example
///
/// ```
/// use qjsw_runtime::{Context, JsValue};
///
/// let context = Context::create().unwrap();
/// let result = context.evaluate("1 + 2").unwrap();
/// assert_eq!(result, JsValue::Int(3));
/// ```
pub struct Context {
    guard: ThreadGuard,
    destroyed: Arc<AtomicBool>,
    shared: ManuallyDrop<Rc<ContextShared>>,
    owned: bool,
}

// SAFETY: `shared` is only touched after `guard.check()` succeeded, i.e. on
// the creating thread. A context dropped on another thread leaks `shared`
// instead of touching it.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    /// Create a context with default configuration
    pub fn create() -> BridgeResult<Self> {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> BridgeResult<Self> {
        Ok(Self::owned(ContextShared::new(config)?))
    }

    fn owned(shared: Rc<ContextShared>) -> Self {
        Self {
            guard: shared.guard,
            destroyed: Arc::clone(&shared.destroyed),
            shared: ManuallyDrop::new(shared),
            owned: true,
        }
    }

    /// View of a context handed to callbacks; dropping it does not destroy
    pub(crate) fn borrowed(shared: Rc<ContextShared>) -> Self {
        Self {
            guard: shared.guard,
            destroyed: Arc::clone(&shared.destroyed),
            shared: ManuallyDrop::new(shared),
            owned: false,
        }
    }

    pub(crate) fn shared(&self) -> BridgeResult<&Rc<ContextShared>> {
        self.guard.check()?;
        Ok(&self.shared)
    }

    fn enter(&self) -> BridgeResult<(&Rc<ContextShared>, Rc<dyn Engine>)> {
        let shared = self.shared()?;
        let engine = shared.check()?;
        Ok((shared, engine))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Evaluate a script under the default file name
    pub fn evaluate(&self, source: &str) -> BridgeResult<JsValue> {
        let shared = self.shared()?;
        self.eval(source, &shared.default_file_name, EvalMode::Global)
    }

    pub fn evaluate_with_name(&self, source: &str, file_name: &str) -> BridgeResult<JsValue> {
        self.eval(source, file_name, EvalMode::Global)
    }

    /// Evaluate `source` as an ES module named `module_name`
    pub fn evaluate_module(&self, source: &str, module_name: &str) -> BridgeResult<JsValue> {
        self.eval(source, module_name, EvalMode::Module)
    }

    fn eval(&self, source: &str, file_name: &str, mode: EvalMode) -> BridgeResult<JsValue> {
        let (shared, engine) = self.enter()?;
        let raw = engine.eval(source, file_name, mode)?;
        shared.finish(engine.as_ref(), raw)
    }

    /// Compile a script to bytecode
    pub fn compile(&self, source: &str, file_name: &str) -> BridgeResult<Vec<u8>> {
        let (_, engine) = self.enter()?;
        Ok(engine.compile(source, file_name, false)?)
    }

    /// Compile an ES module to bytecode
    pub fn compile_module(&self, source: &str, module_name: &str) -> BridgeResult<Vec<u8>> {
        let (_, engine) = self.enter()?;
        Ok(engine.compile(source, module_name, true)?)
    }

    /// Run bytecode produced by [`compile`](Self::compile) or
    /// [`compile_module`](Self::compile_module)
    pub fn execute(&self, bytecode: &[u8]) -> BridgeResult<JsValue> {
        let (shared, engine) = self.enter()?;
        if bytecode.is_empty() {
            return Err(BridgeError::null_argument("bytecode can not be null"));
        }
        let raw = engine.execute(bytecode)?;
        shared.finish(engine.as_ref(), raw)
    }

    /// Parse JSON-like text (`{}` and `[]` included)
    pub fn parse(&self, text: &str) -> BridgeResult<JsValue> {
        let (shared, engine) = self.enter()?;
        let raw = engine.parse_json(text)?;
        Ok(shared.acquire(raw))
    }

    /// Parse text that must describe a JSON object
    pub fn parse_json(&self, text: &str) -> BridgeResult<JsObject> {
        self.shared()?;
        if !text.starts_with('{') {
            return Err(UsageError::NotAJsonObject.into());
        }
        match self.parse(text)? {
            JsValue::Object(object) => Ok(object),
            other => {
                other.release()?;
                Err(UsageError::NotAJsonObject.into())
            }
        }
    }

    pub fn create_new_js_object(&self) -> BridgeResult<JsObject> {
        let (shared, _) = self.enter()?;
        shared.new_object()
    }

    pub fn create_new_js_array(&self) -> BridgeResult<JsArray> {
        match self.parse("[]")? {
            JsValue::Array(array) => Ok(array),
            other => {
                other.release()?;
                Err(BridgeError::Internal("'[]' did not parse to an array".into()))
            }
        }
    }

    /// Build a script value from any serializable host value
    pub fn to_js_value<T: Serialize + ?Sized>(&self, value: &T) -> BridgeResult<JsValue> {
        let json = serde_json::to_string(value)?;
        self.parse(&json)
    }

    /// The context's global object. It is owned by the context: releasing
    /// it is a no-op and it never shows up in leak reports.
    pub fn get_global_object(&self) -> BridgeResult<JsObject> {
        let (shared, _) = self.enter()?;
        shared.global_object()
    }

    pub fn set_module_loader(&self, loader: impl ModuleLoader + 'static) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        *shared.module_loader.borrow_mut() = Some(Rc::new(loader));
        Ok(())
    }

    pub fn remove_module_loader(&self) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        shared.module_loader.borrow_mut().take();
        Ok(())
    }

    pub fn set_leak_listener(&self, listener: impl LeakListener + 'static) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        *shared.leak_listener.borrow_mut() = Some(Rc::new(listener));
        Ok(())
    }

    pub fn set_console(&self, sink: impl ConsoleSink + 'static) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        *shared.console.borrow_mut() = Rc::new(sink);
        Ok(())
    }

    pub(crate) fn write_console(&self, level: ConsoleLevel, text: &str) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        let sink = shared.console.borrow().clone();
        sink.write(level, text);
        Ok(())
    }

    /// Report handles still referenced to the leak listener. With `force`,
    /// their remaining references are freed as well. Returns how many were
    /// found.
    pub fn sweep_leaks(&self, force: bool) -> BridgeResult<usize> {
        let (shared, _) = self.enter()?;
        Ok(shared.sweep(force))
    }

    /// Handles acquired and not yet fully released
    pub fn live_handle_count(&self) -> BridgeResult<usize> {
        let (shared, _) = self.enter()?;
        Ok(shared.objects.len())
    }

    /// Registered host callbacks
    /// Views of every live handle, oldest first. The views do not retain.
    pub fn object_records(&self) -> BridgeResult<Vec<JsObject>> {
        let (shared, _) = self.enter()?;
        Ok(shared
            .objects
            .snapshot()
            .into_iter()
            .map(JsObject::from_core)
            .collect())
    }

    /// Write one line per live handle with its count and formatted value
    pub fn dump_objects(&self, mut out: impl Write) -> BridgeResult<()> {
        let (shared, engine) = self.enter()?;
        let records = shared.objects.snapshot();
        writeln!(out, "{} live handles", records.len())?;
        for core in records {
            writeln!(
                out,
                "#{} {:?} refcount={}: {}",
                core.id,
                core.kind,
                core.refcount.get(),
                describe(engine.as_ref(), &core)
            )?;
        }
        Ok(())
    }

    pub fn callback_count(&self) -> BridgeResult<usize> {
        let (shared, _) = self.enter()?;
        Ok(shared.callbacks.len())
    }

    /// Collect garbage; callbacks of collected functions are deregistered
    pub fn run_gc(&self) -> BridgeResult<()> {
        let (_, engine) = self.enter()?;
        engine.run_gc();
        Ok(())
    }

    pub fn set_max_stack_size(&self, size: usize) -> BridgeResult<()> {
        let (_, engine) = self.enter()?;
        engine.set_max_stack_size(size);
        Ok(())
    }

    pub fn set_memory_limit(&self, limit: usize) -> BridgeResult<()> {
        let (_, engine) = self.enter()?;
        engine.set_memory_limit(limit);
        Ok(())
    }

    /// Record a backtrace on handles acquired from now on
    pub fn set_enable_stack_trace(&self, enabled: bool) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        shared.capture_stack_traces.set(enabled);
        Ok(())
    }

    pub fn memory_usage(&self) -> BridgeResult<MemoryStats> {
        let (_, engine) = self.enter()?;
        Ok(engine.memory_usage())
    }

    /// Throw `message` as a script exception; always returns the error
    pub fn throw_js_exception(&self, message: &str) -> BridgeResult<()> {
        let literal = serde_json::to_string(message)?;
        self.evaluate(&format!("throw {literal};"))?.release()
    }

    /// Free every handle still held, then the engine. Leak listeners hear
    /// about each of them first.
    pub fn destroy(&self) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        shared.teardown();
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.guard.is_owner() {
            warn!("context dropped off its owner thread, leaking it");
            return;
        }
        if self.owned {
            self.shared.teardown();
        }
        // SAFETY: dropped exactly once, on the owner thread
        unsafe { ManuallyDrop::drop(&mut self.shared) }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("destroyed", &self.is_destroyed())
            .field("owned", &self.owned)
            .finish()
    }
}
