//! State shared by the engine handle and the script functions it creates
//!
//! Host retains live here: one engine reference per distinct object plus a
//! counter of host retains on it. Script functions wrapping host callbacks
//! hold an `Rc` to this state, so it outlives the engine handle until the
//! runtime has collected them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rquickjs::function::{Rest, This};
use rquickjs::{
    ArrayBuffer, BigInt, Coerced, Ctx, Exception, Function, IntoJs, Persistent, Type, Value, qjs,
};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::engine::{CallbackDispatcher, FinalizeListener, ModuleProvider};
use crate::error::{EngineError, EngineResult};
use crate::value::{ArgValue, CallbackId, NativePtr, RawValue, ValueKind};

struct Retained {
    value: Persistent<Value<'static>>,
    count: u32,
}

pub(crate) struct EngineShared {
    /// `Ctx` of the innermost engine frame on this thread
    active: Cell<Option<*const ()>>,
    retained: RefCell<FxHashMap<NativePtr, Retained>>,
    dispatcher: RefCell<Option<Rc<CallbackDispatcher>>>,
    finalize_listener: RefCell<Option<Rc<FinalizeListener>>>,
    finalized: RefCell<Vec<CallbackId>>,
    pub(crate) provider: RefCell<Option<Rc<dyn ModuleProvider>>>,
    module_error: RefCell<Option<String>>,
    rejections: RefCell<Vec<(NativePtr, Persistent<Value<'static>>)>>,
}

/// Publishes a `Ctx` as the active one for the lifetime of the guard.
pub(crate) struct ActiveCtx<'a> {
    shared: &'a EngineShared,
    previous: Option<*const ()>,
}

impl<'a> ActiveCtx<'a> {
    pub(crate) fn enter(shared: &'a EngineShared, ctx: &Ctx<'_>) -> Self {
        let previous = shared
            .active
            .replace(Some(ctx as *const Ctx<'_> as *const ()));
        Self { shared, previous }
    }
}

impl Drop for ActiveCtx<'_> {
    fn drop(&mut self) {
        self.shared.active.set(self.previous);
    }
}

/// Identity of an object value: the address of its engine allocation.
pub(crate) fn identity(value: &Value<'_>) -> NativePtr {
    // SAFETY: only called on object values, whose payload is a heap pointer
    let ptr = unsafe { qjs::JS_VALUE_GET_PTR(value.as_raw()) };
    NativePtr(ptr as usize)
}

impl EngineShared {
    pub(crate) fn new() -> Self {
        Self {
            active: Cell::new(None),
            retained: RefCell::new(FxHashMap::default()),
            dispatcher: RefCell::new(None),
            finalize_listener: RefCell::new(None),
            finalized: RefCell::new(Vec::new()),
            provider: RefCell::new(None),
            module_error: RefCell::new(None),
            rejections: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn active(&self) -> Option<*const ()> {
        self.active.get()
    }

    pub(crate) fn set_dispatcher(&self, dispatcher: Rc<CallbackDispatcher>) {
        *self.dispatcher.borrow_mut() = Some(dispatcher);
    }

    pub(crate) fn set_finalize_listener(&self, listener: Rc<FinalizeListener>) {
        *self.finalize_listener.borrow_mut() = Some(listener);
    }

    // ---- host retains -------------------------------------------------

    /// Record one host retain on an object value.
    fn retain<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> NativePtr {
        let ptr = identity(&value);
        let duplicate = {
            let mut retained = self.retained.borrow_mut();
            match retained.get_mut(&ptr) {
                Some(entry) => {
                    entry.count += 1;
                    Some(value)
                }
                None => {
                    retained.insert(
                        ptr,
                        Retained {
                            value: Persistent::save(ctx, value),
                            count: 1,
                        },
                    );
                    None
                }
            }
        };
        // the engine already holds one reference for this object
        drop(duplicate);
        trace!(ptr = ?ptr, "retain");
        ptr
    }

    /// A fresh engine reference to a retained object; host retains unchanged.
    pub(crate) fn restore<'js>(&self, ctx: &Ctx<'js>, ptr: NativePtr) -> EngineResult<Value<'js>> {
        let persistent = self
            .retained
            .borrow()
            .get(&ptr)
            .map(|entry| entry.value.clone())
            .ok_or(EngineError::InvalidPointer(ptr.0))?;
        Ok(persistent.restore(ctx)?)
    }

    /// Move one host retain into an engine reference.
    fn take<'js>(&self, ctx: &Ctx<'js>, ptr: NativePtr) -> EngineResult<Value<'js>> {
        let persistent = {
            let mut retained = self.retained.borrow_mut();
            let entry = retained
                .get_mut(&ptr)
                .ok_or(EngineError::InvalidPointer(ptr.0))?;
            if entry.count > 1 {
                entry.count -= 1;
                entry.value.clone()
            } else {
                retained
                    .remove(&ptr)
                    .map(|entry| entry.value)
                    .ok_or(EngineError::InvalidPointer(ptr.0))?
            }
        };
        trace!(ptr = ?ptr, "transfer");
        Ok(persistent.restore(ctx)?)
    }

    pub(crate) fn dup(&self, ptr: NativePtr) -> EngineResult<()> {
        let mut retained = self.retained.borrow_mut();
        let entry = retained
            .get_mut(&ptr)
            .ok_or(EngineError::InvalidPointer(ptr.0))?;
        entry.count += 1;
        trace!(ptr = ?ptr, count = entry.count, "dup");
        Ok(())
    }

    pub(crate) fn free(&self, ptr: NativePtr) {
        let released = {
            let mut retained = self.retained.borrow_mut();
            match retained.get_mut(&ptr) {
                Some(entry) if entry.count > 1 => {
                    entry.count -= 1;
                    None
                }
                Some(_) => retained.remove(&ptr),
                None => None,
            }
        };
        // finalizers may run here, outside the borrow
        if released.is_some() {
            trace!(ptr = ?ptr, "free");
        }
        drop(released);
    }

    pub(crate) fn retain_count(&self, ptr: NativePtr) -> u32 {
        self.retained
            .borrow()
            .get(&ptr)
            .map_or(0, |entry| entry.count)
    }

    /// Drop every engine reference held for the host.
    pub(crate) fn clear(&self) {
        let retained = std::mem::take(&mut *self.retained.borrow_mut());
        let rejections = std::mem::take(&mut *self.rejections.borrow_mut());
        if !retained.is_empty() {
            trace!(count = retained.len(), "dropping host retains");
        }
        drop(retained);
        drop(rejections);
    }

    pub(crate) fn release_raw(&self, value: &RawValue) {
        if let RawValue::Object { ptr, this, .. } = value {
            self.free(*ptr);
            if let Some(this) = this {
                self.free(*this);
            }
        }
    }

    // ---- conversions --------------------------------------------------

    pub(crate) fn to_raw<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: Value<'js>,
        this: Option<&Value<'js>>,
    ) -> EngineResult<RawValue> {
        if value.is_exception() {
            return Err(self.take_exception(ctx));
        }
        let raw = match value.type_of() {
            Type::Uninitialized | Type::Undefined => RawValue::Undefined,
            Type::Null => RawValue::Null,
            Type::Bool => RawValue::Bool(value.as_bool().unwrap_or_default()),
            Type::Int => RawValue::Int(value.as_int().unwrap_or_default()),
            Type::Float => RawValue::Float(value.as_float().unwrap_or_default()),
            Type::String => RawValue::String(value.get::<String>()?),
            Type::BigInt => match value.as_big_int() {
                Some(big) => RawValue::BigInt(big.clone().to_i64()?),
                None => RawValue::Undefined,
            },
            Type::Symbol => RawValue::String(symbol_description(&value)),
            _ if value.is_object() => self.object_to_raw(ctx, value, this),
            _ => RawValue::Null,
        };
        Ok(raw)
    }

    fn object_to_raw<'js>(
        &self,
        ctx: &Ctx<'js>,
        value: Value<'js>,
        this: Option<&Value<'js>>,
    ) -> RawValue {
        // SAFETY: a class check on a live value; nothing is thrown
        if unsafe { qjs::JS_IsArrayBuffer(value.as_raw()) } {
            let buffer = value
                .as_object()
                .and_then(|object| ArrayBuffer::from_object(object.clone()));
            match buffer.as_ref().and_then(|buffer| buffer.as_bytes()) {
                Some(bytes) => return RawValue::Bytes(bytes.to_vec()),
                // detached: the engine left a TypeError behind
                None => drop(ctx.catch()),
            }
        }

        let kind = if value.is_function() {
            ValueKind::Function
        } else if value.is_array() {
            ValueKind::Array
        } else {
            ValueKind::Object
        };
        let this = match (kind, this) {
            (ValueKind::Function, Some(this)) if this.is_object() => {
                Some(self.retain(ctx, this.clone()))
            }
            _ => None,
        };
        let ptr = self.retain(ctx, value);
        RawValue::Object { ptr, kind, this }
    }

    pub(crate) fn to_js<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        value: ArgValue,
    ) -> EngineResult<Value<'js>> {
        let value = match value {
            ArgValue::Undefined => Value::new_undefined(ctx.clone()),
            ArgValue::Null => Value::new_null(ctx.clone()),
            ArgValue::Bool(b) => Value::new_bool(ctx.clone(), b),
            ArgValue::Int(i) => Value::new_int(ctx.clone(), i),
            ArgValue::Float(f) => Value::new_float(ctx.clone(), f),
            ArgValue::BigInt(i) => BigInt::from_i64(ctx.clone(), i)?.into_value(),
            ArgValue::String(s) => rquickjs::String::from_str(ctx.clone(), &s)?.into_value(),
            ArgValue::Bytes(bytes) => ArrayBuffer::new(ctx.clone(), bytes)?.into_js(ctx)?,
            ArgValue::Object(ptr) => self.restore(ctx, ptr)?,
            ArgValue::Owned(ptr) => self.take(ctx, ptr)?,
            ArgValue::Callback(id, name) => self.callback_function(ctx, id, &name)?.into_value(),
        };
        Ok(value)
    }

    // ---- host callbacks -----------------------------------------------

    fn callback_function<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        id: CallbackId,
        name: &str,
    ) -> EngineResult<Function<'js>> {
        let binding = CallbackBinding {
            id,
            shared: Rc::clone(self),
        };
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, _this: This<Value<'js>>, args: Rest<Value<'js>>| {
                binding.invoke(&ctx, args.0)
            },
        )?;
        trace!(callback = %id, name, "callback function created");
        Ok(function.with_name(name)?)
    }

    /// Hand finalized callback ids to the listener.
    pub(crate) fn flush_finalized(&self) {
        let ids = std::mem::take(&mut *self.finalized.borrow_mut());
        if ids.is_empty() {
            return;
        }
        let listener = self.finalize_listener.borrow().clone();
        if let Some(listener) = listener {
            for id in ids {
                listener(id);
            }
        }
    }

    // ---- errors and jobs ----------------------------------------------

    /// Lift a safe-API result, turning a pending exception into an error.
    pub(crate) fn lift<T>(&self, ctx: &Ctx<'_>, result: rquickjs::Result<T>) -> EngineResult<T> {
        result.map_err(|e| match e {
            rquickjs::Error::Exception => self.take_exception(ctx),
            other => other.into(),
        })
    }

    /// Convert the result of a raw engine call.
    pub(crate) fn finish<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> EngineResult<RawValue> {
        if value.is_exception() {
            return Err(self.take_exception(ctx));
        }
        self.to_raw(ctx, value, None)
    }

    pub(crate) fn take_exception(&self, ctx: &Ctx<'_>) -> EngineError {
        let error = ctx.catch();
        let (message, stack) = error_parts(ctx, &error);
        if let Some(message) = self.module_error.borrow_mut().take() {
            return EngineError::ModuleLoad(message);
        }
        EngineError::script(message, stack)
    }

    pub(crate) fn reset_module_error(&self) {
        self.module_error.borrow_mut().take();
    }

    pub(crate) fn record_module_error(&self, message: &str) {
        let mut slot = self.module_error.borrow_mut();
        if slot.is_none() {
            *slot = Some(message.to_string());
        }
    }

    pub(crate) fn track_rejection<'js>(
        &self,
        ctx: &Ctx<'js>,
        promise: Value<'js>,
        reason: Value<'js>,
        is_handled: bool,
    ) {
        let key = identity(&promise);
        let mut rejections = self.rejections.borrow_mut();
        if is_handled {
            rejections.retain(|(promise, _)| *promise != key);
        } else {
            rejections.push((key, Persistent::save(ctx, reason)));
        }
    }

    /// Run every pending job, then report unhandled rejections.
    pub(crate) fn drain_jobs(&self, ctx: &Ctx<'_>) -> EngineResult<()> {
        // SAFETY: the context pointer is valid while `ctx` is borrowed
        let rt = unsafe { qjs::JS_GetRuntime(ctx.as_raw().as_ptr()) };
        loop {
            let mut job_ctx = std::ptr::null_mut();
            // SAFETY: `rt` owns `ctx`, which this thread is currently using
            let status = unsafe { qjs::JS_ExecutePendingJob(rt, &mut job_ctx) };
            if status == 0 {
                break;
            }
            if status < 0 {
                return Err(self.take_exception(ctx));
            }
        }
        self.flush_finalized();
        self.take_rejections(ctx)
    }

    fn take_rejections(&self, ctx: &Ctx<'_>) -> EngineResult<()> {
        let pending = std::mem::take(&mut *self.rejections.borrow_mut());
        if pending.is_empty() {
            return Ok(());
        }
        // a failed import rejects the module's promise
        if let Some(message) = self.module_error.borrow_mut().take() {
            return Err(EngineError::ModuleLoad(message));
        }
        let mut reasons = Vec::with_capacity(pending.len());
        for (_, reason) in pending {
            let reason = reason.restore(ctx)?;
            let (message, stack) = error_parts(ctx, &reason);
            reasons.push(match stack {
                Some(stack) => format!("{message}\n{stack}"),
                None => message,
            });
        }
        Err(EngineError::UnhandledRejection(reasons.join("\n")))
    }
}

/// Message and stack of a thrown value, after giving `onError` a look.
fn error_parts<'js>(ctx: &Ctx<'js>, error: &Value<'js>) -> (String, Option<String>) {
    let exception = error
        .as_object()
        .and_then(|object| Exception::from_object(object.clone()));
    match exception {
        Some(exception) => {
            notify_on_error(ctx, error);
            let message = exception.message().unwrap_or_default();
            let stack = exception.stack().filter(|stack| !stack.is_empty());
            (message, stack)
        }
        None => (coerce_string(error), None),
    }
}

fn notify_on_error<'js>(ctx: &Ctx<'js>, error: &Value<'js>) {
    let globals = ctx.globals();
    let handler = ["onError", "onerror"].into_iter().find_map(|name| {
        globals
            .get::<_, Value>(name)
            .ok()
            .and_then(|value| value.into_function())
    });
    let Some(handler) = handler else {
        return;
    };
    if handler
        .call::<_, Value>((This(globals.clone()), error.clone()))
        .is_err()
    {
        let thrown = ctx.catch();
        warn!(error = %coerce_string(&thrown), "onError handler threw");
    }
}

/// `Symbol(description)`, the way `String(symbol)` prints it
fn symbol_description(value: &Value<'_>) -> String {
    let description = value
        .as_symbol()
        .and_then(|symbol| symbol.description().ok())
        .and_then(|description| description.as_string().and_then(|s| s.to_string().ok()))
        .unwrap_or_default();
    format!("Symbol({description})")
}

pub(crate) fn coerce_string(value: &Value<'_>) -> String {
    value
        .get::<Coerced<String>>()
        .map(|coerced| coerced.0)
        .unwrap_or_else(|_| String::from("<unprintable value>"))
}

/// Closure state of a script function that forwards to a host callback.
///
/// Dropped by the engine when the function is collected; the id is queued
/// for the finalize listener.
struct CallbackBinding {
    id: CallbackId,
    shared: Rc<EngineShared>,
}

impl CallbackBinding {
    fn invoke<'js>(&self, ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> rquickjs::Result<Value<'js>> {
        let shared = &self.shared;
        let _active = ActiveCtx::enter(shared, ctx);

        let dispatcher = shared.dispatcher.borrow().clone();
        let Some(dispatcher) = dispatcher else {
            return Err(Exception::throw_message(ctx, "no callback dispatcher installed"));
        };

        let mut raw_args = Vec::with_capacity(args.len());
        for arg in args {
            match shared.to_raw(ctx, arg, None) {
                Ok(raw) => raw_args.push(raw),
                Err(e) => {
                    raw_args.iter().for_each(|raw| shared.release_raw(raw));
                    return Err(Exception::throw_message(ctx, &e.to_string()));
                }
            }
        }

        let result = dispatcher(self.id, raw_args)
            .and_then(|ret| shared.to_js(ctx, ret).map_err(|e| e.to_string()));
        result.map_err(|message| Exception::throw_message(ctx, &message))
    }
}

impl Drop for CallbackBinding {
    fn drop(&mut self) {
        if let Ok(mut finalized) = self.shared.finalized.try_borrow_mut() {
            finalized.push(self.id);
        }
    }
}
