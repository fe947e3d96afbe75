//! Value handles
//!
//! A handle is the host side of one native object retain. Every handle
//! produced by the bridge starts with a reference count of one and must be
//! [`release`](JsObject::release)d exactly once per count; a second release
//! fails with [`UsageError::Released`] instead of freeing twice.
//!
//! Object, array and function handles share one [`HandleCore`]. The typed
//! views [`JsArray`] and [`JsFunction`] dereference to [`JsObject`] for the
//! property protocol. Cloning a view does not retain; equality and hashing
//! follow the native pointer.
//!
//! Handles are bound to the context thread:
//!
//! ```compile_fail
//! use qjsw_runtime::Context;
//!
//! let context = Context::create().unwrap();
//! let object = context.create_new_js_object().unwrap();
//! std::thread::spawn(move || {
//!     drop(object); // Error: JsObject is !Send
//! });
//! ```

use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::{Rc, Weak};

use qjsw_engine::{Engine, NativePtr, ValueKind};
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::context::ContextShared;
use crate::error::{BridgeError, BridgeResult, UsageError};
use crate::value::{JsCallback, JsValue};

pub(crate) type HandleId = u64;

/// State shared by all views of one handle
pub(crate) struct HandleCore {
    pub(crate) id: HandleId,
    pub(crate) context: Weak<ContextShared>,
    pub(crate) ptr: NativePtr,
    pub(crate) kind: ValueKind,
    /// Receiver retained alongside a function read off an object
    pub(crate) this: Option<NativePtr>,
    pub(crate) refcount: Cell<u32>,
    /// The context's global object, owned by the context itself
    pub(crate) global: bool,
    pub(crate) stack_trace: Option<Backtrace>,
}

/// Handle to a script object
#[derive(Clone)]
pub struct JsObject {
    pub(crate) core: Rc<HandleCore>,
}

impl JsObject {
    pub(crate) fn from_core(core: Rc<HandleCore>) -> Self {
        Self { core }
    }

    /// Context and engine for an operation on a live handle
    fn enter(&self) -> BridgeResult<(Rc<ContextShared>, Rc<dyn Engine>)> {
        let shared = self
            .core
            .context
            .upgrade()
            .ok_or(UsageError::Destroyed)?;
        let engine = shared.check()?;
        if !self.core.global && self.core.refcount.get() == 0 {
            return Err(UsageError::Released.into());
        }
        Ok((shared, engine))
    }

    pub fn pointer(&self) -> NativePtr {
        self.core.ptr
    }

    pub fn kind(&self) -> ValueKind {
        self.core.kind
    }

    /// Outstanding host references
    pub fn ref_count(&self) -> u32 {
        self.core.refcount.get()
    }

    /// Still referenced and its context still running
    pub fn is_alive(&self) -> bool {
        (self.core.global || self.core.refcount.get() > 0)
            && self
                .core
                .context
                .upgrade()
                .is_some_and(|shared| shared.is_running())
    }

    /// Where this handle was acquired, when stack traces are enabled
    pub fn stack_trace(&self) -> Option<&Backtrace> {
        self.core.stack_trace.as_ref()
    }

    pub fn get_property(&self, name: &str) -> BridgeResult<JsValue> {
        let (shared, engine) = self.enter()?;
        let raw = engine.get_property(self.core.ptr, name)?;
        Ok(shared.acquire(raw))
    }

    /// Store `value` under `name`; callbacks become script functions
    pub fn set_property(&self, name: &str, value: impl Into<JsValue>) -> BridgeResult<()> {
        let (shared, engine) = self.enter()?;
        let arg = shared.to_arg(&value.into())?;
        let result = engine.set_property(self.core.ptr, name, arg.clone());
        if result.is_err() {
            shared.forget_arg(&arg);
        }
        Ok(result?)
    }

    /// Expose `methods` on a new object stored under `name`
    pub fn set_methods(
        &self,
        name: &str,
        methods: impl IntoIterator<Item = JsCallback>,
    ) -> BridgeResult<()> {
        let (shared, _) = self.enter()?;
        let holder = shared.new_object()?;
        let result = methods
            .into_iter()
            .try_for_each(|method| {
                let method_name = method.name().to_string();
                holder.set_property(&method_name, method)
            })
            .and_then(|_| self.set_property(name, holder.clone()));
        holder.release()?;
        result
    }

    pub fn get_string(&self, name: &str) -> BridgeResult<Option<String>> {
        self.get_typed(name, |value| match value {
            JsValue::String(s) => Ok(s),
            other => Err(other),
        })
    }

    /// Integral numbers that fit in `i32`; JSON numbers arrive as `Long`
    pub fn get_int(&self, name: &str) -> BridgeResult<Option<i32>> {
        self.get_typed(name, |value| match value {
            JsValue::Int(i) => Ok(i),
            JsValue::Long(l) => i32::try_from(l).map_err(|_| JsValue::Long(l)),
            other => Err(other),
        })
    }

    pub fn get_long(&self, name: &str) -> BridgeResult<Option<i64>> {
        self.get_typed(name, |value| match value {
            JsValue::Int(i) => Ok(i as i64),
            JsValue::Long(l) => Ok(l),
            other => Err(other),
        })
    }

    pub fn get_double(&self, name: &str) -> BridgeResult<Option<f64>> {
        self.get_typed(name, |value| match value.as_f64() {
            Some(d) => Ok(d),
            None => Err(value),
        })
    }

    pub fn get_bool(&self, name: &str) -> BridgeResult<Option<bool>> {
        self.get_typed(name, |value| match value {
            JsValue::Bool(b) => Ok(b),
            other => Err(other),
        })
    }

    pub fn get_bytes(&self, name: &str) -> BridgeResult<Option<Vec<u8>>> {
        self.get_typed(name, |value| match value {
            JsValue::Bytes(bytes) => Ok(bytes),
            other => Err(other),
        })
    }

    /// Any object-like property (arrays and functions included)
    pub fn get_object(&self, name: &str) -> BridgeResult<Option<JsObject>> {
        self.get_typed(name, |value| match value {
            JsValue::Object(o) => Ok(o),
            JsValue::Array(a) => Ok(a.0),
            JsValue::Function(f) => Ok(f.0),
            other => Err(other),
        })
    }

    pub fn get_array(&self, name: &str) -> BridgeResult<Option<JsArray>> {
        self.get_typed(name, |value| match value {
            JsValue::Array(a) => Ok(a),
            other => Err(other),
        })
    }

    pub fn get_function(&self, name: &str) -> BridgeResult<Option<JsFunction>> {
        self.get_typed(name, |value| match value {
            JsValue::Function(f) => Ok(f),
            other => Err(other),
        })
    }

    /// Read `name` and keep it only if `pick` accepts it; a rejected
    /// handle is released
    fn get_typed<T>(
        &self,
        name: &str,
        pick: impl FnOnce(JsValue) -> Result<T, JsValue>,
    ) -> BridgeResult<Option<T>> {
        match pick(self.get_property(name)?) {
            Ok(value) => Ok(Some(value)),
            Err(other) => {
                other.release()?;
                Ok(None)
            }
        }
    }

    /// Own enumerable property names
    pub fn own_property_names(&self) -> BridgeResult<JsArray> {
        let (shared, engine) = self.enter()?;
        let raw = engine.own_property_names(self.core.ptr)?;
        match shared.acquire(raw) {
            JsValue::Array(names) => Ok(names),
            other => {
                other.release()?;
                Err(BridgeError::Internal(
                    "property names did not come back as an array".into(),
                ))
            }
        }
    }

    /// `JSON.stringify`; `None` when the value has no JSON form
    pub fn stringify(&self) -> BridgeResult<Option<String>> {
        let (_, engine) = self.enter()?;
        Ok(engine.stringify(self.core.ptr)?)
    }

    /// Script-side `String(value)`
    pub fn to_script_string(&self) -> BridgeResult<String> {
        let (_, engine) = self.enter()?;
        Ok(engine.to_string(self.core.ptr)?)
    }

    /// Deserialize through the object's JSON form
    pub fn to_serde<T: DeserializeOwned>(&self) -> BridgeResult<T> {
        let json = self.stringify()?.unwrap_or_else(|| "null".to_string());
        Ok(serde_json::from_str(&json)?)
    }

    /// Add one reference, native and host side
    pub fn hold(&self) -> BridgeResult<()> {
        let (_, engine) = self.enter()?;
        if self.core.global {
            return Ok(());
        }
        engine.dup(self.core.ptr)?;
        let count = self.core.refcount.get() + 1;
        self.core.refcount.set(count);
        trace!(ptr = ?self.core.ptr, refcount = count, "hold");
        Ok(())
    }

    /// Drop one reference; fails once the count has reached zero
    pub fn release(&self) -> BridgeResult<()> {
        let (shared, engine) = self.enter()?;
        shared.release_core(engine.as_ref(), &self.core);
        Ok(())
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &Self) -> bool {
        self.core.ptr == other.core.ptr
    }
}

impl Eq for JsObject {}

impl Hash for JsObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.ptr.hash(state);
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("ptr", &self.core.ptr)
            .field("kind", &self.core.kind)
            .field("refcount", &self.core.refcount.get())
            .finish()
    }
}

/// Handle to a script array
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsArray(pub(crate) JsObject);

impl JsArray {
    pub fn length(&self) -> BridgeResult<u32> {
        let (_, engine) = self.0.enter()?;
        Ok(engine.length(self.0.core.ptr)?)
    }

    pub fn get(&self, index: u32) -> BridgeResult<JsValue> {
        let (shared, engine) = self.0.enter()?;
        let raw = engine.get_index(self.0.core.ptr, index)?;
        Ok(shared.acquire(raw))
    }

    pub fn set(&self, value: impl Into<JsValue>, index: u32) -> BridgeResult<()> {
        let (shared, engine) = self.0.enter()?;
        let arg = shared.to_arg(&value.into())?;
        let result = engine.set_index(self.0.core.ptr, index, arg.clone());
        if result.is_err() {
            shared.forget_arg(&arg);
        }
        Ok(result?)
    }

    /// Append `value` at the current length
    pub fn push(&self, value: impl Into<JsValue>) -> BridgeResult<()> {
        let length = self.length()?;
        self.set(value, length)
    }

    /// Collect string elements, e.g. the result of `own_property_names`
    pub fn to_strings(&self) -> BridgeResult<Vec<String>> {
        let mut strings = Vec::new();
        for index in 0..self.length()? {
            match self.get(index)? {
                JsValue::String(s) => strings.push(s),
                other => {
                    other.release()?;
                }
            }
        }
        Ok(strings)
    }
}

impl Deref for JsArray {
    type Target = JsObject;

    fn deref(&self) -> &JsObject {
        &self.0
    }
}

impl fmt::Debug for JsArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsArray({:?})", self.0.core.ptr)
    }
}

/// Handle to a script function
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsFunction(pub(crate) JsObject);

impl JsFunction {
    /// Call with the receiver the function was read from, draining pending
    /// jobs afterwards
    pub fn call(&self, args: &[JsValue]) -> BridgeResult<JsValue> {
        let (shared, engine) = self.0.enter()?;
        let args = args
            .iter()
            .map(|arg| shared.to_arg(arg))
            .collect::<BridgeResult<Vec<_>>>()?;
        let raw = engine.call(self.0.core.ptr, self.0.core.this, args)?;
        shared.finish(engine.as_ref(), raw)
    }

    /// Call and release whatever comes back
    pub fn call_void(&self, args: &[JsValue]) -> BridgeResult<()> {
        self.call(args)?.release()
    }
}

impl Deref for JsFunction {
    type Target = JsObject;

    fn deref(&self) -> &JsObject {
        &self.0
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsFunction({:?})", self.0.core.ptr)
    }
}
