//! QuickJS backend built on `rquickjs`.

mod bytecode;
mod loader;
mod shared;

use std::rc::Rc;

use rquickjs::{Array, Coerced, Context, Ctx, Function, Object, Runtime, Value, qjs};
use tracing::debug;

use self::bytecode::c_text;
use self::loader::{ProviderLoader, ProviderResolver};
use self::shared::{ActiveCtx, EngineShared, coerce_string};
use crate::engine::{CallbackDispatcher, Engine, EngineOptions, FinalizeListener, ModuleProvider};
use crate::error::{EngineError, EngineResult};
use crate::value::{ArgValue, EvalMode, MemoryStats, NativePtr, RawValue};

/// `format` helper and `console` object installed into every context
const CONSOLE_SCRIPT: &str = include_str!("console.js");

/// One QuickJS runtime with a single full context.
///
/// # Thread Safety
///
/// `!Send` and `!Sync`: the runtime and every value in it belong to the
/// creating thread.
pub struct QuickJsEngine {
    shared: Rc<EngineShared>,
    context: Context,
    _runtime: Runtime,
}

impl QuickJsEngine {
    pub fn new(options: &EngineOptions) -> EngineResult<Self> {
        let runtime = Runtime::new()?;
        if let Some(size) = options.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(limit) = options.memory_limit {
            runtime.set_memory_limit(limit);
        }

        let shared = Rc::new(EngineShared::new());
        let tracker = Rc::clone(&shared);
        runtime.set_host_promise_rejection_tracker(Some(Box::new(
            move |ctx, promise, reason, is_handled| {
                tracker.track_rejection(&ctx, promise, reason, is_handled);
            },
        )));
        runtime.set_loader(
            ProviderResolver {
                shared: Rc::clone(&shared),
            },
            ProviderLoader {
                shared: Rc::clone(&shared),
            },
        );

        let context = Context::full(&runtime)?;
        let engine = Self {
            shared,
            context,
            _runtime: runtime,
        };
        engine.eval(CONSOLE_SCRIPT, "console.js", EvalMode::Global)?;
        debug!("quickjs engine created");
        Ok(engine)
    }

    /// Run `f` with the active `Ctx`, entering the context if none is.
    fn with_ctx<R>(&self, f: impl FnOnce(&Ctx<'_>) -> R) -> R {
        if let Some(ptr) = self.shared.active() {
            // SAFETY: `active` only names a `Ctx` that lives on an enclosing
            // stack frame of this thread (see `ActiveCtx`).
            let ctx = unsafe { &*(ptr as *const Ctx<'_>) };
            return f(ctx);
        }
        self.context.with(|ctx| {
            let _active = ActiveCtx::enter(&self.shared, &ctx);
            f(&ctx)
        })
    }

    fn with_rt(&self, f: impl FnOnce(*mut qjs::JSRuntime)) {
        self.with_ctx(|ctx| {
            // SAFETY: the context pointer is valid while `ctx` is borrowed
            let rt = unsafe { qjs::JS_GetRuntime(ctx.as_raw().as_ptr()) };
            f(rt)
        })
    }

    fn object<'js>(&self, ctx: &Ctx<'js>, ptr: NativePtr) -> EngineResult<Object<'js>> {
        self.shared
            .restore(ctx, ptr)?
            .into_object()
            .ok_or(EngineError::InvalidPointer(ptr.addr()))
    }
}

impl Drop for QuickJsEngine {
    fn drop(&mut self) {
        // host retains must go before the runtime does
        self.shared.clear();
        debug!("quickjs engine dropped");
    }
}

impl Engine for QuickJsEngine {
    fn eval(&self, source: &str, file_name: &str, mode: EvalMode) -> EngineResult<RawValue> {
        let source = c_text(source, "script")?;
        let file_name = c_text(file_name, "file name")?;
        self.with_ctx(|ctx| {
            self.shared.reset_module_error();
            let value = bytecode::eval_raw(ctx, &source, &file_name, mode, false);
            self.shared.finish(ctx, value)
        })
    }

    fn compile(&self, source: &str, file_name: &str, is_module: bool) -> EngineResult<Vec<u8>> {
        let source = c_text(source, "script")?;
        let file_name = c_text(file_name, "file name")?;
        self.with_ctx(|ctx| {
            self.shared.reset_module_error();
            bytecode::compile(&self.shared, ctx, &source, &file_name, is_module)
        })
    }

    fn execute(&self, code: &[u8]) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            self.shared.reset_module_error();
            let value = bytecode::execute(&self.shared, ctx, code)?;
            self.shared.finish(ctx, value)
        })
    }

    fn parse_json(&self, text: &str) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            let value = self.shared.lift(ctx, ctx.json_parse(text))?;
            self.shared.to_raw(ctx, value, None)
        })
    }

    fn global_object(&self) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| self.shared.to_raw(ctx, ctx.globals().into_value(), None))
    }

    fn get_property(&self, ptr: NativePtr, name: &str) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let value = self.shared.lift(ctx, object.get::<_, Value>(name))?;
            self.shared.to_raw(ctx, value, Some(object.as_value()))
        })
    }

    fn set_property(&self, ptr: NativePtr, name: &str, value: ArgValue) -> EngineResult<()> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let value = self.shared.to_js(ctx, value)?;
            self.shared.lift(ctx, object.set(name, value))
        })
    }

    fn get_index(&self, ptr: NativePtr, index: u32) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let value = self.shared.lift(ctx, object.get::<_, Value>(index))?;
            self.shared.to_raw(ctx, value, Some(object.as_value()))
        })
    }

    fn set_index(&self, ptr: NativePtr, index: u32, value: ArgValue) -> EngineResult<()> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let value = self.shared.to_js(ctx, value)?;
            self.shared.lift(ctx, object.set(index, value))
        })
    }

    fn length(&self, ptr: NativePtr) -> EngineResult<u32> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let length = self.shared.lift(ctx, object.get::<_, Value>("length"))?;
            Ok(length
                .as_number()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map_or(0, |n| n as u32))
        })
    }

    fn own_property_names(&self, ptr: NativePtr) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            let object = self.object(ctx, ptr)?;
            let names = Array::new(ctx.clone())?;
            for (index, key) in object.keys::<String>().enumerate() {
                let key = self.shared.lift(ctx, key)?;
                names.set(index, key)?;
            }
            self.shared.to_raw(ctx, names.into_value(), None)
        })
    }

    fn call(
        &self,
        func: NativePtr,
        this: Option<NativePtr>,
        args: Vec<ArgValue>,
    ) -> EngineResult<RawValue> {
        self.with_ctx(|ctx| {
            let function: Function = self
                .shared
                .restore(ctx, func)?
                .into_function()
                .ok_or(EngineError::InvalidPointer(func.addr()))?;
            let this = match this {
                Some(this) => self.shared.restore(ctx, this)?,
                None => Value::new_undefined(ctx.clone()),
            };

            let mut call_args = rquickjs::function::Args::new(ctx.clone(), args.len());
            call_args.this(this)?;
            for arg in args {
                call_args.push_arg(self.shared.to_js(ctx, arg)?)?;
            }
            let value = self.shared.lift(ctx, function.call_arg::<Value>(call_args))?;
            self.shared.to_raw(ctx, value, None)
        })
    }

    fn stringify(&self, ptr: NativePtr) -> EngineResult<Option<String>> {
        self.with_ctx(|ctx| {
            let value = self.shared.restore(ctx, ptr)?;
            let json = self.shared.lift(ctx, ctx.json_stringify(value))?;
            json.map(|json| self.shared.lift(ctx, json.to_string()))
                .transpose()
        })
    }

    fn to_string(&self, ptr: NativePtr) -> EngineResult<String> {
        self.with_ctx(|ctx| {
            let value = self.shared.restore(ctx, ptr)?;
            let text = self.shared.lift(ctx, value.get::<Coerced<String>>())?;
            Ok(text.0)
        })
    }

    fn format(&self, ptr: NativePtr) -> EngineResult<Option<String>> {
        self.with_ctx(|ctx| {
            let value = self.shared.restore(ctx, ptr)?;
            let format = ctx
                .globals()
                .get::<_, Value>("format")
                .ok()
                .and_then(|format| format.into_function());
            let Some(format) = format else {
                return Ok(None);
            };
            let text = self.shared.lift(ctx, format.call::<_, Value>((value,)))?;
            Ok(Some(coerce_string(&text)))
        })
    }

    fn dup(&self, ptr: NativePtr) -> EngineResult<()> {
        self.shared.dup(ptr)
    }

    fn free(&self, ptr: NativePtr) {
        self.shared.free(ptr)
    }

    fn is_live(&self, ptr: NativePtr) -> bool {
        self.shared.retain_count(ptr) > 0
    }

    fn retain_count(&self, ptr: NativePtr) -> u32 {
        self.shared.retain_count(ptr)
    }

    fn drain_jobs(&self) -> EngineResult<()> {
        self.with_ctx(|ctx| self.shared.drain_jobs(ctx))
    }

    fn run_gc(&self) {
        // SAFETY: `rt` is the live runtime of the active context
        self.with_rt(|rt| unsafe { qjs::JS_RunGC(rt) });
        self.shared.flush_finalized();
    }

    fn set_max_stack_size(&self, size: usize) {
        // SAFETY: see `run_gc`
        self.with_rt(|rt| unsafe { qjs::JS_SetMaxStackSize(rt, size as _) });
    }

    fn set_memory_limit(&self, limit: usize) {
        // SAFETY: see `run_gc`
        self.with_rt(|rt| unsafe { qjs::JS_SetMemoryLimit(rt, limit as _) });
    }

    fn memory_usage(&self) -> MemoryStats {
        let mut stats = MemoryStats::default();
        self.with_rt(|rt| {
            // SAFETY: JSMemoryUsage is plain integers; the engine fills it in
            let usage = unsafe {
                let mut usage = std::mem::zeroed::<qjs::JSMemoryUsage>();
                qjs::JS_ComputeMemoryUsage(rt, &mut usage);
                usage
            };
            stats = MemoryStats {
                malloc_size: usage.malloc_size,
                memory_used: usage.memory_used_size,
                object_count: usage.obj_count,
                string_count: usage.str_count,
            };
        });
        stats
    }

    fn set_callback_dispatcher(&self, dispatcher: Rc<CallbackDispatcher>) {
        self.shared.set_dispatcher(dispatcher);
    }

    fn set_finalize_listener(&self, listener: Rc<FinalizeListener>) {
        self.shared.set_finalize_listener(listener);
    }

    fn set_module_provider(&self, provider: Option<Rc<dyn ModuleProvider>>) {
        *self.shared.provider.borrow_mut() = provider;
    }
}
