//! Raw evaluation entry points the safe `rquickjs` API does not cover:
//! evaluation with an explicit file name, compile-to-bytecode and bytecode
//! execution.

use std::ffi::{CStr, CString, c_int};

use rquickjs::{Ctx, Type, Value, qjs};

use super::shared::EngineShared;
use crate::error::{EngineError, EngineResult};
use crate::value::EvalMode;

/// NUL-terminated copy of script text, as `JS_Eval` requires.
pub(crate) fn c_text(text: &str, what: &str) -> EngineResult<CString> {
    CString::new(text).map_err(|e| EngineError::internal(format!("{what} contains NUL: {e}")))
}

fn eval_flags(mode: EvalMode) -> u32 {
    match mode {
        EvalMode::Global => qjs::JS_EVAL_TYPE_GLOBAL,
        EvalMode::Module => qjs::JS_EVAL_TYPE_MODULE,
    }
}

/// Evaluate (or, with `compile_only`, just compile) source text.
pub(crate) fn eval_raw<'js>(
    ctx: &Ctx<'js>,
    source: &CStr,
    file_name: &CStr,
    mode: EvalMode,
    compile_only: bool,
) -> Value<'js> {
    let mut flags = eval_flags(mode);
    if compile_only {
        flags |= qjs::JS_EVAL_FLAG_COMPILE_ONLY;
    }
    // SAFETY: both strings are NUL-terminated and outlive the call; the
    // returned value is owned and handed straight to `Value`.
    unsafe {
        let raw = qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            source.as_ptr(),
            source.to_bytes().len() as _,
            file_name.as_ptr(),
            flags as c_int,
        );
        Value::from_raw(ctx.clone(), raw)
    }
}

pub(crate) fn compile(
    shared: &EngineShared,
    ctx: &Ctx<'_>,
    source: &CStr,
    file_name: &CStr,
    is_module: bool,
) -> EngineResult<Vec<u8>> {
    let mode = if is_module {
        EvalMode::Module
    } else {
        EvalMode::Global
    };
    let compiled = eval_raw(ctx, source, file_name, mode, true);
    if compiled.is_exception() {
        return Err(shared.take_exception(ctx));
    }

    let raw_ctx = ctx.as_raw().as_ptr();
    let mut len: qjs::size_t = 0;
    let flags = qjs::JS_WRITE_OBJ_BYTECODE | qjs::JS_WRITE_OBJ_REFERENCE;
    // SAFETY: `compiled` is a live function or module value of this context
    let buffer = unsafe { qjs::JS_WriteObject(raw_ctx, &mut len, compiled.as_raw(), flags as c_int) };
    if buffer.is_null() {
        return Err(shared.take_exception(ctx));
    }
    // SAFETY: the engine wrote `len` bytes at `buffer`, freed right after copying
    let bytes = unsafe {
        let bytes = std::slice::from_raw_parts(buffer, len as usize).to_vec();
        qjs::js_free(raw_ctx, buffer.cast());
        bytes
    };
    if bytes.is_empty() {
        return Err(EngineError::Bytecode("engine produced no bytecode".into()));
    }
    Ok(bytes)
}

pub(crate) fn execute<'js>(
    shared: &EngineShared,
    ctx: &Ctx<'js>,
    bytecode: &[u8],
) -> EngineResult<Value<'js>> {
    let raw_ctx = ctx.as_raw().as_ptr();
    let flags = qjs::JS_READ_OBJ_BYTECODE | qjs::JS_READ_OBJ_REFERENCE;
    // SAFETY: the buffer outlives the call; the engine validates its contents
    let function = unsafe {
        let raw = qjs::JS_ReadObject(raw_ctx, bytecode.as_ptr(), bytecode.len() as _, flags as c_int);
        Value::from_raw(ctx.clone(), raw)
    };
    if function.is_exception() {
        return Err(shared.take_exception(ctx));
    }

    if function.type_of() == Type::Module {
        // SAFETY: `function` is a module value read into this context
        if unsafe { qjs::JS_ResolveModule(raw_ctx, function.as_raw()) } < 0 {
            return Err(shared.take_exception(ctx));
        }
    }

    // SAFETY: `JS_EvalFunction` consumes one reference, so hand it a
    // duplicate and let `function` release its own.
    let result = unsafe {
        let owned = qjs::JS_DupValue(raw_ctx, function.as_raw());
        Value::from_raw(ctx.clone(), qjs::JS_EvalFunction(raw_ctx, owned))
    };
    Ok(result)
}
