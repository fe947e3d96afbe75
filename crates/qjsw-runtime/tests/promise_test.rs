//! Integration tests for exception propagation and promise jobs

use qjsw_runtime::{BridgeError, Context, JsCallback, JsValue};

const REJECTION_PREFIX: &str = "UnhandledPromiseRejectionException:";

fn context_with_assert() -> Context {
    let context = Context::create().unwrap();
    let global = context.get_global_object().unwrap();
    global
        .set_property(
            "assertTrue",
            JsCallback::new("assertTrue", |_, args| {
                match args.first().and_then(JsValue::as_bool) {
                    Some(true) => Ok(JsValue::Undefined),
                    _ => Err(BridgeError::script("assertion failed")),
                }
            }),
        )
        .unwrap();
    context
}

#[test]
fn test_jobs_run_before_evaluate_returns() {
    let context = context_with_assert();
    context
        .evaluate(
            "var done = false; \
             Promise.resolve(true).then(v => { assertTrue(v); done = true; }); 0",
        )
        .unwrap();
    assert_eq!(context.evaluate("done").unwrap(), JsValue::Bool(true));
}

#[test]
fn test_unhandled_rejection_is_reported() {
    let context = Context::create().unwrap();
    let err = context
        .evaluate("new Promise(() => { aaa; }); 0")
        .unwrap_err();
    assert!(err.is_js_error());
    let message = err.to_string();
    assert!(message.starts_with(REJECTION_PREFIX), "{message}");
    assert!(message.contains("aaa is not defined"), "{message}");
}

#[test]
fn test_async_function_errors_are_reported() {
    let context = Context::create().unwrap();
    let err = context
        .evaluate("async function test() { aa; } test(); 0")
        .unwrap_err();
    assert!(err.to_string().starts_with(REJECTION_PREFIX));
    assert!(err.to_string().contains("aa is not defined"));
}

#[test]
fn test_failed_assertion_in_job_is_reported() {
    let context = context_with_assert();
    let err = context
        .evaluate("Promise.resolve(false).then(v => assertTrue(v)); 0")
        .unwrap_err();
    assert!(err.to_string().starts_with(REJECTION_PREFIX));
    assert!(err.to_string().contains("assertion failed"));
}

#[test]
fn test_handled_rejection_is_not_an_error() {
    let context = Context::create().unwrap();
    context
        .evaluate(
            "var caught; Promise.reject(new Error('x')).catch(e => { caught = e.message; }); 0",
        )
        .unwrap();
    assert_eq!(context.evaluate("caught").unwrap(), JsValue::String("x".into()));
}

#[test]
fn test_function_call_drains_jobs() {
    let context = Context::create().unwrap();
    let value = context
        .evaluate("(function () { Promise.resolve().then(() => { globalThis.flag = 'set'; }); })")
        .unwrap();
    let schedule = value.as_function().unwrap();
    schedule.call_void(&[]).unwrap();
    schedule.release().unwrap();
    assert_eq!(context.evaluate("flag").unwrap(), JsValue::String("set".into()));

    let value = context
        .evaluate("(function () { Promise.reject(new Error('late')); })")
        .unwrap();
    let reject = value.as_function().unwrap();
    let err = reject.call(&[]).unwrap_err();
    assert!(err.to_string().starts_with(REJECTION_PREFIX));
    reject.release().unwrap();
}

#[test]
fn test_execute_drains_jobs() {
    let context = Context::create().unwrap();
    let bytes = context
        .compile("Promise.resolve(7).then(v => { globalThis.seven = v; }); 0", "jobs.js")
        .unwrap();
    context.execute(&bytes).unwrap();
    assert_eq!(context.evaluate("seven").unwrap(), JsValue::Int(7));

    let bytes = context
        .compile("async function test() { aa; } test();", "async.js")
        .unwrap();
    let err = context.execute(&bytes).unwrap_err();
    assert!(err.to_string().starts_with(REJECTION_PREFIX));
}

#[test]
fn test_failed_drain_releases_the_result() {
    let context = Context::create().unwrap();
    let err = context
        .evaluate("Promise.reject(new Error('dropped'))")
        .unwrap_err();
    assert!(err.to_string().contains("dropped"));
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_errors_do_not_poison_the_context() {
    let context = Context::create().unwrap();
    context.evaluate("new Promise(() => { aaa; }); 0").unwrap_err();
    context.evaluate("throw new Error('again')").unwrap_err();
    assert_eq!(context.evaluate("1 + 1").unwrap(), JsValue::Int(2));
}
