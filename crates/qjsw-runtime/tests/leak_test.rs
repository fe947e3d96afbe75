//! Integration tests for the object registry and leak reports

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use qjsw_runtime::{BridgeError, Context, ContextConfig, JsObject, UsageError};

type Reports = Rc<RefCell<Vec<String>>>;

fn listen(context: &Context) -> Reports {
    let reports: Reports = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reports);
    context
        .set_leak_listener(move |_: &JsObject, formatted: &str| {
            sink.borrow_mut().push(formatted.to_string())
        })
        .unwrap();
    reports
}

#[test]
fn test_leak_reported_on_destroy() {
    let context = Context::create().unwrap();
    let reports = listen(&context);

    let object = context.create_new_js_object().unwrap();
    object.set_property("name", "leak1").unwrap();
    context.destroy().unwrap();

    assert_eq!(*reports.borrow(), vec!["{ name: 'leak1' }".to_string()]);
    assert_eq!(object.ref_count(), 0);
}

#[test]
fn test_leak_reported_on_drop() {
    let reports;
    {
        let context = Context::create().unwrap();
        reports = listen(&context);
        let array = context.parse(r#"[1, "a", [2]]"#).unwrap();
        assert!(array.as_array().is_some());
    }
    assert_eq!(*reports.borrow(), vec!["[ 1, 'a', [ 2 ] ]".to_string()]);
}

#[test]
fn test_released_and_global_handles_are_not_reported() {
    let context = Context::create().unwrap();
    let reports = listen(&context);

    let released = context.create_new_js_object().unwrap();
    released.release().unwrap();
    let _global = context.get_global_object().unwrap();
    context.destroy().unwrap();

    assert!(reports.borrow().is_empty());
}

#[test]
fn test_sweep_without_force_keeps_handles() {
    let context = Context::create().unwrap();
    let reports = listen(&context);
    let object = context.parse(r#"{"id": 1}"#).unwrap();
    let object = object.as_object().unwrap();

    assert_eq!(context.sweep_leaks(false).unwrap(), 1);
    assert_eq!(*reports.borrow(), vec!["{ id: 1 }".to_string()]);
    assert_eq!(object.ref_count(), 1);
    assert_eq!(object.get_int("id").unwrap(), Some(1));

    object.release().unwrap();
    assert_eq!(context.sweep_leaks(false).unwrap(), 0);
}

#[test]
fn test_forced_sweep_frees_every_reference() {
    let context = Context::create().unwrap();
    let object = context.create_new_js_object().unwrap();
    object.hold().unwrap();
    object.hold().unwrap();

    assert_eq!(context.sweep_leaks(true).unwrap(), 1);
    assert_eq!(object.ref_count(), 0);
    assert_eq!(context.live_handle_count().unwrap(), 0);
    assert!(matches!(
        object.release(),
        Err(BridgeError::Usage(UsageError::Released))
    ));
}

#[test]
fn test_panicking_listener_does_not_stop_the_sweep() {
    let context = Context::create().unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    context
        .set_leak_listener(move |_: &JsObject, _: &str| {
            counter.set(counter.get() + 1);
            if counter.get() == 1 {
                panic!("listener failure");
            }
        })
        .unwrap();

    let first = context.create_new_js_object().unwrap();
    let second = context.create_new_js_object().unwrap();
    context.destroy().unwrap();

    assert_eq!(calls.get(), 2);
    assert_eq!(first.ref_count(), 0);
    assert_eq!(second.ref_count(), 0);
}

#[test]
fn test_listener_sees_acquisition_stack_trace() {
    let context =
        Context::with_config(ContextConfig::new().capture_stack_traces(true)).unwrap();
    let traced = Rc::new(Cell::new(false));
    let flag = Rc::clone(&traced);
    context
        .set_leak_listener(move |handle: &JsObject, _: &str| {
            flag.set(handle.stack_trace().is_some())
        })
        .unwrap();

    let _leaked = context.create_new_js_object().unwrap();
    context.destroy().unwrap();
    assert!(traced.get());
}

#[test]
fn test_listener_may_release_the_handle() {
    let context = Context::create().unwrap();
    context
        .set_leak_listener(|handle: &JsObject, _: &str| {
            handle.release().unwrap();
        })
        .unwrap();

    let object = context.create_new_js_object().unwrap();
    assert_eq!(context.sweep_leaks(false).unwrap(), 1);
    assert_eq!(object.ref_count(), 0);
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_functions_are_formatted() {
    let context = Context::create().unwrap();
    let reports = listen(&context);
    let _f = context.evaluate("(function answer() { return 42; })").unwrap();
    context.destroy().unwrap();
    assert_eq!(*reports.borrow(), vec!["[Function: answer]".to_string()]);
}

#[test]
fn test_object_records_follow_live_handles() {
    let context = Context::create().unwrap();
    assert!(context.object_records().unwrap().is_empty());

    let first = context.create_new_js_object().unwrap();
    let second = context.parse("[1, 2]").unwrap();
    let records = context.object_records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], first);
    assert_eq!(records[0].ref_count(), 1);

    first.release().unwrap();
    let records = context.object_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], **second.as_array().unwrap());
    second.release().unwrap();
    assert!(context.object_records().unwrap().is_empty());
}

#[test]
fn test_dump_objects() {
    let context = Context::create().unwrap();
    let object = context.evaluate("({ id: 7 })").unwrap();
    object.as_object().unwrap().hold().unwrap();

    let mut out = Vec::new();
    context.dump_objects(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "1 live handles");
    assert!(lines[1].ends_with("Object refcount=2: { id: 7 }"), "{text}");

    object.release().unwrap();
    object.release().unwrap();
}
