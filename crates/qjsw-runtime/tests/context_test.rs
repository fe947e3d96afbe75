//! Integration tests for context entry points and the property protocol

use std::cell::RefCell;
use std::rc::Rc;

use qjsw_runtime::{
    BridgeError, ConsoleLevel, Context, ContextConfig, JsCallback, JsValue, MapValue, UsageError,
};
use serde::Deserialize;

fn context() -> Context {
    Context::create().unwrap()
}

#[test]
fn test_evaluate_object_properties() {
    let context = context();
    let person = context
        .evaluate("var a = { name: 'Jack', age: 18 }; a;")
        .unwrap();
    let person = person.as_object().unwrap();

    assert_eq!(person.get_string("name").unwrap().as_deref(), Some("Jack"));
    assert_eq!(person.get_int("age").unwrap(), Some(18));
    assert_eq!(person.get_long("age").unwrap(), Some(18));
    assert_eq!(person.get_double("age").unwrap(), Some(18.0));
    assert_eq!(person.get_bool("name").unwrap(), None);
    assert_eq!(person.get_property("missing").unwrap(), JsValue::Undefined);

    person.release().unwrap();
}

#[test]
fn test_typed_getter_mismatch_releases_handle() {
    let context = context();
    let value = context.evaluate("({ child: {}, list: [1] })").unwrap();
    let object = value.as_object().unwrap();
    let live = context.live_handle_count().unwrap();

    assert_eq!(object.get_string("child").unwrap(), None);
    assert!(object.get_array("child").unwrap().is_none());
    assert!(object.get_function("list").unwrap().is_none());
    assert_eq!(context.live_handle_count().unwrap(), live);

    let list = object.get_array("list").unwrap().unwrap();
    assert_eq!(list.length().unwrap(), 1);
    list.release().unwrap();
    object.release().unwrap();
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_set_property_round_trip() {
    let context = context();
    let global = context.get_global_object().unwrap();
    global.set_property("count", 3).unwrap();
    global.set_property("label", "three").unwrap();
    global.set_property("flag", true).unwrap();
    global.set_property("nothing", JsValue::Null).unwrap();
    global.set_property("ratio", 0.5).unwrap();

    assert_eq!(
        context
            .evaluate("[count, label, flag, nothing, ratio].join(',')")
            .unwrap(),
        JsValue::String("3,three,true,,0.5".into())
    );
}

#[test]
fn test_own_property_names() {
    let context = context();
    let value = context.evaluate("({ name: 'Jack', age: 18 })").unwrap();
    let object = value.as_object().unwrap();

    let names = object.own_property_names().unwrap();
    assert_eq!(names.to_strings().unwrap(), vec!["name", "age"]);
    names.release().unwrap();
    object.release().unwrap();
}

#[test]
fn test_parse_and_parse_json() {
    let context = context();

    let err = context.parse_json("[1, 2]").unwrap_err();
    assert!(matches!(err, BridgeError::Usage(UsageError::NotAJsonObject)));
    assert!(!err.is_js_error());

    let object = context.parse_json(r#"{"name":"Jack","age":18}"#).unwrap();
    assert_eq!(
        object.stringify().unwrap().as_deref(),
        Some(r#"{"name":"Jack","age":18}"#)
    );
    object.release().unwrap();

    let array = context.parse("[1, 2]").unwrap();
    assert_eq!(array.as_array().unwrap().length().unwrap(), 2);
    array.release().unwrap();

    assert_eq!(context.parse("\"text\"").unwrap(), JsValue::String("text".into()));
}

#[test]
fn test_new_object_and_array() {
    let context = context();
    let object = context.create_new_js_object().unwrap();
    let array = context.create_new_js_array().unwrap();

    array.push(1).unwrap();
    array.push("two").unwrap();
    array.set(3.5, 5).unwrap();
    assert_eq!(array.length().unwrap(), 6);
    assert_eq!(array.get(1).unwrap(), JsValue::String("two".into()));
    assert_eq!(array.get(2).unwrap(), JsValue::Undefined);

    object.set_property("items", array.clone()).unwrap();
    assert_eq!(
        object.stringify().unwrap().as_deref(),
        Some(r#"{"items":[1,"two",null,null,null,3.5]}"#)
    );

    array.release().unwrap();
    object.release().unwrap();
}

#[test]
fn test_function_call() {
    let context = context();
    let value = context.evaluate("(function (a, b) { return a + b; })").unwrap();
    let add = value.as_function().unwrap();

    assert_eq!(add.call(&[1.into(), 2.into()]).unwrap(), JsValue::Int(3));
    assert_eq!(
        add.call(&["a".into(), "b".into()]).unwrap(),
        JsValue::String("ab".into())
    );
    add.call_void(&[]).unwrap();
    add.release().unwrap();
}

#[test]
fn test_method_keeps_receiver() {
    let context = context();
    let value = context
        .evaluate("({ n: 5, get() { return this.n; } })")
        .unwrap();
    let object = value.as_object().unwrap();
    let get = object.get_function("get").unwrap().unwrap();

    assert_eq!(get.call(&[]).unwrap(), JsValue::Int(5));
    get.release().unwrap();
    object.release().unwrap();
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_set_methods() {
    let context = context();
    let global = context.get_global_object().unwrap();
    global
        .set_methods(
            "host",
            [
                JsCallback::new("add", |_, args| {
                    let sum: i64 = args.iter().filter_map(JsValue::as_i64).sum();
                    Ok(sum.into())
                }),
                JsCallback::new("name", |_, _| Ok("qjsw".into())),
            ],
        )
        .unwrap();

    assert_eq!(context.evaluate("host.add(1, 2)").unwrap(), JsValue::Int(3));
    assert_eq!(
        context.evaluate("host.name()").unwrap(),
        JsValue::String("qjsw".into())
    );
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_to_map() {
    let context = context();
    let value = context
        .evaluate("({ a: 1, b: 'x', c: [1, { d: true }], f() {}, e: {} })")
        .unwrap();
    let object = value.as_object().unwrap();

    let map = object.to_map().unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b", "c", "e"]);
    assert_eq!(map["a"], MapValue::Int(1));
    assert_eq!(map["b"], MapValue::String("x".into()));
    let MapValue::List(list) = &map["c"] else {
        panic!("expected a list, got {:?}", map["c"]);
    };
    assert_eq!(list[0], MapValue::Int(1));
    assert!(matches!(&list[1], MapValue::Map(inner) if inner["d"] == MapValue::Bool(true)));
    assert!(matches!(&map["e"], MapValue::Map(inner) if inner.is_empty()));

    let filtered = object
        .to_map_filtered(&|key: &str, _: &qjsw_runtime::JsObject| key == "b")
        .unwrap();
    assert!(!filtered.contains_key("b"));
    assert!(filtered.contains_key("a"));

    assert_eq!(
        serde_json::to_string(&map).unwrap(),
        r#"{"a":1,"b":"x","c":[1,{"d":true}],"e":{}}"#
    );

    object.release().unwrap();
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_to_map_breaks_cycles() {
    let context = context();
    let value = context
        .evaluate("var o = { name: 'x', child: { n: 1 } }; o.self = o; o.child.parent = o; o")
        .unwrap();
    let object = value.as_object().unwrap();

    let map = object.to_map().unwrap();
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["name", "child"]);
    let MapValue::Map(child) = &map["child"] else {
        panic!("expected a map");
    };
    assert_eq!(child.keys().collect::<Vec<_>>(), vec!["n"]);

    object.release().unwrap();
}

#[test]
fn test_to_list() {
    let context = context();
    let value = context.evaluate("[1, 'two', [3], null]").unwrap();
    let list = value.as_array().unwrap().to_list().unwrap();
    assert_eq!(
        list,
        vec![
            MapValue::Int(1),
            MapValue::String("two".into()),
            MapValue::List(vec![MapValue::Int(3)]),
            MapValue::Null,
        ]
    );
    value.release().unwrap();
}

#[test]
fn test_serde_helpers() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
    }

    let context = context();
    let value = context
        .to_js_value(&serde_json::json!({ "name": "Jack", "age": 18 }))
        .unwrap();
    let person: Person = value.as_object().unwrap().to_serde().unwrap();
    assert_eq!(
        person,
        Person {
            name: "Jack".into(),
            age: 18
        }
    );
    value.release().unwrap();
}

#[test]
fn test_script_errors() {
    let context = context();

    let err = context.evaluate("a();").unwrap_err();
    assert!(err.is_js_error());
    assert!(err.to_string().starts_with("a is not defined"));

    let err = context.evaluate("var o = {}; o.f();").unwrap_err();
    assert!(err.to_string().contains("not a function"));

    let err = context.evaluate("throw 'plain';").unwrap_err();
    assert_eq!(err.to_string(), "plain");
}

#[test]
fn test_on_error_sees_thrown_errors() {
    let context = context();
    context
        .evaluate("var seen; function onError(e) { seen = e.message; }")
        .unwrap();

    let err = context.evaluate("throw new Error('boom');").unwrap_err();
    assert!(err.to_string().starts_with("boom"));
    assert_eq!(context.evaluate("seen").unwrap(), JsValue::String("boom".into()));
}

#[test]
fn test_failed_evaluation_is_never_a_value() {
    let context = context();
    for source in ["undefinedFn()", "var x = {}; x.foo()", "function f() { f() } f()"] {
        let result = context.evaluate(source);
        assert!(result.is_err(), "{source} evaluated to {result:?}");
    }

    let bytecode = context.compile("missingFn()", "job.js").unwrap();
    let err = context.execute(&bytecode).unwrap_err();
    assert!(err.to_string().starts_with("missingFn is not defined"));
    assert_eq!(context.evaluate("1 + 1").unwrap(), JsValue::Int(2));
}

#[test]
fn test_error_objects_are_plain_values() {
    let context = context();

    let error = context.evaluate("new Error('x')").unwrap();
    let object = error.as_object().unwrap();
    assert_eq!(object.get_string("message").unwrap(), Some("x".into()));
    error.release().unwrap();

    let holder = context.evaluate("({ err: new TypeError('t') })").unwrap();
    let inner = holder.as_object().unwrap().get_property("err").unwrap();
    assert_eq!(
        inner.as_object().unwrap().get_string("name").unwrap(),
        Some("TypeError".into())
    );
    inner.release().unwrap();
    holder.release().unwrap();

    // nothing left pending from the conversions above
    let err = context.evaluate("nope()").unwrap_err();
    assert!(err.to_string().starts_with("nope is not defined"), "{err}");
    assert_eq!(context.live_handle_count().unwrap(), 0);
}

#[test]
fn test_array_buffers_and_symbols() {
    let context = context();
    assert_eq!(
        context.evaluate("new Uint8Array([4, 5]).buffer").unwrap(),
        JsValue::Bytes(vec![4, 5])
    );
    assert_eq!(
        context.evaluate("Symbol('tag')").unwrap(),
        JsValue::String("Symbol(tag)".into())
    );
    assert_eq!(
        context.evaluate("Symbol()").unwrap(),
        JsValue::String("Symbol()".into())
    );
}

#[test]
fn test_get_int_accepts_json_integers() {
    let context = context();
    let value = context
        .parse(r#"{"n": 1, "big": 4294967296, "half": 1.5}"#)
        .unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.get_int("n").unwrap(), Some(1));
    assert_eq!(object.get_int("big").unwrap(), None);
    assert_eq!(object.get_long("big").unwrap(), Some(4_294_967_296));
    assert_eq!(object.get_int("half").unwrap(), None);
    value.release().unwrap();
}

#[test]
fn test_stack_overflow() {
    let context = context();
    let err = context
        .evaluate("function f() { return f() + 1; } f();")
        .unwrap_err();
    assert!(matches!(err, BridgeError::ResourceLimit(_)));
    assert!(err.is_js_error());
    assert!(err.to_string().contains("stack overflow"));
}

#[test]
fn test_console_routes_to_sink() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let context = Context::with_config(ContextConfig::new().console(
        move |level: ConsoleLevel, text: &str| sink.borrow_mut().push((level, text.to_string())),
    ))
    .unwrap();

    context
        .evaluate("console.log('hello', 1, { a: 1 }); console.warn(['x']);")
        .unwrap();
    assert_eq!(
        *lines.borrow(),
        vec![
            (ConsoleLevel::Log, "hello 1 { a: 1 }".to_string()),
            (ConsoleLevel::Warn, "[ 'x' ]".to_string()),
        ]
    );

    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    context
        .set_console(move |level: ConsoleLevel, text: &str| {
            sink.borrow_mut().push(format!("{level:?} {text}"))
        })
        .unwrap();
    context.evaluate("console.error('bad')").unwrap();
    assert_eq!(*errors.borrow(), vec!["Error bad".to_string()]);
}

#[test]
fn test_memory_usage_and_gc() {
    let context = context();
    let stats = context.memory_usage().unwrap();
    assert!(stats.object_count > 0);
    assert!(stats.memory_used > 0);
    context.run_gc().unwrap();
}

#[test]
fn test_default_file_name_in_stack() {
    let context = Context::with_config(ContextConfig::new().default_file_name("main.js")).unwrap();
    let err = context.evaluate("function f() { a(); } f();").unwrap_err();
    assert!(err.to_string().contains("main.js"));

    let err = context
        .evaluate_with_name("function g() { b(); } g();", "other.js")
        .unwrap_err();
    assert!(err.to_string().contains("other.js"));
}
