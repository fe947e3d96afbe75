//! Integration tests for the QuickJS engine capability

use std::collections::HashMap;
use std::rc::Rc;

use qjsw_engine::{
    Engine, EngineError, EngineOptions, EvalMode, ModuleProvider, ModuleSource, QuickJsEngine,
    RawValue,
};

struct MapProvider {
    modules: HashMap<String, ModuleSource>,
}

impl ModuleProvider for MapProvider {
    fn normalize(&self, _base: &str, name: &str) -> Result<String, String> {
        Ok(name.trim_start_matches("./").to_string())
    }

    fn load(&self, name: &str) -> Result<ModuleSource, String> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no module {name}"))
    }
}

fn engine() -> QuickJsEngine {
    QuickJsEngine::new(&EngineOptions::default()).unwrap()
}

#[test]
fn test_module_imports_through_provider() {
    let engine = engine();
    let mut modules = HashMap::new();
    modules.insert(
        "a.js".to_string(),
        ModuleSource::Source("export const name = 'Jack'; export const age = 18;".into()),
    );
    engine.set_module_provider(Some(Rc::new(MapProvider { modules })));

    engine
        .eval(
            "import { name, age } from './a.js'; globalThis.result = name + ':' + age;",
            "main.mjs",
            EvalMode::Module,
        )
        .unwrap();
    engine.drain_jobs().unwrap();

    assert_eq!(
        engine.eval("result", "check.js", EvalMode::Global).unwrap(),
        RawValue::String("Jack:18".into())
    );
}

#[test]
fn test_module_bytecode_through_provider() {
    let engine = engine();
    let bytes = engine
        .compile("export default 40 + 2;", "b.js", true)
        .unwrap();
    let mut modules = HashMap::new();
    modules.insert("b.js".to_string(), ModuleSource::Bytecode(bytes));
    engine.set_module_provider(Some(Rc::new(MapProvider { modules })));

    engine
        .eval(
            "import answer from 'b.js'; globalThis.answer = answer;",
            "main.mjs",
            EvalMode::Module,
        )
        .unwrap();
    engine.drain_jobs().unwrap();

    assert_eq!(
        engine.eval("answer", "check.js", EvalMode::Global).unwrap(),
        RawValue::Int(42)
    );
}

#[test]
fn test_provider_error_surfaces_verbatim() {
    let engine = engine();
    engine.set_module_provider(Some(Rc::new(MapProvider {
        modules: HashMap::new(),
    })));

    let err = engine
        .eval("import x from './missing.js';", "main.mjs", EvalMode::Module)
        .and_then(|_| engine.drain_jobs())
        .unwrap_err();
    assert!(matches!(err, EngineError::ModuleLoad(ref m) if m == "no module missing.js"));
}

#[test]
fn test_nested_calls_reenter_engine() {
    let engine = Rc::new(engine());
    let inner = Rc::downgrade(&engine);
    engine.set_callback_dispatcher(Rc::new(move |_, args| {
        let inner = inner.upgrade().ok_or("engine dropped")?;
        // evaluate while the outer script is still running
        let RawValue::Int(n) = args[0] else {
            return Err("expected int".into());
        };
        match inner.eval(&format!("{n} * 2"), "inner.js", EvalMode::Global) {
            Ok(RawValue::Int(doubled)) => Ok(qjsw_engine::ArgValue::Int(doubled)),
            other => Err(format!("unexpected {other:?}")),
        }
    }));

    let global = engine.global_object().unwrap();
    let ptr = global.ptr().unwrap();
    engine
        .set_property(
            ptr,
            "double",
            qjsw_engine::ArgValue::Callback(
                qjsw_engine::CallbackId {
                    index: 0,
                    generation: 0,
                },
                "double".into(),
            ),
        )
        .unwrap();

    assert_eq!(
        engine.eval("double(21)", "outer.js", EvalMode::Global).unwrap(),
        RawValue::Int(42)
    );
}

#[test]
fn test_async_error_in_bytecode() {
    let engine = engine();
    let bytes = engine
        .compile("async function test() { aa; } test();", "async.js", false)
        .unwrap();
    engine.execute(&bytes).unwrap();
    let err = engine.drain_jobs().unwrap_err();
    assert!(err.to_string().contains("aa is not defined"));
}
