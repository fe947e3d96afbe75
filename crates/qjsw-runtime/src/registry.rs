//! Per-context record of live handles
//!
//! Every acquired handle is registered until its count reaches zero. The
//! record drives leak reports and the forced cleanup on context teardown.
//! The global object never enters it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::handle::{HandleCore, HandleId, JsObject};

/// Notified about handles still referenced when the registry is swept
pub trait LeakListener {
    fn notify_leak_detected(&self, handle: &JsObject, formatted: &str);
}

impl<F> LeakListener for F
where
    F: Fn(&JsObject, &str),
{
    fn notify_leak_detected(&self, handle: &JsObject, formatted: &str) {
        self(handle, formatted)
    }
}

#[derive(Default)]
pub(crate) struct ObjectRegistry {
    entries: RefCell<IndexMap<HandleId, Rc<HandleCore>>>,
    next_id: Cell<HandleId>,
}

impl ObjectRegistry {
    pub(crate) fn next_id(&self) -> HandleId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn register(&self, core: Rc<HandleCore>) {
        self.entries.borrow_mut().insert(core.id, core);
    }

    pub(crate) fn deregister(&self, id: HandleId) {
        self.entries.borrow_mut().shift_remove(&id);
    }

    /// Registered handles in acquisition order
    pub(crate) fn snapshot(&self) -> Vec<Rc<HandleCore>> {
        self.entries.borrow().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Weak;

    use qjsw_engine::{Engine, EngineOptions, QuickJsEngine, ValueKind};

    thread_local! {
        static ENGINE: QuickJsEngine = QuickJsEngine::new(&EngineOptions::default()).unwrap();
    }

    fn core(registry: &ObjectRegistry) -> Rc<HandleCore> {
        let ptr = ENGINE.with(|engine| engine.parse_json("{}").unwrap().ptr().unwrap());
        Rc::new(HandleCore {
            id: registry.next_id(),
            context: Weak::new(),
            ptr,
            kind: ValueKind::Object,
            this: None,
            refcount: Cell::new(1),
            global: false,
            stack_trace: None,
        })
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = ObjectRegistry::default();
        let a = core(&registry);
        registry.register(a.clone());
        let b = core(&registry);
        registry.register(b.clone());
        assert_eq!(registry.len(), 2);
        assert_ne!(a.id, b.id);

        registry.deregister(a.id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].id, b.id);

        registry.deregister(a.id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_keeps_order() {
        let registry = ObjectRegistry::default();
        let ids: Vec<_> = (0..5)
            .map(|_| {
                let c = core(&registry);
                registry.register(c.clone());
                c.id
            })
            .collect();
        registry.deregister(ids[2]);
        let remaining: Vec<_> = registry.snapshot().iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[1], ids[3], ids[4]]);
    }
}
