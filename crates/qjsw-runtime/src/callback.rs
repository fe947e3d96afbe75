//! Host callbacks reachable from script code
//!
//! Callbacks live in slots addressed by [`CallbackId`]. A removed slot is
//! reused with a bumped generation, so a stale id from a collected script
//! function never reaches the slot's next occupant.

use std::cell::RefCell;

use qjsw_engine::CallbackId;

use crate::value::JsCallback;

struct Slot {
    generation: u32,
    callback: Option<JsCallback>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Default)]
pub(crate) struct CallbackRegistry {
    inner: RefCell<Slots>,
}

impl CallbackRegistry {
    pub(crate) fn register(&self, callback: JsCallback) -> CallbackId {
        let mut inner = self.inner.borrow_mut();
        inner.len += 1;
        match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.callback = Some(callback);
                CallbackId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    callback: Some(callback),
                });
                CallbackId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub(crate) fn get(&self, id: CallbackId) -> Option<JsCallback> {
        let inner = self.inner.borrow();
        inner
            .slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.callback.clone())
    }

    /// Remove `id`; false when it was already gone
    pub(crate) fn remove(&self, id: CallbackId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(slot) = inner.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.callback.is_none() {
            return false;
        }
        slot.callback = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(id.index);
        inner.len -= 1;
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.borrow().len
    }

    pub(crate) fn clear(&self) {
        let callbacks: Vec<JsCallback> = {
            let mut inner = self.inner.borrow_mut();
            let Slots { slots, free, len } = &mut *inner;
            *len = 0;
            slots
                .iter_mut()
                .enumerate()
                .filter_map(|(index, slot)| {
                    let callback = slot.callback.take()?;
                    slot.generation = slot.generation.wrapping_add(1);
                    free.push(index as u32);
                    Some(callback)
                })
                .collect()
        };
        // closures may capture handles; drop them outside the borrow
        drop(callbacks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::JsValue;

    fn callback(name: &str) -> JsCallback {
        JsCallback::new(name, |_, _| Ok(JsValue::Undefined))
    }

    #[test]
    fn test_register_and_get() {
        let registry = CallbackRegistry::default();
        let a = registry.register(callback("a"));
        let b = registry.register(callback("b"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a).unwrap().name(), "a");
        assert_eq!(registry.get(b).unwrap().name(), "b");
    }

    #[test]
    fn test_removed_slot_is_reused_with_new_generation() {
        let registry = CallbackRegistry::default();
        let a = registry.register(callback("a"));
        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert!(registry.get(a).is_none());

        let b = registry.register(callback("b"));
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.get(b).unwrap().name(), "b");

        // a stale id must not remove the new occupant
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_stay_unique_under_churn() {
        let registry = CallbackRegistry::default();
        let mut seen = std::collections::HashSet::new();
        for i in 0..100 {
            let id = registry.register(callback(&format!("cb{i}")));
            assert!(seen.insert(id));
            assert!(registry.remove(id));
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_clear() {
        let registry = CallbackRegistry::default();
        let a = registry.register(callback("a"));
        registry.register(callback("b"));
        registry.clear();
        assert_eq!(registry.len(), 0);
        assert!(registry.get(a).is_none());
        assert!(!registry.remove(a));
    }
}
