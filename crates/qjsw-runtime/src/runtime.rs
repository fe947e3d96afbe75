//! Runtime owning a group of contexts

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::config::ContextConfig;
use crate::context::{Context, ContextShared};
use crate::error::{BridgeResult, UsageError};
use crate::thread::ThreadGuard;

/// Creates contexts and tears them all down together.
///
/// Dropping a runtime leaves its contexts running; call
/// [`destroy`](Runtime::destroy) to invalidate them.
pub struct Runtime {
    guard: ThreadGuard,
    contexts: RefCell<Vec<Weak<ContextShared>>>,
    destroyed: Cell<bool>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            guard: ThreadGuard::current(),
            contexts: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        }
    }

    pub fn create_context(&self) -> BridgeResult<Context> {
        self.create_context_with(ContextConfig::default())
    }

    pub fn create_context_with(&self, config: ContextConfig) -> BridgeResult<Context> {
        self.check()?;
        let context = Context::with_config(config)?;
        let mut contexts = self.contexts.borrow_mut();
        contexts.retain(|weak| weak.upgrade().is_some_and(|shared| shared.is_running()));
        contexts.push(Rc::downgrade(context.shared()?));
        Ok(context)
    }

    /// Contexts created here and not yet destroyed
    pub fn context_count(&self) -> BridgeResult<usize> {
        self.guard.check()?;
        Ok(self
            .contexts
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|shared| shared.is_running())
            .count())
    }

    /// Destroy every context still running
    pub fn destroy(&self) -> BridgeResult<()> {
        self.check()?;
        let contexts = std::mem::take(&mut *self.contexts.borrow_mut());
        let count = contexts.len();
        for shared in contexts.iter().filter_map(Weak::upgrade) {
            shared.teardown();
        }
        self.destroyed.set(true);
        debug!(contexts = count, "runtime destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn check(&self) -> BridgeResult<()> {
        self.guard.check()?;
        if self.destroyed.get() {
            return Err(UsageError::Destroyed.into());
        }
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
