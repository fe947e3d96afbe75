//! Single-owner-thread enforcement

use std::thread::{self, ThreadId};

use crate::error::UsageError;

/// Remembers the thread a context was created on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ThreadGuard {
    owner: ThreadId,
}

impl ThreadGuard {
    /// Bind to the calling thread
    pub(crate) fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub(crate) fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    pub(crate) fn check(&self) -> Result<(), UsageError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(UsageError::WrongThread)
        }
    }
}
