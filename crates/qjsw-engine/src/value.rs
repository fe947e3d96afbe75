//! Values crossing the engine boundary

use std::fmt;

/// Opaque identity of an engine object.
///
/// Two pointers are equal exactly when they name the same script object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(pub(crate) usize);

impl NativePtr {
    /// Raw address, for diagnostics only
    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:#x})", self.0)
    }
}

/// Kind tag carried by object values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Object,
    Array,
    Function,
}

/// Token identifying a host callback.
///
/// The slot index is reused once a callback is removed; the generation makes a
/// stale token distinguishable from the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A value produced by the engine.
///
/// Every `Object` carries one host retain on `ptr` (and one on `this`, when
/// present) that the receiver must eventually hand back through
/// [`Engine::free`](crate::Engine::free).
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    BigInt(i64),
    String(String),
    Bytes(Vec<u8>),
    Object {
        ptr: NativePtr,
        kind: ValueKind,
        this: Option<NativePtr>,
    },
}

impl RawValue {
    /// Pointer of an object value
    pub fn ptr(&self) -> Option<NativePtr> {
        match self {
            Self::Object { ptr, .. } => Some(*ptr),
            _ => None,
        }
    }
}

/// A value handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Float(f64),
    BigInt(i64),
    String(String),
    Bytes(Vec<u8>),
    /// Object the host keeps retaining; the engine takes its own reference
    Object(NativePtr),
    /// Object whose host retain moves to the engine
    Owned(NativePtr),
    /// Host callback exposed as a script function with the given name
    Callback(CallbackId, String),
}

/// Evaluation mode for source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Global,
    Module,
}

/// Snapshot of engine memory accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub malloc_size: i64,
    pub memory_used: i64,
    pub object_count: i64,
    pub string_count: i64,
}

/// Module text handed back by a module provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Source(String),
    Bytecode(Vec<u8>),
}
