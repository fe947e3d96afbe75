//! Host-side values

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::BridgeResult;
use crate::handle::{JsArray, JsFunction, JsObject};

type CallbackFn = dyn Fn(&Context, &[JsValue]) -> BridgeResult<JsValue>;

/// A host function exposed to script code.
///
/// Each time a callback is stored into a script object it gets its own
/// registry entry, dropped again once the script-side function is collected.
/// Handle arguments are released after the callback returns unless the
/// callback [`hold`](JsObject::hold)s them. A handle returned from the
/// callback moves to the script side.
#[derive(Clone)]
pub struct JsCallback {
    name: String,
    func: Rc<CallbackFn>,
}

impl JsCallback {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Context, &[JsValue]) -> BridgeResult<JsValue> + 'static,
    {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    /// Script-visible function name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, context: &Context, args: &[JsValue]) -> BridgeResult<JsValue> {
        (self.func)(context, args)
    }
}

impl PartialEq for JsCallback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for JsCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsCallback({})", self.name)
    }
}

/// Value exchanged with script code.
///
/// Script integers that fit 32 bits arrive as `Int`; other integral numbers
/// and BigInts as `Long`; anything else numeric as `Double`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Object(JsObject),
    Array(JsArray),
    Function(JsFunction),
    Callback(JsCallback),
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Any integral value as `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i as i64),
            Self::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Any numeric value as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Long(l) => Some(*l as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The handle behind an object, array or function
    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Self::Object(o) => Some(o),
            Self::Array(a) => Some(&**a),
            Self::Function(f) => Some(&**f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Release the handle carried by this value, if any
    pub fn release(&self) -> BridgeResult<()> {
        match self.as_object() {
            Some(object) => object.release(),
            None => Ok(()),
        }
    }

    /// `typeof`-style name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Long(_) | Self::Double(_) => "number",
            Self::String(_) => "string",
            Self::Bytes(_) => "arraybuffer",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Function(_) | Self::Callback(_) => "function",
        }
    }
}

impl From<()> for JsValue {
    fn from(_: ()) -> Self {
        Self::Undefined
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for JsValue {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<i64> for JsValue {
    fn from(l: i64) -> Self {
        Self::Long(l)
    }
}

impl From<f64> for JsValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for JsValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<JsObject> for JsValue {
    fn from(o: JsObject) -> Self {
        Self::Object(o)
    }
}

impl From<JsArray> for JsValue {
    fn from(a: JsArray) -> Self {
        Self::Array(a)
    }
}

impl From<JsFunction> for JsValue {
    fn from(f: JsFunction) -> Self {
        Self::Function(f)
    }
}

impl From<JsCallback> for JsValue {
    fn from(c: JsCallback) -> Self {
        Self::Callback(c)
    }
}

impl<T: Into<JsValue>> From<Option<T>> for JsValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
