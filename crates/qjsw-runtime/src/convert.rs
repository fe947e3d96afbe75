//! Deep conversion of script objects into host maps and lists

use indexmap::IndexMap;
use qjsw_engine::NativePtr;
use serde::Serialize;

use crate::error::BridgeResult;
use crate::handle::{JsArray, JsObject};
use crate::value::JsValue;

/// Detached copy of a script value.
///
/// Serializes to the JSON shape the value had in script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MapValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<MapValue>),
    Map(IndexMap<String, MapValue>),
}

/// Decides which keys `to_map` leaves out
pub trait MapFilter {
    fn should_skip_key(&self, key: &str, owner: &JsObject) -> bool;
}

impl<F> MapFilter for F
where
    F: Fn(&str, &JsObject) -> bool,
{
    fn should_skip_key(&self, key: &str, owner: &JsObject) -> bool {
        self(key, owner)
    }
}

struct Converter<'a> {
    filter: Option<&'a dyn MapFilter>,
    ancestors: Vec<NativePtr>,
}

impl Converter<'_> {
    fn object(&mut self, object: &JsObject) -> BridgeResult<IndexMap<String, MapValue>> {
        self.ancestors.push(object.pointer());
        let result = self.object_entries(object);
        self.ancestors.pop();
        result
    }

    fn object_entries(&mut self, object: &JsObject) -> BridgeResult<IndexMap<String, MapValue>> {
        let names = object.own_property_names()?;
        let keys = names.to_strings();
        names.release()?;

        let mut map = IndexMap::new();
        for key in keys? {
            if self
                .filter
                .is_some_and(|filter| filter.should_skip_key(&key, object))
            {
                continue;
            }
            let value = object.get_property(&key)?;
            let converted = self.value(&value);
            value.release()?;
            if let Some(converted) = converted? {
                map.insert(key, converted);
            }
        }
        Ok(map)
    }

    fn array(&mut self, array: &JsArray) -> BridgeResult<Vec<MapValue>> {
        self.ancestors.push(array.pointer());
        let result = self.array_items(array);
        self.ancestors.pop();
        result
    }

    fn array_items(&mut self, array: &JsArray) -> BridgeResult<Vec<MapValue>> {
        let mut list = Vec::new();
        for index in 0..array.length()? {
            let value = array.get(index)?;
            let converted = self.value(&value);
            value.release()?;
            if let Some(converted) = converted? {
                list.push(converted);
            }
        }
        Ok(list)
    }

    /// `None` for values that are left out: functions and back references
    fn value(&mut self, value: &JsValue) -> BridgeResult<Option<MapValue>> {
        let converted = match value {
            JsValue::Undefined | JsValue::Null => MapValue::Null,
            JsValue::Bool(b) => MapValue::Bool(*b),
            JsValue::Int(i) => MapValue::Int(*i),
            JsValue::Long(l) => MapValue::Long(*l),
            JsValue::Double(d) => MapValue::Double(*d),
            JsValue::String(s) => MapValue::String(s.clone()),
            JsValue::Bytes(b) => MapValue::Bytes(b.clone()),
            JsValue::Function(_) | JsValue::Callback(_) => return Ok(None),
            JsValue::Object(o) if self.ancestors.contains(&o.pointer()) => return Ok(None),
            JsValue::Array(a) if self.ancestors.contains(&a.pointer()) => return Ok(None),
            JsValue::Object(o) => MapValue::Map(self.object(o)?),
            JsValue::Array(a) => MapValue::List(self.array(a)?),
        };
        Ok(Some(converted))
    }
}

impl JsObject {
    /// Copy own enumerable properties into a map, recursively.
    ///
    /// Functions are skipped; a property pointing back at one of its
    /// ancestors is left out.
    pub fn to_map(&self) -> BridgeResult<IndexMap<String, MapValue>> {
        Converter {
            filter: None,
            ancestors: Vec::new(),
        }
        .object(self)
    }

    /// Like [`to_map`](Self::to_map), leaving out keys `filter` rejects
    pub fn to_map_filtered(&self, filter: &dyn MapFilter) -> BridgeResult<IndexMap<String, MapValue>> {
        Converter {
            filter: Some(filter),
            ancestors: Vec::new(),
        }
        .object(self)
    }
}

impl JsArray {
    /// Copy elements into a list, recursively
    pub fn to_list(&self) -> BridgeResult<Vec<MapValue>> {
        Converter {
            filter: None,
            ancestors: Vec::new(),
        }
        .array(self)
    }
}
