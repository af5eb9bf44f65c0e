// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prototype-based object record.
//!
//! An [`ObjectData`] pairs a [`ShapeId`] with a dense slot vector. Objects
//! that fall off the fast path (a property is deleted, or an attribute is
//! changed after creation) flip to dictionary mode, where an overflow
//! descriptor map becomes authoritative and the shape is only used for the
//! properties that predate the transition.

use ahash::AHashMap;

use crate::context::{Agent, JsResult};
use crate::error::ErrorKind;
use crate::function::FunctionRef;
use crate::shape::{Attributes, PropertyKey, ShapeId, ShapeTable};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub(crate) u32);

/// The object-type tag from "Object". The interpreter and JIT
/// dispatch on this instead of virtual-call inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Ordinary,
    Array,
    Arguments,
    Promise,
    Error,
    RegExp,
    Map,
    Set,
    WeakMap,
    WeakSet,
    ArrayBuffer,
    TypedArray,
    Custom,
}

#[derive(Debug, Clone)]
pub enum PropertyDescriptor {
    Data { value: Value, writable: bool, enumerable: bool, configurable: bool },
    Accessor { get: Option<FunctionRef>, set: Option<FunctionRef>, enumerable: bool, configurable: bool },
}

impl PropertyDescriptor {
    pub fn enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. } => *enumerable,
            PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. } => *configurable,
            PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }
}

#[derive(Debug)]
pub struct ObjectData {
    pub shape: ShapeId,
    /// Dense values parallel to `shape`'s slot table. Empty once the object
    /// is in dictionary mode.
    pub slots: Vec<Value>,
    /// Authoritative once non-`None`: accessors, deleted slots, or any
    /// attribute that deviates from what the shape recorded.
    pub overflow: Option<AHashMap<PropertyKey, PropertyDescriptor>>,
    pub prototype: Option<ObjectRef>,
    pub kind: ObjectKind,
    pub extensible: bool,
    pub sealed: bool,
    pub frozen: bool,
    /// Only meaningful for `ObjectKind::Array`; kept denormalized so
    /// `length` reads don't need a shape lookup.
    pub array_length: u32,
}

impl ObjectData {
    pub fn new(prototype: Option<ObjectRef>, kind: ObjectKind) -> Self {
        ObjectData {
            shape: ShapeTable::ROOT,
            slots: Vec::new(),
            overflow: None,
            prototype,
            kind,
            extensible: true,
            sealed: false,
            frozen: false,
            array_length: 0,
        }
    }

    pub fn is_dictionary(&self) -> bool {
        self.overflow.is_some()
    }

    fn drop_to_dictionary(&mut self, shapes: &ShapeTable) {
        if self.overflow.is_some() {
            return;
        }
        let mut map = AHashMap::new();
        for entry in shapes.get(self.shape).entries.iter() {
            let value = self.slots[entry.slot as usize].clone();
            map.insert(
                entry.key,
                PropertyDescriptor::Data {
                    value,
                    writable: entry.attributes.writable,
                    enumerable: entry.attributes.enumerable,
                    configurable: entry.attributes.configurable,
                },
            );
        }
        self.overflow = Some(map);
    }

    fn own_descriptor(&self, shapes: &ShapeTable, key: PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(map) = &self.overflow {
            return map.get(&key).cloned();
        }
        let shape = shapes.get(self.shape);
        shape.find(key).map(|entry| PropertyDescriptor::Data {
            value: self.slots[entry.slot as usize].clone(),
            writable: entry.attributes.writable,
            enumerable: entry.attributes.enumerable,
            configurable: entry.attributes.configurable,
        })
    }
}

impl Agent {
    /// `get`: own data slot, else own
    /// accessor (invoked with `this = receiver`), else walk the prototype
    /// chain. Undefined at the end of the chain.
    pub fn get_property(&mut self, obj: ObjectRef, key: PropertyKey, receiver: Value) -> JsResult<Value> {
        let mut current = Some(obj);
        while let Some(o) = current {
            let data = &self.objects[o.0 as usize];
            match data.own_descriptor(&self.shapes, key) {
                Some(PropertyDescriptor::Data { value, .. }) => return Ok(value),
                Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => {
                    return self.call(&Value::Function(getter), receiver, &[]);
                }
                Some(PropertyDescriptor::Accessor { get: None, .. }) => return Ok(Value::Undefined),
                None => current = data.prototype,
            }
        }
        Ok(Value::Undefined)
    }

    /// `set`: own slot first; only walk the prototype chain to
    /// detect an inherited accessor or non-writable same-named property
    /// that blocks assignment. Creates a new own property (and a shape
    /// transition) on a clean miss.
    pub fn set_property(&mut self, obj: ObjectRef, key: PropertyKey, value: Value, receiver: Value, strict: bool) -> JsResult<bool> {
        if self.objects[obj.0 as usize].frozen {
            return if strict {
                Err(self.throw(ErrorKind::Type, "cannot assign to a frozen object"))
            } else {
                Ok(false)
            };
        }
        if let Some(desc) = self.objects[obj.0 as usize].own_descriptor(&self.shapes, key) {
            return match desc {
                PropertyDescriptor::Data { writable: false, .. } => {
                    if strict {
                        Err(self.throw(ErrorKind::Type, "cannot assign to read only property"))
                    } else {
                        Ok(false)
                    }
                }
                PropertyDescriptor::Data { .. } => {
                    self.write_own_slot(obj, key, value);
                    Ok(true)
                }
                PropertyDescriptor::Accessor { set: Some(setter), .. } => {
                    self.call(&Value::Function(setter), receiver, &[value])?;
                    Ok(true)
                }
                PropertyDescriptor::Accessor { set: None, .. } => {
                    if strict {
                        Err(self.throw(ErrorKind::Type, "cannot set property which has only a getter"))
                    } else {
                        Ok(false)
                    }
                }
            };
        }
        // Walk the prototype chain looking only for a blocking inherited
        // member; ordinary data properties up the chain do not block a new
        // own property from being created.
        let mut proto = self.objects[obj.0 as usize].prototype;
        while let Some(p) = proto {
            match self.objects[p.0 as usize].own_descriptor(&self.shapes, key) {
                Some(PropertyDescriptor::Data { writable: false, .. }) => {
                    return if strict { Err(self.throw(ErrorKind::Type, "cannot assign to read only property")) } else { Ok(false) };
                }
                Some(PropertyDescriptor::Accessor { set, .. }) => {
                    return match set {
                        Some(setter) => {
                            self.call(&Value::Function(setter), receiver, &[value])?;
                            Ok(true)
                        }
                        None => {
                            if strict {
                                Err(self.throw(ErrorKind::Type, "cannot set property which has only a getter"))
                            } else {
                                Ok(false)
                            }
                        }
                    };
                }
                Some(PropertyDescriptor::Data { .. }) => break,
                None => proto = self.objects[p.0 as usize].prototype,
            }
        }
        if !self.objects[obj.0 as usize].extensible {
            return if strict { Err(self.throw(ErrorKind::Type, "cannot add property, object is not extensible")) } else { Ok(false) };
        }
        self.define_own_data_property(obj, key, value, Attributes::USER);
        Ok(true)
    }

    fn write_own_slot(&mut self, obj: ObjectRef, key: PropertyKey, value: Value) {
        let data = &mut self.objects[obj.0 as usize];
        if let Some(map) = &mut data.overflow {
            if let Some(PropertyDescriptor::Data { value: slot, .. }) = map.get_mut(&key) {
                *slot = value;
            }
            return;
        }
        let slot = self.shapes.get(data.shape).find(key).unwrap().slot;
        data.slots[slot as usize] = value;
    }

    /// Defines an own data property, transitioning the shape for a new key
    /// on the fast path. A key that already has an own data descriptor is
    /// overwritten in place instead of pushing a second, shadowed slot —
    /// otherwise a repeated key (`{ a: 1, a: 2 }`, or a static class field
    /// declared twice) would read back the first value instead of the last.
    pub fn define_own_data_property(&mut self, obj: ObjectRef, key: PropertyKey, value: Value, attributes: Attributes) {
        let existing = self.objects[obj.0 as usize].own_descriptor(&self.shapes, key);
        if matches!(existing, Some(PropertyDescriptor::Data { .. })) {
            self.write_own_slot(obj, key, value);
            return;
        }
        let data = &mut self.objects[obj.0 as usize];
        if let Some(map) = &mut data.overflow {
            map.insert(key, PropertyDescriptor::Data { value, writable: attributes.writable, enumerable: attributes.enumerable, configurable: attributes.configurable });
            return;
        }
        let new_shape = self.shapes.transition(data.shape, key, attributes);
        data.shape = new_shape;
        data.slots.push(value);
    }

    pub fn define_own_accessor_property(&mut self, obj: ObjectRef, key: PropertyKey, get: Option<FunctionRef>, set: Option<FunctionRef>, enumerable: bool, configurable: bool) {
        let data = &mut self.objects[obj.0 as usize];
        data.drop_to_dictionary(&self.shapes);
        data.overflow.as_mut().unwrap().insert(key, PropertyDescriptor::Accessor { get, set, enumerable, configurable });
    }

    pub fn has_property(&self, obj: ObjectRef, key: PropertyKey) -> bool {
        let mut current = Some(obj);
        while let Some(o) = current {
            let data = &self.objects[o.0 as usize];
            if data.own_descriptor(&self.shapes, key).is_some() {
                return true;
            }
            current = data.prototype;
        }
        false
    }

    /// `delete` moves the object to dictionary mode (deletions always fall
    /// off the fast path,) and removes the key. Non-configurable
    /// own properties cannot be deleted.
    pub fn delete_property(&mut self, obj: ObjectRef, key: PropertyKey, strict: bool) -> JsResult<bool> {
        let data = &mut self.objects[obj.0 as usize];
        data.drop_to_dictionary(&self.shapes);
        let map = data.overflow.as_mut().unwrap();
        match map.get(&key) {
            None => Ok(true),
            Some(desc) if desc.configurable() => {
                map.remove(&key);
                Ok(true)
            }
            Some(_) => {
                if strict {
                    Err(self.throw(ErrorKind::Type, "cannot delete non-configurable property"))
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// `own_property_keys`: integer-like keys ascending, then string keys
    /// in insertion order, then symbol keys in insertion order
    /// (OrdinaryOwnPropertyKeys, "Enumeration").
    pub fn own_property_keys(&self, obj: ObjectRef) -> Vec<PropertyKey> {
        let data = &self.objects[obj.0 as usize];
        let mut indices = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();
        let mut push = |key: PropertyKey| match key {
            PropertyKey::Index(i) => indices.push(i),
            PropertyKey::Interned(_) => strings.push(key),
            PropertyKey::Symbol(_) => symbols.push(key),
        };
        if let Some(map) = &data.overflow {
            for key in map.keys() {
                push(*key);
            }
        } else {
            for entry in data.entries_iter(&self.shapes) {
                push(entry.key);
            }
        }
        indices.sort_unstable();
        let mut out: Vec<PropertyKey> = indices.into_iter().map(PropertyKey::Index).collect();
        out.extend(strings);
        out.extend(symbols);
        out
    }

    pub fn prevent_extensions(&mut self, obj: ObjectRef) {
        self.objects[obj.0 as usize].extensible = false;
    }

    /// `seal`/`freeze` are monotonic: once set they cannot be relaxed, so these only ever
    /// flip the flags on.
    pub fn seal(&mut self, obj: ObjectRef) {
        self.prevent_extensions(obj);
        self.objects[obj.0 as usize].sealed = true;
        let data = &mut self.objects[obj.0 as usize];
        data.drop_to_dictionary(&self.shapes);
        for desc in data.overflow.as_mut().unwrap().values_mut() {
            match desc {
                PropertyDescriptor::Data { configurable, .. } => *configurable = false,
                PropertyDescriptor::Accessor { configurable, .. } => *configurable = false,
            }
        }
    }

    pub fn freeze(&mut self, obj: ObjectRef) {
        self.seal(obj);
        self.objects[obj.0 as usize].frozen = true;
        let data = &mut self.objects[obj.0 as usize];
        for desc in data.overflow.as_mut().unwrap().values_mut() {
            if let PropertyDescriptor::Data { writable, .. } = desc {
                *writable = false;
            }
        }
    }

    pub fn is_extensible(&self, obj: ObjectRef) -> bool {
        self.objects[obj.0 as usize].extensible
    }

    /// Array `length` write truncates elements above the new length; a
    /// write to an index past `length - 1` grows `length`.
    pub fn set_array_length(&mut self, obj: ObjectRef, new_length: u32) {
        let data = &mut self.objects[obj.0 as usize];
        debug_assert_eq!(data.kind, ObjectKind::Array);
        if new_length < data.array_length {
            let stale: Vec<PropertyKey> = (new_length..data.array_length).map(PropertyKey::Index).collect();
            for key in stale {
                let _ = self.delete_property(obj, key, false);
            }
        }
        self.objects[obj.0 as usize].array_length = new_length;
    }

    pub fn array_length(&self, obj: ObjectRef) -> u32 {
        self.objects[obj.0 as usize].array_length
    }

    pub fn array_push_element(&mut self, obj: ObjectRef, index: u32, value: Value) {
        let key = PropertyKey::Index(index);
        let already_own = matches!(self.objects[obj.0 as usize].own_descriptor(&self.shapes, key), Some(PropertyDescriptor::Data { .. }));
        if already_own {
            self.write_own_slot(obj, key, value);
        } else {
            self.define_own_data_property(obj, key, value, Attributes::USER);
        }
        let data = &mut self.objects[obj.0 as usize];
        if index >= data.array_length {
            data.array_length = index + 1;
        }
    }

    /// `length` reads on an Array are not an ordinary own property lookup:
    /// the slot is denormalized onto `array_length` rather than stored in
    /// the shape/overflow map. Returns `None` for non-Arrays or any
    /// other key, signalling the caller should fall back to `get_property`.
    pub fn array_length_get(&self, obj: ObjectRef, key: PropertyKey) -> Option<Value> {
        let data = &self.objects[obj.0 as usize];
        if data.kind != ObjectKind::Array {
            return None;
        }
        match key {
            PropertyKey::Interned(id) if self.resolve_interned(id) == "length" => Some(Value::Number(data.array_length as f64)),
            _ => None,
        }
    }

    /// Mirrors [`Self::array_length_get`] for writes. Returns `Ok(Some(()))` when handled, `Ok(None)` when the
    /// caller should fall back to the ordinary `set_property` path (not an
    /// Array, or a key other than `length`/a numeric index).
    pub fn array_length_set(&mut self, obj: ObjectRef, key: PropertyKey, value: Value) -> JsResult<Option<()>> {
        if self.objects[obj.0 as usize].kind != ObjectKind::Array {
            return Ok(None);
        }
        match key {
            PropertyKey::Interned(id) if self.resolve_interned(id) == "length" => {
                let n = value.to_number(self)?;
                if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                    return Err(self.throw(ErrorKind::Range, "invalid array length"));
                }
                self.set_array_length(obj, n as u32);
                Ok(Some(()))
            }
            PropertyKey::Index(i) => {
                self.array_push_element(obj, i, value);
                Ok(Some(()))
            }
            _ => Ok(None),
        }
    }
}

/// Helper iterator over an object's fast-path (shape-backed) entries,
/// avoiding an allocation when the caller just wants to enumerate.
impl ObjectData {
    fn entries_iter<'a>(&'a self, shapes: &'a ShapeTable) -> impl Iterator<Item = crate::shape::ShapeEntry> + 'a {
        shapes.get(self.shape).entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Agent, EngineOptions};

    #[test]
    fn get_falls_back_through_prototype_chain() {
        let mut agent = Agent::new(EngineOptions::default());
        let proto = agent.new_object(None, ObjectKind::Ordinary);
        let key = PropertyKey::Interned(agent.intern("greeting"));
        agent.define_own_data_property(proto, key, Value::from_str("hi"), Attributes::USER);
        let child = agent.new_object(Some(proto), ObjectKind::Ordinary);
        let result = agent.get_property(child, key, Value::Object(child)).unwrap();
        assert!(matches!(result, Value::String(s) if &*s == "hi"));
    }

    #[test]
    fn get_on_missing_key_returns_undefined() {
        let mut agent = Agent::new(EngineOptions::default());
        let obj = agent.new_object(None, ObjectKind::Ordinary);
        let key = PropertyKey::Interned(agent.intern("missing"));
        let result = agent.get_property(obj, key, Value::Object(obj)).unwrap();
        assert!(matches!(result, Value::Undefined));
    }

    #[test]
    fn set_on_frozen_object_is_noop_in_sloppy_mode() {
        let mut agent = Agent::new(EngineOptions::default());
        let obj = agent.new_object(None, ObjectKind::Ordinary);
        agent.freeze(obj);
        let key = PropertyKey::Interned(agent.intern("x"));
        let ok = agent.set_property(obj, key, Value::Number(1.0), Value::Object(obj), false).unwrap();
        assert!(!ok);
        assert!(!agent.has_property(obj, key));
    }

    #[test]
    fn set_on_frozen_object_throws_in_strict_mode() {
        let mut agent = Agent::new(EngineOptions::default());
        let obj = agent.new_object(None, ObjectKind::Ordinary);
        agent.freeze(obj);
        let key = PropertyKey::Interned(agent.intern("x"));
        let result = agent.set_property(obj, key, Value::Number(1.0), Value::Object(obj), true);
        assert!(result.is_err());
    }

    #[test]
    fn array_length_write_truncates_elements() {
        let mut agent = Agent::new(EngineOptions::default());
        let arr = agent.new_object(None, ObjectKind::Array);
        agent.array_push_element(arr, 0, Value::Number(1.0));
        agent.array_push_element(arr, 1, Value::Number(2.0));
        agent.array_push_element(arr, 2, Value::Number(3.0));
        agent.set_array_length(arr, 1);
        assert_eq!(agent.objects[arr.0 as usize].array_length, 1);
        assert!(!agent.has_property(arr, PropertyKey::Index(1)));
    }

    #[test]
    fn own_property_keys_orders_indices_then_strings_then_symbols() {
        let mut agent = Agent::new(EngineOptions::default());
        let obj = agent.new_object(None, ObjectKind::Ordinary);
        let b = PropertyKey::Interned(agent.intern("b"));
        let a = PropertyKey::Interned(agent.intern("a"));
        agent.define_own_data_property(obj, b, Value::Undefined, Attributes::USER);
        agent.define_own_data_property(obj, PropertyKey::Index(2), Value::Undefined, Attributes::USER);
        agent.define_own_data_property(obj, a, Value::Undefined, Attributes::USER);
        agent.define_own_data_property(obj, PropertyKey::Index(0), Value::Undefined, Attributes::USER);
        let keys = agent.own_property_keys(obj);
        assert_eq!(keys, vec![PropertyKey::Index(0), PropertyKey::Index(2), b, a]);
    }
}
