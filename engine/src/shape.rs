// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hidden-class property layout.
//!
//! Two objects built by the same code path transition through the same
//! sequence of shapes and therefore end up sharing a `ShapeId`, which is
//! what lets the interpreter's and JIT's inline caches be monomorphic.
//! Shapes themselves are arena-allocated and never freed individually (the
//! whole arena goes away with the [`Agent`](crate::context::Agent)); the
//! transition table that links them is a process-global, insert-only
//! memoization because two unrelated
//! objects in the same engine instance that add the same property in the
//! same order should still end up sharing structure.

use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

/// Property keys are interned to small integers (array index, or an
/// interned-string id) so they stay `Copy` and hashable without touching
/// the `Rc<str>` arena on every shape lookup. String identity is resolved
/// through `Agent::intern`/`Agent::resolve_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Index(u32),
    Interned(u32),
    Symbol(crate::value::SymbolRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    pub is_accessor: bool,
}

impl Attributes {
    /// Default attributes for a property created by ordinary script code
    ///.
    pub const USER: Attributes = Attributes { writable: true, enumerable: true, configurable: true, is_accessor: false };
    /// Built-in constants: writable only.
    pub const CONSTANT: Attributes = Attributes { writable: true, enumerable: false, configurable: false, is_accessor: false };
    /// `length` on functions: non-enumerable, non-writable, configurable.
    pub const FUNCTION_LENGTH: Attributes = Attributes { writable: false, enumerable: false, configurable: true, is_accessor: false };
}

/// One entry in a shape's property layout: the key, its attributes at the
/// time it was added, and the slot index into the owning object's dense
/// value vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeEntry {
    pub key: PropertyKey,
    pub attributes: Attributes,
    pub slot: u32,
}

#[derive(Debug)]
pub struct ShapeData {
    pub parent: Option<ShapeId>,
    /// The `(key, attributes)` pair that distinguishes this shape from its
    /// parent; `None` only for the root (empty) shape.
    pub added: Option<ShapeEntry>,
    /// Full property list, root-to-here, recomputed once and cached so
    /// `own_property_keys` doesn't have to walk the shape chain per call.
    pub entries: Rc<Vec<ShapeEntry>>,
}

impl ShapeData {
    pub fn slot_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn find(&self, key: PropertyKey) -> Option<&ShapeEntry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransitionKey {
    parent: ShapeId,
    key: PropertyKey,
    attributes: Attributes,
}

/// Arena of shapes plus the transition cache. Lives on the `Agent`, not as
/// a true global, so that multiple `Agent`s in a test binary don't share
/// state; within one `Agent` it behaves like a process-global table
/// (insert-only, never mutated after insertion).
#[derive(Debug)]
pub struct ShapeTable {
    shapes: Vec<ShapeData>,
    transitions: HashMap<TransitionKey, ShapeId>,
}

impl Default for ShapeTable {
    fn default() -> Self {
        let root = ShapeData { parent: None, added: None, entries: Rc::new(Vec::new()) };
        ShapeTable { shapes: vec![root], transitions: HashMap::new() }
    }
}

impl ShapeTable {
    pub const ROOT: ShapeId = ShapeId(0);

    pub fn get(&self, id: ShapeId) -> &ShapeData {
        &self.shapes[id.0 as usize]
    }

    /// Transition `from` by adding `key` with `attributes`, reusing a
    /// cached child shape when the same triple was seen before.
    pub fn transition(&mut self, from: ShapeId, key: PropertyKey, attributes: Attributes) -> ShapeId {
        let tkey = TransitionKey { parent: from, key, attributes };
        if let Some(&existing) = self.transitions.get(&tkey) {
            return existing;
        }
        let parent_entries = &self.shapes[from.0 as usize].entries;
        let slot = parent_entries.len() as u32;
        let mut entries = (**parent_entries).clone();
        entries.push(ShapeEntry { key, attributes, slot });
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(ShapeData { parent: Some(from), added: Some(ShapeEntry { key, attributes, slot }), entries: Rc::new(entries) });
        self.transitions.insert(tkey, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_property_sequences_share_a_shape() {
        let mut table = ShapeTable::default();
        let a = table.transition(ShapeTable::ROOT, PropertyKey::Interned(1), Attributes::USER);
        let b = table.transition(ShapeTable::ROOT, PropertyKey::Interned(1), Attributes::USER);
        assert_eq!(a, b);
    }

    #[test]
    fn different_attributes_produce_distinct_shapes() {
        let mut table = ShapeTable::default();
        let a = table.transition(ShapeTable::ROOT, PropertyKey::Interned(1), Attributes::USER);
        let b = table.transition(ShapeTable::ROOT, PropertyKey::Interned(1), Attributes::CONSTANT);
        assert_ne!(a, b);
    }

    #[test]
    fn transition_chain_preserves_slot_order() {
        let mut table = ShapeTable::default();
        let s1 = table.transition(ShapeTable::ROOT, PropertyKey::Interned(1), Attributes::USER);
        let s2 = table.transition(s1, PropertyKey::Interned(2), Attributes::USER);
        let entries = &table.get(s2).entries;
        assert_eq!(entries[0].key, PropertyKey::Interned(1));
        assert_eq!(entries[1].key, PropertyKey::Interned(2));
    }
}
