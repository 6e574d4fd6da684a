//! FactIndex: an in-memory triple store for fact-pattern constraints.
//!
//! Facts are `(entity, attribute, value)` triples over interned [`Value`]s.
//! Each column keeps `value id -> {fact ids}` as a Roaring bitmap, so the
//! facts matching any combination of bound positions are the intersection of
//! at most three bitmaps.
//!
//! Retracted facts keep their id (the id space only grows); snapshots written
//! with [`FactIndex::to_bytes`] compact them away.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use ahash::AHashMap;
use dashmap::DashMap;
use roaring::RoaringBitmap;

use crate::error::{JoinError, Result};
use crate::value::Value;

// ============================================================================
// Value interning
// ============================================================================

/// Interned value ID.
pub type ValueId = u32;

/// Value interner: maps values to compact IDs and back.
#[derive(Debug)]
pub struct ValueInterner {
    to_id: DashMap<Value, ValueId>,
    to_value: DashMap<ValueId, Value>,
    next_id: AtomicU32,
}

impl ValueInterner {
    pub fn new() -> Self {
        Self {
            to_id: DashMap::new(),
            to_value: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a value, returning its ID
    pub fn intern(&self, value: &Value) -> ValueId {
        if let Some(id) = self.to_id.get(value) {
            return *id;
        }
        *self.to_id.entry(value.clone()).or_insert_with(|| {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.to_value.insert(id, value.clone());
            id
        })
    }

    /// Look up an existing ID without inserting.
    pub fn id_of(&self, value: &Value) -> Option<ValueId> {
        self.to_id.get(value).map(|id| *id)
    }

    pub fn lookup(&self, id: ValueId) -> Option<Value> {
        self.to_value.get(&id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ValueInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fact index
// ============================================================================

/// A column of a fact triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Entity = 0,
    Attribute = 1,
    Value = 2,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Entity, Position::Attribute, Position::Value];

    pub const fn column(self) -> usize {
        self as usize
    }
}

pub type FactId = u32;

#[derive(Debug, Default)]
pub struct FactIndex {
    interner: ValueInterner,
    /// `fact id -> (entity, attribute, value)`; retracted slots stay in place.
    facts: Vec<[ValueId; 3]>,
    live: RoaringBitmap,
    by_triple: AHashMap<[ValueId; 3], FactId>,
    /// Per position: `value id -> {fact ids}`.
    columns: [AHashMap<ValueId, RoaringBitmap>; 3],
}

impl FactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts<E, A, V>(facts: impl IntoIterator<Item = (E, A, V)>) -> Self
    where
        E: Into<Value>,
        A: Into<Value>,
        V: Into<Value>,
    {
        let mut index = Self::new();
        for (e, a, v) in facts {
            index.insert(e, a, v);
        }
        index
    }

    /// Add a fact. Returns `false` when it was already present.
    pub fn insert(
        &mut self,
        entity: impl Into<Value>,
        attribute: impl Into<Value>,
        value: impl Into<Value>,
    ) -> bool {
        let triple = [
            self.interner.intern(&entity.into()),
            self.interner.intern(&attribute.into()),
            self.interner.intern(&value.into()),
        ];
        if self.by_triple.contains_key(&triple) {
            return false;
        }
        let id = self.facts.len() as FactId;
        self.facts.push(triple);
        self.live.insert(id);
        self.by_triple.insert(triple, id);
        for (column, &value_id) in self.columns.iter_mut().zip(&triple) {
            column
                .entry(value_id)
                .or_insert_with(RoaringBitmap::new)
                .insert(id);
        }
        true
    }

    /// Remove a fact. Returns `false` when it was not present.
    pub fn retract(&mut self, entity: &Value, attribute: &Value, value: &Value) -> bool {
        let Some(triple) = self.triple_ids(entity, attribute, value) else {
            return false;
        };
        let Some(id) = self.by_triple.remove(&triple) else {
            return false;
        };
        self.live.remove(id);
        for (column, value_id) in self.columns.iter_mut().zip(&triple) {
            if let Some(bitmap) = column.get_mut(value_id) {
                bitmap.remove(id);
                if bitmap.is_empty() {
                    column.remove(value_id);
                }
            }
        }
        true
    }

    pub fn contains(&self, entity: &Value, attribute: &Value, value: &Value) -> bool {
        self.triple_ids(entity, attribute, value)
            .is_some_and(|t| self.by_triple.contains_key(&t))
    }

    pub fn len(&self) -> usize {
        self.live.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn id_of(&self, value: &Value) -> Option<ValueId> {
        self.interner.id_of(value)
    }

    pub fn value_of(&self, id: ValueId) -> Option<Value> {
        self.interner.lookup(id)
    }

    pub fn fact(&self, id: FactId) -> Option<[ValueId; 3]> {
        if !self.live.contains(id) {
            return None;
        }
        self.facts.get(id as usize).copied()
    }

    /// Number of live facts with `id` at `position`.
    pub fn count(&self, position: Position, id: ValueId) -> u64 {
        self.columns[position.column()]
            .get(&id)
            .map(RoaringBitmap::len)
            .unwrap_or(0)
    }

    /// Facts whose bound positions hold the given value ids.
    ///
    /// Intersects from the smallest column bitmap upward; with nothing bound
    /// this is every live fact.
    pub fn matching(&self, bound: &[(Position, ValueId)]) -> RoaringBitmap {
        let mut bitmaps: Vec<&RoaringBitmap> = Vec::with_capacity(bound.len());
        for &(position, id) in bound {
            match self.columns[position.column()].get(&id) {
                Some(bitmap) => bitmaps.push(bitmap),
                None => return RoaringBitmap::new(),
            }
        }
        bitmaps.sort_by_key(|b| b.len());
        let mut iter = bitmaps.into_iter();
        let Some(first) = iter.next() else {
            return self.live.clone();
        };
        let mut out = first.clone();
        for bitmap in iter {
            out &= bitmap;
            if out.is_empty() {
                break;
            }
        }
        out
    }

    /// Iterate live facts in insertion order, resolved to values.
    pub fn iter(&self) -> impl Iterator<Item = (Value, Value, Value)> + '_ {
        self.live.iter().filter_map(move |id| {
            let [e, a, v] = self.facts[id as usize];
            Some((
                self.interner.lookup(e)?,
                self.interner.lookup(a)?,
                self.interner.lookup(v)?,
            ))
        })
    }

    fn triple_ids(&self, entity: &Value, attribute: &Value, value: &Value) -> Option<[ValueId; 3]> {
        Some([
            self.interner.id_of(entity)?,
            self.interner.id_of(attribute)?,
            self.interner.id_of(value)?,
        ])
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Serialize live facts to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let facts: Vec<(Value, Value, Value)> = self.iter().collect();
        Ok(bincode::serialize(&facts)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let facts: Vec<(Value, Value, Value)> = bincode::deserialize(bytes)?;
        Ok(Self::from_facts(facts))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| JoinError::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }
}
