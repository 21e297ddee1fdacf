//! ValMap: value-keyed map over a canonical key registry and handle storage.

use crate::error::{Error, Result};
use crate::key_hash::{resolve, KeyHash, ValueKey};
use crate::options::ValMapOptions;
use core::hash::BuildHasher;
use hashbrown::hash_table;
use hashbrown::HashTable;
use serde::de::{Deserialize, DeserializeOwned, Deserializer, Error as _};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::fmt;

/// Stable name for one canonical entry. Stale handles never resolve, even
/// when the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub fn key<'a, K, V, S>(&self, map: &'a ValMap<K, V, S>) -> Option<&'a K> {
        map.slots.get(self.0).map(|e| &e.key)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a ValMap<K, V, S>) -> Option<&'a V> {
        map.slots.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut ValMap<K, V, S>) -> Option<&'a mut V> {
        map.slots.get_mut(self.0).map(|e| &mut e.value)
    }

    /// The hash the entry was registered under.
    pub fn hash<'a, K, V, S>(&self, map: &'a ValMap<K, V, S>) -> Option<&'a KeyHash> {
        map.slots.get(self.0).map(|e| &e.hash)
    }
}

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: KeyHash,
    hashed: u64,
}

/// A map whose keys are compared by value.
///
/// Each distinct `KeyHash` owns one slot. The first key stored under a hash
/// stays canonical until the entry is removed; later equal keys only
/// overwrite the value.
#[derive(Clone)]
pub struct ValMap<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    options: ValMapOptions,
}

impl<K, V> ValMap<K, V>
where
    K: ValueKey,
{
    pub fn new() -> Self {
        Self::with_options(ValMapOptions::default())
    }

    pub fn with_options(options: ValMapOptions) -> Self {
        Self::with_options_and_hasher(options, Default::default())
    }

    /// Build a map by applying `set` to each pair in order. Later pairs with
    /// an equal key overwrite the value but keep the earliest key.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        map.try_extend(pairs)?;
        Ok(map)
    }
}

impl<K, V> ValMap<K, V>
where
    K: ValueKey + DeserializeOwned,
    V: DeserializeOwned,
{
    /// Build a map from a dynamic initializer of the form
    /// `[[key, value], ...]`. `null` builds an empty map. Elements of a
    /// pair past the value are ignored.
    pub fn from_json(init: serde_json::Value) -> Result<Self> {
        let items = match init {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Array(items) => items,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "expected an array, found {}",
                    json_kind(&other)
                )))
            }
        };
        let mut map = Self::new();
        for (i, item) in items.into_iter().enumerate() {
            let (key, value): (K, V) = match item {
                serde_json::Value::Array(mut pair) if pair.len() >= 2 => {
                    pair.truncate(2);
                    serde_json::from_value(serde_json::Value::Array(pair))
                        .map_err(|e| Error::InvalidArgument(format!("pair {i}: {e}")))?
                }
                other => {
                    return Err(Error::InvalidArgument(format!(
                        "pair {i}: expected [key, value], found {}",
                        json_kind(&other)
                    )))
                }
            };
            map.set(key, value)?;
        }
        Ok(map)
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K, V> Default for ValMap<K, V>
where
    K: ValueKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ValMap<K, V, S>
where
    K: ValueKey,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_options_and_hasher(ValMapOptions::default(), hasher)
    }

    pub fn with_options_and_hasher(options: ValMapOptions, hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
            options,
        }
    }

    pub fn options(&self) -> &ValMapOptions {
        &self.options
    }

    /// Changing options does not rehash existing entries; they stay under
    /// the hash they were registered with.
    pub fn options_mut(&mut self) -> &mut ValMapOptions {
        &mut self.options
    }

    pub fn set_disable_to_string_hash(&mut self, disable: bool) -> &mut Self {
        self.options.disable_to_string_hash = disable;
        self
    }

    pub fn set_prevent_undefined_key(&mut self, prevent: bool) -> &mut Self {
        self.options.prevent_undefined_key = prevent;
        self
    }

    /// Resolve `key` the way every lookup on this map does.
    pub fn key_hash<Q>(&self, key: &Q) -> KeyHash
    where
        Q: ?Sized + ValueKey,
    {
        resolve(key, &self.options)
    }

    fn lookup(&self, hash: &KeyHash) -> Option<DefaultKey> {
        let hashed = self.hasher.hash_one(hash);
        self.index
            .find(hashed, |&k| {
                self.slots
                    .get(k)
                    .map(|e| e.hash == *hash)
                    .unwrap_or(false)
            })
            .copied()
    }

    // A hash with no slot resolves to the absent key's slot, if any.
    fn canonical_slot(&self, hash: &KeyHash) -> Option<DefaultKey> {
        match self.lookup(hash) {
            Some(k) => Some(k),
            None if *hash != KeyHash::Absent => self.lookup(&KeyHash::Absent),
            None => None,
        }
    }

    /// Handle of the canonical entry `key` resolves to.
    pub fn find<Q>(&self, key: &Q) -> Option<Handle>
    where
        Q: ?Sized + ValueKey,
    {
        let hash = self.key_hash(key);
        self.canonical_slot(&hash).map(Handle)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + ValueKey,
    {
        let k = self.find(key)?;
        self.slots.get(k.0).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: ?Sized + ValueKey,
    {
        let k = self.find(key)?;
        self.slots.get_mut(k.0).map(|e| &mut e.value)
    }

    /// The canonical key object stored for `key`'s hash.
    pub fn canonical_key<Q>(&self, key: &Q) -> Option<&K>
    where
        Q: ?Sized + ValueKey,
    {
        let k = self.find(key)?;
        self.slots.get(k.0).map(|e| &e.key)
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + ValueKey,
    {
        self.find(key).is_some()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + ValueKey,
    {
        self.has(key)
    }

    /// Store `value` under `key`'s canonical key, registering `key` as
    /// canonical if its hash is new.
    pub fn set(&mut self, key: K, value: V) -> Result<&mut Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Like `set`, returning the value previously stored for the hash.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let hash = self.key_hash(&key);
        if hash == KeyHash::Absent {
            if self.options.prevent_undefined_key {
                return Err(Error::InvalidKey);
            }
            tracing::debug!("storing absent key, unregistered lookups will resolve to it");
        }
        let hashed = self.hasher.hash_one(&hash);
        match self.index.entry(
            hashed,
            |&kk| {
                self.slots
                    .get(kk)
                    .map(|e| e.hash == hash)
                    .unwrap_or(false)
            },
            |&kk| self.slots.get(kk).map(|e| e.hashed).unwrap_or(0),
        ) {
            hash_table::Entry::Occupied(o) => {
                // The index only holds live slots; `key` is dropped and the
                // canonical one kept.
                let e = &mut self.slots[*o.get()];
                tracing::trace!(%hash, "overwriting value of canonical key");
                Ok(Some(std::mem::replace(&mut e.value, value)))
            }
            hash_table::Entry::Vacant(v) => {
                tracing::trace!(%hash, "registering canonical key");
                let k = self.slots.insert(Entry {
                    key,
                    value,
                    hash,
                    hashed,
                });
                let _ = v.insert(k);
                Ok(None)
            }
        }
    }

    /// Apply `set` to each pair in order, stopping at the first error.
    pub fn try_extend<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.set(k, v)?;
        }
        Ok(())
    }

    /// Remove the entry `key` resolves to. Returns whether one existed.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        Q: ?Sized + ValueKey,
    {
        self.remove(key).is_some()
    }

    /// Remove the entry `key` resolves to, returning the canonical key and
    /// the value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        Q: ?Sized + ValueKey,
    {
        let handle = self.find(key)?;
        self.remove_handle(handle)
    }

    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let k = handle.0;
        let entry = self.slots.remove(k)?;
        if let Ok(o) = self.index.find_entry(entry.hashed, |&kk| kk == k) {
            o.remove();
        }
        tracing::trace!(hash = %entry.hash, "removed canonical key");
        Some((entry.key, entry.value))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }
}

impl<K, V, S> ValMap<K, V, S> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }

    /// Same as `iter`.
    pub fn entries(&self) -> Iter<'_, K, V> {
        self.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.slots.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { it: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { it: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            it: self.iter_mut(),
        }
    }

    /// Iterate handles alongside entries.
    pub fn handles(&self) -> impl Iterator<Item = (Handle, &K, &V)> + '_ {
        self.slots
            .iter()
            .map(|(k, e)| (Handle(k), &e.key, &e.value))
    }
}

/// Iterator over canonical entries in `ValMap`.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over canonical entries with mutable values.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (&e.key, &mut e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct Keys<'a, K, V> {
    it: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct Values<'a, K, V> {
    it: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct ValuesMut<'a, K, V> {
    it: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Owning iterator over `(canonical key, value)` pairs.
pub struct IntoIter<K, V> {
    it: slotmap::basic::IntoIter<DefaultKey, Entry<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, e)| (e.key, e.value))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V, S> IntoIterator for ValMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            it: self.slots.into_iter(),
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a ValMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut ValMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ValMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// Serialized as `[[key, value], ...]`, the shape `from_json` accepts.
impl<K, V, S> Serialize for ValMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Ser>(&self, ser: Ser) -> core::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        let mut seq = ser.serialize_seq(Some(self.len()))?;
        for pair in self.iter() {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }
}

impl<'de, K, V, S> Deserialize<'de> for ValMap<K, V, S>
where
    K: ValueKey + Deserialize<'de>,
    V: Deserialize<'de>,
    S: BuildHasher + Default,
{
    fn deserialize<D>(de: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(de)?;
        let mut map = Self::with_hasher(S::default());
        map.try_extend(pairs).map_err(D::Error::custom)?;
        Ok(map)
    }
}
