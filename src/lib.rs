//! val-map: a single-threaded map keyed by value equality. Two distinct key
//! instances with the same content name the same entry.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let arbitrary key types behave as value keys without requiring
//!   `Eq`/`Hash` on them, and keep exactly one stored key per logical key.
//! - Layers:
//!   - `key_hash`: resolves a key to a `KeyHash`, the identity string that
//!     decides which entry it names (sentinel, self-reported hash, textual
//!     representation, canonical JSON, in that order).
//!   - `canonical`: order-independent JSON writer backing the structural
//!     fallback.
//!   - `ValMap<K, V, S>`: a `HashTable` registry from `KeyHash` to a
//!     generational handle, composed with a `SlotMap` of entries owning the
//!     canonical key and the value.
//!
//! Constraints
//! - Single-threaded; mutation takes `&mut self`, sharing needs external
//!   synchronization.
//! - The first key stored under a hash stays canonical until its entry is
//!   removed. Later equal keys only overwrite the value.
//! - One registry slot per live entry, sentinels included.
//! - Each entry stores its `KeyHash` and precomputed index hash; the index is
//!   never rebuilt from user code.
//!
//! Absent and null keys
//! - `KeyHash::Absent` and `KeyHash::Null` never equal a text hash.
//! - A lookup whose hash has no slot resolves to the absent key's slot.
//!   `set` refuses the absent key while `prevent_undefined_key` is on (the
//!   default), so that fallback only matters once the guard is disabled:
//!   from then on every never-seen key reads the absent key's value.
//!
//! Notes and non-goals
//! - Changing `ValMapOptions` does not rehash existing entries.
//! - Keys that fail to serialize share one fallback hash.
//! - No ordering guarantees; iteration follows slot order.
//! - No persistence, I/O or concurrency.

pub mod canonical;
pub mod error;
pub mod key_hash;
pub mod options;
pub mod val_map;
mod val_map_proptest;

// Public surface
pub use error::{Error, Result};
pub use key_hash::{KeyHash, MaybeKey, Sentinel, ValueKey};
pub use options::ValMapOptions;
pub use val_map::{Handle, ValMap};
