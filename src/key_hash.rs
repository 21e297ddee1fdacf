//! Key hash resolution: turns a key into the identity string that decides
//! which canonical entry it names.
//!
//! Resolution order:
//! 1. A sentinel key (absent or null) hashes to that sentinel.
//! 2. A self-reported `ValueKey::value_hash` is used verbatim.
//! 3. A customized `ValueKey::text_repr` is used, unless the map has
//!    `disable_to_string_hash` set.
//! 4. Otherwise the key's canonical JSON serialization is used.
//!
//! Keys whose `Serialize` impl fails hash to text derived from the error,
//! so distinct keys failing the same way collide. Derived impls over plain
//! data, including 128-bit integers and non-string map keys, always succeed.
//!
//! Floats use the number text of the original JavaScript `toString`: `-0.0`
//! and `0.0` are one key, infinities read `Infinity`/`-Infinity`.

use crate::canonical::to_canonical_json;
use crate::options::ValMapOptions;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Resolved identity of a key. The sentinels never equal any text hash.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum KeyHash {
    Absent,
    Null,
    Text(String),
}

impl KeyHash {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyHash::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyHash::Absent => f.write_str("<absent>"),
            KeyHash::Null => f.write_str("<null>"),
            KeyHash::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Sentinel {
    /// No key was provided at all.
    Absent,
    /// An explicit null key.
    Null,
}

impl From<Sentinel> for KeyHash {
    fn from(s: Sentinel) -> Self {
        match s {
            Sentinel::Absent => KeyHash::Absent,
            Sentinel::Null => KeyHash::Null,
        }
    }
}

/// A type usable as a `ValMap` key.
///
/// Every key can be serialized, which gives the structural fallback hash.
/// The provided methods are optional capabilities: override them to change
/// how a key type is identified.
///
/// ```
/// use serde::Serialize;
/// use val_map::ValueKey;
///
/// // Two points are the same key regardless of their label.
/// #[derive(Serialize)]
/// struct Point {
///     x: i32,
///     y: i32,
///     label: String,
/// }
///
/// impl ValueKey for Point {
///     fn value_hash(&self) -> Option<String> {
///         Some(format!("Point({},{})", self.x, self.y))
///     }
/// }
/// ```
pub trait ValueKey: Serialize {
    /// Returns `Some` if this key is the absent or null sentinel.
    fn sentinel(&self) -> Option<Sentinel> {
        None
    }

    /// Self-reported hash. Takes precedence over every other strategy.
    fn value_hash(&self) -> Option<String> {
        None
    }

    /// Customized textual representation, used when there is no
    /// `value_hash` and the map allows it.
    fn text_repr(&self) -> Option<String> {
        None
    }
}

/// Resolve `key` to its `KeyHash` under `options`.
pub fn resolve<Q>(key: &Q, options: &ValMapOptions) -> KeyHash
where
    Q: ?Sized + ValueKey,
{
    if let Some(s) = key.sentinel() {
        return s.into();
    }
    if let Some(h) = key.value_hash() {
        return KeyHash::Text(h);
    }
    if !options.disable_to_string_hash {
        if let Some(t) = key.text_repr() {
            return KeyHash::Text(t);
        }
    }
    match to_canonical_json(key) {
        Ok(json) => KeyHash::Text(json),
        Err(err) => {
            tracing::warn!(%err, "key is not serializable, falling back to error hash");
            KeyHash::Text(format!("<unserializable: {err}>"))
        }
    }
}

/// A key that may also be one of the two sentinels.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum MaybeKey<T> {
    Absent,
    Null,
    Key(T),
}

impl<T: Serialize> Serialize for MaybeKey<T> {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        match self {
            MaybeKey::Absent | MaybeKey::Null => ser.serialize_none(),
            MaybeKey::Key(k) => ser.serialize_some(k),
        }
    }
}

impl<T: ValueKey> ValueKey for MaybeKey<T> {
    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            MaybeKey::Absent => Some(Sentinel::Absent),
            MaybeKey::Null => Some(Sentinel::Null),
            MaybeKey::Key(k) => k.sentinel(),
        }
    }
    fn value_hash(&self) -> Option<String> {
        match self {
            MaybeKey::Key(k) => k.value_hash(),
            _ => None,
        }
    }
    fn text_repr(&self) -> Option<String> {
        match self {
            MaybeKey::Key(k) => k.text_repr(),
            _ => None,
        }
    }
}

impl<T: ValueKey> From<Option<T>> for MaybeKey<T> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(k) => MaybeKey::Key(k),
            None => MaybeKey::Null,
        }
    }
}

/// `None` is the null sentinel.
impl<T: ValueKey> ValueKey for Option<T> {
    fn sentinel(&self) -> Option<Sentinel> {
        match self {
            Some(k) => k.sentinel(),
            None => Some(Sentinel::Null),
        }
    }
    fn value_hash(&self) -> Option<String> {
        self.as_ref().and_then(ValueKey::value_hash)
    }
    fn text_repr(&self) -> Option<String> {
        self.as_ref().and_then(ValueKey::text_repr)
    }
}

impl<T: ?Sized + ValueKey> ValueKey for &T {
    fn sentinel(&self) -> Option<Sentinel> {
        (**self).sentinel()
    }
    fn value_hash(&self) -> Option<String> {
        (**self).value_hash()
    }
    fn text_repr(&self) -> Option<String> {
        (**self).text_repr()
    }
}

impl<T: ?Sized + ValueKey> ValueKey for Box<T> {
    fn sentinel(&self) -> Option<Sentinel> {
        (**self).sentinel()
    }
    fn value_hash(&self) -> Option<String> {
        (**self).value_hash()
    }
    fn text_repr(&self) -> Option<String> {
        (**self).text_repr()
    }
}

macro_rules! text_keys {
    ($($t:ty),* $(,)?) => {
        $(
            impl ValueKey for $t {
                fn text_repr(&self) -> Option<String> {
                    Some(self.to_string())
                }
            }
        )*
    };
}

text_keys!(
    String, str, char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
);

// `-0.0` prints as `0` and infinities as `Infinity`, like JavaScript numbers.
macro_rules! float_keys {
    ($($t:ty),* $(,)?) => {
        $(
            impl ValueKey for $t {
                fn text_repr(&self) -> Option<String> {
                    let text = if *self == 0.0 {
                        "0".to_owned()
                    } else if *self == <$t>::INFINITY {
                        "Infinity".to_owned()
                    } else if *self == <$t>::NEG_INFINITY {
                        "-Infinity".to_owned()
                    } else {
                        self.to_string()
                    };
                    Some(text)
                }
            }
        )*
    };
}

float_keys!(f32, f64);

// Containers are identified by their structure only.
impl<T: Serialize> ValueKey for Vec<T> {}
impl<T: Serialize> ValueKey for [T] {}
impl<T, const N: usize> ValueKey for [T; N] where [T; N]: Serialize {}
impl<A: Serialize, B: Serialize> ValueKey for (A, B) {}
impl<A: Serialize, B: Serialize, C: Serialize> ValueKey for (A, B, C) {}
impl<A: Serialize, B: Serialize, C: Serialize, D: Serialize> ValueKey for (A, B, C, D) {}
impl<K, V> ValueKey for BTreeMap<K, V> where BTreeMap<K, V>: Serialize {}
impl<K, V, S> ValueKey for HashMap<K, V, S> where HashMap<K, V, S>: Serialize {}
impl<T> ValueKey for BTreeSet<T> where BTreeSet<T>: Serialize {}
impl<T, S> ValueKey for HashSet<T, S> where HashSet<T, S>: Serialize {}

impl ValueKey for serde_json::Value {
    fn sentinel(&self) -> Option<Sentinel> {
        self.is_null().then_some(Sentinel::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_log::test;

    #[derive(Serialize)]
    struct SelfHashed {
        x: i32,
        y: i32,
    }

    impl ValueKey for SelfHashed {
        fn value_hash(&self) -> Option<String> {
            Some(format!("Point({},{})", self.x, self.y))
        }
        fn text_repr(&self) -> Option<String> {
            Some(format!("{},{}", self.x, self.y))
        }
    }

    #[derive(Serialize)]
    struct Displayed {
        x: i32,
        y: i32,
    }

    impl ValueKey for Displayed {
        fn text_repr(&self) -> Option<String> {
            Some(format!("{},{}", self.x, self.y))
        }
    }

    #[derive(Serialize)]
    struct Plain {
        y: i32,
        x: i32,
    }

    impl ValueKey for Plain {}

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _ser: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("broken"))
        }
    }

    impl ValueKey for Broken {}

    fn opts(disable_to_string_hash: bool) -> ValMapOptions {
        ValMapOptions {
            disable_to_string_hash,
            ..ValMapOptions::default()
        }
    }

    /// Invariant: a self-reported hash wins over text and structure, even
    /// with the text path disabled.
    #[test]
    fn self_hash_takes_precedence() {
        let k = SelfHashed { x: 1, y: 2 };
        assert_eq!(resolve(&k, &opts(false)), KeyHash::Text("Point(1,2)".into()));
        assert_eq!(resolve(&k, &opts(true)), KeyHash::Text("Point(1,2)".into()));
    }

    /// Invariant: the text representation is used unless disabled, in which
    /// case the canonical structure is used.
    #[test]
    fn text_repr_and_disable_flag() {
        let k = Displayed { x: 1, y: 2 };
        assert_eq!(resolve(&k, &opts(false)), KeyHash::Text("1,2".into()));
        assert_eq!(
            resolve(&k, &opts(true)),
            KeyHash::Text(r#"{"x":1,"y":2}"#.into())
        );
    }

    #[test]
    fn plain_data_uses_canonical_json() {
        let k = Plain { y: 2, x: 1 };
        assert_eq!(
            resolve(&k, &opts(false)),
            KeyHash::Text(r#"{"x":1,"y":2}"#.into())
        );
    }

    /// Invariant: sentinels resolve to themselves and differ from every text
    /// hash, including text that spells them.
    #[test]
    fn sentinels_are_distinct() {
        let o = ValMapOptions::default();
        let absent: MaybeKey<String> = MaybeKey::Absent;
        let null: MaybeKey<String> = MaybeKey::Null;
        assert_eq!(resolve(&absent, &o), KeyHash::Absent);
        assert_eq!(resolve(&null, &o), KeyHash::Null);
        assert_ne!(resolve(&absent, &o), resolve(&null, &o));
        assert_ne!(resolve(&null, &o), resolve("null", &o));
        assert_ne!(resolve(&absent, &o), resolve("undefined", &o));
        assert_eq!(resolve(&None::<i32>, &o), KeyHash::Null);
        assert_eq!(resolve(&json!(null), &o), KeyHash::Null);
    }

    #[test]
    fn primitives_use_display() {
        let o = ValMapOptions::default();
        assert_eq!(resolve("abc", &o), KeyHash::Text("abc".into()));
        assert_eq!(resolve(&"abc".to_string(), &o), KeyHash::Text("abc".into()));
        assert_eq!(resolve(&42u32, &o), KeyHash::Text("42".into()));
        assert_eq!(resolve(&true, &o), KeyHash::Text("true".into()));
        assert_eq!(resolve(&Some(7i64), &o), KeyHash::Text("7".into()));
        // Structural once text is disabled.
        assert_eq!(resolve("abc", &opts(true)), KeyHash::Text("\"abc\"".into()));
    }

    #[test]
    fn containers_are_structural() {
        let o = ValMapOptions::default();
        assert_eq!(resolve(&vec![1, 2], &o), KeyHash::Text("[1,2]".into()));
        assert_eq!(resolve(&[1, 2], &o), KeyHash::Text("[1,2]".into()));
        assert_eq!(resolve(&(1, "a"), &o), KeyHash::Text(r#"[1,"a"]"#.into()));
        assert_ne!(resolve(&vec!["1,2"], &o), resolve(&vec![1, 2], &o));
        assert_eq!(
            resolve(&json!({"b": 1, "a": 2}), &o),
            KeyHash::Text(r#"{"a":2,"b":1}"#.into())
        );
    }

    /// Invariant: plain-data keys that `serde_json::Value` cannot hold still
    /// get distinct structural hashes.
    #[test]
    fn wide_integers_and_compound_map_keys_are_distinct() {
        #[derive(Serialize)]
        struct Id {
            v: u128,
        }
        impl ValueKey for Id {}

        #[derive(Serialize)]
        struct Grid {
            cells: BTreeMap<(u8, u8), u8>,
        }
        impl ValueKey for Grid {}

        let o = ValMapOptions::default();
        let a = resolve(&Id { v: u64::MAX as u128 + 1 }, &o);
        let b = resolve(&Id { v: u64::MAX as u128 + 2 }, &o);
        assert_eq!(a, KeyHash::Text(r#"{"v":18446744073709551616}"#.into()));
        assert_ne!(a, b);

        let ga = Grid { cells: BTreeMap::from([((0, 0), 1)]) };
        let gb = Grid { cells: BTreeMap::from([((0, 1), 1)]) };
        assert_eq!(
            resolve(&ga, &o),
            KeyHash::Text(r#"{"cells":{"[0,0]":1}}"#.into())
        );
        assert_ne!(resolve(&ga, &o), resolve(&gb, &o));
    }

    #[test]
    fn float_text_follows_number_to_string() {
        let o = ValMapOptions::default();
        assert_eq!(resolve(&-0.0f64, &o), resolve(&0.0f64, &o));
        assert_eq!(resolve(&0.0f32, &o), KeyHash::Text("0".into()));
        assert_eq!(resolve(&1.5f64, &o), KeyHash::Text("1.5".into()));
        assert_eq!(resolve(&f64::INFINITY, &o), KeyHash::Text("Infinity".into()));
        assert_eq!(resolve(&f32::NEG_INFINITY, &o), KeyHash::Text("-Infinity".into()));
        assert_eq!(resolve(&f64::NAN, &o), KeyHash::Text("NaN".into()));
        assert_eq!(resolve(&0.1f32, &o), KeyHash::Text("0.1".into()));
    }

    #[test]
    fn references_and_boxes_delegate() {
        let o = ValMapOptions::default();
        let k = SelfHashed { x: 3, y: 4 };
        assert_eq!(resolve(&&k, &o), resolve(&k, &o));
        assert_eq!(resolve(&Box::new(k), &o), KeyHash::Text("Point(3,4)".into()));
    }

    /// Unserializable keys collapse onto one error-derived hash.
    #[test]
    fn unserializable_keys_fall_back() {
        let h = resolve(&Broken, &ValMapOptions::default());
        assert_eq!(h.as_text(), Some("<unserializable: broken>"));
        assert_eq!(h, resolve(&Broken, &ValMapOptions::default()));
    }

    #[test]
    fn display() {
        assert_eq!(KeyHash::Absent.to_string(), "<absent>");
        assert_eq!(KeyHash::Null.to_string(), "<null>");
        assert_eq!(KeyHash::Text("x".into()).to_string(), "x");
    }
}
