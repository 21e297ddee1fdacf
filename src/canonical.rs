//! Canonical JSON serialization for structural key hashes.
//!
//! Values are first serialized into a small tree by `CanonicalSerializer`,
//! then written as compact JSON with object members sorted by key at every
//! depth. The output does not depend on field declaration order or map
//! insertion order.
//!
//! Unlike `serde_json::Value`, the tree keeps 128-bit integers outside the
//! 64-bit range and accepts non-string map keys. A non-string key is written
//! as the JSON string of its own canonical form, so `(1, 2)` becomes
//! `"[1,2]"`; numbers and booleans become their plain text as in
//! `serde_json`.

use serde::ser;
use serde::Serialize;

/// Serialize `value` to compact JSON with sorted object keys.
pub fn to_canonical_json<T>(value: &T) -> Result<String, serde_json::Error>
where
    T: ?Sized + Serialize,
{
    let node = value.serialize(CanonicalSerializer)?;
    let mut out = String::new();
    node.write(&mut out)?;
    Ok(out)
}

/// Intermediate form of a serialized value.
enum Node {
    /// Compact JSON text of a number, boolean or null.
    Scalar(String),
    Str(String),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    fn write(self, out: &mut String) -> Result<(), serde_json::Error> {
        match self {
            Node::Scalar(text) => out.push_str(&text),
            Node::Str(s) => out.push_str(&serde_json::to_string(&s)?),
            Node::Seq(items) => {
                out.push('[');
                for (i, item) in items.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out)?;
                }
                out.push(']');
            }
            Node::Map(mut members) => {
                members.sort_by(|a, b| a.0.cmp(&b.0));
                out.push('{');
                for (i, (k, v)) in members.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(&k)?);
                    out.push(':');
                    v.write(out)?;
                }
                out.push('}');
            }
        }
        Ok(())
    }

    // Text used when this node is a map key.
    fn into_key(self) -> Result<String, serde_json::Error> {
        match self {
            Node::Str(s) | Node::Scalar(s) => Ok(s),
            compound => {
                let mut out = String::new();
                compound.write(&mut out)?;
                Ok(out)
            }
        }
    }
}

fn scalar<T: Serialize>(v: T) -> Result<Node, serde_json::Error> {
    serde_json::to_string(&v).map(Node::Scalar)
}

struct CanonicalSerializer;

struct SerializeVec(Vec<Node>);

impl ser::SerializeSeq for SerializeVec {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, v: &T) -> Result<(), Self::Error> {
        self.0.push(v.serialize(CanonicalSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Self::Error> {
        Ok(Node::Seq(self.0))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, v: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, v)
    }

    fn end(self) -> Result<Node, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, v: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, v)
    }

    fn end(self) -> Result<Node, Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

/// Tuple variants are written `{"Variant":[...]}`.
struct SerializeTupleVariant(&'static str, Vec<Node>);

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, v: &T) -> Result<(), Self::Error> {
        self.1.push(v.serialize(CanonicalSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Self::Error> {
        Ok(Node::Map(vec![(self.0.to_owned(), Node::Seq(self.1))]))
    }
}

struct SerializeMap {
    members: Vec<(String, Node)>,
    pending: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        if self.pending.is_some() {
            return Err(ser::Error::custom("map key serialized twice"));
        }
        self.pending = Some(key.serialize(CanonicalSerializer)?.into_key()?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let Some(key) = self.pending.take() else {
            return Err(ser::Error::custom("map value serialized without a key"));
        };
        self.members.push((key, value.serialize(CanonicalSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Node, Self::Error> {
        if self.pending.is_some() {
            return Err(ser::Error::custom("map key serialized without a value"));
        }
        Ok(Node::Map(self.members))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.members
            .push((name.to_owned(), value.serialize(CanonicalSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Node, Self::Error> {
        ser::SerializeMap::end(self)
    }
}

/// Struct variants are written `{"Variant":{...}}`.
struct SerializeStructVariant(&'static str, SerializeMap);

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Node;
    type Error = serde_json::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(&mut self.1, name, value)
    }

    fn end(self) -> Result<Node, Self::Error> {
        let inner = ser::SerializeMap::end(self.1)?;
        Ok(Node::Map(vec![(self.0.to_owned(), inner)]))
    }
}

fn empty_map(len: Option<usize>) -> SerializeMap {
    SerializeMap {
        members: Vec::with_capacity(len.unwrap_or(0)),
        pending: None,
    }
}

impl ser::Serializer for CanonicalSerializer {
    type Ok = Node;
    type Error = serde_json::Error;
    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_i8(self, v: i8) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_i16(self, v: i16) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_i32(self, v: i32) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_i64(self, v: i64) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_i128(self, v: i128) -> Result<Node, Self::Error> {
        Ok(Node::Scalar(v.to_string()))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_u16(self, v: u16) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_u32(self, v: u32) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_u64(self, v: u64) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_u128(self, v: u128) -> Result<Node, Self::Error> {
        Ok(Node::Scalar(v.to_string()))
    }

    // Non-finite floats are written as `null`, like `serde_json`.
    fn serialize_f32(self, v: f32) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_f64(self, v: f64) -> Result<Node, Self::Error> {
        scalar(v)
    }

    fn serialize_char(self, v: char) -> Result<Node, Self::Error> {
        Ok(Node::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Node, Self::Error> {
        Ok(Node::Str(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, Self::Error> {
        v.iter().map(|b| scalar(*b)).collect::<Result<_, _>>().map(Node::Seq)
    }

    fn serialize_none(self) -> Result<Node, Self::Error> {
        Ok(Node::Scalar("null".to_owned()))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, v: &T) -> Result<Node, Self::Error> {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Node, Self::Error> {
        Ok(Node::Scalar("null".to_owned()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, Self::Error> {
        Ok(Node::Scalar("null".to_owned()))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, Self::Error> {
        Ok(Node::Str(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        v: &T,
    ) -> Result<Node, Self::Error> {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        v: &T,
    ) -> Result<Node, Self::Error> {
        let inner = v.serialize(self)?;
        Ok(Node::Map(vec![(variant.to_owned(), inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec, Self::Error> {
        Ok(SerializeVec(Vec::with_capacity(len.unwrap_or(0))))
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec, Self::Error> {
        Ok(SerializeVec(Vec::with_capacity(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeVec, Self::Error> {
        Ok(SerializeVec(Vec::with_capacity(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, Self::Error> {
        Ok(SerializeTupleVariant(variant, Vec::with_capacity(len)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap, Self::Error> {
        Ok(empty_map(len))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMap, Self::Error> {
        Ok(empty_map(Some(len)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant, Self::Error> {
        Ok(SerializeStructVariant(variant, empty_map(Some(len))))
    }
}
