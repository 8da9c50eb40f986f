use crate::error::{Error, Result};
use crate::tree::{Node, Property};
use alloc::{string::String, vec::Vec};
use serde::ser::{self, Impossible, Serialize};

/// What one serialized value turns into.
#[derive(Debug)]
pub enum Value {
    /// Structs and maps become nodes.
    Node(Node),
    /// Everything else becomes property bytes.
    Prop(Vec<u8>),
    /// `false` and `None` produce no property at all.
    Omitted,
}

/// Serializer producing a [`Value`] for one serde value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Serializer;

/// Builds a node from struct fields or map entries.
pub struct NodeSerializer {
    node: Node,
    pending_key: Option<String>,
}

/// Concatenates the property bytes of every element.
pub struct SeqSerializer {
    data: Vec<u8>,
}

impl NodeSerializer {
    fn new() -> NodeSerializer {
        NodeSerializer {
            node: Node::root(),
            pending_key: None,
        }
    }

    fn insert(&mut self, key: String, value: Value) {
        match value {
            Value::Node(mut child) => {
                child.name = key;
                self.node.add_child(child);
            }
            Value::Prop(bytes) => self.node.add_property(Property::new(key, bytes)),
            Value::Omitted => {}
        }
    }
}

/// Keys are accepted when they serialize as strings.
fn key_to_string<K: Serialize + ?Sized>(key: &K) -> Result<String> {
    match key.serialize(Serializer)? {
        Value::Prop(mut bytes) if bytes.last() == Some(&0) => {
            bytes.pop();
            if bytes.contains(&0) {
                return Err(Error::unsupported_type("map key"));
            }
            String::from_utf8(bytes).map_err(|e| Error::utf8(e.utf8_error(), 0))
        }
        _ => Err(Error::unsupported_type("map key")),
    }
}

impl ser::SerializeStruct for NodeSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = value.serialize(Serializer)?;
        self.insert(key.into(), value);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Node(self.node))
    }
}

impl ser::SerializeMap for NodeSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.pending_key = Some(key_to_string(key)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| <Error as ser::Error>::custom("map value without a key"))?;
        let value = value.serialize(Serializer)?;
        self.insert(key, value);
        Ok(())
    }

    fn serialize_entry<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key = key_to_string(key)?;
        let value = value.serialize(Serializer)?;
        self.insert(key, value);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Node(self.node))
    }
}

impl SeqSerializer {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        match value.serialize(Serializer)? {
            Value::Prop(bytes) => self.data.extend_from_slice(&bytes),
            Value::Omitted => {}
            Value::Node(_) => return Err(Error::unsupported_type("node in sequence")),
        }
        Ok(())
    }
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Prop(self.data))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Prop(self.data))
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Prop(self.data))
    }
}

impl ser::Serializer for Serializer {
    type Ok = Value;
    type Error = Error;
    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = Impossible<Value, Error>;
    type SerializeMap = NodeSerializer;
    type SerializeStruct = NodeSerializer;
    type SerializeStructVariant = Impossible<Value, Error>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(if v { Value::Prop(Vec::new()) } else { Value::Omitted })
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::Prop(v.to_be_bytes().into()))
    }

    fn serialize_f32(self, _v: f32) -> Result<Value> {
        Err(Error::unsupported_type("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<Value> {
        Err(Error::unsupported_type("f64"))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        let mut buf = [0u8; 4];
        self.serialize_str(v.encode_utf8(&mut buf))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        let mut bytes = Vec::with_capacity(v.len() + 1);
        bytes.extend_from_slice(v.as_bytes());
        bytes.push(0);
        Ok(Value::Prop(bytes))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Prop(v.into()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Omitted)
    }

    fn serialize_some<T>(self, v: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        v.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Prop(Vec::new()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, v: &T) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        v.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Value>
    where
        T: Serialize + ?Sized,
    {
        Err(Error::unsupported_type("newtype variant"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer> {
        Ok(SeqSerializer {
            data: Vec::with_capacity(len.unwrap_or(0) * 4),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqSerializer> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::unsupported_type("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<NodeSerializer> {
        Ok(NodeSerializer::new())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<NodeSerializer> {
        Ok(NodeSerializer::new())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::unsupported_type("struct variant"))
    }
}

/// Serialize a struct or map into a root node.
///
/// Fields holding structs or maps become child nodes named after the field;
/// every other field becomes a property.
pub fn to_tree<T>(data: &T) -> Result<Node>
where
    T: Serialize + ?Sized,
{
    match data.serialize(Serializer)? {
        Value::Node(root) => Ok(root),
        _ => Err(Error::expected_struct_begin(0)),
    }
}
