//! Deserialize Rust data structures from an in-memory tree.
//!
//! A node reads as a map whose keys are its property names followed by its
//! child node names. A property reads as whatever its bytes encode: a
//! big-endian integer of the exact width, a zero-terminated string, raw
//! bytes, or a sequence of those.

use crate::error::{Error, Result};
use crate::tree::{Node, Property};
use core::slice;
use serde::de::{self, DeserializeSeed, Visitor, value::BorrowedStrDeserializer};

/// Deserialize an instance of type `T` from a device tree node.
///
/// # Example
///
/// ```
/// use device_tree_blob::{Node, Property, from_tree};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Tree<'a> {
///     #[serde(borrow)]
///     chosen: Option<Chosen<'a>>,
/// }
///
/// #[derive(Debug, Deserialize)]
/// #[serde(rename_all = "kebab-case")]
/// struct Chosen<'a> {
///     #[serde(borrow)]
///     stdout_path: Option<&'a str>,
/// }
///
/// let root = Node::root().with_child(
///     Node::new("chosen").with_property(Property::string("stdout-path", "serial0")),
/// );
/// let tree: Tree = from_tree(&root).expect("deserialize tree");
/// assert_eq!(tree.chosen.and_then(|c| c.stdout_path), Some("serial0"));
/// ```
pub fn from_tree<'de, T>(root: &'de Node) -> Result<T>
where
    T: de::Deserialize<'de>,
{
    T::deserialize(NodeDeserializer { node: root })
}

struct NodeDeserializer<'de> {
    node: &'de Node,
}

impl<'de> de::Deserializer<'de> for NodeDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(NodeAccess::new(self.node))
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        enum identifier
    }
}

enum Pending<'de> {
    Prop(&'de [u8]),
    Node(&'de Node),
}

struct NodeAccess<'de> {
    props: slice::Iter<'de, Property>,
    children: slice::Iter<'de, Node>,
    value: Option<Pending<'de>>,
}

impl<'de> NodeAccess<'de> {
    fn new(node: &'de Node) -> Self {
        Self {
            props: node.properties().iter(),
            children: node.children().iter(),
            value: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for NodeAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let name = if let Some(prop) = self.props.next() {
            self.value = Some(Pending::Prop(prop.value()));
            prop.name()
        } else if let Some(child) = self.children.next() {
            self.value = Some(Pending::Node(child));
            child.name()
        } else {
            return Ok(None);
        };
        seed.deserialize(BorrowedStrDeserializer::new(name)).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        match self.value.take() {
            Some(Pending::Prop(value)) => seed.deserialize(PropDeserializer { value }),
            Some(Pending::Node(node)) => seed.deserialize(NodeDeserializer { node }),
            None => Err(de::Error::custom("value requested before key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.props.len() + self.children.len())
    }
}

/// Strip the single terminating zero a string property carries.
fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes {
        [rest @ .., 0] => rest,
        _ => bytes,
    }
}

fn to_str(bytes: &[u8]) -> Result<&str> {
    core::str::from_utf8(bytes).map_err(|e| Error::utf8(e, 0))
}

macro_rules! be_integers {
    ($de:lifetime; $($method:ident => $visit:ident($ty:ty),)*) => {
        $(
            fn $method<V>(mut self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<$de>,
            {
                let bytes = self.fixed::<{ core::mem::size_of::<$ty>() }>()?;
                visitor.$visit(<$ty>::from_be_bytes(bytes))
            }
        )*
    };
}

/// A whole property value.
struct PropDeserializer<'de> {
    value: &'de [u8],
}

impl<'de> PropDeserializer<'de> {
    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        <[u8; N]>::try_from(self.value).map_err(|_| Error::invalid_serde_type_length(N as u8))
    }
}

impl<'de> de::Deserializer<'de> for PropDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        match self.value.len() {
            0 => visitor.visit_bool(true),
            4 => self.deserialize_u32(visitor),
            _ => visitor.visit_borrowed_bytes(self.value), // by default, it's bytes
        }
    }

    /// A present property without value is a set flag.
    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.value.is_empty() {
            visitor.visit_bool(true)
        } else {
            Err(Error::invalid_serde_type_length(0))
        }
    }

    be_integers! {
        'de;
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
    }

    fn deserialize_f32<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported_type("f32"))
    }

    fn deserialize_f64<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported_type("f64"))
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(to_str(trim_nul(self.value))?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_bytes(self.value)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.value.is_empty() {
            visitor.visit_unit()
        } else {
            Err(Error::invalid_serde_type_length(0))
        }
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ItemAccess { rest: self.value })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported_type("property as map"))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported_type("property as struct"))
    }

    /// Unit variants, named by the string the property holds.
    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let variant = to_str(trim_nul(self.value))?;
        visitor.visit_enum(BorrowedStrDeserializer::new(variant))
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

/// Elements of a property read as a sequence: each element takes as many
/// bytes as its type needs, a string takes bytes up to and past its zero.
struct ItemAccess<'de> {
    rest: &'de [u8],
}

impl<'de> de::SeqAccess<'de> for ItemAccess<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        if self.rest.is_empty() {
            return Ok(None);
        }
        seed.deserialize(ItemDeserializer {
            rest: &mut self.rest,
        })
        .map(Some)
    }
}

struct ItemDeserializer<'a, 'de> {
    rest: &'a mut &'de [u8],
}

impl<'a, 'de> ItemDeserializer<'a, 'de> {
    fn take(&mut self, len: usize) -> &'de [u8] {
        let rest: &'de [u8] = *self.rest;
        let (head, tail) = rest.split_at(len.min(rest.len()));
        *self.rest = tail;
        head
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        if self.rest.len() < N {
            return Err(Error::invalid_serde_type_length(N as u8));
        }
        <[u8; N]>::try_from(self.take(N)).map_err(|_| Error::invalid_serde_type_length(N as u8))
    }

    fn string(&mut self) -> &'de [u8] {
        let rest: &'de [u8] = *self.rest;
        match rest.iter().position(|&b| b == 0) {
            Some(pos) => {
                *self.rest = &rest[pos + 1..];
                &rest[..pos]
            }
            None => self.take(rest.len()),
        }
    }
}

impl<'a, 'de> de::Deserializer<'de> for ItemDeserializer<'a, 'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.rest.len() >= 4 {
            self.deserialize_u32(visitor)
        } else {
            self.deserialize_bytes(visitor)
        }
    }

    be_integers! {
        'de;
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
    }

    fn deserialize_str<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(to_str(self.string())?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(mut self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let len = self.rest.len();
        visitor.visit_borrowed_bytes(self.take(len))
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        mut self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(BorrowedStrDeserializer::new(to_str(self.string())?))
    }

    serde::forward_to_deserialize_any! {
        bool i128 u128 f32 f64 unit unit_struct option seq tuple tuple_struct
        map struct identifier ignored_any
    }
}
