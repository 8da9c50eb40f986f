//! In-memory device tree: nodes, properties and the memory reservation map.

use alloc::{string::String, vec::Vec};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Characters allowed in the base part of a node name.
pub(crate) const PROPCHAR: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789,._+*#?-";
/// Characters allowed after the `@` of a node name.
pub(crate) const UNITCHAR: &[u8] = b"0123456789abcdef,";

/// A named binary value attached to a node.
///
/// An empty value is a valid property, distinct from the property being absent.
#[derive(Debug, Clone)]
pub struct Property {
    pub(crate) name: String,
    pub(crate) value: Vec<u8>,
    pub(crate) label: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Property {
        Property {
            name: name.into(),
            value: value.into(),
            label: None,
        }
    }

    /// A property holding `value` followed by a terminating zero.
    pub fn string(name: impl Into<String>, value: &str) -> Property {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Property::new(name, bytes)
    }

    /// A property holding one big-endian cell.
    pub fn cell(name: impl Into<String>, value: u32) -> Property {
        Property::new(name, value.to_be_bytes())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Property {
        self.label = Some(label.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for Property {}

/// A device tree node.
///
/// Properties and children keep insertion order, which is also their order
/// in a flattened blob.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) full_path: Option<String>,
    pub(crate) base_name_len: Option<usize>,
    pub(crate) properties: Vec<Property>,
    pub(crate) children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Node {
        Node {
            name: name.into(),
            ..Node::default()
        }
    }

    /// The root node, whose name is empty.
    pub fn root() -> Node {
        Node::new("")
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Node {
        self.label = Some(label.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Node {
        self.add_property(property);
        self
    }

    pub fn with_child(mut self, child: Node) -> Node {
        self.add_child(child);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Full path recorded when the node was read from a blob.
    #[inline]
    pub fn full_path(&self) -> Option<&str> {
        self.full_path.as_deref()
    }

    /// Name without the `@unit-address` suffix.
    pub fn base_name(&self) -> &str {
        match self.base_name_len {
            Some(len) if len <= self.name.len() && self.name.is_char_boundary(len) => {
                &self.name[..len]
            }
            _ => split_node_name(&self.name).0,
        }
    }

    /// The part after the last `@`, if any.
    pub fn unit_address(&self) -> Option<&str> {
        split_node_name(&self.name).1
    }

    #[inline]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[inline]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    pub fn get_prop(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    pub fn get_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Add a property; an existing property of the same name gets the new
    /// value in its original position.
    pub fn add_property(&mut self, property: Property) {
        match self
            .properties
            .iter_mut()
            .find(|prop| prop.name == property.name)
        {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        let index = self.properties.iter().position(|prop| prop.name == name)?;
        Some(self.properties.remove(index))
    }
}

/// Structural equality: names, property names, values and order, children.
/// Labels and cached paths are ignored.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.properties == other.properties
            && self.children == other.children
    }
}

impl Eq for Node {}

/// A physical memory range the consumer of the tree must not use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveEntry {
    pub address: u64,
    pub size: u64,
}

impl ReserveEntry {
    pub const fn new(address: u64, size: u64) -> ReserveEntry {
        ReserveEntry { address, size }
    }
}

/// Everything a blob carries: the reservation map and the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootInfo {
    pub reserve_map: Vec<ReserveEntry>,
    pub root: Node,
}

impl BootInfo {
    pub fn new(reserve_map: Vec<ReserveEntry>, root: Node) -> BootInfo {
        BootInfo { reserve_map, root }
    }
}

/// Split `base@unit` at the last `@`.
pub fn split_node_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('@') {
        Some(pos) => (&name[..pos], Some(&name[pos + 1..])),
        None => (name, None),
    }
}

/// Base name length of a well-formed node name, `None` when the base name has
/// characters outside [`PROPCHAR`] or the unit address outside [`UNITCHAR`].
pub fn check_node_name(name: &str) -> Option<usize> {
    let (base, unit) = split_node_name(name);
    if !base.bytes().all(|c| PROPCHAR.contains(&c)) {
        return None;
    }
    if let Some(unit) = unit {
        if !unit.bytes().all(|c| UNITCHAR.contains(&c)) {
            return None;
        }
    }
    Some(base.len())
}

/// Append `name` to `path` with exactly one separator.
///
/// Under an empty parent, `""` and `"/"` both name the root.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() && name == "/" {
        return String::from("/");
    }
    let mut full = String::with_capacity(path.len() + name.len() + 1);
    full.push_str(path);
    if !path.ends_with('/') {
        full.push('/');
    }
    full.push_str(name);
    full
}

/// The node name in `path` if `path` names a direct child of `parent_path`.
pub(crate) fn nodename_from_path<'a>(parent_path: &str, path: &'a str) -> Option<&'a str> {
    let last_slash = path.rfind('/')?;
    if path == "/" && parent_path.is_empty() {
        return Some("");
    }
    let name = &path[last_slash + 1..];
    if last_slash == 0 && parent_path == "/" {
        return Some(name);
    }
    if &path[..last_slash] == parent_path {
        Some(name)
    } else {
        None
    }
}

struct RawBytes<'a>(&'a [u8]);

impl Serialize for RawBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

/// A node serializes as a map: properties as byte values, then children as
/// nested maps.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(self.properties.len() + self.children.len()))?;
        for prop in &self.properties {
            map.serialize_entry(prop.name.as_str(), &RawBytes(&prop.value))?;
        }
        for child in &self.children {
            map.serialize_entry(child.name.as_str(), child)?;
        }
        map.end()
    }
}
