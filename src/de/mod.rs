// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Unflatten device tree blobs, and deserialize Rust data structures from
//! the resulting tree.

pub mod deserializer;
pub mod inbuf;

pub use deserializer::from_tree;

use crate::common::Header;
use crate::error::{Error, Result, Warning};
use crate::tag::{Tag, Tags};
use crate::tree::{BootInfo, Node, Property, ReserveEntry, check_node_name, join_path, nodename_from_path};
use crate::version::{Flags, VersionInfo};
use alloc::{string::String, vec::Vec};
use inbuf::InBuf;

/// Result of unflattening a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    pub boot_info: BootInfo,
    /// Header as read from the blob.
    pub header: Header,
    /// Recoverable problems found while decoding.
    pub warnings: Vec<Warning>,
}

/// Decode a device tree blob.
///
/// `blob` must hold at least `totalsize` bytes; anything after that is
/// ignored. Every read is bounded by `totalsize`, and by the block sizes
/// the header carries when its version has them.
///
/// # Example
///
/// ```
/// use device_tree_blob::{BootInfo, FlattenConfig, Node, Property, from_blob, to_blob};
///
/// let root = Node::root().with_property(Property::string("compatible", "vendor,board"));
/// let blob = to_blob(&BootInfo::new(Vec::new(), root.clone()), &FlattenConfig::default())
///     .expect("encode");
/// let decoded = from_blob(&blob).expect("decode");
/// assert_eq!(decoded.boot_info.root, root);
/// assert!(decoded.warnings.is_empty());
/// ```
pub fn from_blob(blob: &[u8]) -> Result<DecodedBlob> {
    let (header, vi) = Header::parse(blob)?;
    let total = header.total_size as usize;
    let blob = &blob[..total];

    let reserve_map = read_reserve_map(InBuf::new(blob, header.off_mem_rsvmap as usize, total))?;

    let struct_base = header.off_dt_struct as usize;
    let struct_limit = match header.size_dt_struct {
        Some(size) => struct_base + size as usize,
        None => total,
    };
    let strings_base = header.off_dt_strings as usize;
    let strings_limit = match header.size_dt_strings {
        Some(size) => strings_base + size as usize,
        None => total,
    };
    let tags = Tags::new(
        InBuf::new(blob, struct_base, struct_limit),
        InBuf::new(blob, strings_base, strings_limit),
        vi.flags,
    );

    let mut warnings = Vec::new();
    let root = unflatten_tree(tags, vi, &mut warnings)?;
    Ok(DecodedBlob {
        boot_info: BootInfo::new(reserve_map, root),
        header,
        warnings,
    })
}

fn read_reserve_map(mut inb: InBuf<'_>) -> Result<Vec<ReserveEntry>> {
    let mut reserve_map = Vec::new();
    loop {
        let address = inb.read_u64()?;
        let size = inb.read_u64()?;
        if size == 0 {
            break;
        }
        reserve_map.push(ReserveEntry::new(address, size));
    }
    Ok(reserve_map)
}

fn to_str(bytes: &[u8], file_index: usize) -> Result<&str> {
    core::str::from_utf8(bytes).map_err(|e| Error::utf8(e, file_index))
}

/// Node opened by a `FDT_BEGIN_NODE` tag, with its full path resolved.
fn open_node(
    raw: &[u8],
    parent_path: &str,
    vi: &VersionInfo,
    file_index: usize,
    warnings: &mut Vec<Warning>,
) -> Result<Node> {
    let raw = to_str(raw, file_index)?;
    let (name, full_path) = if vi.has(Flags::FULLPATH) {
        let name = nodename_from_path(parent_path, raw)
            .ok_or_else(|| Error::path_not_child(raw, parent_path, file_index))?;
        (String::from(name), String::from(raw))
    } else {
        (String::from(raw), join_path(parent_path, raw))
    };
    log::trace!("unflatten {}", full_path);

    let base_name_len = check_node_name(&name);
    if base_name_len.is_none() {
        let warning = Warning::IncorrectNodeName {
            name: name.clone(),
            file_index,
        };
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    let mut node = Node::new(name);
    node.full_path = Some(full_path);
    node.base_name_len = base_name_len;
    Ok(node)
}

/// Rebuild the tree with an explicit stack of open nodes, so nesting depth
/// taken from the blob never grows the call stack.
fn unflatten_tree(mut tags: Tags<'_>, vi: &VersionInfo, warnings: &mut Vec<Warning>) -> Result<Node> {
    let mut open: Vec<Node> = match tags.next().transpose()? {
        Some((Tag::Begin(raw), index)) => Vec::from([open_node(raw, "", vi, index, warnings)?]),
        Some((_, index)) => return Err(Error::expected_struct_begin(index)),
        None => return Err(Error::expected_struct_begin(tags.file_index())),
    };

    let root = loop {
        let (tag, index) = match tags.next().transpose()? {
            Some(item) => item,
            None => return Err(Error::premature_end(tags.file_index())),
        };
        // the stack is never empty here
        let Some(current) = open.last_mut() else {
            return Err(Error::expected_struct_begin(index));
        };
        match tag {
            Tag::Begin(raw) => {
                let parent_path = current.full_path().unwrap_or_default();
                let child = open_node(raw, parent_path, vi, index, warnings)?;
                open.push(child);
            }
            Tag::Prop(value, name) => {
                let name = to_str(name, index)?;
                current.add_property(Property::new(name, value));
            }
            Tag::End => {
                let Some(done) = open.pop() else {
                    return Err(Error::expected_struct_begin(index));
                };
                match open.last_mut() {
                    Some(parent) => parent.add_child(done),
                    None => break done,
                }
            }
        }
    };

    match tags.next() {
        None => Ok(root),
        Some(Ok((_, index))) => Err(Error::expected_struct_end(index)),
        Some(Err(e)) => Err(Error::expected_struct_end(e.file_index())),
    }
}
