use super::string_block::StringBlock;
use crate::common::*;
use crate::error::{Error, Result};
use crate::tree::{Node, Property, join_path};
use crate::version::{Flags, VersionInfo};

/// Output target of [`flatten_tree`].
///
/// The driver issues the same sequence of calls whatever the target is; a
/// backend decides only how each call is rendered. Labels are symbolic names
/// taken from the source tree and only matter to text backends.
pub trait Emitter {
    /// One 32-bit cell.
    fn cell(&mut self, value: u32) -> Result<()>;
    /// Zero-terminated string.
    fn string(&mut self, value: &str) -> Result<()>;
    /// Pad to a multiple of `align` bytes of structure output.
    fn align(&mut self, align: usize) -> Result<()>;
    /// Raw value bytes of a property.
    fn data(&mut self, prop: &Property) -> Result<()>;
    fn begin_node(&mut self, label: Option<&str>) -> Result<()>;
    fn end_node(&mut self, label: Option<&str>) -> Result<()>;
    /// Property marker, followed by length, name offset and value.
    fn property(&mut self, label: Option<&str>) -> Result<()>;
    /// Per-node hook for backends that describe whole nodes at once.
    ///
    /// [`flatten_tree`] never calls it; the board walk in [`to_board`]
    /// hands it every node in pre-order.
    ///
    /// [`to_board`]: crate::ser::to_board
    fn special(&mut self, node: &Node) -> Result<()> {
        let _ = node;
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.contains('\0') {
        Err(Error::invalid_name(name))
    } else {
        Ok(())
    }
}

fn value_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::value_too_large(len))
}

/// Walk `tree` in pre-order and drive `emit` with its structure block,
/// collecting property names into `strings`.
///
/// The closing `FDT_END` is left to the caller.
pub fn flatten_tree<E: Emitter + ?Sized>(
    tree: &Node,
    emit: &mut E,
    strings: &mut StringBlock,
    vi: &VersionInfo,
) -> Result<()> {
    flatten_node(tree, "", emit, strings, vi)
}

fn flatten_node<E: Emitter + ?Sized>(
    tree: &Node,
    parent_path: &str,
    emit: &mut E,
    strings: &mut StringBlock,
    vi: &VersionInfo,
) -> Result<()> {
    check_name(&tree.name)?;
    // a root addressed as "/" is written like the unnamed root
    let name = if parent_path.is_empty() && tree.name == "/" {
        ""
    } else {
        tree.name.as_str()
    };
    let full_path = join_path(parent_path, name);
    log::trace!("flatten {}", full_path);

    emit.begin_node(tree.label())?;
    if vi.has(Flags::FULLPATH) {
        emit.string(&full_path)?;
    } else {
        emit.string(name)?;
    }
    emit.align(CELL_LEN)?;

    let mut seen_name_prop = false;
    for prop in tree.properties() {
        check_name(&prop.name)?;
        if prop.name == "name" {
            seen_name_prop = true;
        }
        let len = value_len(prop.value.len())?;
        let name_offset = strings.find_or_insert(&prop.name) as u32;

        emit.property(prop.label())?;
        emit.cell(len)?;
        emit.cell(name_offset)?;
        if vi.has(Flags::VARALIGN) && prop.value.len() >= DOUBLE_CELL_LEN {
            emit.align(DOUBLE_CELL_LEN)?;
        }
        emit.data(prop)?;
        emit.align(CELL_LEN)?;
    }

    if vi.has(Flags::NAMEPROPS) && !seen_name_prop {
        let base_name = if name.is_empty() { "" } else { tree.base_name() };
        let len = base_name.len() + 1;

        emit.property(None)?;
        emit.cell(value_len(len)?)?;
        emit.cell(strings.find_or_insert("name") as u32)?;
        if vi.has(Flags::VARALIGN) && len >= DOUBLE_CELL_LEN {
            emit.align(DOUBLE_CELL_LEN)?;
        }
        emit.string(base_name)?;
        emit.align(CELL_LEN)?;
    }

    for child in tree.children() {
        flatten_node(child, &full_path, emit, strings, vi)?;
    }

    emit.end_node(tree.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version;
    use alloc::{format, string::String, vec::Vec};

    /// Records every call so call sequences can be compared.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Emitter for Recorder {
        fn cell(&mut self, value: u32) -> Result<()> {
            self.calls.push(format!("cell {:#x}", value));
            Ok(())
        }
        fn string(&mut self, value: &str) -> Result<()> {
            self.calls.push(format!("string {:?}", value));
            Ok(())
        }
        fn align(&mut self, align: usize) -> Result<()> {
            self.calls.push(format!("align {}", align));
            Ok(())
        }
        fn data(&mut self, prop: &Property) -> Result<()> {
            self.calls.push(format!("data {:?}", prop.value()));
            Ok(())
        }
        fn begin_node(&mut self, label: Option<&str>) -> Result<()> {
            self.calls.push(format!("begin {:?}", label));
            Ok(())
        }
        fn end_node(&mut self, label: Option<&str>) -> Result<()> {
            self.calls.push(format!("end {:?}", label));
            Ok(())
        }
        fn property(&mut self, label: Option<&str>) -> Result<()> {
            self.calls.push(format!("prop {:?}", label));
            Ok(())
        }
    }

    fn sample() -> Node {
        Node::root()
            .with_property(Property::string("model", "board"))
            .with_child(
                Node::new("cpu@0")
                    .with_label("cpu0")
                    .with_property(Property::new("reg", [0u8; 8])),
            )
    }

    #[test]
    fn short_names_without_legacy_flags() {
        let mut rec = Recorder::default();
        let mut strings = StringBlock::new();
        flatten_tree(&sample(), &mut rec, &mut strings, version::lookup(16).unwrap()).unwrap();
        assert_eq!(
            rec.calls,
            [
                "begin None",
                "string \"\"",
                "align 4",
                "prop None",
                "cell 0x6",
                "cell 0x0",
                "data [98, 111, 97, 114, 100, 0]",
                "align 4",
                "begin Some(\"cpu0\")",
                "string \"cpu@0\"",
                "align 4",
                "prop None",
                "cell 0x8",
                "cell 0x6",
                "data [0, 0, 0, 0, 0, 0, 0, 0]",
                "align 4",
                "end Some(\"cpu0\")",
                "end None",
            ]
        );
        assert_eq!(strings.as_slice(), b"model\0reg\0");
    }

    #[test]
    fn legacy_flags_add_paths_alignment_and_names() {
        let mut rec = Recorder::default();
        let mut strings = StringBlock::new();
        flatten_tree(&sample(), &mut rec, &mut strings, version::lookup(1).unwrap()).unwrap();
        let calls: Vec<&str> = rec.calls.iter().map(String::as_str).collect();
        assert_eq!(calls[1], "string \"/\"");
        // root: synthesized name property holds only the terminator
        assert_eq!(
            &calls[8..14],
            [
                "prop None",
                "cell 0x1",
                "cell 0x6",
                "string \"\"",
                "align 4",
                "begin Some(\"cpu0\")"
            ]
        );
        assert_eq!(calls[14], "string \"/cpu@0\"");
        // 8-byte value is aligned to 8 first
        assert_eq!(&calls[19..21], ["align 8", "data [0, 0, 0, 0, 0, 0, 0, 0]"]);
        // synthesized name keeps the base name only
        assert_eq!(&calls[22..26], ["prop None", "cell 0x4", "cell 0x6", "string \"cpu\""]);
        assert_eq!(strings.as_slice(), b"model\0name\0reg\0");
    }

    #[test]
    fn explicit_name_is_not_duplicated() {
        let tree = Node::root().with_property(Property::string("name", "custom"));
        let mut rec = Recorder::default();
        let mut strings = StringBlock::new();
        flatten_tree(&tree, &mut rec, &mut strings, version::lookup(2).unwrap()).unwrap();
        assert_eq!(rec.calls.iter().filter(|c| *c == "prop None").count(), 1);
    }

    #[test]
    fn rejects_nul_in_names() {
        let tree = Node::root().with_property(Property::cell("bad\0name", 1));
        let mut rec = Recorder::default();
        let mut strings = StringBlock::new();
        let err =
            flatten_tree(&tree, &mut rec, &mut strings, version::lookup(16).unwrap()).unwrap_err();
        assert!(matches!(
            err.error_type(),
            Some(crate::error::ErrorType::InvalidName { .. })
        ));
    }
}
