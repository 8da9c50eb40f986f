use device_tree_blob::{
    BootInfo, ErrorType, FlattenConfig, Node, Property, Warning, error::HeaderField, from_blob,
    to_blob, version,
};

fn blob_of(root: Node, v: u32) -> Vec<u8> {
    to_blob(&BootInfo::new(Vec::new(), root), &FlattenConfig::default().with_version(v))
        .expect("encode blob")
}

fn board() -> Node {
    Node::root()
        .with_property(Property::string("compatible", "vendor,board"))
        .with_child(
            Node::new("cpus").with_child(Node::new("cpu@0").with_property(Property::cell("reg", 0))),
        )
}

fn be32(blob: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(blob[offset..offset + 4].try_into().unwrap())
}

fn put32(blob: &mut [u8], offset: usize, value: u32) {
    blob[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn kind(blob: &[u8]) -> ErrorType {
    from_blob(blob)
        .unwrap_err()
        .error_type()
        .cloned()
        .expect("typed error")
}

#[test]
fn truncated_blobs_are_rejected() {
    for v in version::supported() {
        let blob = blob_of(board(), v);
        for len in 0..blob.len() {
            assert!(from_blob(&blob[..len]).is_err(), "version {} length {}", v, len);
            // same prefix, but with a header claiming it is complete
            if len >= 8 {
                let mut cut = blob[..len].to_vec();
                put32(&mut cut, 4, len as u32);
                assert!(from_blob(&cut).is_err(), "version {} totalsize {}", v, len);
            }
        }
    }
}

#[test]
fn bad_magic() {
    let mut blob = blob_of(board(), 16);
    put32(&mut blob, 0, 0xfeedd00d);
    assert_eq!(kind(&blob), ErrorType::InvalidMagic { wrong_magic: 0xfeedd00d });
}

#[test]
fn bad_version() {
    let mut blob = blob_of(board(), 16);
    put32(&mut blob, 20, 4);
    assert_eq!(kind(&blob), ErrorType::UnknownVersion { version: 4 });
}

#[test]
fn header_shorter_than_version_needs() {
    let mut blob = blob_of(board(), 16);
    put32(&mut blob, 4, 20);
    assert!(matches!(kind(&blob), ErrorType::HeaderTooShort { .. }));
}

#[test]
fn offsets_past_total_size() {
    let mut blob = blob_of(board(), 16);
    let total = be32(&blob, 4);
    put32(&mut blob, 12, total + 4);
    assert_eq!(
        kind(&blob),
        ErrorType::OffsetOutOfBounds {
            field: HeaderField::Strings,
            current_index: total as u64 + 4,
            bound_index: total,
        }
    );

    let mut blob = blob_of(board(), 16);
    put32(&mut blob, 32, 0x1000);
    assert!(matches!(
        kind(&blob),
        ErrorType::OffsetOutOfBounds {
            field: HeaderField::StringsSize,
            ..
        }
    ));
}

#[test]
fn bad_opcode() {
    let mut blob = blob_of(board(), 16);
    let off_dt_struct = be32(&blob, 8) as usize;
    put32(&mut blob, off_dt_struct, 0x7);
    let err = from_blob(&blob).unwrap_err();
    assert_eq!(err.error_type(), Some(&ErrorType::InvalidTagId { wrong_id: 7 }));
    assert_eq!(err.file_index(), off_dt_struct);
}

#[test]
fn nop_needs_version_17() {
    let root = Node::root().with_property(Property::cell("x", 0));
    for v in [16, 17] {
        let mut blob = blob_of(root.clone(), v);
        let off_dt_struct = be32(&blob, 8) as usize;
        // BEGIN_NODE, "", then the four cells of the property
        let prop = off_dt_struct + 8;
        assert_eq!(be32(&blob, prop), 0x3);
        for i in 0..4 {
            put32(&mut blob, prop + 4 * i, 0x4);
        }
        let result = from_blob(&blob);
        if v == 17 {
            let decoded = result.expect("NOP is skipped");
            assert_eq!(decoded.boot_info.root, Node::root());
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.error_type(), Some(&ErrorType::InvalidTagId { wrong_id: 4 }));
            assert_eq!(err.file_index(), prop);
        }
    }
}

#[test]
fn missing_end() {
    let mut blob = blob_of(Node::root(), 16);
    let off_dt_struct = be32(&blob, 8) as usize;
    assert_eq!(be32(&blob, off_dt_struct + 12), 0x9);
    put32(&mut blob, off_dt_struct + 12, 0x2);
    let err = from_blob(&blob).unwrap_err();
    assert_eq!(err.error_type(), Some(&ErrorType::ExpectStructEnd));
    assert_eq!(err.file_index(), off_dt_struct + 12);
}

#[test]
fn premature_end() {
    let mut blob = blob_of(Node::root(), 16);
    let off_dt_struct = be32(&blob, 8) as usize;
    assert_eq!(be32(&blob, off_dt_struct + 8), 0x2);
    put32(&mut blob, off_dt_struct + 8, 0x9);
    let err = from_blob(&blob).unwrap_err();
    assert_eq!(err.error_type(), Some(&ErrorType::PrematureEnd));
    assert_eq!(err.file_index(), off_dt_struct + 8);
}

#[test]
fn full_path_must_extend_parent() {
    let mut blob = blob_of(board(), 1);
    let needle = b"/cpus/cpu@0";
    let pos = blob
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("nested path in blob");
    blob[pos + 4] = b'x';
    assert_eq!(
        kind(&blob),
        ErrorType::PathNotChild {
            path: "/cpux/cpu@0".into(),
            parent_path: "/cpus".into(),
        }
    );
}

#[test]
fn bad_node_name_is_only_a_warning() {
    let root = Node::root().with_child(Node::new("Bad Name@XY"));
    let decoded = from_blob(&blob_of(root.clone(), 16)).expect("decode blob");
    assert_eq!(decoded.boot_info.root, root);
    assert_eq!(decoded.warnings.len(), 1);
    assert!(matches!(
        &decoded.warnings[0],
        Warning::IncorrectNodeName { name, .. } if name == "Bad Name@XY"
    ));
}
