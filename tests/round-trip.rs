use device_tree_blob::{
    BootInfo, FlattenConfig, Node, Property, ReserveEntry, error::Error, from_blob, to_blob,
    version,
};

fn sample_tree() -> BootInfo {
    let root = Node::root()
        .with_property(Property::cell("#address-cells", 2))
        .with_property(Property::cell("#size-cells", 2))
        .with_property(Property::string("compatible", "vendor,board"))
        .with_property(Property::new("dma-coherent", Vec::new()))
        .with_child(
            Node::new("cpus").with_property(Property::cell("#address-cells", 1)).with_child(
                Node::new("cpu@0")
                    .with_property(Property::cell("reg", 0))
                    .with_property(Property::string("riscv,isa", "rv64imafdc")),
            ),
        )
        .with_child(Node::new("memory@80000000").with_property(Property::new(
            "reg",
            [0u8, 0, 0, 0, 0x80, 0, 0, 0, 0, 0, 0, 0, 0x40, 0, 0, 0],
        )))
        .with_child(
            Node::new("soc").with_child(
                Node::new("serial@10000000")
                    .with_property(Property::new("reg", [0x10u8, 0, 0, 0, 0, 0, 0x01, 0]))
                    .with_property(Property::new("odd", [1u8, 2, 3])),
            ),
        );
    BootInfo::new(
        vec![
            ReserveEntry::new(0x8000_0000, 0x20_0000),
            ReserveEntry::new(0x1_0000_0000, 0x1000),
        ],
        root,
    )
}

/// The tree a decoder sees from a version with synthesized `name` properties.
fn with_name_props(node: &Node) -> Node {
    let mut out = Node::new(node.name());
    for prop in node.properties() {
        out.add_property(prop.clone());
    }
    if node.get_prop("name").is_none() {
        out.add_property(Property::string("name", node.base_name()));
    }
    for child in node.children() {
        out.add_child(with_name_props(child));
    }
    out
}

#[test]
fn every_version_round_trips() -> Result<(), Error> {
    let bi = sample_tree();
    for v in version::supported() {
        let vi = version::lookup(v)?;
        let blob = to_blob(&bi, &FlattenConfig::default().with_version(v))?;
        let decoded = from_blob(&blob)?;
        assert!(decoded.warnings.is_empty(), "version {}", v);
        assert_eq!(decoded.header.version, v);
        assert_eq!(decoded.header.total_size as usize, blob.len());
        assert_eq!(decoded.boot_info.reserve_map, bi.reserve_map, "version {}", v);
        if vi.has(version::Flags::NAMEPROPS) {
            assert_eq!(decoded.boot_info.root, with_name_props(&bi.root), "version {}", v);
        } else {
            assert_eq!(decoded.boot_info.root, bi.root, "version {}", v);
        }
    }
    Ok(())
}

#[test]
fn decoded_paths() -> Result<(), Error> {
    for v in [1, 16] {
        let blob = to_blob(&sample_tree(), &FlattenConfig::default().with_version(v))?;
        let decoded = from_blob(&blob)?;
        let root = &decoded.boot_info.root;
        assert_eq!(root.full_path(), Some("/"));
        assert_eq!(root.name(), "");
        let cpus = root.get_child("cpus").expect("cpus node");
        assert_eq!(cpus.full_path(), Some("/cpus"));
        let cpu = cpus.get_child("cpu@0").expect("cpu node");
        assert_eq!(cpu.full_path(), Some("/cpus/cpu@0"));
        assert_eq!(cpu.base_name(), "cpu");
    }
    Ok(())
}

#[test]
fn end_to_end_example() -> Result<(), Error> {
    let root = Node::root()
        .with_property(Property::string("compatible", "vendor,board"))
        .with_child(Node::new("cpu@0").with_property(Property::cell("reg", 0)));
    let blob = to_blob(&BootInfo::new(Vec::new(), root), &FlattenConfig::default())?;
    let decoded = from_blob(&blob)?;

    let root = &decoded.boot_info.root;
    assert_eq!(root.properties().len(), 1);
    assert_eq!(root.properties()[0].name(), "compatible");
    assert_eq!(root.properties()[0].value(), b"vendor,board\0");
    assert_eq!(root.children().len(), 1);
    let cpu = &root.children()[0];
    assert_eq!(cpu.name(), "cpu@0");
    assert_eq!(cpu.base_name(), "cpu");
    assert_eq!(cpu.unit_address(), Some("0"));
    assert_eq!(cpu.get_prop("reg").map(Property::value), Some(&[0u8, 0, 0, 0][..]));
    assert!(decoded.boot_info.reserve_map.is_empty());
    Ok(())
}

#[test]
fn empty_reservation_map() -> Result<(), Error> {
    let bi = BootInfo::new(Vec::new(), Node::root());
    let blob = to_blob(&bi, &FlattenConfig::default())?;
    let decoded = from_blob(&blob)?;
    let rsvmap = decoded.header.off_mem_rsvmap as usize;
    // exactly one terminator, then the structure block
    assert_eq!(&blob[rsvmap..rsvmap + 16], &[0u8; 16]);
    assert_eq!(decoded.header.off_dt_struct as usize, rsvmap + 16);
    assert!(decoded.boot_info.reserve_map.is_empty());
    Ok(())
}

#[test]
fn version_one_ignores_later_header_fields() -> Result<(), Error> {
    let mut blob = to_blob(&sample_tree(), &FlattenConfig::default().with_version(1))?;
    // v1 header is 28 bytes; the padding up to the reserve map sits where
    // later versions keep boot_cpuid_phys
    assert_eq!(&blob[28..32], &[0u8; 4]);
    blob[28..32].copy_from_slice(&[0xff; 4]);
    let decoded = from_blob(&blob)?;
    assert_eq!(decoded.header.boot_cpuid_phys, None);
    assert_eq!(decoded.header.size_dt_strings, None);
    assert_eq!(decoded.header.size_dt_struct, None);
    assert_eq!(decoded.boot_info.root, with_name_props(&sample_tree().root));
    Ok(())
}

#[test]
fn boot_cpu_is_kept() -> Result<(), Error> {
    let config = FlattenConfig::default().with_boot_cpuid_phys(3);
    let blob = to_blob(&sample_tree(), &config)?;
    assert_eq!(from_blob(&blob)?.header.boot_cpuid_phys, Some(3));
    Ok(())
}

#[test]
fn trailing_bytes_are_ignored() -> Result<(), Error> {
    let bi = sample_tree();
    let mut blob = to_blob(&bi, &FlattenConfig::default())?;
    blob.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(from_blob(&blob)?.boot_info, bi);
    Ok(())
}

#[test]
fn unknown_version_is_rejected() {
    assert!(version::lookup(99).is_err());
    let err = to_blob(&sample_tree(), &FlattenConfig::default().with_version(99)).unwrap_err();
    assert_eq!(
        err.error_type(),
        Some(&device_tree_blob::ErrorType::UnknownVersion { version: 99 })
    );
}

#[test]
fn root_named_slash() -> Result<(), Error> {
    let tree = |root: Node| {
        root.with_property(Property::string("compatible", "vendor,board"))
            .with_child(Node::new("cpus").with_child(Node::new("cpu@0")))
    };
    for v in [1, 16] {
        let bi = BootInfo::new(Vec::new(), tree(Node::new("/")));
        let blob = to_blob(&bi, &FlattenConfig::default().with_version(v))?;
        let decoded = from_blob(&blob)?;
        assert!(decoded.warnings.is_empty(), "version {}", v);
        let root = &decoded.boot_info.root;
        assert_eq!(root.full_path(), Some("/"), "version {}", v);
        let cpu = root.find("/cpus/cpu@0").expect("cpu node");
        assert_eq!(cpu.full_path(), Some("/cpus/cpu@0"), "version {}", v);
        // same blob as the unnamed root
        let unnamed = BootInfo::new(Vec::new(), tree(Node::root()));
        assert_eq!(blob, to_blob(&unnamed, &FlattenConfig::default().with_version(v))?);
    }
    Ok(())
}
