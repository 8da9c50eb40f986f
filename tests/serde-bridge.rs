use serde::{Deserialize, Serialize};

use device_tree_blob::{
    BootInfo, FlattenConfig, error::Error, from_blob, from_tree, to_blob, to_tree,
};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Chosen {
    stdout_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bootargs: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Memory {
    device_type: String,
    reg: (u64, u64),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Tree {
    #[serde(rename = "#address-cells")]
    address_cells: u32,
    #[serde(rename = "#size-cells")]
    size_cells: u32,
    model: String,
    #[serde(rename = "dma-coherent", default)]
    dma_coherent: bool,
    chosen: Chosen,
    #[serde(rename = "memory@80000000")]
    memory: Memory,
}

#[test]
fn struct_through_blob() -> Result<(), Error> {
    let value = Tree {
        address_cells: 2,
        size_cells: 2,
        model: "riscv-virtio,qemu".into(),
        dma_coherent: true,
        chosen: Chosen {
            stdout_path: "/soc/serial@10000000".into(),
            bootargs: None,
        },
        memory: Memory {
            device_type: "memory".into(),
            reg: (0x8000_0000, 0x8000_0000),
        },
    };

    let root = to_tree(&value)?;
    assert_eq!(root.name(), "");
    assert!(root.get_prop("dma-coherent").is_some_and(|p| p.value().is_empty()));
    assert!(root.find("/chosen").is_some_and(|c| c.get_prop("bootargs").is_none()));
    assert_eq!(root.chosen_stdout_path(), Some("/soc/serial@10000000"));

    let blob = to_blob(&BootInfo::new(Vec::new(), root), &FlattenConfig::default())?;
    let decoded = from_blob(&blob)?;
    let back: Tree = from_tree(&decoded.boot_info.root)?;
    assert_eq!(back, value);
    Ok(())
}

#[test]
fn false_flag_is_absent() -> Result<(), Error> {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Flags {
        #[serde(default)]
        enabled: bool,
        status: String,
    }
    let value = Flags {
        enabled: false,
        status: "disabled".into(),
    };
    let root = to_tree(&value)?;
    assert!(root.get_prop("enabled").is_none());
    assert_eq!(root.get_prop("status").map(|p| p.value()), Some(&b"disabled\0"[..]));
    assert_eq!(from_tree::<Flags>(&root)?, value);
    Ok(())
}

#[test]
fn node_serializes_as_itself() -> Result<(), Error> {
    let value = Memory {
        device_type: "memory".into(),
        reg: (0, 0x1000),
    };
    let root = to_tree(&value)?;
    assert_eq!(to_tree(&root)?, root);
    Ok(())
}
