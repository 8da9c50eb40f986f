use super::FlattenConfig;
use super::emitter::Emitter;
use crate::error::{Error, Result};
use crate::tree::{BootInfo, Node, Property};
use crate::version;
use alloc::{string::String, vec::Vec};
use core::fmt::Write;

/// Make a C identifier out of a node or property name.
///
/// With `instantiate` the unit address is kept after a `_`, otherwise the
/// name stops at the `@`.
pub fn clean(name: &str, instantiate: bool) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '#' => cleaned.push('H'),
            '@' if instantiate => cleaned.push('_'),
            '@' => break,
            '-' | ',' => cleaned.push('_'),
            c => cleaned.push(c),
        }
    }
    cleaned
}

/// Include directory named by a `config` value: up to the `@`, with `,`
/// as path separator.
fn config_path(value: &str) -> String {
    value
        .split('@')
        .next()
        .unwrap_or_default()
        .replace(',', "/")
}

/// Value bytes up to the first zero, as text.
fn value_str(prop: &Property) -> Result<&str> {
    let value = prop.value();
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    core::str::from_utf8(&value[..end]).map_err(|e| Error::utf8(e, 0))
}

#[derive(Debug)]
struct Device {
    label: String,
    parent: Option<usize>,
    next_sibling: Option<usize>,
    first_child: Option<usize>,
    next: Option<usize>,
}

/// Device relations of the tree, indexed in pre-order.
#[derive(Debug)]
struct DeviceArena {
    devices: Vec<Device>,
}

impl DeviceArena {
    fn build(root: &Node) -> DeviceArena {
        let mut arena = DeviceArena {
            devices: Vec::new(),
        };
        let mut post_order = Vec::new();
        arena.insert(root, None, &mut post_order);
        arena.devices[0].label = String::from("root");

        // root first, then every other node children-first
        post_order.pop();
        let mut prev = 0;
        for index in post_order {
            arena.devices[prev].next = Some(index);
            prev = index;
        }
        arena
    }

    fn insert(&mut self, node: &Node, parent: Option<usize>, post_order: &mut Vec<usize>) -> usize {
        let index = self.devices.len();
        self.devices.push(Device {
            label: clean(node.name(), true),
            parent,
            next_sibling: None,
            first_child: None,
            next: None,
        });
        let mut prev_child: Option<usize> = None;
        for child in node.children() {
            let child_index = self.insert(child, Some(index), post_order);
            match prev_child {
                Some(prev) => self.devices[prev].next_sibling = Some(child_index),
                None => self.devices[index].first_child = Some(child_index),
            }
            prev_child = Some(child_index);
        }
        post_order.push(index);
        index
    }

    fn label(&self, index: usize) -> &str {
        &self.devices[index].label
    }

    fn next_chain(&self) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(Some(0), |&index| self.devices[index].next)
    }
}

/// Emitter for the board dialect, where every node becomes a
/// `struct device` initializer written by [`Emitter::special`].
pub struct BoardEmitter<'w, W: Write> {
    out: &'w mut W,
    unique: u32,
    arena: DeviceArena,
    visited: usize,
}

impl<'w, W: Write> BoardEmitter<'w, W> {
    /// `root` must be the tree whose nodes are later handed to `special`
    /// in pre-order.
    pub fn new(out: &'w mut W, root: &Node) -> Self {
        BoardEmitter {
            out,
            unique: 0,
            arena: DeviceArena::build(root),
            visited: 0,
        }
    }

    fn next_unique(&mut self) -> u32 {
        let id = self.unique;
        self.unique += 1;
        id
    }
}

impl<W: Write> Emitter for BoardEmitter<'_, W> {
    fn cell(&mut self, value: u32) -> Result<()> {
        let id = self.next_unique();
        writeln!(self.out, "\tu32\tc{} = {:#x};", id, value)?;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        let id = self.next_unique();
        writeln!(
            self.out,
            "\tunsigned char *c{}  = \t\"{}\";",
            id,
            super::Escaped(value)
        )?;
        Ok(())
    }

    fn align(&mut self, align: usize) -> Result<()> {
        writeln!(self.out, "\tALIGN(x)\t{}", align)?;
        Ok(())
    }

    fn data(&mut self, prop: &Property) -> Result<()> {
        if prop.value().is_empty() {
            return Ok(());
        }
        write!(self.out, "\t.{} = {{", clean(prop.name(), true))?;
        for byte in prop.value() {
            write!(self.out, "0x{:02x},", byte)?;
        }
        writeln!(self.out, "}},")?;
        Ok(())
    }

    fn begin_node(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            writeln!(self.out, "struct\t{} {{", label)?;
        }
        Ok(())
    }

    fn end_node(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            writeln!(self.out, "}}; /*{}*/", label)?;
        }
        Ok(())
    }

    fn property(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            let id = self.next_unique();
            writeln!(self.out, "\tstruct p{}\t{}{{", id, label)?;
        }
        let id = self.next_unique();
        writeln!(self.out, "\tu32 p{} = \tOF_DT_PROP;", id)?;
        Ok(())
    }

    fn special(&mut self, node: &Node) -> Result<()> {
        let index = self.visited;
        self.visited += 1;
        let arena = &self.arena;
        let device = arena
            .devices
            .get(index)
            .ok_or_else(|| Error::Custom(String::from("node outside the described tree")))?;
        let out = &mut *self.out;
        let is_root = index == 0;
        let mut ops_set = false;

        writeln!(out, "struct device dev_{} = {{", device.label)?;
        if is_root {
            writeln!(out, "\t.path =  {{ .type = DEVICE_PATH_ROOT }},")?;
        }
        for prop in node.properties() {
            match prop.name() {
                "pcidomain" => writeln!(
                    out,
                    "\t.path = {{.type=DEVICE_PATH_PCI_DOMAIN,.u={{.pci_domain={{ .domain = {} }}}}}},",
                    value_str(prop)?
                )?,
                "pcipath" => writeln!(
                    out,
                    "\t.path = {{.type=DEVICE_PATH_PCI,.u={{.pci={{ .devfn = PCI_DEVFN({})}}}}}},",
                    value_str(prop)?
                )?,
                "on_mainboard" => writeln!(out, "\t.on_mainboard = 1,")?,
                "enabled" => writeln!(out, "\t.enabled = 1,")?,
                "config" => {
                    writeln!(out, "\t.chip_ops = &{}_ops,", clean(value_str(prop)?, false))?;
                    writeln!(out, "\t.chip_info = &{},", clean(&device.label, true))?;
                }
                name @ ("ops" | "ops_pci" | "ops_pci_bus" | "ops_smbus_bus") => {
                    writeln!(out, "\t.{} = &{},", name, clean(value_str(prop)?, false))?;
                    ops_set = true;
                }
                _ => {}
            }
        }
        if let Some(sibling) = device.next_sibling {
            writeln!(out, "\t.sibling = &dev_{},", arena.label(sibling))?;
        }
        if let Some(next) = device.next {
            writeln!(out, "\t.next = &dev_{},", arena.label(next))?;
        }
        if let Some(child) = device.first_child {
            writeln!(out, "\t.links = 1,")?;
            writeln!(out, "\t.link = {{")?;
            writeln!(out, "\t\t[0] = {{")?;
            writeln!(out, "\t\t\t.dev = &dev_{},", device.label)?;
            writeln!(out, "\t\t\t.link = 0,")?;
            writeln!(out, "\t\t\t.children = &dev_{}", arena.label(child))?;
            writeln!(out, "\t\t}},")?;
            writeln!(out, "\t}},")?;
        }
        let bus = device.parent.unwrap_or(index);
        writeln!(out, "\t.bus = &dev_{}.link[0],", arena.label(bus))?;
        if !ops_set && is_root {
            writeln!(out, "\t.ops = &default_dev_ops_root,")?;
        }
        writeln!(out, "\t.dtsname = \"{}\",", device.label)?;
        writeln!(out, "}};")?;
        Ok(())
    }
}

fn emit_includes<W: Write>(node: &Node, out: &mut W) -> Result<()> {
    for prop in node.properties() {
        if prop.name() == "config" {
            writeln!(out, "#include <{}/config.h>", config_path(value_str(prop)?))?;
        }
    }
    for child in node.children() {
        emit_includes(child, out)?;
    }
    Ok(())
}

fn emit_structinits<E: Emitter + ?Sized>(node: &Node, emit: &mut E) -> Result<()> {
    emit.special(node)?;
    for child in node.children() {
        emit_structinits(child, emit)?;
    }
    Ok(())
}

/// Write `bi` as static `struct device` initializers, one per node, linked
/// by sibling, child, bus and `next` pointers. `code` is copied verbatim
/// between the declarations and the initializers.
pub fn to_board<W: Write>(
    bi: &BootInfo,
    config: &FlattenConfig,
    code: Option<&str>,
    out: &mut W,
) -> Result<()> {
    version::lookup(config.version)?;

    writeln!(out, "#include <device/device.h>\n#include <device/pci.h>")?;
    emit_includes(&bi.root, out)?;

    let mut emitter = BoardEmitter::new(out, &bi.root);
    let labels: Vec<String> = emitter
        .arena
        .next_chain()
        .map(|index| emitter.arena.label(index).into())
        .collect();
    for label in &labels {
        writeln!(emitter.out, "struct device dev_{};", label)?;
    }
    if let Some(code) = code {
        writeln!(emitter.out, "{}", code)?;
    }

    emit_structinits(&bi.root, &mut emitter)
}
