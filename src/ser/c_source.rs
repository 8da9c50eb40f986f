use super::asm::write_defines;
use super::emitter::{Emitter, flatten_tree};
use super::string_block::StringBlock;
use super::{DataChunk, Escaped, FlattenConfig, data_chunks};
use crate::common::DOUBLE_CELL_LEN;
use crate::error::Result;
use crate::tree::{BootInfo, Property};
use crate::version::{self, Flags};
use core::fmt::Write;

/// Emitter writing struct members of C source.
///
/// Every member gets a fresh identifier from `unique`, which lives and dies
/// with the emitter.
pub struct CEmitter<'w, W: Write> {
    out: &'w mut W,
    unique: u32,
}

impl<'w, W: Write> CEmitter<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        CEmitter { out, unique: 0 }
    }

    fn next_unique(&mut self) -> u32 {
        let id = self.unique;
        self.unique += 1;
        id
    }
}

impl<W: Write> Emitter for CEmitter<'_, W> {
    fn cell(&mut self, value: u32) -> Result<()> {
        let id = self.next_unique();
        writeln!(self.out, "\tu32\tc{} = {:#x};", id, value)?;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        let id = self.next_unique();
        writeln!(self.out, "\tunsigned char *c{}  = \t\"{}\";", id, Escaped(value))?;
        Ok(())
    }

    fn align(&mut self, align: usize) -> Result<()> {
        writeln!(self.out, "\tALIGN(x)\t{}", align)?;
        Ok(())
    }

    fn data(&mut self, prop: &Property) -> Result<()> {
        for chunk in data_chunks(prop.value()) {
            let id = self.next_unique();
            match chunk {
                DataChunk::Long(v) => writeln!(self.out, "\tu32 d{} = \t{:#x};", id, v)?,
                DataChunk::Short(v) => writeln!(self.out, "\tu16 d{} = \t{:#x};", id, v)?,
                DataChunk::Byte(v) => writeln!(self.out, "\tu8 d{} = \t{:#x};", id, v)?,
            }
        }
        Ok(())
    }

    fn begin_node(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            writeln!(self.out, "struct\t{} {{", label)?;
        }
        let id = self.next_unique();
        writeln!(self.out, "\tu32\tn{} = OF_DT_BEGIN_NODE;", id)?;
        Ok(())
    }

    fn end_node(&mut self, label: Option<&str>) -> Result<()> {
        let id = self.next_unique();
        writeln!(self.out, "\tu32\ten{} = OF_DT_END_NODE;", id)?;
        if let Some(label) = label {
            writeln!(self.out, "\t\t{};", label)?;
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
}

fn struct_start<W: Write>(out: &mut W, label: &str) -> Result<()> {
    writeln!(out, "struct\t{} {{", label)?;
    Ok(())
}

fn struct_end<W: Write>(out: &mut W, label: &str) -> Result<()> {
    writeln!(out, "}}; /*{}*/", label)?;
    Ok(())
}

/// Write `bi` as a C `struct blob` whose members spell out the blob.
pub fn to_c<W: Write>(bi: &BootInfo, config: &FlattenConfig, out: &mut W) -> Result<()> {
    let vi = version::lookup(config.version)?;

    write_defines(out)?;

    struct_start(out, "blob")?;
    writeln!(out, "\tu32\tmagic = OF_DT_HEADER;")?;
    writeln!(out, "\tu32\ttotalsize = sizeof(struct blob);")?;
    writeln!(out, "\tu32\toffdt = offsetof(struct blob, dt);")?;
    writeln!(out, "\tu32\toffstrings = offsetof(struct blob, strings);")?;
    writeln!(out, "\tu32\toffreserve = offsetof(struct blob, reserve);")?;
    writeln!(out, "\tu32\tversion = {};", vi.version)?;
    writeln!(out, "\tu32\tlast_comp_version = {};", vi.last_comp_version)?;
    if vi.has(Flags::BOOTCPUID) {
        writeln!(out, "\tu32\tboot_cpuid_phys = {:#x};", config.boot_cpuid_phys)?;
    }
    if vi.has(Flags::STRTABSIZE) {
        writeln!(out, "\tu32\tsize_dt_strings = sizeof(dt.strings);")?;
    }
    if vi.has(Flags::STRUCTSIZE) {
        writeln!(out, "\tu32\tsize_dt_struct = sizeof(struct dt_blob);")?;
    }

    CEmitter::new(out).align(DOUBLE_CELL_LEN)?;
    writeln!(out, "\t/* Memory reserve map from source file */")?;
    writeln!(out, "\tu64 reservemap[] = {{")?;
    for entry in &bi.reserve_map {
        writeln!(out, "\tu64\t{:#x}", entry.address)?;
        writeln!(out, "\tu64\t{:#x}", entry.size)?;
    }
    writeln!(out, "\t0, 0")?;
    writeln!(out, "\t}};")?;

    struct_start(out, "dt_blob")?;
    let mut strings = StringBlock::new();
    flatten_tree(&bi.root, &mut CEmitter::new(out), &mut strings, vi)?;
    writeln!(out, "\tu32\tend = OF_DT_END;")?;
    struct_end(out, "dt_blob")?;

    writeln!(out, "\tchar *stringtable[] = {{")?;
    for name in strings.iter() {
        writeln!(out, "\t\"{}\"", Escaped::from_bytes(name))?;
    }
    writeln!(out, "\t}};")?;

    struct_end(out, "blob")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;
    use alloc::{string::String, vec::Vec};

    #[test]
    fn counter_is_per_emitter() {
        let prop = Property::new("x", [0u8, 0, 0, 1, 2]);
        let mut first = String::new();
        let mut emitter = CEmitter::new(&mut first);
        emitter.cell(7).unwrap();
        emitter.data(&prop).unwrap();
        assert_eq!(
            first,
            "\tu32\tc0 = 0x7;\n\tu32 d1 = \t0x1;\n\tu8 d2 = \t0x2;\n"
        );

        let mut second = String::new();
        CEmitter::new(&mut second).cell(7).unwrap();
        assert_eq!(second, "\tu32\tc0 = 0x7;\n");
    }

    #[test]
    fn labelled_property_opens_struct() {
        let mut out = String::new();
        CEmitter::new(&mut out).property(Some("clk")).unwrap();
        assert_eq!(out, "\tstruct p0\tclk{\n\tu32 p1 = \tOF_DT_PROP;\n");
    }

    #[test]
    fn whole_blob_struct() {
        let root = Node::root().with_child(Node::new("cpus"));
        let bi = BootInfo::new(Vec::new(), root);
        let mut out = String::new();
        to_c(&bi, &FlattenConfig::default().with_version(1), &mut out).unwrap();
        assert!(out.contains("struct\tblob {\n\tu32\tmagic = OF_DT_HEADER;\n"));
        assert!(out.contains("\tu32\tversion = 1;\n\tu32\tlast_comp_version = 1;\n\tALIGN(x)\t8\n"));
        assert!(!out.contains("boot_cpuid_phys"));
        assert!(out.contains("\tu64 reservemap[] = {\n\t0, 0\n\t};\n"));
        assert!(out.contains("struct\tdt_blob {\n\tu32\tn0 = OF_DT_BEGIN_NODE;\n\tunsigned char *c1  = \t\"/\";\n"));
        assert!(out.contains("\tunsigned char *c"));
        assert!(out.contains("\"/cpus\";\n"));
        assert!(out.contains("\tu32\tend = OF_DT_END;\n}; /*dt_blob*/\n\tchar *stringtable[] = {\n\t\"name\"\n\t};\n}; /*blob*/\n"));
    }
}
