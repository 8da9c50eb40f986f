use super::emitter::{Emitter, flatten_tree};
use super::string_block::StringBlock;
use super::{DataChunk, Escaped, FlattenConfig, data_chunks};
use crate::common::*;
use crate::error::Result;
use crate::tree::{BootInfo, Property};
use crate::version::{self, Flags};
use core::fmt::Write;

const SYMPREFIX: &str = "dt";

/// Emitter writing assembler directives.
pub struct AsmEmitter<'w, W: Write> {
    out: &'w mut W,
}

impl<'w, W: Write> AsmEmitter<'w, W> {
    pub fn new(out: &'w mut W) -> Self {
        AsmEmitter { out }
    }
}

impl<W: Write> Emitter for AsmEmitter<'_, W> {
    fn cell(&mut self, value: u32) -> Result<()> {
        writeln!(self.out, "\t.long\t{:#x}", value)?;
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        writeln!(self.out, "\t.string\t\"{}\"", Escaped(value))?;
        Ok(())
    }

    fn align(&mut self, align: usize) -> Result<()> {
        writeln!(self.out, "\t.balign\t{}", align)?;
        Ok(())
    }

    fn data(&mut self, prop: &Property) -> Result<()> {
        for chunk in data_chunks(prop.value()) {
            match chunk {
                DataChunk::Long(v) => writeln!(self.out, "\t.long\t{:#x}", v)?,
                DataChunk::Short(v) => writeln!(self.out, "\t.short\t{:#x}", v)?,
                DataChunk::Byte(v) => writeln!(self.out, "\t.byte\t{:#x}", v)?,
            }
        }
        Ok(())
    }

    fn begin_node(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            write!(self.out, "\t.globl\t{0}\n{0}:\n", label)?;
        }
        writeln!(self.out, "\t.long\tOF_DT_BEGIN_NODE")?;
        Ok(())
    }

    fn end_node(&mut self, label: Option<&str>) -> Result<()> {
        writeln!(self.out, "\t.long\tOF_DT_END_NODE")?;
        if let Some(label) = label {
            write!(self.out, "\t.globl\t{0}_end\n{0}_end:\n", label)?;
        }
        Ok(())
    }

    fn property(&mut self, label: Option<&str>) -> Result<()> {
        if let Some(label) = label {
            write!(self.out, "\t.globl\t{0}\n{0}:\n", label)?;
        }
        writeln!(self.out, "\t.long\tOF_DT_PROP")?;
        Ok(())
    }
}

/// `.globl` symbol plus its plain and underscored definitions.
fn emit_label<W: Write>(out: &mut W, label: &str) -> Result<()> {
    write!(
        out,
        "\t.globl\t{0}_{1}\n{0}_{1}:\n_{0}_{1}:\n",
        SYMPREFIX, label
    )?;
    Ok(())
}

pub(crate) fn write_defines<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "/* autogenerated by dtc, do not edit */\n")?;
    writeln!(out, "#define OF_DT_HEADER {:#x}", DEVICE_TREE_MAGIC)?;
    writeln!(out, "#define OF_DT_BEGIN_NODE {:#x}", FDT_BEGIN_NODE)?;
    writeln!(out, "#define OF_DT_END_NODE {:#x}", FDT_END_NODE)?;
    writeln!(out, "#define OF_DT_PROP {:#x}", FDT_PROP)?;
    writeln!(out, "#define OF_DT_END {:#x}", FDT_END)?;
    writeln!(out)?;
    Ok(())
}

/// Write `bi` as assembler source that builds the same blob layout as
/// [`to_blob`](super::to_blob), with header fields computed from symbol
/// differences.
pub fn to_asm<W: Write>(bi: &BootInfo, config: &FlattenConfig, out: &mut W) -> Result<()> {
    let vi = version::lookup(config.version)?;
    let p = SYMPREFIX;

    write_defines(out)?;

    emit_label(out, "blob_start")?;
    emit_label(out, "header")?;
    writeln!(out, "\t.long\tOF_DT_HEADER /* magic */")?;
    writeln!(out, "\t.long\t_{p}_blob_end - _{p}_blob_start /* totalsize */")?;
    writeln!(out, "\t.long\t_{p}_struct_start - _{p}_blob_start /* off_dt_struct */")?;
    writeln!(out, "\t.long\t_{p}_strings_start - _{p}_blob_start /* off_dt_strings */")?;
    writeln!(out, "\t.long\t_{p}_reserve_map - _{p}_blob_start /* off_mem_rsvmap */")?;
    writeln!(out, "\t.long\t{} /* version */", vi.version)?;
    writeln!(out, "\t.long\t{} /* last_comp_version */", vi.last_comp_version)?;
    if vi.has(Flags::BOOTCPUID) {
        writeln!(out, "\t.long\t{}\t/*boot_cpuid_phys*/", config.boot_cpuid_phys)?;
    }
    if vi.has(Flags::STRTABSIZE) {
        writeln!(
            out,
            "\t.long\t_{p}_strings_end - _{p}_strings_start\t/* size_dt_strings */"
        )?;
    }
    if vi.has(Flags::STRUCTSIZE) {
        writeln!(
            out,
            "\t.long\t_{p}_struct_end - _{p}_struct_start\t/* size_dt_struct */"
        )?;
    }

    AsmEmitter::new(out).align(DOUBLE_CELL_LEN)?;
    emit_label(out, "reserve_map")?;
    writeln!(out, "/* Memory reserve map from source file */")?;
    // .long halves, since .quad is missing from some assemblers
    for entry in &bi.reserve_map {
        for value in [entry.address, entry.size] {
            writeln!(out, "\t.long\t0x{:08x}", (value >> 32) as u32)?;
            writeln!(out, "\t.long\t0x{:08x}", value as u32)?;
        }
    }
    writeln!(out, "\t.long\t0, 0\n\t.long\t0, 0")?;

    emit_label(out, "struct_start")?;
    let mut strings = StringBlock::new();
    flatten_tree(&bi.root, &mut AsmEmitter::new(out), &mut strings, vi)?;
    writeln!(out, "\t.long\tOF_DT_END")?;
    emit_label(out, "struct_end")?;

    emit_label(out, "strings_start")?;
    for name in strings.iter() {
        writeln!(out, "\t.string \"{}\"", Escaped::from_bytes(name))?;
    }
    emit_label(out, "strings_end")?;

    emit_label(out, "blob_end")?;
    Ok(())
}
