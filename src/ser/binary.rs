use super::buffer::DataBuffer;
use super::emitter::{Emitter, flatten_tree};
use super::string_block::StringBlock;
use super::FlattenConfig;
use crate::common::*;
use crate::error::Result;
use crate::tree::{BootInfo, Property, ReserveEntry};
use crate::version;
use alloc::vec::Vec;

/// Emitter writing the structure block bytes.
#[derive(Debug, Default)]
pub struct BinaryEmitter {
    dst: DataBuffer,
}

impl BinaryEmitter {
    pub fn new() -> BinaryEmitter {
        BinaryEmitter {
            dst: DataBuffer::new(),
        }
    }

    pub fn finish(self) -> DataBuffer {
        self.dst
    }
}

impl Emitter for BinaryEmitter {
    fn cell(&mut self, value: u32) -> Result<()> {
        self.dst.step_by_u32(value);
        Ok(())
    }

    fn string(&mut self, value: &str) -> Result<()> {
        self.dst.step_by_name(value);
        Ok(())
    }

    fn align(&mut self, align: usize) -> Result<()> {
        self.dst.step_align(align);
        Ok(())
    }

    fn data(&mut self, prop: &Property) -> Result<()> {
        self.dst.step_by_slice(prop.value());
        Ok(())
    }

    fn begin_node(&mut self, _label: Option<&str>) -> Result<()> {
        self.cell(FDT_BEGIN_NODE)
    }

    fn end_node(&mut self, _label: Option<&str>) -> Result<()> {
        self.cell(FDT_END_NODE)
    }

    fn property(&mut self, _label: Option<&str>) -> Result<()> {
        self.cell(FDT_PROP)
    }
}

/// Reservation entries followed by the zero terminator.
fn flatten_reserve_list(reserve_map: &[ReserveEntry]) -> DataBuffer {
    let mut dst = DataBuffer::new();
    for entry in reserve_map.iter().chain(core::iter::once(&ReserveEntry::new(0, 0))) {
        dst.step_by_u64(entry.address);
        dst.step_by_u64(entry.size);
    }
    dst
}

/// Flatten `bi` into a device tree blob.
///
/// Layout: header, padding to 8 bytes, reservation map with its terminator,
/// structure block, strings block.
pub fn to_blob(bi: &BootInfo, config: &FlattenConfig) -> Result<Vec<u8>> {
    let vi = version::lookup(config.version)?;

    let mut emitter = BinaryEmitter::new();
    let mut strings = StringBlock::new();
    flatten_tree(&bi.root, &mut emitter, &mut strings, vi)?;
    emitter.cell(FDT_END)?;
    let structure = emitter.finish();

    let reserve = flatten_reserve_list(&bi.reserve_map);

    let header = Header::build(
        vi,
        reserve.len(),
        structure.len(),
        strings.len(),
        config.boot_cpuid_phys,
    )?;

    let mut blob = DataBuffer::new();
    header.write(vi, &mut blob);
    blob.step_align(DOUBLE_CELL_LEN);
    debug_assert_eq!(blob.len(), header.off_mem_rsvmap as usize);
    blob.step_by_slice(reserve.as_slice());
    blob.step_by_slice(structure.as_slice());
    blob.step_by_slice(strings.as_slice());
    debug_assert_eq!(blob.len(), header.total_size as usize);
    Ok(blob.into_inner())
}
