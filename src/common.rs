use crate::error::{Error, HeaderField, Result};
use crate::ser::buffer::DataBuffer;
use crate::version::{self, Flags, VersionInfo};

pub(crate) const DEVICE_TREE_MAGIC: u32 = 0xD00DFEED;
pub(crate) const U32_LEN: usize = core::mem::size_of::<u32>();
pub(crate) const U64_LEN: usize = core::mem::size_of::<u64>();

/// Machine cell size, the alignment of everything in the structure block.
pub(crate) const CELL_LEN: usize = U32_LEN;
/// Alignment of the reservation map and of large values under `VARALIGN`.
pub(crate) const DOUBLE_CELL_LEN: usize = U64_LEN;
pub(crate) const RESERVE_ENTRY_LEN: usize = 2 * U64_LEN;

pub(crate) const FDT_BEGIN_NODE: u32 = 0x1;
pub(crate) const FDT_END_NODE: u32 = 0x2;
pub(crate) const FDT_PROP: u32 = 0x3;
pub(crate) const FDT_NOP: u32 = 0x4;
pub(crate) const FDT_END: u32 = 0x9;

pub(crate) const HEADER_V1_LEN: u32 = 7 * U32_LEN as u32;
pub(crate) const HEADER_V2_LEN: u32 = 8 * U32_LEN as u32;
pub(crate) const HEADER_V3_LEN: u32 = 9 * U32_LEN as u32;
pub(crate) const HEADER_V17_LEN: u32 = 10 * U32_LEN as u32;

const OFF_MAGIC: usize = 0;
const OFF_TOTAL_SIZE: usize = 4;
const OFF_DT_STRUCT: usize = 8;
const OFF_DT_STRINGS: usize = 12;
const OFF_MEM_RSVMAP: usize = 16;
const OFF_VERSION: usize = 20;
const OFF_LAST_COMP_VERSION: usize = 24;
const OFF_BOOT_CPUID_PHYS: usize = 28;
const OFF_SIZE_DT_STRINGS: usize = 32;
const OFF_SIZE_DT_STRUCT: usize = 36;

#[inline]
pub(crate) fn align_up(val: usize, align: usize) -> usize {
    val + (align - (val % align)) % align
}

/// Blob header with every field in native byte order.
///
/// Fields that the blob version does not carry are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub total_size: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: Option<u32>,
    pub size_dt_strings: Option<u32>,
    pub size_dt_struct: Option<u32>,
}

#[inline]
fn read_be_u32(blob: &[u8], offset: usize) -> Result<u32> {
    match blob.get(offset..offset + U32_LEN) {
        Some(&[a, b, c, d]) => Ok(u32::from_be_bytes([a, b, c, d])),
        _ => Err(Error::slice_eof_unpexpected(
            U32_LEN as u32,
            blob.len().saturating_sub(offset) as u32,
            offset,
        )),
    }
}

impl Header {
    /// Lay out the header of a blob whose blocks have the given sizes.
    ///
    /// `reserve_size` includes the terminating entry.
    pub(crate) fn build(
        vi: &VersionInfo,
        reserve_size: usize,
        struct_size: usize,
        strings_size: usize,
        boot_cpuid_phys: u32,
    ) -> Result<Header> {
        let too_large = |_| Error::total_size_too_large();
        let reserve_off = align_up(vi.hdr_size as usize, DOUBLE_CELL_LEN);
        let off_dt_struct = reserve_off + reserve_size;
        let off_dt_strings = off_dt_struct + struct_size;
        let total_size = off_dt_strings + strings_size;
        Ok(Header {
            magic: DEVICE_TREE_MAGIC,
            total_size: u32::try_from(total_size).map_err(too_large)?,
            off_dt_struct: u32::try_from(off_dt_struct).map_err(too_large)?,
            off_dt_strings: u32::try_from(off_dt_strings).map_err(too_large)?,
            off_mem_rsvmap: reserve_off as u32,
            version: vi.version,
            last_comp_version: vi.last_comp_version,
            boot_cpuid_phys: vi.has(Flags::BOOTCPUID).then_some(boot_cpuid_phys),
            size_dt_strings: vi.has(Flags::STRTABSIZE).then_some(strings_size as u32),
            size_dt_struct: vi.has(Flags::STRUCTSIZE).then_some(struct_size as u32),
        })
    }

    /// Write exactly `vi.hdr_size` bytes.
    pub(crate) fn write(&self, vi: &VersionInfo, dst: &mut DataBuffer) {
        let start = dst.len();
        dst.step_by_zeros(vi.hdr_size as usize);
        let mut put = |offset: usize, value: u32| dst.write_to_offset_u32(start + offset, value);
        put(OFF_MAGIC, self.magic);
        put(OFF_TOTAL_SIZE, self.total_size);
        put(OFF_DT_STRUCT, self.off_dt_struct);
        put(OFF_DT_STRINGS, self.off_dt_strings);
        put(OFF_MEM_RSVMAP, self.off_mem_rsvmap);
        put(OFF_VERSION, self.version);
        put(OFF_LAST_COMP_VERSION, self.last_comp_version);
        if let Some(boot_cpuid_phys) = self.boot_cpuid_phys {
            put(OFF_BOOT_CPUID_PHYS, boot_cpuid_phys);
        }
        if let Some(size_dt_strings) = self.size_dt_strings {
            put(OFF_SIZE_DT_STRINGS, size_dt_strings);
        }
        if let Some(size_dt_struct) = self.size_dt_struct {
            put(OFF_SIZE_DT_STRUCT, size_dt_struct);
        }
    }

    /// Read and verify the header at the beginning of `blob`.
    ///
    /// `blob` must hold at least `totalsize` bytes. Fields are read according
    /// to the version table entry, so bytes at the position of a field the
    /// version does not define are never looked at.
    pub(crate) fn parse(blob: &[u8]) -> Result<(Header, &'static VersionInfo)> {
        // ---
        let magic = read_be_u32(blob, OFF_MAGIC)?;
        if magic != DEVICE_TREE_MAGIC {
            return Err(Error::invalid_magic(magic));
        }
        // ---
        let total_size = read_be_u32(blob, OFF_TOTAL_SIZE)?;
        if total_size < HEADER_V1_LEN {
            return Err(Error::header_too_short(
                total_size,
                HEADER_V1_LEN,
                OFF_TOTAL_SIZE,
            ));
        }
        if (blob.len() as u64) < total_size as u64 {
            return Err(Error::slice_eof_unpexpected(
                total_size,
                blob.len() as u32,
                blob.len(),
            ));
        }
        let blob = &blob[..total_size as usize];
        // ---
        let version = read_be_u32(blob, OFF_VERSION)?;
        let vi = version::lookup(version)
            .map_err(|_| Error::unknown_version(version, OFF_VERSION))?;
        if total_size < vi.hdr_size {
            return Err(Error::header_too_short(
                total_size,
                vi.hdr_size,
                OFF_TOTAL_SIZE,
            ));
        }
        let optional = |flag: Flags, offset: usize| -> Result<Option<u32>> {
            if vi.has(flag) {
                read_be_u32(blob, offset).map(Some)
            } else {
                Ok(None)
            }
        };
        let header = Header {
            magic,
            total_size,
            off_dt_struct: read_be_u32(blob, OFF_DT_STRUCT)?,
            off_dt_strings: read_be_u32(blob, OFF_DT_STRINGS)?,
            off_mem_rsvmap: read_be_u32(blob, OFF_MEM_RSVMAP)?,
            version,
            last_comp_version: read_be_u32(blob, OFF_LAST_COMP_VERSION)?,
            boot_cpuid_phys: optional(Flags::BOOTCPUID, OFF_BOOT_CPUID_PHYS)?,
            size_dt_strings: optional(Flags::STRTABSIZE, OFF_SIZE_DT_STRINGS)?,
            size_dt_struct: optional(Flags::STRUCTSIZE, OFF_SIZE_DT_STRUCT)?,
        };
        header.log();
        header.verify()?;
        Ok((header, vi))
    }

    fn verify(&self) -> Result<()> {
        let total_size = self.total_size;
        let check = |field: HeaderField, end: u64, inclusive: bool, file_index: usize| {
            let fits = if inclusive {
                end <= total_size as u64
            } else {
                end < total_size as u64
            };
            if fits {
                Ok(())
            } else {
                Err(Error::offset_out_of_bounds(
                    field, end, total_size, file_index,
                ))
            }
        };
        check(
            HeaderField::MemRsvmap,
            self.off_mem_rsvmap as u64,
            false,
            OFF_MEM_RSVMAP,
        )?;
        check(
            HeaderField::Struct,
            self.off_dt_struct as u64,
            false,
            OFF_DT_STRUCT,
        )?;
        check(
            HeaderField::Strings,
            self.off_dt_strings as u64,
            true,
            OFF_DT_STRINGS,
        )?;
        if let Some(size) = self.size_dt_strings {
            check(
                HeaderField::StringsSize,
                self.off_dt_strings as u64 + size as u64,
                true,
                OFF_SIZE_DT_STRINGS,
            )?;
        }
        if let Some(size) = self.size_dt_struct {
            check(
                HeaderField::StructSize,
                self.off_dt_struct as u64 + size as u64,
                true,
                OFF_SIZE_DT_STRUCT,
            )?;
        }
        Ok(())
    }

    fn log(&self) {
        log::debug!("magic:             {:#x}", self.magic);
        log::debug!("totalsize:         {}", self.total_size);
        log::debug!("off_dt_struct:     {:#x}", self.off_dt_struct);
        log::debug!("off_dt_strings:    {:#x}", self.off_dt_strings);
        log::debug!("off_mem_rsvmap:    {:#x}", self.off_mem_rsvmap);
        log::debug!("version:           {:#x}", self.version);
        log::debug!("last_comp_version: {:#x}", self.last_comp_version);
        if let Some(boot_cpuid_phys) = self.boot_cpuid_phys {
            log::debug!("boot_cpuid_phys:   {:#x}", boot_cpuid_phys);
        }
        if let Some(size_dt_strings) = self.size_dt_strings {
            log::debug!("size_dt_strings:   {}", size_dt_strings);
        }
        if let Some(size_dt_struct) = self.size_dt_struct {
            log::debug!("size_dt_struct:    {}", size_dt_struct);
        }
    }
}
