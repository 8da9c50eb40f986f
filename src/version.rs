//! Version policy table.
//!
//! Every format decision that depends on the blob version (header layout,
//! node identifier form, value alignment, synthesized `name` properties)
//! is made from the [`Flags`] of the resolved [`VersionInfo`], never by
//! comparing version numbers.

use crate::common::{HEADER_V1_LEN, HEADER_V2_LEN, HEADER_V3_LEN, HEADER_V17_LEN};
use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Format features switched on by a version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        /// Nodes carry their full path instead of the short name.
        const FULLPATH = 0x1;
        /// Property values of 8 bytes or more are aligned to 8 bytes.
        const VARALIGN = 0x2;
        /// Every node has a `name` property, synthesized when missing.
        const NAMEPROPS = 0x4;
        /// Header has `boot_cpuid_phys`.
        const BOOTCPUID = 0x8;
        /// Header has `size_dt_strings`.
        const STRTABSIZE = 0x10;
        /// Header has `size_dt_struct`.
        const STRUCTSIZE = 0x20;
        /// Structure block may contain `FDT_NOP` tags.
        const NOP = 0x40;
    }
}

/// Static description of one blob format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: u32,
    pub last_comp_version: u32,
    pub hdr_size: u32,
    pub flags: Flags,
}

const LEGACY: Flags = Flags::FULLPATH
    .union(Flags::VARALIGN)
    .union(Flags::NAMEPROPS);

static VERSION_TABLE: [VersionInfo; 5] = [
    VersionInfo {
        version: 1,
        last_comp_version: 1,
        hdr_size: HEADER_V1_LEN,
        flags: LEGACY,
    },
    VersionInfo {
        version: 2,
        last_comp_version: 1,
        hdr_size: HEADER_V2_LEN,
        flags: LEGACY.union(Flags::BOOTCPUID),
    },
    VersionInfo {
        version: 3,
        last_comp_version: 1,
        hdr_size: HEADER_V3_LEN,
        flags: LEGACY.union(Flags::BOOTCPUID).union(Flags::STRTABSIZE),
    },
    VersionInfo {
        version: 0x10,
        last_comp_version: 0x10,
        hdr_size: HEADER_V3_LEN,
        flags: Flags::BOOTCPUID.union(Flags::STRTABSIZE),
    },
    VersionInfo {
        version: 0x11,
        last_comp_version: 0x10,
        hdr_size: HEADER_V17_LEN,
        flags: Flags::BOOTCPUID
            .union(Flags::STRTABSIZE)
            .union(Flags::STRUCTSIZE)
            .union(Flags::NOP),
    },
];

/// Find the table entry for `version`.
pub fn lookup(version: u32) -> Result<&'static VersionInfo> {
    VERSION_TABLE
        .iter()
        .find(|vi| vi.version == version)
        .ok_or(Error::unknown_version(version, 0))
}

/// All known versions, oldest first.
pub fn supported() -> impl Iterator<Item = u32> {
    VERSION_TABLE.iter().map(|vi| vi.version)
}

impl VersionInfo {
    #[inline]
    pub fn has(&self, flag: Flags) -> bool {
        self.flags.contains(flag)
    }
}
