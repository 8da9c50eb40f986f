//! Flattening a device tree into a blob or into source text.

pub mod asm;
pub mod binary;
pub mod board;
pub mod buffer;
pub mod c_source;
pub mod emitter;
pub mod serializer;
pub mod string_block;

pub use asm::to_asm;
pub use binary::to_blob;
pub use board::to_board;
pub use c_source::to_c;
pub use emitter::{Emitter, flatten_tree};
pub use serializer::to_tree;

use core::fmt;

/// Parameters shared by every flattening entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenConfig {
    /// Blob format version, one of [`crate::version::supported`].
    pub version: u32,
    pub boot_cpuid_phys: u32,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            version: 16,
            boot_cpuid_phys: 0,
        }
    }
}

impl FlattenConfig {
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_boot_cpuid_phys(mut self, boot_cpuid_phys: u32) -> Self {
        self.boot_cpuid_phys = boot_cpuid_phys;
        self
    }
}

/// Piece of a property value as text backends print it: big-endian words
/// first, then at most one half word and one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataChunk {
    Long(u32),
    Short(u16),
    Byte(u8),
}

pub(crate) fn data_chunks(value: &[u8]) -> impl Iterator<Item = DataChunk> + '_ {
    let words = value.chunks_exact(4);
    let tail = words.remainder();
    let (short, byte) = match *tail {
        [a, b, c] => (Some(u16::from_be_bytes([a, b])), Some(c)),
        [a, b] => (Some(u16::from_be_bytes([a, b])), None),
        [c] => (None, Some(c)),
        _ => (None, None),
    };
    words
        .map(|w| DataChunk::Long(u32::from_be_bytes([w[0], w[1], w[2], w[3]])))
        .chain(short.map(DataChunk::Short))
        .chain(byte.map(DataChunk::Byte))
}

/// String contents as a C or assembler string literal body.
pub(crate) struct Escaped<'a>(pub &'a str);

impl<'a> Escaped<'a> {
    /// Non-UTF-8 bytes are written as octal escapes.
    pub(crate) fn from_bytes(bytes: &'a [u8]) -> EscapedBytes<'a> {
        EscapedBytes(bytes)
    }
}

pub(crate) struct EscapedBytes<'a>(&'a [u8]);

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &b in bytes {
        match b {
            b'"' => f.write_str("\\\"")?,
            b'\\' => f.write_str("\\\\")?,
            0x20..=0x7e => fmt::Write::write_char(f, b as char)?,
            _ => write!(f, "\\{:03o}", b)?,
        }
    }
    Ok(())
}

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, self.0.as_bytes())
    }
}

impl fmt::Display for EscapedBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, vec::Vec};

    #[test]
    fn chunks_cover_value() {
        let chunks: Vec<DataChunk> = data_chunks(&[1, 2, 3, 4, 5, 6, 7]).collect();
        assert_eq!(
            chunks,
            [
                DataChunk::Long(0x01020304),
                DataChunk::Short(0x0506),
                DataChunk::Byte(7)
            ]
        );
        assert_eq!(data_chunks(&[9]).collect::<Vec<_>>(), [DataChunk::Byte(9)]);
        assert_eq!(data_chunks(&[]).count(), 0);
    }

    #[test]
    fn escapes_quotes_and_controls() {
        assert_eq!(format!("{}", Escaped("a\"b\\c\n")), "a\\\"b\\\\c\\012");
        assert_eq!(format!("{}", Escaped::from_bytes(b"x\xff")), "x\\377");
    }

    #[test]
    fn config_builder() {
        let config = FlattenConfig::default().with_version(17).with_boot_cpuid_phys(2);
        assert_eq!(config.version, 17);
        assert_eq!(config.boot_cpuid_phys, 2);
        assert_eq!(FlattenConfig::default().version, 16);
    }
}
