use crate::common::{U32_LEN, align_up};
use crate::error::{Error, Result};

/// Cursor over one block of a blob.
///
/// Positions are offsets from the start of the blob, so they double as
/// `file_index` in errors. No read crosses `limit`; alignment is relative
/// to `base`.
#[derive(Debug, Clone)]
pub struct InBuf<'a> {
    blob: &'a [u8],
    base: usize,
    limit: usize,
    ptr: usize,
}

impl<'a> InBuf<'a> {
    /// `limit` is clamped to the blob length.
    pub fn new(blob: &'a [u8], base: usize, limit: usize) -> InBuf<'a> {
        let limit = limit.min(blob.len());
        InBuf {
            blob,
            base,
            limit,
            ptr: base,
        }
    }

    #[inline]
    pub fn file_index(&self) -> usize {
        self.ptr
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.ptr)
    }

    pub fn read_chunk(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::slice_eof_unpexpected(
                u32::try_from(len).unwrap_or(u32::MAX),
                self.remaining() as u32,
                self.ptr,
            ));
        }
        let chunk = &self.blob[self.ptr..self.ptr + len];
        self.ptr += len;
        Ok(chunk)
    }

    pub fn read_word(&mut self) -> Result<u32> {
        let bytes = self.read_chunk(U32_LEN)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let hi = self.read_word()? as u64;
        let lo = self.read_word()? as u64;
        Ok(hi << 32 | lo)
    }

    pub fn realign(&mut self, align: usize) -> Result<()> {
        let ptr = self.base + align_up(self.ptr - self.base, align);
        if ptr > self.limit {
            return Err(Error::slice_eof_unpexpected(
                (ptr - self.ptr) as u32,
                self.remaining() as u32,
                self.ptr,
            ));
        }
        self.ptr = ptr;
        Ok(())
    }

    /// Bytes up to the next zero; the cursor moves past the zero.
    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let rest = &self.blob[self.ptr.min(self.limit)..self.limit];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::string_eof_unpexpected(self.ptr))?;
        self.ptr += len + 1;
        Ok(&rest[..len])
    }

    pub fn read_data(&mut self, len: u32) -> Result<&'a [u8]> {
        self.read_chunk(len as usize)
    }

    /// String starting `offset` bytes after `base`, without moving the
    /// cursor. `file_index` locates the reference for errors.
    pub fn read_table_string(&self, offset: u32, file_index: usize) -> Result<&'a [u8]> {
        let bound = self.limit.saturating_sub(self.base);
        let start = offset as usize;
        if start >= bound {
            return Err(Error::table_string_offset(offset, bound as u32, file_index));
        }
        let rest = &self.blob[self.base + start..self.limit];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::string_eof_unpexpected(file_index))?;
        Ok(&rest[..len])
    }
}
