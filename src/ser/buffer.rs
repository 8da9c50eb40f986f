use crate::common::*;
use alloc::vec::Vec;

/// Append-only byte accumulator for the structure and reservation blocks.
///
/// Alignment is relative to the number of bytes written so far, and padding
/// is always zero.
#[derive(Debug, Default, Clone)]
pub struct DataBuffer {
    data: Vec<u8>,
}

impl DataBuffer {
    pub fn new() -> DataBuffer {
        DataBuffer { data: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn write_to_offset_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + U32_LEN].copy_from_slice(&u32::to_be_bytes(value));
    }

    pub fn step_by_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&u32::to_be_bytes(value));
    }

    pub fn step_by_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&u64::to_be_bytes(value));
    }

    pub fn step_by_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn step_by_slice(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
    }

    pub fn step_by_zeros(&mut self, len: usize) {
        self.data.resize(self.data.len() + len, 0);
    }

    pub fn step_align(&mut self, align: usize) {
        let len = align_up(self.data.len(), align);
        self.data.resize(len, 0);
    }

    /// Name bytes followed by a terminating zero, not aligned.
    pub fn step_by_name(&mut self, name: &str) {
        self.step_by_slice(name.as_bytes());
        self.step_by_u8(0);
    }
}
