use alloc::vec::Vec;

/// Deduplicating property name table.
///
/// Lookups scan the accumulated bytes for a zero-terminated run equal to the
/// name, so a name that is the tail of an earlier one shares its bytes.
#[derive(Debug, Default, Clone)]
pub struct StringBlock {
    data: Vec<u8>,
}

impl StringBlock {
    #[inline(always)]
    pub fn new() -> StringBlock {
        StringBlock { data: Vec::new() }
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

    /// Return (Result String, End Offset), or `None` when `offset` is not
    /// inside the table.
    pub fn get_str_by_offset(&self, offset: usize) -> Option<(&[u8], usize)> {
        let current_slice = self.data.get(offset..)?;
        let pos = current_slice
            .iter()
            .position(|&x| x == b'\0')
            .unwrap_or(current_slice.len());
        Some((&current_slice[..pos], offset + pos + 1))
    }

    /// Return the start offset of inserted string.
    #[inline]
    fn insert_str(&mut self, name: &str) -> usize {
        let result = self.data.len();
        self.data.extend_from_slice(name.as_bytes());
        self.data.push(0);
        result
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        let name = name.as_bytes();
        (0..self.data.len()).find(|&start| {
            let end = start + name.len();
            self.data.get(start..end) == Some(name) && self.data.get(end) == Some(&0)
        })
    }

    pub fn find_or_insert(&mut self, name: &str) -> usize {
        match self.find(name) {
            Some(offset) => offset,
            None => self.insert_str(name),
        }
    }

    /// Every stored string in table order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            block: self,
            offset: 0,
        }
    }
}

pub struct Iter<'a> {
    block: &'a StringBlock,
    offset: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.block.len() {
            return None;
        }
        let (result, next) = self.block.get_str_by_offset(self.offset)?;
        self.offset = next;
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::StringBlock;
    use alloc::vec::Vec;

    #[test]
    fn dedup_offsets() {
        let mut block = StringBlock::new();
        assert_eq!(block.find_or_insert("a"), 0);
        assert_eq!(block.find_or_insert("b"), 2);
        assert_eq!(block.find_or_insert("a"), 0);
        assert_eq!(block.as_slice(), b"a\0b\0");
    }

    #[test]
    fn shares_suffix() {
        let mut block = StringBlock::new();
        assert_eq!(block.find_or_insert("compatible"), 0);
        assert_eq!(block.find_or_insert("ible"), 6);
        assert_eq!(block.find_or_insert("compat"), 11);
        assert_eq!(block.len(), 18);
    }

    #[test]
    fn iter_lists_strings() {
        let mut block = StringBlock::new();
        block.find_or_insert("reg");
        block.find_or_insert("name");
        block.find_or_insert("reg");
        let all: Vec<&[u8]> = block.iter().collect();
        assert_eq!(all, [&b"reg"[..], &b"name"[..]]);
    }
}
