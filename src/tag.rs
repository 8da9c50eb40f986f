use crate::common::{CELL_LEN, DOUBLE_CELL_LEN, FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_NOP, FDT_PROP};
use crate::de::inbuf::InBuf;
use crate::error::{Error, Result};
use crate::version::Flags;

/// Reader of structure block tags.
///
/// Yields `None` once `FDT_END` is read, and after any error.
#[derive(Debug, Clone)]
pub struct Tags<'a> {
    structure: InBuf<'a>,
    strings: InBuf<'a>,
    flags: Flags,
    end: Option<usize>,
    finished: bool,
}

impl<'a> Tags<'a> {
    pub(crate) fn new(structure: InBuf<'a>, strings: InBuf<'a>, flags: Flags) -> Tags<'a> {
        Tags {
            structure,
            strings,
            flags,
            end: None,
            finished: false,
        }
    }

    /// Byte index from file begin of the next unread word, or of the
    /// `FDT_END` tag once it was read.
    #[inline]
    pub fn file_index(&self) -> usize {
        self.end.unwrap_or(self.structure.file_index())
    }

    fn read_begin(&mut self) -> Result<Tag<'a>> {
        let name = self.structure.read_string()?;
        self.structure.realign(CELL_LEN)?;
        Ok(Tag::Begin(name))
    }

    fn read_prop(&mut self) -> Result<Tag<'a>> {
        let prop_index = self.file_index();
        let val_size = self.structure.read_word()?;
        let name_offset = self.structure.read_word()?;
        if self.flags.contains(Flags::VARALIGN) && val_size as usize >= DOUBLE_CELL_LEN {
            self.structure.realign(DOUBLE_CELL_LEN)?;
        }
        let val = self.structure.read_data(val_size)?;
        self.structure.realign(CELL_LEN)?;
        let prop_name = self.strings.read_table_string(name_offset, prop_index)?;
        Ok(Tag::Prop(val, prop_name))
    }

    fn read_tag(&mut self) -> Result<Option<Tag<'a>>> {
        loop {
            let index = self.file_index();
            match self.structure.read_word()? {
                FDT_BEGIN_NODE => return self.read_begin().map(Some),
                FDT_PROP => return self.read_prop().map(Some),
                FDT_END_NODE => return Ok(Some(Tag::End)),
                FDT_NOP if self.flags.contains(Flags::NOP) => continue,
                FDT_END => {
                    self.end = Some(index);
                    return Ok(None);
                }
                invalid => return Err(Error::invalid_tag_id(invalid, index)),
            }
        }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Result<(Tag<'a>, usize)>; // Tag, byte index from file begin
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let index = self.file_index();
        match self.read_tag() {
            Ok(Some(tag)) => Some(Ok((tag, index))),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag<'a> {
    /// Node name or full path, by version.
    Begin(&'a [u8]),
    /// Value, then name.
    Prop(&'a [u8], &'a [u8]),
    End,
}
