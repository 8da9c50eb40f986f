// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! When flattening or unflattening device tree goes wrong.

use alloc::{format, string::String};
use core::fmt;

/// Represents all possible errors that can occur when encoding or decoding device tree data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Typed {
        error_type: ErrorType,
        file_index: usize,
    },
    Custom(String),
}

/// Header fields holding an offset or a size that must stay inside the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    MemRsvmap,
    Struct,
    Strings,
    StringsSize,
    StructSize,
}

impl HeaderField {
    pub const fn name(&self) -> &'static str {
        match self {
            HeaderField::MemRsvmap => "off_mem_rsvmap",
            HeaderField::Struct => "off_dt_struct",
            HeaderField::Strings => "off_dt_strings",
            HeaderField::StringsSize => "size_dt_strings",
            HeaderField::StructSize => "size_dt_struct",
        }
    }
}

/// All error types that would occur from device tree flattening and unflattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    InvalidMagic {
        wrong_magic: u32,
    },
    UnknownVersion {
        version: u32,
    },
    HeaderTooShort {
        header_length: u32,
        at_least_length: u32,
    },
    OffsetOutOfBounds {
        field: HeaderField,
        current_index: u64,
        bound_index: u32,
    },
    StringEofUnexpected,
    SliceEofUnexpected {
        expected_length: u32,
        remaining_length: u32,
    },
    TableStringOffset {
        given_offset: u32,
        bound_offset: u32,
    },
    InvalidTagId {
        wrong_id: u32,
    },
    PrematureEnd,
    PathNotChild {
        path: String,
        parent_path: String,
    },
    ExpectStructBegin,
    ExpectStructEnd,
    InvalidName {
        name: String,
    },
    ValueTooLarge {
        length: usize,
    },
    TotalSizeTooLarge,
    Format,
    InvalidSerdeTypeLength {
        expected_length: u8,
    },
    UnsupportedType {
        type_name: &'static str,
    },
    Utf8(core::str::Utf8Error),
}

impl Error {
    #[inline]
    pub const fn invalid_magic(wrong_magic: u32) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidMagic { wrong_magic },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn unknown_version(version: u32, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::UnknownVersion { version },
            file_index,
        }
    }
    #[inline]
    pub fn header_too_short(header_length: u32, at_least_length: u32, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::HeaderTooShort {
                header_length,
                at_least_length,
            },
            file_index,
        }
    }
    #[inline]
    pub fn offset_out_of_bounds(
        field: HeaderField,
        current_index: u64,
        bound_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::OffsetOutOfBounds {
                field,
                current_index,
                bound_index,
            },
            file_index,
        }
    }
    #[inline]
    pub fn string_eof_unpexpected(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::StringEofUnexpected,
            file_index,
        }
    }
    #[inline]
    pub fn slice_eof_unpexpected(
        expected_length: u32,
        remaining_length: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::SliceEofUnexpected {
                expected_length,
                remaining_length,
            },
            file_index,
        }
    }
    #[inline]
    pub fn table_string_offset(given_offset: u32, bound_offset: u32, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::TableStringOffset {
                given_offset,
                bound_offset,
            },
            file_index,
        }
    }
    #[inline]
    pub fn invalid_tag_id(wrong_id: u32, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidTagId { wrong_id },
            file_index,
        }
    }
    #[inline]
    pub fn premature_end(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::PrematureEnd,
            file_index,
        }
    }
    #[inline]
    pub fn path_not_child(path: &str, parent_path: &str, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::PathNotChild {
                path: path.into(),
                parent_path: parent_path.into(),
            },
            file_index,
        }
    }
    #[inline]
    pub fn expected_struct_begin(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::ExpectStructBegin,
            file_index,
        }
    }
    #[inline]
    pub fn expected_struct_end(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::ExpectStructEnd,
            file_index,
        }
    }
    #[inline]
    pub fn invalid_name(name: &str) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidName { name: name.into() },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn value_too_large(length: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::ValueTooLarge { length },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn total_size_too_large() -> Error {
        Error::Typed {
            error_type: ErrorType::TotalSizeTooLarge,
            file_index: 0,
        }
    }
    #[inline]
    pub const fn format() -> Error {
        Error::Typed {
            error_type: ErrorType::Format,
            file_index: 0,
        }
    }
    #[inline]
    pub fn invalid_serde_type_length(expected_length: u8) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidSerdeTypeLength { expected_length },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn unsupported_type(type_name: &'static str) -> Error {
        Error::Typed {
            error_type: ErrorType::UnsupportedType { type_name },
            file_index: 0,
        }
    }
    #[inline]
    pub fn utf8(error: core::str::Utf8Error, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::Utf8(error),
            file_index,
        }
    }

    /// Kind of a typed error, `None` for custom messages.
    pub fn error_type(&self) -> Option<&ErrorType> {
        match self {
            Error::Typed { error_type, .. } => Some(error_type),
            Error::Custom(_) => None,
        }
    }

    /// Byte offset from the beginning of the blob where the error was detected.
    pub fn file_index(&self) -> usize {
        match self {
            Error::Typed { file_index, .. } => *file_index,
            Error::Custom(_) => 0,
        }
    }
}

/// Alias for a Result with the error type `device_tree_blob::Error`.
pub type Result<T> = core::result::Result<T, Error>;

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::format()
    }
}

impl serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Custom(format!("{}", msg))
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Custom(format!("{}", msg))
    }
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (error_type, file_index) = match self {
            Error::Typed {
                error_type,
                file_index,
            } => (error_type, *file_index),
            Error::Custom(msg) => return write!(f, "Error({})", msg),
        };
        match error_type {
            ErrorType::InvalidMagic { wrong_magic } => write!(
                f,
                "Error(invalid magic, value: {}, index: {})",
                wrong_magic, file_index
            ),
            ErrorType::UnknownVersion { version } => write!(
                f,
                "Error(unknown device tree blob version {}, index: {})",
                version, file_index
            ),
            ErrorType::HeaderTooShort {
                header_length,
                at_least_length,
            } => write!(
                f,
                "Error(blob size {} is too small, at least: {}, index: {})",
                header_length, at_least_length, file_index
            ),
            ErrorType::OffsetOutOfBounds {
                field,
                current_index,
                bound_index,
            } => write!(
                f,
                "Error({} {} exceeds total size {}, index: {})",
                field.name(),
                current_index,
                bound_index,
                file_index
            ),
            ErrorType::StringEofUnexpected => write!(
                f,
                "Error(premature end of data reading string, index: {})",
                file_index
            ),
            ErrorType::SliceEofUnexpected {
                expected_length,
                remaining_length,
            } => write!(
                f,
                "Error(premature end of data, expected: {}, remaining: {}, index: {})",
                expected_length, remaining_length, file_index
            ),
            ErrorType::TableStringOffset {
                given_offset,
                bound_offset,
            } => write!(
                f,
                "Error(string offset {} overruns string table of {} bytes, index: {})",
                given_offset, bound_offset, file_index
            ),
            ErrorType::InvalidTagId { wrong_id } => write!(
                f,
                "Error(invalid opcode word {:08x}, index: {})",
                wrong_id, file_index
            ),
            ErrorType::PrematureEnd => {
                write!(f, "Error(premature FDT_END, index: {})", file_index)
            }
            ErrorType::PathNotChild { path, parent_path } => write!(
                f,
                "Error(path \"{}\" is not valid as a child of \"{}\", index: {})",
                path, parent_path, file_index
            ),
            ErrorType::ExpectStructBegin => write!(
                f,
                "Error(expected FDT_BEGIN_NODE, index: {})",
                file_index
            ),
            ErrorType::ExpectStructEnd => {
                write!(f, "Error(expected FDT_END, index: {})", file_index)
            }
            ErrorType::InvalidName { name } => write!(f, "Error(invalid name {:?})", name),
            ErrorType::ValueTooLarge { length } => write!(
                f,
                "Error(property value of {} bytes does not fit in 32 bits)",
                length
            ),
            ErrorType::TotalSizeTooLarge => write!(f, "Error(total size must fit in 32 bits)"),
            ErrorType::Format => write!(f, "Error(text output failed)"),
            ErrorType::InvalidSerdeTypeLength { expected_length } => write!(
                f,
                "Error(value length does not match, expected: {})",
                expected_length
            ),
            ErrorType::UnsupportedType { type_name } => {
                write!(f, "Error(unsupported type {})", type_name)
            }
            ErrorType::Utf8(e) => write!(f, "Error({}, index: {})", e, file_index),
        }
    }
}

/// A recoverable problem found while decoding; the tree is still usable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// Node name has characters outside the allowed set.
    IncorrectNodeName { name: String, file_index: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::IncorrectNodeName { name, file_index } => write!(
                f,
                "Warning \"{}\" has incorrect format (index: {})",
                name, file_index
            ),
        }
    }
}
