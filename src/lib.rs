// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! This library flattens in-memory device trees into blobs of any supported
//! format version, or into assembler, C and board source text, and
//! unflattens untrusted blobs back into trees.
//!
//! Trees can also be built from, and read into, Rust data structures
//! through serde.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod de;
pub mod error;
pub mod ser;
pub mod tree;
pub mod utils;
pub mod version;

mod common;
mod tag;

#[doc(inline)]
pub use common::Header;

#[doc(inline)]
pub use de::{DecodedBlob, from_blob, from_tree};

#[doc(inline)]
pub use ser::{Emitter, FlattenConfig, flatten_tree, to_asm, to_blob, to_board, to_c, to_tree};

#[doc(inline)]
pub use tree::{BootInfo, Node, Property, ReserveEntry};

#[doc(inline)]
pub use version::VersionInfo;

#[doc(inline)]
pub use error::{Error, ErrorType, Result, Warning};
