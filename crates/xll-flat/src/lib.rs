// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Zero-copy flat-table codec for the xll wire format.
//!
//! The layout is the FlatBuffers layout (little-endian):
//!
//! ```text
//! buffer  = root:u32 | ... tables, vtables, vectors, strings ...
//! table   = vtable_soffset:i32 | fields...
//! vtable  = vtable_len:u16 | table_len:u16 | field_offset:u16 * N
//! vector  = len:u32 | elements...
//! string  = len:u32 | bytes... | 0
//! ```
//!
//! Reading never copies and never trusts the buffer: [`Table`] and [`Vector`] borrow
//! the input slice and every access is bounds-checked, returning `None` (or the
//! field default) instead of panicking. Writing goes through [`Builder`], an
//! append-only writer that grows the buffer from the back, so nested objects must be
//! finished before the object that references them and vector elements are pushed
//! last element first.
//!
//! [`Owned`] pairs a finished buffer with its root so typed views can be handed out
//! for as long as the buffer lives.
#![forbid(unsafe_code)]

mod builder;
mod owned;
mod table;

pub use builder::{Builder, Offset};
pub use owned::{Owned, Root};
pub use table::{Follow, Primitive, Table, Vector};

/// Size of a `uoffset` (forward reference) in bytes.
pub const SIZE_UOFFSET: usize = 4;

/// Size of a vector or string length prefix in bytes.
pub const SIZE_PREFIX: usize = 4;

/// Errors produced when rooting a buffer.
///
/// Everything below the root is read fail-soft (`Option`), so these are the only
/// hard failures the reader reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlatError {
    /// Buffer cannot hold the root offset.
    #[error("buffer too short: need at least {SIZE_UOFFSET} bytes, got {len}")]
    BufferTooShort {
        /// Length of the buffer.
        len: usize,
    },
    /// Root offset does not land on a readable table.
    #[error("root table at offset {offset} is out of bounds for a {len}-byte buffer")]
    RootOutOfBounds {
        /// Root offset read from the buffer.
        offset: u32,
        /// Length of the buffer.
        len: usize,
    },
}
