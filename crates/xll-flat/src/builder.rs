// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only, back-to-front buffer builder.
//!
//! The buffer grows towards lower addresses: every write is prepended in front of
//! what is already there. Consequences callers must respect:
//!
//! - an object can only reference objects that were finished before it, so nested
//!   values are built bottom-up;
//! - vector elements are pushed in reverse index order (last element first) between
//!   [`Builder::start_vector`] and [`Builder::end_vector`];
//! - only one table or vector may be open at a time.

use crate::table::Primitive;
use crate::{SIZE_PREFIX, SIZE_UOFFSET};

/// Reference to an object already written into a [`Builder`].
///
/// Measured from the end of the buffer, so it stays valid as the buffer grows.
/// There is no null offset; absence is `Option<Offset>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(usize);

impl Offset {
    /// Distance from the end of the buffer.
    pub fn value(self) -> usize {
        self.0
    }
}

/// Back-to-front writer for flat tables, vectors and strings.
#[derive(Debug)]
pub struct Builder {
    buf: Vec<u8>,
    head: usize,
    min_align: usize,
    table_start: Option<usize>,
    fields: Vec<(u16, usize)>,
    vector_open: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a builder with `capacity` bytes pre-allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            head: capacity,
            min_align: 1,
            table_start: None,
            fields: Vec::new(),
            vector_open: false,
        }
    }

    /// Discard everything written so far, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.head = self.buf.len();
        self.min_align = 1;
        self.table_start = None;
        self.fields.clear();
        self.vector_open = false;
    }

    /// Bytes written so far.
    pub fn used_space(&self) -> usize {
        self.buf.len() - self.head
    }

    fn offset(&self) -> Offset {
        Offset(self.used_space())
    }

    fn ensure(&mut self, want: usize) {
        if self.head >= want {
            return;
        }
        let used = self.used_space();
        let needed = used.saturating_add(want);
        let mut len = self.buf.len().max(64);
        while len < needed {
            len = len.saturating_mul(2);
        }
        let mut next = vec![0; len];
        next[len - used..].copy_from_slice(&self.buf[self.head..]);
        self.head = len - used;
        self.buf = next;
    }

    fn pad(&mut self, n: usize) {
        self.ensure(n);
        self.head -= n;
        self.buf[self.head..self.head + n].fill(0);
    }

    /// Pad so that after writing `additional` bytes the buffer is `align`-aligned.
    fn prep(&mut self, align: usize, additional: usize) {
        self.min_align = self.min_align.max(align);
        let used = self.used_space().wrapping_add(additional);
        let pad = (align - used % align) % align;
        self.pad(pad);
    }

    fn prepend_bytes(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
    }

    /// Prepend one aligned scalar.
    pub fn push<T: Primitive>(&mut self, value: T) {
        self.prep(T::SIZE, 0);
        value.with_le_bytes(|bytes| self.prepend_bytes(bytes));
    }

    /// Prepend a `uoffset` pointing at `target`.
    pub fn push_offset(&mut self, target: Offset) {
        self.prep(SIZE_UOFFSET, 0);
        debug_assert!(target.0 <= self.used_space(), "offset points forward");
        let rel = self.used_space() + SIZE_UOFFSET - target.0;
        self.push(u32::try_from(rel).unwrap_or(u32::MAX));
    }

    /// Open a table. Fields are added with [`Builder::add_field`] and
    /// [`Builder::add_offset_field`].
    pub fn start_table(&mut self) {
        debug_assert!(self.table_start.is_none(), "nested start_table");
        debug_assert!(!self.vector_open, "start_table inside a vector");
        self.fields.clear();
        self.table_start = Some(self.used_space());
    }

    /// Add a scalar field to the open table.
    pub fn add_field<T: Primitive>(&mut self, slot: u16, value: T) {
        debug_assert!(self.table_start.is_some(), "add_field outside a table");
        self.push(value);
        self.fields.push((slot, self.used_space()));
    }

    /// Add a reference field (string, vector or table) to the open table.
    pub fn add_offset_field(&mut self, slot: u16, target: Offset) {
        debug_assert!(self.table_start.is_some(), "add_offset_field outside a table");
        self.push_offset(target);
        self.fields.push((slot, self.used_space()));
    }

    /// Close the open table: write its vtable and return its offset.
    pub fn end_table(&mut self) -> Offset {
        let start = self.table_start.take().unwrap_or_else(|| self.used_space());
        self.push(0i32);
        let object = self.used_space();

        let slots = self
            .fields
            .iter()
            .map(|&(slot, _)| usize::from(slot) + 1)
            .max()
            .unwrap_or(0);
        let mut entries = vec![0u16; slots];
        for &(slot, at) in &self.fields {
            if let Some(entry) = entries.get_mut(usize::from(slot)) {
                *entry = u16::try_from(object - at).unwrap_or(0);
            }
        }
        self.fields.clear();

        for &entry in entries.iter().rev() {
            self.push(entry);
        }
        self.push(u16::try_from(object - start).unwrap_or(u16::MAX));
        self.push(u16::try_from(4 + 2 * slots).unwrap_or(u16::MAX));
        let vtable = self.used_space();

        // The vtable sits in front of the table: table_pos - soffset == vtable_pos.
        let at = self.buf.len() - object;
        let soffset = i32::try_from(vtable - object).unwrap_or(i32::MAX);
        self.buf[at..at + 4].copy_from_slice(&soffset.to_le_bytes());
        Offset(object)
    }

    /// Open a vector of `len` elements of `elem_size` bytes aligned to `align`.
    ///
    /// Elements must then be pushed in reverse index order.
    pub fn start_vector(&mut self, len: usize, elem_size: usize, align: usize) {
        debug_assert!(self.table_start.is_none(), "start_vector inside a table");
        self.vector_open = true;
        self.prep(align.max(SIZE_PREFIX), len.saturating_mul(elem_size));
    }

    /// Close the open vector by writing its length prefix.
    pub fn end_vector(&mut self, len: usize) -> Offset {
        self.vector_open = false;
        self.push(u32::try_from(len).unwrap_or(u32::MAX));
        self.offset()
    }

    /// Write a vector of scalars, handling the reverse order internally.
    pub fn create_vector<T: Primitive>(&mut self, items: &[T]) -> Offset {
        self.start_vector(items.len(), T::SIZE, T::SIZE);
        for &item in items.iter().rev() {
            self.push(item);
        }
        self.end_vector(items.len())
    }

    /// Write a vector of references, handling the reverse order internally.
    pub fn create_offset_vector(&mut self, items: &[Offset]) -> Offset {
        self.start_vector(items.len(), SIZE_UOFFSET, SIZE_UOFFSET);
        for &item in items.iter().rev() {
            self.push_offset(item);
        }
        self.end_vector(items.len())
    }

    /// Copy `bytes` into a zero-terminated, length-prefixed string.
    pub fn create_string(&mut self, bytes: &[u8]) -> Offset {
        self.prep(SIZE_PREFIX, bytes.len() + 1);
        self.pad(1);
        self.prepend_bytes(bytes);
        self.push(u32::try_from(bytes.len()).unwrap_or(u32::MAX));
        self.offset()
    }

    /// Write the root reference and hand back the finished bytes.
    ///
    /// The returned buffer is sized exactly and shares nothing with the builder.
    pub fn finish(mut self, root: Offset) -> Vec<u8> {
        self.prep(self.min_align.max(SIZE_UOFFSET), SIZE_UOFFSET);
        self.push_offset(root);
        self.buf[self.head..].to_vec()
    }
}
