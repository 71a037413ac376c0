// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounds-checked, zero-copy table and vector views.

use core::str;

use crate::{FlatError, SIZE_PREFIX, SIZE_UOFFSET};

fn read_array<const N: usize>(buf: &[u8], pos: usize) -> Option<[u8; N]> {
    let end = pos.checked_add(N)?;
    buf.get(pos..end)?.try_into().ok()
}

fn to_usize(n: u32) -> Option<usize> {
    usize::try_from(n).ok()
}

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width little-endian scalar that can live in a table slot or a vector.
pub trait Primitive: Copy + Default + sealed::Sealed {
    /// Encoded width in bytes (also the required alignment).
    const SIZE: usize;

    /// Read a value at `pos`; `None` when the bytes are not in the buffer.
    fn read_at(buf: &[u8], pos: usize) -> Option<Self>;

    /// Hand the little-endian encoding to `f`.
    fn with_le_bytes<R>(self, f: impl FnOnce(&[u8]) -> R) -> R;
}

macro_rules! primitive {
    ($($ty:ty),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            const SIZE: usize = core::mem::size_of::<$ty>();

            #[inline]
            fn read_at(buf: &[u8], pos: usize) -> Option<Self> {
                read_array(buf, pos).map(<$ty>::from_le_bytes)
            }

            #[inline]
            fn with_le_bytes<R>(self, f: impl FnOnce(&[u8]) -> R) -> R {
                f(&self.to_le_bytes())
            }
        }
    )*};
}

primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const SIZE: usize = 1;

    #[inline]
    fn read_at(buf: &[u8], pos: usize) -> Option<Self> {
        read_array::<1>(buf, pos).map(|[b]| b != 0)
    }

    #[inline]
    fn with_le_bytes<R>(self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&[u8::from(self)])
    }
}

/// Typed view constructed from a raw table.
pub trait Follow<'a>: Sized {
    /// Wrap `table` without reading anything.
    fn follow(table: Table<'a>) -> Self;

    /// Root a buffer and wrap its root table.
    fn root(buf: &'a [u8]) -> Result<Self, FlatError> {
        Table::root(buf).map(Self::follow)
    }
}

/// Non-owning view of one table inside a borrowed buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table<'a> {
    buf: &'a [u8],
    loc: usize,
}

impl<'a> Table<'a> {
    /// View the table that starts at byte `loc` of `buf`.
    ///
    /// Nothing is validated here; reads through an unreadable table return defaults.
    #[must_use]
    pub const fn new(buf: &'a [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    /// Root `buf`: follow the leading `uoffset` and check that the table's vtable is
    /// readable.
    pub fn root(buf: &'a [u8]) -> Result<Self, FlatError> {
        let offset =
            u32::read_at(buf, 0).ok_or(FlatError::BufferTooShort { len: buf.len() })?;
        let out_of_bounds = FlatError::RootOutOfBounds {
            offset,
            len: buf.len(),
        };
        let loc = to_usize(offset).ok_or_else(|| out_of_bounds.clone())?;
        let table = Self::new(buf, loc);
        if table.vtable().is_none() {
            return Err(out_of_bounds);
        }
        Ok(table)
    }

    /// Backing buffer.
    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Byte position of the table within the buffer.
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// `(position, length)` of this table's vtable.
    fn vtable(&self) -> Option<(usize, usize)> {
        let soffset = i32::read_at(self.buf, self.loc)?;
        let loc = i64::try_from(self.loc).ok()?;
        let pos = usize::try_from(loc.checked_sub(i64::from(soffset))?).ok()?;
        let len = u16::read_at(self.buf, pos)?;
        Some((pos, usize::from(len)))
    }

    /// Position of field `slot`, or `None` when the field is absent.
    fn field_pos(&self, slot: u16) -> Option<usize> {
        let (vtable, vtable_len) = self.vtable()?;
        let entry = 4 + 2 * usize::from(slot);
        if entry + 2 > vtable_len {
            return None;
        }
        let offset = u16::read_at(self.buf, vtable.checked_add(entry)?)?;
        if offset == 0 {
            return None;
        }
        self.loc.checked_add(usize::from(offset))
    }

    /// Follow the `uoffset` stored at `pos`.
    fn deref(&self, pos: usize) -> Option<usize> {
        let rel = u32::read_at(self.buf, pos)?;
        pos.checked_add(to_usize(rel)?)
    }

    /// Whether field `slot` is present in the vtable.
    pub fn has_field(&self, slot: u16) -> bool {
        self.field_pos(slot).is_some()
    }

    /// Read a scalar field, falling back to `default` when absent or unreadable.
    pub fn get<T: Primitive>(&self, slot: u16, default: T) -> T {
        self.field_pos(slot)
            .and_then(|pos| T::read_at(self.buf, pos))
            .unwrap_or(default)
    }

    /// Follow a table-valued field.
    pub fn get_table(&self, slot: u16) -> Option<Table<'a>> {
        let pos = self.field_pos(slot)?;
        Some(Table::new(self.buf, self.deref(pos)?))
    }

    /// Follow a table-valued field and wrap it as `T`.
    pub fn get_as<T: Follow<'a>>(&self, slot: u16) -> Option<T> {
        self.get_table(slot).map(T::follow)
    }

    /// Raw bytes of a string field.
    pub fn get_bytes(&self, slot: u16) -> Option<&'a [u8]> {
        let pos = self.field_pos(slot)?;
        string_at(self.buf, self.deref(pos)?)
    }

    /// String field as UTF-8; `None` when absent, unreadable or not UTF-8.
    pub fn get_str(&self, slot: u16) -> Option<&'a str> {
        self.get_bytes(slot).and_then(|b| str::from_utf8(b).ok())
    }

    /// Vector field. The length is the claimed length and is not checked against the
    /// buffer; see [`Vector::fits`].
    pub fn get_vector(&self, slot: u16) -> Option<Vector<'a>> {
        let pos = self.field_pos(slot)?;
        let start = self.deref(pos)?;
        let len = u32::read_at(self.buf, start)?;
        Some(Vector {
            buf: self.buf,
            start: start.checked_add(SIZE_PREFIX)?,
            len,
        })
    }
}

fn string_at(buf: &[u8], pos: usize) -> Option<&[u8]> {
    let len = to_usize(u32::read_at(buf, pos)?)?;
    let start = pos.checked_add(SIZE_PREFIX)?;
    buf.get(start..start.checked_add(len)?)
}

/// Non-owning view of a length-prefixed vector.
///
/// `len` is whatever the buffer claims. Element accessors are bounds-checked against
/// both the claimed length and the real buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vector<'a> {
    buf: &'a [u8],
    start: usize,
    len: u32,
}

impl<'a> Vector<'a> {
    /// Claimed element count.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether the claimed element count is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `len` elements of `elem_size` bytes actually fit in the buffer.
    pub fn fits(&self, elem_size: usize) -> bool {
        self.raw(elem_size).is_some()
    }

    /// Every element's bytes at once; `None` unless all of them fit in the buffer.
    pub fn raw(&self, elem_size: usize) -> Option<&'a [u8]> {
        let n = to_usize(self.len)?.checked_mul(elem_size)?;
        self.buf.get(self.start..self.start.checked_add(n)?)
    }

    fn elem_pos(&self, index: usize, elem_size: usize) -> Option<usize> {
        if index >= to_usize(self.len)? {
            return None;
        }
        self.start.checked_add(index.checked_mul(elem_size)?)
    }

    /// Scalar element `index`.
    pub fn get<T: Primitive>(&self, index: usize) -> Option<T> {
        T::read_at(self.buf, self.elem_pos(index, T::SIZE)?)
    }

    /// Table element `index` of a vector of tables.
    pub fn table(&self, index: usize) -> Option<Table<'a>> {
        let pos = self.elem_pos(index, SIZE_UOFFSET)?;
        let rel = to_usize(u32::read_at(self.buf, pos)?)?;
        Some(Table::new(self.buf, pos.checked_add(rel)?))
    }

    /// Table element `index`, wrapped as `T`.
    pub fn get_as<T: Follow<'a>>(&self, index: usize) -> Option<T> {
        self.table(index).map(T::follow)
    }

    /// String element `index` of a vector of strings, as raw bytes.
    pub fn bytes(&self, index: usize) -> Option<&'a [u8]> {
        let pos = self.elem_pos(index, SIZE_UOFFSET)?;
        let rel = to_usize(u32::read_at(self.buf, pos)?)?;
        string_at(self.buf, pos.checked_add(rel)?)
    }

    /// Inline struct element `index`, as its `elem_size` raw bytes.
    pub fn slice(&self, index: usize, elem_size: usize) -> Option<&'a [u8]> {
        let pos = self.elem_pos(index, elem_size)?;
        self.buf.get(pos..pos.checked_add(elem_size)?)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn primitive_reads_are_bounds_checked() {
        let buf = [1u8, 0, 0, 0, 0xff];
        assert_eq!(u32::read_at(&buf, 0), Some(1));
        assert_eq!(u32::read_at(&buf, 2), None);
        assert_eq!(u32::read_at(&buf, usize::MAX), None);
        assert_eq!(bool::read_at(&buf, 4), Some(true));
        assert_eq!(u8::read_at(&buf, 5), None);
    }

    #[test]
    fn root_rejects_short_and_dangling_buffers() {
        assert_eq!(
            Table::root(&[0, 0]),
            Err(FlatError::BufferTooShort { len: 2 })
        );
        assert_eq!(
            Table::root(&[200, 0, 0, 0]),
            Err(FlatError::RootOutOfBounds {
                offset: 200,
                len: 4
            })
        );
    }

    #[test]
    fn vector_fits_rejects_overclaimed_length() {
        let buf = [0u8; 16];
        let vector = Vector {
            buf: &buf,
            start: 4,
            len: 3,
        };
        assert!(vector.fits(4));
        assert!(!vector.fits(8));
        let huge = Vector {
            buf: &buf,
            start: 4,
            len: u32::MAX,
        };
        assert!(!huge.fits(1));
        assert_eq!(huge.get::<u8>(100), None);
    }
}
