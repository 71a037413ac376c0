// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sheet references: `Range` and the opaque `RefCache` key.

use serde::Serialize;
use xll_flat::{Builder, Offset, Vector};

const SHEET_NAME: u16 = 0;
const REFS: u16 = 1;
const FORMAT: u16 = 2;

const KEY: u16 = 0;

/// One rectangular block of cells, stored inline in a `Range`'s `refs` vector.
///
/// Wire layout: four little-endian `u32`s in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rect {
    /// First row, inclusive.
    pub row_first: u32,
    /// Last row, inclusive.
    pub row_last: u32,
    /// First column, inclusive.
    pub col_first: u32,
    /// Last column, inclusive.
    pub col_last: u32,
}

impl Rect {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Alignment of a `Rect` inside a vector.
    pub const ALIGN: usize = 4;

    /// Decode from exactly [`Rect::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let word = |i: usize| -> Option<u32> {
            let chunk = bytes.get(i * 4..i * 4 + 4)?;
            Some(u32::from_le_bytes(chunk.try_into().ok()?))
        };
        if bytes.len() != Self::SIZE {
            return None;
        }
        Some(Self {
            row_first: word(0)?,
            row_last: word(1)?,
            col_first: word(2)?,
            col_last: word(3)?,
        })
    }

    /// Prepend this rect into an open vector.
    ///
    /// The builder writes back to front, so the fields go in last to first.
    pub fn push(self, b: &mut Builder) {
        b.push(self.col_last);
        b.push(self.col_first);
        b.push(self.row_last);
        b.push(self.row_first);
    }

    /// Write a vector of rects.
    pub fn create_vector(b: &mut Builder, rects: &[Self]) -> Offset {
        b.start_vector(rects.len(), Self::SIZE, Self::ALIGN);
        for rect in rects.iter().rev() {
            rect.push(b);
        }
        b.end_vector(rects.len())
    }
}

table_view! {
    /// One or more rectangular blocks on a (possibly unnamed) sheet.
    Range
}

impl<'a> Range<'a> {
    /// Sheet name bytes, when present.
    pub fn sheet_name(&self) -> Option<&'a [u8]> {
        self.0.get_bytes(SHEET_NAME)
    }

    /// Number format hint bytes, when present.
    pub fn format(&self) -> Option<&'a [u8]> {
        self.0.get_bytes(FORMAT)
    }

    /// Inline `[Rect]` vector. Its length is the claimed length.
    pub fn refs(&self) -> Option<Vector<'a>> {
        self.0.get_vector(REFS)
    }

    /// Claimed rect count; `0` when the vector is absent.
    pub fn refs_len(&self) -> u32 {
        self.refs().map_or(0, |refs| refs.len())
    }

    /// Rect `index`.
    pub fn rect(&self, index: usize) -> Option<Rect> {
        Rect::from_bytes(self.refs()?.slice(index, Rect::SIZE)?)
    }
}

impl Range<'_> {
    /// Write a `Range` table. Absent strings or refs are left out of the table.
    pub fn create(
        b: &mut Builder,
        sheet_name: Option<Offset>,
        refs: Option<Offset>,
        format: Option<Offset>,
    ) -> Offset {
        b.start_table();
        if let Some(sheet_name) = sheet_name {
            b.add_offset_field(SHEET_NAME, sheet_name);
        }
        if let Some(refs) = refs {
            b.add_offset_field(REFS, refs);
        }
        if let Some(format) = format {
            b.add_offset_field(FORMAT, format);
        }
        b.end_table()
    }
}

table_view! {
    /// Key of a value the receiving side has already materialized.
    RefCache
}

impl<'a> RefCache<'a> {
    /// Key bytes, when present.
    pub fn key(&self) -> Option<&'a [u8]> {
        self.0.get_bytes(KEY)
    }
}

impl RefCache<'_> {
    /// Write a `RefCache` table.
    pub fn create(b: &mut Builder, key: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(key) = key {
            b.add_offset_field(KEY, key);
        }
        b.end_table()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::Follow;

    #[test]
    fn rects_keep_field_and_element_order() {
        let rects = [
            Rect {
                row_first: 1,
                row_last: 2,
                col_first: 3,
                col_last: 4,
            },
            Rect {
                row_first: 10,
                row_last: 20,
                col_first: 30,
                col_last: 40,
            },
        ];
        let mut b = Builder::new();
        let sheet = b.create_string(b"Sheet1");
        let refs = Rect::create_vector(&mut b, &rects);
        let root = Range::create(&mut b, Some(sheet), Some(refs), None);
        let bytes = b.finish(root);

        let range = Range::root(&bytes).expect("root");
        assert_eq!(range.sheet_name(), Some(&b"Sheet1"[..]));
        assert_eq!(range.format(), None);
        assert_eq!(range.refs_len(), 2);
        assert_eq!(range.rect(0), Some(rects[0]));
        assert_eq!(range.rect(1), Some(rects[1]));
        assert_eq!(range.rect(2), None);
    }

    #[test]
    fn rect_rejects_wrong_width() {
        assert_eq!(Rect::from_bytes(&[0; 15]), None);
        assert_eq!(Rect::from_bytes(&[0; 17]), None);
        assert_eq!(Rect::from_bytes(&[0; 16]), Some(Rect::default()));
    }
}
