// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two-dimensional values: `Grid` (tagged cells) and `NumGrid` (plain floats).
//!
//! Both are row-major and both are expected to satisfy
//! `rows * cols == len(data) <= i32::MAX`; nothing here enforces that, see
//! [`crate::Validate`].

use xll_flat::{Builder, Offset, Vector};

use crate::Scalar;

const ROWS: u16 = 0;
const COLS: u16 = 1;
const DATA: u16 = 2;

table_view! {
    /// Grid of [`Scalar`] cells.
    Grid
}

impl<'a> Grid<'a> {
    /// Row count as stored.
    pub fn rows(&self) -> u32 {
        self.0.get(ROWS, 0)
    }

    /// Column count as stored.
    pub fn cols(&self) -> u32 {
        self.0.get(COLS, 0)
    }

    /// Cell vector. Its length is the claimed length.
    pub fn data(&self) -> Option<Vector<'a>> {
        self.0.get_vector(DATA)
    }

    /// Claimed cell count; `0` when the vector is absent.
    pub fn data_len(&self) -> u32 {
        self.data().map_or(0, |data| data.len())
    }

    /// Cell `index`.
    pub fn cell(&self, index: usize) -> Option<Scalar<'a>> {
        self.data()?.get_as(index)
    }
}

impl Grid<'_> {
    /// Write a `Grid` table around a vector of `Scalar` offsets.
    pub fn create(b: &mut Builder, rows: u32, cols: u32, data: Option<Offset>) -> Offset {
        b.start_table();
        b.add_field(ROWS, rows);
        b.add_field(COLS, cols);
        if let Some(data) = data {
            b.add_offset_field(DATA, data);
        }
        b.end_table()
    }
}

table_view! {
    /// All-numeric grid stored as a flat `[f64]`.
    NumGrid
}

impl<'a> NumGrid<'a> {
    /// Row count as stored.
    pub fn rows(&self) -> u32 {
        self.0.get(ROWS, 0)
    }

    /// Column count as stored.
    pub fn cols(&self) -> u32 {
        self.0.get(COLS, 0)
    }

    /// Value vector. Its length is the claimed length.
    pub fn data(&self) -> Option<Vector<'a>> {
        self.0.get_vector(DATA)
    }

    /// Claimed value count; `0` when the vector is absent.
    pub fn data_len(&self) -> u32 {
        self.data().map_or(0, |data| data.len())
    }

    /// Value `index`.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.data()?.get(index)
    }
}

impl NumGrid<'_> {
    /// Write a `NumGrid` table around an `f64` vector.
    pub fn create(b: &mut Builder, rows: u32, cols: u32, data: Option<Offset>) -> Offset {
        b.start_table();
        b.add_field(ROWS, rows);
        b.add_field(COLS, cols);
        if let Some(data) = data {
            b.add_offset_field(DATA, data);
        }
        b.end_table()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{Follow, Num, ScalarKind, ScalarValue};

    #[test]
    fn grid_cells_read_in_index_order() {
        let mut b = Builder::new();
        let cells: Vec<Offset> = [1.0, 2.0, 3.0, 4.0]
            .into_iter()
            .map(|v| {
                let num = Num::create(&mut b, v);
                Scalar::create(&mut b, ScalarKind::Num, Some(num))
            })
            .collect();
        let data = b.create_offset_vector(&cells);
        let root = Grid::create(&mut b, 2, 2, Some(data));
        let bytes = b.finish(root);

        let grid = Grid::root(&bytes).expect("root");
        assert_eq!((grid.rows(), grid.cols(), grid.data_len()), (2, 2, 4));
        let values: Vec<f64> = (0..4)
            .filter_map(|i| match grid.cell(i)?.val() {
                ScalarValue::Num(n) => Some(n.val()),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(grid.cell(4).is_none());
    }

    #[test]
    fn missing_data_reads_as_zero_length() {
        let mut b = Builder::new();
        let root = NumGrid::create(&mut b, 0, 0, None);
        let bytes = b.finish(root);
        let grid = NumGrid::root(&bytes).expect("root");
        assert_eq!(grid.data_len(), 0);
        assert_eq!(grid.value(0), None);
    }
}
