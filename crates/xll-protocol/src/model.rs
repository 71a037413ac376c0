// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Owned values: plain Rust data on either side of the wire.
//!
//! Encoding ([`Value::encode`], [`Cell::encode`]) never fails. Decoding
//! ([`Value::from_any`], [`Cell::from_scalar`]) never fails either: it follows the
//! spreadsheet's conventions for bad data instead.
//!
//! - A grid or range that fails validation, has no data vector, or whose vector
//!   does not fit in the buffer, becomes `#VALUE!`.
//! - Text is decoded lossily and cut at [`MAX_TEXT_UNITS`] UTF-16 code units.
//! - An untagged union becomes [`Cell::Empty`].
//! - Text and handle bytes are charged against the [`OutputBudget`] of the source
//!   buffer. A cell whose payload no longer fits becomes `#VALUE!`, so payloads
//!   shared by many cells cannot multiply into an unbounded allocation.

use serde::Serialize;
use tracing::debug;
use xll_flat::{Builder, Offset, Vector, SIZE_UOFFSET};

use crate::{
    Any, AnyKind, AnyValue, AsyncHandle, Bool, ErrorCode, ErrorValue, Grid, Int, Limits, Nil, Num,
    NumGrid, OutputBudget, Range, Rect, RefCache, Scalar, ScalarKind, ScalarValue, Str, Validate,
};

/// Longest text a spreadsheet cell holds, in UTF-16 code units.
pub const MAX_TEXT_UNITS: usize = 32_767;

/// One scalar cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Cell {
    /// Untagged: no value at all.
    #[default]
    Empty,
    /// Boolean.
    Bool(bool),
    /// Float.
    Num(f64),
    /// Integer.
    Int(i32),
    /// Text.
    Str(String),
    /// Spreadsheet error.
    Err(ErrorCode),
    /// Pending asynchronous call.
    AsyncHandle(Vec<u8>),
    /// Explicit nil.
    Nil,
}

impl Cell {
    /// Wire tag this cell encodes to.
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::Empty => ScalarKind::None,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Num(_) => ScalarKind::Num,
            Self::Int(_) => ScalarKind::Int,
            Self::Str(_) => ScalarKind::Str,
            Self::Err(_) => ScalarKind::Err,
            Self::AsyncHandle(_) => ScalarKind::AsyncHandle,
            Self::Nil => ScalarKind::Nil,
        }
    }

    /// Materialize a `Scalar` view.
    pub fn from_scalar(scalar: Scalar<'_>) -> Self {
        let mut budget = Limits::default().output_budget(scalar.table().buf().len());
        Self::from_scalar_within(scalar, &mut budget)
    }

    fn from_scalar_within(scalar: Scalar<'_>, budget: &mut OutputBudget) -> Self {
        match scalar.val() {
            ScalarValue::None => Self::Empty,
            ScalarValue::Bool(v) => Self::Bool(v.val()),
            ScalarValue::Num(v) => Self::Num(v.val()),
            ScalarValue::Int(v) => Self::Int(v.val()),
            ScalarValue::Str(v) => text_cell(v.val(), budget),
            ScalarValue::Err(v) => Self::Err(v.val()),
            ScalarValue::AsyncHandle(v) => handle_cell(v.val(), budget),
            ScalarValue::Nil(_) => Self::Nil,
        }
    }

    /// Write the payload table; `None` for [`Cell::Empty`].
    fn encode_payload(&self, b: &mut Builder) -> Option<Offset> {
        match self {
            Self::Empty => None,
            Self::Bool(v) => Some(Bool::create(b, *v)),
            Self::Num(v) => Some(Num::create(b, *v)),
            Self::Int(v) => Some(Int::create(b, *v)),
            Self::Str(v) => {
                let s = b.create_string(v.as_bytes());
                Some(Str::create(b, Some(s)))
            }
            Self::Err(v) => Some(ErrorValue::create(b, *v)),
            Self::AsyncHandle(v) => {
                let bytes = b.create_vector(v);
                Some(AsyncHandle::create(b, Some(bytes)))
            }
            Self::Nil => Some(Nil::create(b)),
        }
    }

    /// Write this cell as a `Scalar` union.
    pub fn encode(&self, b: &mut Builder) -> Offset {
        let payload = self.encode_payload(b);
        Scalar::create(b, self.kind(), payload)
    }
}

/// Owned [`Grid`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GridValue {
    /// Row count.
    pub rows: u32,
    /// Column count.
    pub cols: u32,
    /// Row-major cells.
    pub cells: Vec<Cell>,
}

impl GridValue {
    /// Materialize a validated grid; `None` when it fails validation, has no cell
    /// vector, or its cell vector does not fit in the buffer.
    pub fn from_view(grid: Grid<'_>, limits: &Limits) -> Option<Self> {
        let mut budget = limits.output_budget(grid.table().buf().len());
        Self::from_view_within(grid, limits, &mut budget)
    }

    fn from_view_within(
        grid: Grid<'_>,
        limits: &Limits,
        budget: &mut OutputBudget,
    ) -> Option<Self> {
        grid.validate_with(limits).ok()?;
        let data = present(grid.data(), "grid")?;
        let len = admitted(data, SIZE_UOFFSET)?;
        let cells = (0..len)
            .map(|i| {
                data.get_as::<Scalar<'_>>(i)
                    .map_or(Cell::Empty, |s| Cell::from_scalar_within(s, budget))
            })
            .collect();
        Some(Self {
            rows: grid.rows(),
            cols: grid.cols(),
            cells,
        })
    }
}

/// Owned [`NumGrid`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NumGridValue {
    /// Row count.
    pub rows: u32,
    /// Column count.
    pub cols: u32,
    /// Row-major values.
    pub data: Vec<f64>,
}

impl NumGridValue {
    /// Materialize a validated numeric grid; see [`GridValue::from_view`].
    pub fn from_view(grid: NumGrid<'_>, limits: &Limits) -> Option<Self> {
        grid.validate_with(limits).ok()?;
        let values = present(grid.data(), "num_grid")?;
        let len = admitted(values, 8)?;
        let data = (0..len).filter_map(|i| values.get::<f64>(i)).collect();
        Some(Self {
            rows: grid.rows(),
            cols: grid.cols(),
            data,
        })
    }
}

/// Owned [`Range`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RangeValue {
    /// Sheet name, when the range names one.
    pub sheet_name: Option<String>,
    /// Referenced blocks.
    pub refs: Vec<Rect>,
    /// Number format hint.
    pub format: Option<String>,
}

impl RangeValue {
    /// Materialize a validated range; `None` when it fails validation or has no
    /// readable `refs` vector.
    pub fn from_view(range: Range<'_>, limits: &Limits) -> Option<Self> {
        let mut budget = limits.output_budget(range.table().buf().len());
        Self::from_view_within(range, limits, &mut budget)
    }

    fn from_view_within(
        range: Range<'_>,
        limits: &Limits,
        budget: &mut OutputBudget,
    ) -> Option<Self> {
        range.validate_with(limits).ok()?;
        let refs = present(range.refs(), "range")?;
        let len = admitted(refs, Rect::SIZE)?;
        let sheet_name = match range.sheet_name() {
            Some(bytes) => Some(spend_text(bytes, budget)?),
            None => None,
        };
        let format = match range.format() {
            Some(bytes) => Some(spend_text(bytes, budget)?),
            None => None,
        };
        Some(Self {
            sheet_name,
            refs: (0..len)
                .filter_map(|i| refs.slice(i, Rect::SIZE).and_then(Rect::from_bytes))
                .collect(),
            format,
        })
    }
}

/// Any value an `Any` union can carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Scalar payload, including the empty value.
    Scalar(Cell),
    /// Grid of cells.
    Grid(GridValue),
    /// All-numeric grid.
    NumGrid(NumGridValue),
    /// Sheet reference.
    Range(RangeValue),
    /// Cache key.
    RefCache(String),
}

impl Default for Value {
    fn default() -> Self {
        Self::Scalar(Cell::Empty)
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        Self::Scalar(cell)
    }
}

const VALUE_ERROR: Value = Value::Scalar(Cell::Err(ErrorCode::VALUE));

impl Value {
    /// Build a value from a row-major block of cells, the way the add-in converts a
    /// spreadsheet array.
    ///
    /// Negative or overflowing dimensions, or a cell count that does not match them,
    /// give an empty `0 x 0` grid. A block made only of numbers becomes a
    /// [`Value::NumGrid`]; anything else becomes a [`Value::Grid`].
    pub fn from_cells(rows: i32, cols: i32, cells: Vec<Cell>) -> Self {
        let (Ok(rows), Ok(cols)) = (u32::try_from(rows), u32::try_from(cols)) else {
            return Self::Grid(GridValue::default());
        };
        let count = u64::from(rows) * u64::from(cols);
        if count > u64::from(crate::MAX_VECTOR_LEN) || u64::try_from(cells.len()) != Ok(count) {
            return Self::Grid(GridValue::default());
        }
        if cells.iter().all(|c| matches!(c, Cell::Num(_))) {
            let data = cells
                .into_iter()
                .filter_map(|c| match c {
                    Cell::Num(v) => Some(v),
                    _ => None,
                })
                .collect();
            return Self::NumGrid(NumGridValue { rows, cols, data });
        }
        Self::Grid(GridValue { rows, cols, cells })
    }

    /// Materialize an `Any` view with the default ceilings.
    pub fn from_any(any: Any<'_>) -> Self {
        Self::from_any_with(any, &Limits::default())
    }

    /// Materialize an `Any` view with `limits`, within the output budget
    /// [`Limits::output_budget`] grants its buffer.
    pub fn from_any_with(any: Any<'_>, limits: &Limits) -> Self {
        let budget = &mut limits.output_budget(any.table().buf().len());
        match any.val() {
            AnyValue::None => Cell::Empty.into(),
            AnyValue::Bool(v) => Cell::Bool(v.val()).into(),
            AnyValue::Num(v) => Cell::Num(v.val()).into(),
            AnyValue::Int(v) => Cell::Int(v.val()).into(),
            AnyValue::Str(v) => text_cell(v.val(), budget).into(),
            AnyValue::Err(v) => Cell::Err(v.val()).into(),
            AnyValue::AsyncHandle(v) => handle_cell(v.val(), budget).into(),
            AnyValue::Nil(_) => Cell::Nil.into(),
            AnyValue::Grid(v) => {
                GridValue::from_view_within(v, limits, budget).map_or(VALUE_ERROR, Self::Grid)
            }
            AnyValue::NumGrid(v) => {
                NumGridValue::from_view(v, limits).map_or(VALUE_ERROR, Self::NumGrid)
            }
            AnyValue::Range(v) => {
                RangeValue::from_view_within(v, limits, budget).map_or(VALUE_ERROR, Self::Range)
            }
            AnyValue::RefCache(v) => spend_text(v.key().unwrap_or_default(), budget)
                .map_or(VALUE_ERROR, Self::RefCache),
        }
    }

    /// Write this value as an `Any` union.
    pub fn encode(&self, b: &mut Builder) -> Offset {
        let (kind, payload) = match self {
            Self::Scalar(cell) => (AnyKind::from(cell.kind()), cell.encode_payload(b)),
            Self::Grid(grid) => {
                let cells: Vec<Offset> = grid.cells.iter().map(|c| c.encode(b)).collect();
                let data = b.create_offset_vector(&cells);
                (
                    AnyKind::Grid,
                    Some(Grid::create(b, grid.rows, grid.cols, Some(data))),
                )
            }
            Self::NumGrid(grid) => {
                let data = b.create_vector(&grid.data);
                (
                    AnyKind::NumGrid,
                    Some(NumGrid::create(b, grid.rows, grid.cols, Some(data))),
                )
            }
            Self::Range(range) => {
                let sheet_name = range.sheet_name.as_ref().map(|s| b.create_string(s.as_bytes()));
                let format = range.format.as_ref().map(|s| b.create_string(s.as_bytes()));
                let refs = Rect::create_vector(b, &range.refs);
                (
                    AnyKind::Range,
                    Some(Range::create(b, sheet_name, Some(refs), format)),
                )
            }
            Self::RefCache(key) => {
                let key = b.create_string(key.as_bytes());
                (AnyKind::RefCache, Some(RefCache::create(b, Some(key))))
            }
        };
        Any::create(b, kind, payload)
    }

    /// Encode into a finished buffer rooted at an `Any`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut b = Builder::new();
        let root = self.encode(&mut b);
        b.finish(root)
    }
}

/// The data vector of a grid or range; materializing one without it is an error.
fn present<'a>(vector: Option<Vector<'a>>, kind: &'static str) -> Option<Vector<'a>> {
    if vector.is_none() {
        debug!(kind, "missing data vector");
    }
    vector
}

/// Length of `vector` when all of its elements are inside the buffer.
fn admitted(vector: Vector<'_>, elem_size: usize) -> Option<usize> {
    if !vector.fits(elem_size) {
        debug!(claimed = vector.len(), elem_size, "vector runs past end of buffer");
        return None;
    }
    usize::try_from(vector.len()).ok()
}

/// Decode wire text the way a cell stores it: lossy UTF-8, at most
/// [`MAX_TEXT_UNITS`] UTF-16 units, never splitting a character.
fn cell_text(bytes: Option<&[u8]>) -> String {
    let text = String::from_utf8_lossy(bytes.unwrap_or_default());
    let mut units = 0;
    for (at, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > MAX_TEXT_UNITS {
            return text[..at].to_owned();
        }
    }
    text.into_owned()
}

/// Decode text and charge it to `budget`; `None` when it does not fit.
fn spend_text(bytes: &[u8], budget: &mut OutputBudget) -> Option<String> {
    let text = cell_text(Some(bytes));
    if budget.spend(text.len()) {
        return Some(text);
    }
    debug!(
        len = text.len(),
        remaining = budget.remaining(),
        "output budget exhausted; text dropped"
    );
    None
}

fn text_cell(bytes: Option<&[u8]>, budget: &mut OutputBudget) -> Cell {
    spend_text(bytes.unwrap_or_default(), budget).map_or(Cell::Err(ErrorCode::VALUE), Cell::Str)
}

fn handle_cell(vector: Option<Vector<'_>>, budget: &mut OutputBudget) -> Cell {
    let bytes = vector.and_then(|v| v.raw(1)).unwrap_or_default();
    if budget.spend(bytes.len()) {
        return Cell::AsyncHandle(bytes.to_vec());
    }
    debug!(
        len = bytes.len(),
        remaining = budget.remaining(),
        "output budget exhausted; handle dropped"
    );
    Cell::Err(ErrorCode::VALUE)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::Follow;

    fn decode(value: &Value) -> Value {
        let bytes = value.to_bytes();
        Value::from_any(Any::root(&bytes).expect("root"))
    }

    #[test]
    fn scalars_round_trip() {
        for cell in [
            Cell::Empty,
            Cell::Bool(true),
            Cell::Num(-0.5),
            Cell::Int(i32::MIN),
            Cell::Str("héllo".to_owned()),
            Cell::Err(ErrorCode::NA),
            Cell::Err(ErrorCode(1234)),
            Cell::AsyncHandle(vec![9, 8, 7]),
            Cell::Nil,
        ] {
            let value = Value::from(cell);
            assert_eq!(decode(&value), value);
        }
    }

    #[test]
    fn composite_values_round_trip() {
        let grid = Value::from_cells(
            1,
            3,
            vec![Cell::Num(1.0), Cell::Str("x".to_owned()), Cell::Empty],
        );
        assert!(matches!(grid, Value::Grid(_)));
        assert_eq!(decode(&grid), grid);

        let num_grid = Value::from_cells(2, 1, vec![Cell::Num(1.0), Cell::Num(2.0)]);
        assert!(matches!(num_grid, Value::NumGrid(_)));
        assert_eq!(decode(&num_grid), num_grid);

        let range = Value::Range(RangeValue {
            sheet_name: Some("Data".to_owned()),
            refs: vec![Rect {
                row_first: 0,
                row_last: 9,
                col_first: 1,
                col_last: 1,
            }],
            format: None,
        });
        assert_eq!(decode(&range), range);

        let cache = Value::RefCache("k1".to_owned());
        assert_eq!(decode(&cache), cache);
    }

    #[test]
    fn bad_dimensions_give_an_empty_grid() {
        let empty = Value::Grid(GridValue::default());
        assert_eq!(Value::from_cells(-1, 2, vec![]), empty);
        assert_eq!(Value::from_cells(2, 2, vec![Cell::Nil]), empty);
        assert_eq!(Value::from_cells(i32::MAX, 2, vec![]), empty);
    }

    #[test]
    fn invalid_grid_materializes_as_value_error() {
        let mut b = Builder::new();
        let cell = Cell::Int(1).encode(&mut b);
        let data = b.create_offset_vector(&[cell]);
        let grid = Grid::create(&mut b, 2, 2, Some(data));
        let root = Any::create(&mut b, AnyKind::Grid, Some(grid));
        let bytes = b.finish(root);

        let value = Value::from_any(Any::root(&bytes).expect("root"));
        assert_eq!(value, Value::Scalar(Cell::Err(ErrorCode::VALUE)));
    }

    #[test]
    fn range_without_refs_materializes_as_value_error() {
        let mut b = Builder::new();
        let range = Range::create(&mut b, None, None, None);
        let root = Any::create(&mut b, AnyKind::Range, Some(range));
        let bytes = b.finish(root);

        let value = Value::from_any(Any::root(&bytes).expect("root"));
        assert_eq!(value, VALUE_ERROR);
    }

    #[test]
    fn grids_without_data_materialize_as_value_error() {
        let mut b = Builder::new();
        let grid = Grid::create(&mut b, 0, 3, None);
        let root = Any::create(&mut b, AnyKind::Grid, Some(grid));
        let bytes = b.finish(root);
        let any = Any::root(&bytes).expect("root");
        assert!(any.validate().is_ok());
        assert_eq!(Value::from_any(any), VALUE_ERROR);

        let mut b = Builder::new();
        let grid = NumGrid::create(&mut b, 0, 0, None);
        let root = Any::create(&mut b, AnyKind::NumGrid, Some(grid));
        let bytes = b.finish(root);
        assert_eq!(Value::from_any(Any::root(&bytes).expect("root")), VALUE_ERROR);
    }

    #[test]
    fn shared_text_is_charged_per_cell() {
        let text = "x".repeat(1000);
        let mut b = Builder::new();
        let cell = Cell::Str(text.clone()).encode(&mut b);
        let data = b.create_offset_vector(&[cell; 64]);
        let grid = Grid::create(&mut b, 1, 64, Some(data));
        let root = Any::create(&mut b, AnyKind::Grid, Some(grid));
        let bytes = b.finish(root);
        assert!(bytes.len() < 2000);

        let Value::Grid(value) = Value::from_any(Any::root(&bytes).expect("root")) else {
            panic!("grid expected");
        };
        assert_eq!(value.cells.len(), 64);
        assert_eq!(value.cells[0], Cell::Str(text));
        assert_eq!(value.cells[63], Cell::Err(ErrorCode::VALUE));
    }

    #[test]
    fn long_text_is_cut_at_the_cell_limit() {
        let long = "a".repeat(MAX_TEXT_UNITS + 10);
        assert_eq!(cell_text(Some(long.as_bytes())).len(), MAX_TEXT_UNITS);

        // A surrogate pair that would straddle the limit is dropped whole.
        let mut straddle = "a".repeat(MAX_TEXT_UNITS - 1);
        straddle.push('😀');
        let cut = cell_text(Some(straddle.as_bytes()));
        assert_eq!(cut.encode_utf16().count(), MAX_TEXT_UNITS - 1);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(cell_text(Some(&[b'o', 0xff, b'k'][..])), "o\u{fffd}k");
        assert_eq!(cell_text(None), "");
    }
}
