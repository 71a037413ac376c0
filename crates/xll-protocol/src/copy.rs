// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deep copy: re-encode a view into a fresh, independently owned buffer.
//!
//! Copying is fail-soft. Every vector length is admitted by [`CopyContext`] before
//! it drives an allocation or a loop; a length over the ceiling, or one that claims
//! more bytes than the source buffer holds, makes that value's copy return `None`.
//! Unions absorb the `None` and come out empty, so a corrupt cell costs only that
//! cell and the rest of the message is copied normally.
//!
//! Every vector and string is also charged against an [`OutputBudget`] before it is
//! written. Tables may be shared, so one large payload referenced by every cell of a
//! grid would otherwise be copied once per cell. Once the budget is spent, further
//! payloads collapse the same way corrupt ones do.

use tracing::{debug, warn};
use xll_flat::{Builder, Offset, Owned, Root, Vector, SIZE_UOFFSET};

use crate::{
    Any, AnyValue, AsyncHandle, BatchRtdUpdate, Bool, ErrorValue, Grid, Int, Limits, Nil, Num,
    NumGrid, OutputBudget, Range, Rect, RefCache, RtdConnectRequest, RtdUpdate, Scalar,
    ScalarKind, ScalarValue, Str,
};

/// Output builder plus the ceilings and bookkeeping of one copy.
#[derive(Debug)]
pub struct CopyContext {
    builder: Builder,
    limits: Limits,
    budget: OutputBudget,
    exhausted: bool,
    collapsed: usize,
}

impl Default for CopyContext {
    fn default() -> Self {
        Self::with_limits(Limits::default())
    }
}

impl CopyContext {
    /// Context with the default ceilings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with configured ceilings, clamped by [`Limits::effective`].
    ///
    /// The output budget is `max_output_bytes` alone; use
    /// [`CopyContext::for_source`] to also bound it by the source size.
    pub fn with_limits(limits: Limits) -> Self {
        let limits = limits.effective();
        Self::with_budget(limits, OutputBudget::new(limits.max_output_bytes))
    }

    /// Context for copying out of `source`, budgeted by [`Limits::output_budget`].
    pub fn for_source(limits: Limits, source: &[u8]) -> Self {
        let limits = limits.effective();
        Self::with_budget(limits, limits.output_budget(source.len()))
    }

    fn with_budget(limits: Limits, budget: OutputBudget) -> Self {
        Self {
            builder: Builder::new(),
            limits,
            budget,
            exhausted: false,
            collapsed: 0,
        }
    }

    /// Output builder, for writing envelopes around copied values.
    pub fn builder_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }

    /// Ceilings in effect.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Output budget left.
    pub fn budget(&self) -> OutputBudget {
        self.budget
    }

    /// Number of subtrees dropped so far.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }

    /// Finish the output with `root` as its root table.
    pub fn finish(self, root: Offset) -> Vec<u8> {
        self.builder.finish(root)
    }

    /// Admit `vector` for copying: its length must be within the ceiling, its
    /// `elem_size`-byte elements must all lie inside the source buffer and their
    /// bytes must fit in the output budget.
    fn admit(&mut self, kind: &'static str, vector: Vector<'_>, elem_size: usize) -> Option<usize> {
        let claimed = vector.len();
        let ceiling = self.limits.max_vector_len;
        // The ceiling is at most i32::MAX, so lengths that are negative as signed
        // 32-bit counts fail here too.
        if claimed > ceiling {
            self.collapsed += 1;
            warn!(kind, claimed, ceiling, "vector length over ceiling; dropping value");
            return None;
        }
        let Some(bytes) = vector.raw(elem_size) else {
            self.collapsed += 1;
            warn!(kind, claimed, elem_size, "vector runs past end of buffer; dropping value");
            return None;
        };
        self.charge(kind, bytes.len())?;
        usize::try_from(claimed).ok()
    }

    /// Charge `bytes` of output against the budget.
    fn charge(&mut self, kind: &'static str, bytes: usize) -> Option<()> {
        if self.budget.spend(bytes) {
            return Some(());
        }
        self.collapsed += 1;
        let remaining = self.budget.remaining();
        if self.exhausted {
            debug!(kind, bytes, remaining, "output budget exhausted; dropping value");
        } else {
            self.exhausted = true;
            warn!(kind, bytes, remaining, "output budget exhausted; dropping value");
        }
        None
    }

    /// Copy a string, charging its bytes first.
    fn copy_string(&mut self, kind: &'static str, bytes: &[u8]) -> Option<Offset> {
        self.charge(kind, bytes.len())?;
        Some(self.builder.create_string(bytes))
    }
}

/// A view that can be re-encoded into a [`CopyContext`].
pub trait DeepCopy {
    /// Root family of the owned copy.
    type Family: Root;

    /// Buffer the view reads from.
    fn source(&self) -> &[u8];

    /// Write a copy into `cx` and return its offset.
    ///
    /// `None` means the value itself was dropped (for example its vector failed
    /// admission). Union values never return `None`; they come out empty instead.
    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset>;

    /// Copy into a new exclusively owned buffer using the default ceilings.
    fn clone_owned(&self) -> Option<Owned<Self::Family>> {
        self.clone_with(Limits::default())
    }

    /// Copy into a new exclusively owned buffer using `limits`, with the output
    /// budgeted against [`DeepCopy::source`].
    fn clone_with(&self, limits: Limits) -> Option<Owned<Self::Family>> {
        let mut cx = CopyContext::for_source(limits, self.source());
        let root = self.deep_copy(&mut cx)?;
        Owned::from_bytes(cx.finish(root)).ok()
    }
}

/// [`DeepCopy::source`] for a view declared with `table_view!`.
macro_rules! source_is_table_buffer {
    () => {
        fn source(&self) -> &[u8] {
            self.table().buf()
        }
    };
}

impl DeepCopy for Bool<'_> {
    type Family = Bool<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        Some(Bool::create(cx.builder_mut(), self.val()))
    }
}

impl DeepCopy for Num<'_> {
    type Family = Num<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        Some(Num::create(cx.builder_mut(), self.val()))
    }
}

impl DeepCopy for Int<'_> {
    type Family = Int<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        Some(Int::create(cx.builder_mut(), self.val()))
    }
}

impl DeepCopy for Str<'_> {
    type Family = Str<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let val = match self.val() {
            Some(bytes) => Some(cx.copy_string("str", bytes)?),
            None => None,
        };
        Some(Str::create(cx.builder_mut(), val))
    }
}

impl DeepCopy for ErrorValue<'_> {
    type Family = ErrorValue<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        Some(ErrorValue::create(cx.builder_mut(), self.val()))
    }
}

impl DeepCopy for AsyncHandle<'_> {
    type Family = AsyncHandle<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let val = match self.val() {
            Some(vector) => {
                let len = cx.admit("async_handle", vector, 1)?;
                let bytes = vector.raw(1)?;
                let b = cx.builder_mut();
                b.start_vector(len, 1, 1);
                for &byte in bytes.iter().rev() {
                    b.push(byte);
                }
                Some(b.end_vector(len))
            }
            None => None,
        };
        Some(AsyncHandle::create(cx.builder_mut(), val))
    }
}

impl DeepCopy for Nil<'_> {
    type Family = Nil<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        Some(Nil::create(cx.builder_mut()))
    }
}

/// Copy a scalar payload; `None` when the payload was dropped or there was none.
fn copy_scalar_value(value: ScalarValue<'_>, cx: &mut CopyContext) -> Option<Offset> {
    match value {
        ScalarValue::None => None,
        ScalarValue::Bool(v) => v.deep_copy(cx),
        ScalarValue::Num(v) => v.deep_copy(cx),
        ScalarValue::Int(v) => v.deep_copy(cx),
        ScalarValue::Str(v) => v.deep_copy(cx),
        ScalarValue::Err(v) => v.deep_copy(cx),
        ScalarValue::AsyncHandle(v) => v.deep_copy(cx),
        ScalarValue::Nil(v) => v.deep_copy(cx),
    }
}

impl DeepCopy for Scalar<'_> {
    type Family = Scalar<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let value = self.val();
        let payload = copy_scalar_value(value, cx);
        Some(Scalar::create(cx.builder_mut(), value.kind(), payload))
    }
}

impl DeepCopy for Grid<'_> {
    type Family = Grid<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let data = match self.data() {
            Some(vector) => {
                let len = cx.admit("grid.data", vector, SIZE_UOFFSET)?;
                let mut cells = Vec::with_capacity(len);
                for i in 0..len {
                    let cell = vector.get_as::<Scalar<'_>>(i).and_then(|s| s.deep_copy(cx));
                    let cell = cell
                        .unwrap_or_else(|| Scalar::create(cx.builder_mut(), ScalarKind::None, None));
                    cells.push(cell);
                }
                Some(cx.builder_mut().create_offset_vector(&cells))
            }
            None => None,
        };
        Some(Grid::create(cx.builder_mut(), self.rows(), self.cols(), data))
    }
}

impl DeepCopy for NumGrid<'_> {
    type Family = NumGrid<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let data = match self.data() {
            Some(vector) => {
                let len = cx.admit("num_grid.data", vector, 8)?;
                let b = cx.builder_mut();
                b.start_vector(len, 8, 8);
                for i in (0..len).rev() {
                    b.push(vector.get::<f64>(i).unwrap_or_default());
                }
                Some(b.end_vector(len))
            }
            None => None,
        };
        Some(NumGrid::create(cx.builder_mut(), self.rows(), self.cols(), data))
    }
}

impl DeepCopy for Range<'_> {
    type Family = Range<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let sheet_name = match self.sheet_name() {
            Some(bytes) => Some(cx.copy_string("range.sheet_name", bytes)?),
            None => None,
        };
        let format = match self.format() {
            Some(bytes) => Some(cx.copy_string("range.format", bytes)?),
            None => None,
        };
        let refs = match self.refs() {
            Some(vector) => {
                let len = cx.admit("range.refs", vector, Rect::SIZE)?;
                let b = cx.builder_mut();
                b.start_vector(len, Rect::SIZE, Rect::ALIGN);
                for i in (0..len).rev() {
                    let rect = vector
                        .slice(i, Rect::SIZE)
                        .and_then(Rect::from_bytes)
                        .unwrap_or_default();
                    rect.push(b);
                }
                Some(b.end_vector(len))
            }
            None => None,
        };
        Some(Range::create(cx.builder_mut(), sheet_name, refs, format))
    }
}

impl DeepCopy for RefCache<'_> {
    type Family = RefCache<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let key = match self.key() {
            Some(bytes) => Some(cx.copy_string("ref_cache.key", bytes)?),
            None => None,
        };
        Some(RefCache::create(cx.builder_mut(), key))
    }
}

impl DeepCopy for Any<'_> {
    type Family = Any<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let value = self.val();
        let payload = match value {
            AnyValue::None => None,
            AnyValue::Bool(v) => v.deep_copy(cx),
            AnyValue::Num(v) => v.deep_copy(cx),
            AnyValue::Int(v) => v.deep_copy(cx),
            AnyValue::Str(v) => v.deep_copy(cx),
            AnyValue::Err(v) => v.deep_copy(cx),
            AnyValue::AsyncHandle(v) => v.deep_copy(cx),
            AnyValue::Nil(v) => v.deep_copy(cx),
            AnyValue::Grid(v) => v.deep_copy(cx),
            AnyValue::NumGrid(v) => v.deep_copy(cx),
            AnyValue::Range(v) => v.deep_copy(cx),
            AnyValue::RefCache(v) => v.deep_copy(cx),
        };
        Some(Any::create(cx.builder_mut(), value.kind(), payload))
    }
}

impl DeepCopy for RtdConnectRequest<'_> {
    type Family = RtdConnectRequest<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let strings = match self.strings() {
            Some(vector) => {
                let len = cx.admit("rtd_connect.strings", vector, SIZE_UOFFSET)?;
                let mut offsets = Vec::with_capacity(len);
                for i in 0..len {
                    let bytes = vector.bytes(i).unwrap_or_default();
                    offsets.push(cx.copy_string("rtd_connect.string", bytes)?);
                }
                Some(cx.builder_mut().create_offset_vector(&offsets))
            }
            None => None,
        };
        Some(RtdConnectRequest::create(
            cx.builder_mut(),
            self.topic_id(),
            strings,
            self.new_values(),
        ))
    }
}

impl DeepCopy for RtdUpdate<'_> {
    type Family = RtdUpdate<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let val = self.val().and_then(|any| any.deep_copy(cx));
        Some(RtdUpdate::create(cx.builder_mut(), self.topic_id(), val))
    }
}

impl DeepCopy for BatchRtdUpdate<'_> {
    type Family = BatchRtdUpdate<'static>;

    source_is_table_buffer!();

    fn deep_copy(&self, cx: &mut CopyContext) -> Option<Offset> {
        let updates = match self.updates() {
            Some(vector) => {
                let len = cx.admit("batch.updates", vector, SIZE_UOFFSET)?;
                let mut updates = Vec::with_capacity(len);
                for i in 0..len {
                    let update = vector
                        .get_as::<RtdUpdate<'_>>(i)
                        .and_then(|u| u.deep_copy(cx));
                    let update =
                        update.unwrap_or_else(|| RtdUpdate::create(cx.builder_mut(), 0, None));
                    updates.push(update);
                }
                Some(cx.builder_mut().create_offset_vector(&updates))
            }
            None => None,
        };
        Some(BatchRtdUpdate::create(cx.builder_mut(), updates))
    }
}
