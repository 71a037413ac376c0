// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Messages exchanged between a spreadsheet add-in and its compute service.
//!
//! Every message is a flat table read in place from an untrusted buffer. This crate
//! provides:
//!
//! - typed, lifetime-bound views ([`Scalar`], [`Any`], [`Grid`], [`NumGrid`],
//!   [`Range`], [`RefCache`] and the RTD envelopes) with `create` helpers for the
//!   writing side;
//! - [`DeepCopy`]: re-encodes a view into a fresh, independently owned buffer.
//!   Corruption collapses only the affected subtree, never the whole copy;
//! - [`Validate`]: checks the structural invariants of grids and ranges and reports
//!   a typed [`ValidationError`];
//! - [`model`]: owned values for code that wants plain Rust data instead of views.
//!
//! Copying and validation never call each other. Validate untrusted input before
//! acting on it; copy it when it has to outlive the buffer it arrived in.
//!
//! ```
//! use xll_protocol::{Any, AnyValue, Builder, DeepCopy, Follow, Num, AnyKind};
//!
//! let mut b = Builder::new();
//! let num = Num::create(&mut b, 42.5);
//! let root = Any::create(&mut b, AnyKind::Num, Some(num));
//! let bytes = b.finish(root);
//!
//! let view = Any::root(&bytes).unwrap();
//! let copy = view.clone_owned().unwrap();
//! drop(bytes);
//! match copy.view().val() {
//!     AnyValue::Num(n) => assert_eq!(n.val(), 42.5),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
#![forbid(unsafe_code)]

/// Declare a view newtype over a [`xll_flat::Table`] together with its `Follow` and
/// `Root` impls.
macro_rules! table_view {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name<'a>(xll_flat::Table<'a>);

        impl<'a> xll_flat::Follow<'a> for $name<'a> {
            fn follow(table: xll_flat::Table<'a>) -> Self {
                Self(table)
            }
        }

        impl xll_flat::Root for $name<'static> {
            type View<'a> = $name<'a>;
        }

        impl<'a> $name<'a> {
            /// Underlying raw table.
            pub fn table(&self) -> xll_flat::Table<'a> {
                self.0
            }
        }
    };
}

mod any;
mod copy;
mod grid;
mod limits;
pub mod model;
mod range;
mod rtd;
mod scalar;
mod validate;

pub use any::{Any, AnyKind, AnyValue};
pub use copy::{CopyContext, DeepCopy};
pub use grid::{Grid, NumGrid};
pub use limits::{
    Limits, LimitsError, OutputBudget, MAX_OUTPUT_BYTES, MAX_OUTPUT_RATIO, MAX_RANGE_REFS,
    MAX_VECTOR_LEN,
};
pub use range::{Range, Rect, RefCache};
pub use rtd::{BatchRtdUpdate, RtdConnectRequest, RtdUpdate};
pub use scalar::{
    AsyncHandle, Bool, ErrorCode, ErrorValue, Int, Nil, Num, Scalar, ScalarKind, ScalarValue, Str,
};
pub use validate::{Validate, ValidationError};
pub use xll_flat::{Builder, FlatError, Follow, Offset, Owned};

/// Field slots shared by the leaf and union tables.
mod slots {
    /// Payload of a single-field leaf table.
    pub(crate) const VAL: u16 = 0;
    /// Discriminant of a union table.
    pub(crate) const UNION_TAG: u16 = 0;
    /// Payload of a union table.
    pub(crate) const UNION_VAL: u16 = 1;
}

/// Owned, deep-copied [`Scalar`].
pub type OwnedScalar = Owned<Scalar<'static>>;
/// Owned, deep-copied [`Any`].
pub type OwnedAny = Owned<Any<'static>>;
/// Owned, deep-copied [`Grid`].
pub type OwnedGrid = Owned<Grid<'static>>;
/// Owned, deep-copied [`NumGrid`].
pub type OwnedNumGrid = Owned<NumGrid<'static>>;
/// Owned, deep-copied [`Range`].
pub type OwnedRange = Owned<Range<'static>>;
/// Owned, deep-copied [`RefCache`].
pub type OwnedRefCache = Owned<RefCache<'static>>;
/// Owned, deep-copied [`RtdConnectRequest`].
pub type OwnedRtdConnectRequest = Owned<RtdConnectRequest<'static>>;
/// Owned, deep-copied [`RtdUpdate`].
pub type OwnedRtdUpdate = Owned<RtdUpdate<'static>>;
/// Owned, deep-copied [`BatchRtdUpdate`].
pub type OwnedBatchRtdUpdate = Owned<BatchRtdUpdate<'static>>;
