// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The `Any` union: every scalar leaf plus grids, ranges and cache keys.

use xll_flat::{Builder, Follow, Offset};

use crate::slots::{UNION_TAG, UNION_VAL};
use crate::{
    AsyncHandle, Bool, ErrorValue, Grid, Int, Nil, Num, NumGrid, Range, RefCache, ScalarKind, Str,
};

/// Discriminant of the [`Any`] union. Tags `0..=7` match [`ScalarKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AnyKind {
    /// No payload.
    #[default]
    None = 0,
    /// [`Bool`].
    Bool = 1,
    /// [`Num`].
    Num = 2,
    /// [`Int`].
    Int = 3,
    /// [`Str`].
    Str = 4,
    /// [`ErrorValue`].
    Err = 5,
    /// [`AsyncHandle`].
    AsyncHandle = 6,
    /// [`Nil`].
    Nil = 7,
    /// [`Grid`].
    Grid = 8,
    /// [`NumGrid`].
    NumGrid = 9,
    /// [`Range`].
    Range = 10,
    /// [`RefCache`].
    RefCache = 11,
}

impl AnyKind {
    /// Decode a wire tag. Unknown tags decode to [`AnyKind::None`].
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Bool,
            2 => Self::Num,
            3 => Self::Int,
            4 => Self::Str,
            5 => Self::Err,
            6 => Self::AsyncHandle,
            7 => Self::Nil,
            8 => Self::Grid,
            9 => Self::NumGrid,
            10 => Self::Range,
            11 => Self::RefCache,
            _ => Self::None,
        }
    }

    /// Wire tag.
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl From<ScalarKind> for AnyKind {
    fn from(kind: ScalarKind) -> Self {
        Self::from_tag(kind.tag())
    }
}

/// Decoded payload of an [`Any`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyValue<'a> {
    /// Untagged, unknown tag or missing payload.
    None,
    /// Boolean payload.
    Bool(Bool<'a>),
    /// Float payload.
    Num(Num<'a>),
    /// Integer payload.
    Int(Int<'a>),
    /// Text payload.
    Str(Str<'a>),
    /// Error payload.
    Err(ErrorValue<'a>),
    /// Async handle payload.
    AsyncHandle(AsyncHandle<'a>),
    /// Nil payload.
    Nil(Nil<'a>),
    /// Grid payload.
    Grid(Grid<'a>),
    /// Numeric grid payload.
    NumGrid(NumGrid<'a>),
    /// Range payload.
    Range(Range<'a>),
    /// Cache key payload.
    RefCache(RefCache<'a>),
}

impl AnyValue<'_> {
    /// Tag matching this payload.
    pub const fn kind(&self) -> AnyKind {
        match self {
            Self::None => AnyKind::None,
            Self::Bool(_) => AnyKind::Bool,
            Self::Num(_) => AnyKind::Num,
            Self::Int(_) => AnyKind::Int,
            Self::Str(_) => AnyKind::Str,
            Self::Err(_) => AnyKind::Err,
            Self::AsyncHandle(_) => AnyKind::AsyncHandle,
            Self::Nil(_) => AnyKind::Nil,
            Self::Grid(_) => AnyKind::Grid,
            Self::NumGrid(_) => AnyKind::NumGrid,
            Self::Range(_) => AnyKind::Range,
            Self::RefCache(_) => AnyKind::RefCache,
        }
    }
}

table_view! {
    /// Tagged union carried by function arguments, results and RTD updates.
    Any
}

impl<'a> Any<'a> {
    /// Stored discriminant.
    pub fn val_type(&self) -> AnyKind {
        AnyKind::from_tag(self.0.get(UNION_TAG, 0))
    }

    /// Decode the payload.
    pub fn val(&self) -> AnyValue<'a> {
        let Some(table) = self.0.get_table(UNION_VAL) else {
            return AnyValue::None;
        };
        match self.val_type() {
            AnyKind::None => AnyValue::None,
            AnyKind::Bool => AnyValue::Bool(Bool::follow(table)),
            AnyKind::Num => AnyValue::Num(Num::follow(table)),
            AnyKind::Int => AnyValue::Int(Int::follow(table)),
            AnyKind::Str => AnyValue::Str(Str::follow(table)),
            AnyKind::Err => AnyValue::Err(ErrorValue::follow(table)),
            AnyKind::AsyncHandle => AnyValue::AsyncHandle(AsyncHandle::follow(table)),
            AnyKind::Nil => AnyValue::Nil(Nil::follow(table)),
            AnyKind::Grid => AnyValue::Grid(Grid::follow(table)),
            AnyKind::NumGrid => AnyValue::NumGrid(NumGrid::follow(table)),
            AnyKind::Range => AnyValue::Range(Range::follow(table)),
            AnyKind::RefCache => AnyValue::RefCache(RefCache::follow(table)),
        }
    }
}

impl Any<'_> {
    /// Write an `Any` union; see [`crate::Scalar::create`] for the empty case.
    pub fn create(b: &mut Builder, kind: AnyKind, val: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(val) = val.filter(|_| kind != AnyKind::None) {
            b.add_field(UNION_TAG, kind.tag());
            b.add_offset_field(UNION_VAL, val);
        }
        b.end_table()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn scalar_tags_map_onto_any_tags() {
        assert_eq!(AnyKind::from(ScalarKind::Str), AnyKind::Str);
        assert_eq!(AnyKind::from(ScalarKind::Nil), AnyKind::Nil);
        assert_eq!(AnyKind::from(ScalarKind::None), AnyKind::None);
        for tag in 0..=11u8 {
            assert_eq!(AnyKind::from_tag(tag).tag(), tag);
        }
        assert_eq!(AnyKind::from_tag(12), AnyKind::None);
    }

    #[test]
    fn range_payload_decodes() {
        let mut b = Builder::new();
        let key = b.create_string(b"cache-7");
        let cache = RefCache::create(&mut b, Some(key));
        let root = Any::create(&mut b, AnyKind::RefCache, Some(cache));
        let bytes = b.finish(root);

        let any = Any::root(&bytes).expect("root");
        match any.val() {
            AnyValue::RefCache(cache) => assert_eq!(cache.key(), Some(&b"cache-7"[..])),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
