// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar leaf tables and the `Scalar` union.
//!
//! Leaf tables carry their payload in slot 0 (`Nil` carries nothing). The union
//! stores a `u8` tag in slot 0 and the payload table in slot 1.

use core::fmt;

use serde::Serialize;
use xll_flat::{Builder, Follow, Offset, Vector};

use crate::slots::{UNION_TAG, UNION_VAL, VAL};

/// Excel error code carried by an [`ErrorValue`].
///
/// Codes outside the named set are kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    /// `#NULL!`
    pub const NULL: Self = Self(0);
    /// `#DIV/0!`
    pub const DIV0: Self = Self(7);
    /// `#VALUE!`
    pub const VALUE: Self = Self(15);
    /// `#REF!`
    pub const REF: Self = Self(23);
    /// `#NAME?`
    pub const NAME: Self = Self(29);
    /// `#NUM!`
    pub const NUM: Self = Self(36);
    /// `#N/A`
    pub const NA: Self = Self(42);
    /// `#GETTING_DATA`
    pub const GETTING_DATA: Self = Self(43);

    /// Spreadsheet spelling of a known code.
    pub const fn label(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("#NULL!"),
            7 => Some("#DIV/0!"),
            15 => Some("#VALUE!"),
            23 => Some("#REF!"),
            29 => Some("#NAME?"),
            36 => Some("#NUM!"),
            42 => Some("#N/A"),
            43 => Some("#GETTING_DATA"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => write!(f, "#ERR({})", self.0),
        }
    }
}

table_view! {
    /// Boolean leaf.
    Bool
}

impl Bool<'_> {
    /// Stored value; `false` when absent.
    pub fn val(&self) -> bool {
        self.0.get(VAL, false)
    }

    /// Write a `Bool` table.
    pub fn create(b: &mut Builder, val: bool) -> Offset {
        b.start_table();
        b.add_field(VAL, val);
        b.end_table()
    }
}

table_view! {
    /// 64-bit float leaf.
    Num
}

impl Num<'_> {
    /// Stored value; `0.0` when absent.
    pub fn val(&self) -> f64 {
        self.0.get(VAL, 0.0)
    }

    /// Write a `Num` table.
    pub fn create(b: &mut Builder, val: f64) -> Offset {
        b.start_table();
        b.add_field(VAL, val);
        b.end_table()
    }
}

table_view! {
    /// 32-bit integer leaf.
    Int
}

impl Int<'_> {
    /// Stored value; `0` when absent.
    pub fn val(&self) -> i32 {
        self.0.get(VAL, 0)
    }

    /// Write an `Int` table.
    pub fn create(b: &mut Builder, val: i32) -> Offset {
        b.start_table();
        b.add_field(VAL, val);
        b.end_table()
    }
}

table_view! {
    /// Text leaf. The bytes are meant to be UTF-8 but are not checked on the wire.
    Str
}

impl<'a> Str<'a> {
    /// Raw string bytes, `None` when the field is absent or unreadable.
    pub fn val(&self) -> Option<&'a [u8]> {
        self.0.get_bytes(VAL)
    }

    /// The string as UTF-8.
    pub fn as_str(&self) -> Option<&'a str> {
        self.0.get_str(VAL)
    }
}

impl Str<'_> {
    /// Write a `Str` table around a string created with [`Builder::create_string`].
    pub fn create(b: &mut Builder, val: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(val) = val {
            b.add_offset_field(VAL, val);
        }
        b.end_table()
    }
}

table_view! {
    /// Spreadsheet error leaf (`#VALUE!`, `#N/A`, ...).
    ErrorValue
}

impl ErrorValue<'_> {
    /// Stored code; `#NULL!` when absent.
    pub fn val(&self) -> ErrorCode {
        ErrorCode(self.0.get(VAL, 0))
    }

    /// Write an `Err` table.
    pub fn create(b: &mut Builder, val: ErrorCode) -> Offset {
        b.start_table();
        b.add_field(VAL, val.0);
        b.end_table()
    }
}

table_view! {
    /// Opaque handle identifying a pending asynchronous call.
    AsyncHandle
}

impl<'a> AsyncHandle<'a> {
    /// Handle bytes as a `[u8]` vector.
    pub fn val(&self) -> Option<Vector<'a>> {
        self.0.get_vector(VAL)
    }
}

impl AsyncHandle<'_> {
    /// Write an `AsyncHandle` table around a byte vector.
    pub fn create(b: &mut Builder, val: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(val) = val {
            b.add_offset_field(VAL, val);
        }
        b.end_table()
    }
}

table_view! {
    /// Explicit "no value" leaf. Carries no fields.
    Nil
}

impl Nil<'_> {
    /// Write an empty `Nil` table.
    pub fn create(b: &mut Builder) -> Offset {
        b.start_table();
        b.end_table()
    }
}

/// Discriminant of the [`Scalar`] union as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ScalarKind {
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
}

impl ScalarKind {
    /// Decode a wire tag. Unknown tags decode to [`ScalarKind::None`].
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Bool,
            2 => Self::Num,
            3 => Self::Int,
            4 => Self::Str,
            5 => Self::Err,
            6 => Self::AsyncHandle,
            7 => Self::Nil,
            _ => Self::None,
        }
    }

    /// Wire tag.
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

/// Decoded payload of a [`Scalar`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarValue<'a> {
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
}

impl ScalarValue<'_> {
    /// Tag matching this payload.
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::None => ScalarKind::None,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Num(_) => ScalarKind::Num,
            Self::Int(_) => ScalarKind::Int,
            Self::Str(_) => ScalarKind::Str,
            Self::Err(_) => ScalarKind::Err,
            Self::AsyncHandle(_) => ScalarKind::AsyncHandle,
            Self::Nil(_) => ScalarKind::Nil,
        }
    }
}

table_view! {
    /// Tagged union of the scalar leaves; the cell type of a [`crate::Grid`].
    Scalar
}

impl<'a> Scalar<'a> {
    /// Stored discriminant.
    pub fn val_type(&self) -> ScalarKind {
        ScalarKind::from_tag(self.0.get(UNION_TAG, 0))
    }

    /// Decode the payload.
    pub fn val(&self) -> ScalarValue<'a> {
        let Some(table) = self.0.get_table(UNION_VAL) else {
            return ScalarValue::None;
        };
        match self.val_type() {
            ScalarKind::None => ScalarValue::None,
            ScalarKind::Bool => ScalarValue::Bool(Bool::follow(table)),
            ScalarKind::Num => ScalarValue::Num(Num::follow(table)),
            ScalarKind::Int => ScalarValue::Int(Int::follow(table)),
            ScalarKind::Str => ScalarValue::Str(Str::follow(table)),
            ScalarKind::Err => ScalarValue::Err(ErrorValue::follow(table)),
            ScalarKind::AsyncHandle => ScalarValue::AsyncHandle(AsyncHandle::follow(table)),
            ScalarKind::Nil => ScalarValue::Nil(Nil::follow(table)),
        }
    }
}

impl Scalar<'_> {
    /// Write a `Scalar` union.
    ///
    /// The tag is written only together with a payload; `None` for either produces
    /// the empty, untagged union.
    pub fn create(b: &mut Builder, kind: ScalarKind, val: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(val) = val.filter(|_| kind != ScalarKind::None) {
            b.add_field(UNION_TAG, kind.tag());
            b.add_offset_field(UNION_VAL, val);
        }
        b.end_table()
    }
}
