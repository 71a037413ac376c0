// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural validation of grids and ranges.
//!
//! The validator reads only the header fields and vector lengths of the value it is
//! given. It does not allocate, does not look inside cells and does not copy.

use thiserror::Error;
use tracing::debug;

use crate::{Any, AnyValue, Grid, Limits, NumGrid, Range};

/// Structural violation found by [`Validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `rows` or `cols` is negative when read as a signed 32-bit count.
    #[error("negative dimensions: rows {rows}, cols {cols}")]
    NegativeDimensions {
        /// Row count, signed.
        rows: i32,
        /// Column count, signed.
        cols: i32,
    },
    /// `rows * cols` exceeds the cell ceiling.
    #[error("dimension overflow: count {count} > {max}")]
    Overflow {
        /// `rows * cols`, computed in 64 bits.
        count: u64,
        /// Ceiling in effect.
        max: u32,
    },
    /// Stored element count differs from `rows * cols`.
    #[error("invalid dimensions: expected {expected}, got {actual}")]
    InvalidDimensions {
        /// `rows * cols`.
        expected: u64,
        /// Stored element count.
        actual: u64,
    },
    /// More rects than the range ceiling allows.
    #[error("too many refs: got {count}, max {max}")]
    TooManyRefs {
        /// Stored rect count.
        count: u32,
        /// Ceiling in effect.
        max: u32,
    },
}

/// Structural check of a view.
pub trait Validate {
    /// Validate against the default ceilings.
    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_with(&Limits::default())
    }

    /// Validate against `limits`, clamped by [`Limits::effective`].
    fn validate_with(&self, limits: &Limits) -> Result<(), ValidationError>;
}

/// Sign, overflow and length checks shared by both grid kinds, in that order.
fn check_dimensions(rows: u32, cols: u32, actual: u32, max: u32) -> Result<(), ValidationError> {
    let (signed_rows, signed_cols) = (rows.cast_signed(), cols.cast_signed());
    if signed_rows < 0 || signed_cols < 0 {
        return Err(ValidationError::NegativeDimensions {
            rows: signed_rows,
            cols: signed_cols,
        });
    }
    let count = u64::from(rows) * u64::from(cols);
    if count > u64::from(max) {
        return Err(ValidationError::Overflow { count, max });
    }
    if u64::from(actual) != count {
        return Err(ValidationError::InvalidDimensions {
            expected: count,
            actual: u64::from(actual),
        });
    }
    Ok(())
}

impl Validate for Grid<'_> {
    fn validate_with(&self, limits: &Limits) -> Result<(), ValidationError> {
        let max = limits.effective().max_vector_len;
        check_dimensions(self.rows(), self.cols(), self.data_len(), max)
            .inspect_err(|err| debug!(kind = "grid", %err, "validation failed"))
    }
}

impl Validate for NumGrid<'_> {
    fn validate_with(&self, limits: &Limits) -> Result<(), ValidationError> {
        let max = limits.effective().max_vector_len;
        check_dimensions(self.rows(), self.cols(), self.data_len(), max)
            .inspect_err(|err| debug!(kind = "num_grid", %err, "validation failed"))
    }
}

impl Validate for Range<'_> {
    fn validate_with(&self, limits: &Limits) -> Result<(), ValidationError> {
        let max = limits.effective().max_range_refs;
        let count = self.refs_len();
        if count > max {
            let err = ValidationError::TooManyRefs { count, max };
            debug!(kind = "range", %err, "validation failed");
            return Err(err);
        }
        Ok(())
    }
}

/// Validates the grid or range an `Any` carries; every other payload passes.
impl Validate for Any<'_> {
    fn validate_with(&self, limits: &Limits) -> Result<(), ValidationError> {
        match self.val() {
            AnyValue::Grid(grid) => grid.validate_with(limits),
            AnyValue::NumGrid(grid) => grid.validate_with(limits),
            AnyValue::Range(range) => range.validate_with(limits),
            AnyValue::None
            | AnyValue::Bool(_)
            | AnyValue::Num(_)
            | AnyValue::Int(_)
            | AnyValue::Str(_)
            | AnyValue::Err(_)
            | AnyValue::AsyncHandle(_)
            | AnyValue::Nil(_)
            | AnyValue::RefCache(_) => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn sign_is_checked_before_overflow() {
        assert_eq!(
            check_dimensions(u32::MAX, 2, 0, i32::MAX.unsigned_abs()),
            Err(ValidationError::NegativeDimensions { rows: -1, cols: 2 })
        );
    }

    #[test]
    fn overflow_is_checked_before_length() {
        assert_eq!(
            check_dimensions(65_536, 32_768, 0, i32::MAX.unsigned_abs()),
            Err(ValidationError::Overflow {
                count: 2_147_483_648,
                max: 2_147_483_647
            })
        );
    }

    #[test]
    fn product_at_ceiling_is_accepted() {
        assert_eq!(
            check_dimensions(1, i32::MAX.unsigned_abs(), i32::MAX.unsigned_abs(), i32::MAX.unsigned_abs()),
            Ok(())
        );
    }

    #[test]
    fn tightened_ceiling_applies() {
        assert_eq!(
            check_dimensions(4, 4, 16, 10),
            Err(ValidationError::Overflow { count: 16, max: 10 })
        );
    }

    #[test]
    fn messages_name_the_numbers() {
        let err = ValidationError::InvalidDimensions {
            expected: 4,
            actual: 2,
        };
        assert_eq!(err.to_string(), "invalid dimensions: expected 4, got 2");
        let err = ValidationError::TooManyRefs {
            count: 65_536,
            max: 65_535,
        };
        assert_eq!(err.to_string(), "too many refs: got 65536, max 65535");
    }
}
