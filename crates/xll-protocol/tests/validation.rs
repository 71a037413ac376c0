// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural validation of grids and ranges built on the wire.
#![allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]

use xll_protocol::{
    Any, AnyKind, Builder, Follow, Grid, Limits, Num, NumGrid, Range, Rect, Scalar, ScalarKind,
    Validate, ValidationError,
};

fn grid_bytes(rows: u32, cols: u32, cells: usize) -> Vec<u8> {
    let mut b = Builder::new();
    let offsets: Vec<_> = (0..cells)
        .map(|i| {
            let num = Num::create(&mut b, f64::from(u32::try_from(i).unwrap_or(0)));
            Scalar::create(&mut b, ScalarKind::Num, Some(num))
        })
        .collect();
    let data = b.create_offset_vector(&offsets);
    let root = Grid::create(&mut b, rows, cols, Some(data));
    b.finish(root)
}

fn range_bytes(refs: usize) -> Vec<u8> {
    let mut b = Builder::new();
    let rects = vec![Rect::default(); refs];
    let refs = Rect::create_vector(&mut b, &rects);
    let root = Range::create(&mut b, None, Some(refs), None);
    b.finish(root)
}

#[test]
fn matching_grid_is_valid() {
    let bytes = grid_bytes(2, 2, 4);
    assert_eq!(Grid::root(&bytes).expect("root").validate(), Ok(()));
}

#[test]
fn short_grid_is_invalid_dimensions() {
    let bytes = grid_bytes(2, 2, 2);
    assert_eq!(
        Grid::root(&bytes).expect("root").validate(),
        Err(ValidationError::InvalidDimensions {
            expected: 4,
            actual: 2
        })
    );
}

#[test]
fn huge_product_is_overflow_before_length_check() {
    let bytes = grid_bytes(i32::MAX.unsigned_abs(), 2, 0);
    assert_eq!(
        Grid::root(&bytes).expect("root").validate(),
        Err(ValidationError::Overflow {
            count: 4_294_967_294,
            max: 2_147_483_647
        })
    );
}

#[test]
fn negative_dimension_is_rejected() {
    let bytes = grid_bytes(u32::MAX, 1, 0);
    assert!(matches!(
        Grid::root(&bytes).expect("root").validate(),
        Err(ValidationError::NegativeDimensions { rows: -1, cols: 1 })
    ));
}

#[test]
fn grid_without_data_counts_as_empty() {
    let mut b = Builder::new();
    let root = Grid::create(&mut b, 0, 5, None);
    let bytes = b.finish(root);
    assert_eq!(Grid::root(&bytes).expect("root").validate(), Ok(()));

    let mut b = Builder::new();
    let root = Grid::create(&mut b, 1, 1, None);
    let bytes = b.finish(root);
    assert_eq!(
        Grid::root(&bytes).expect("root").validate(),
        Err(ValidationError::InvalidDimensions {
            expected: 1,
            actual: 0
        })
    );
}

#[test]
fn num_grid_uses_the_same_rules() {
    let mut b = Builder::new();
    let data = b.create_vector(&[1.0f64, 2.0, 3.0]);
    let root = NumGrid::create(&mut b, 3, 1, Some(data));
    let bytes = b.finish(root);
    assert_eq!(NumGrid::root(&bytes).expect("root").validate(), Ok(()));

    let mut b = Builder::new();
    let data = b.create_vector(&[1.0f64, 2.0, 3.0]);
    let root = NumGrid::create(&mut b, 2, 2, Some(data));
    let bytes = b.finish(root);
    assert_eq!(
        NumGrid::root(&bytes).expect("root").validate(),
        Err(ValidationError::InvalidDimensions {
            expected: 4,
            actual: 3
        })
    );
}

#[test]
fn range_ref_ceiling_is_inclusive() {
    let bytes = range_bytes(65_535);
    assert_eq!(Range::root(&bytes).expect("root").validate(), Ok(()));

    let bytes = range_bytes(65_536);
    assert_eq!(
        Range::root(&bytes).expect("root").validate(),
        Err(ValidationError::TooManyRefs {
            count: 65_536,
            max: 65_535
        })
    );
}

#[test]
fn configured_limits_tighten_checks() {
    let limits = Limits::from_json(br#"{"max_vector_len": 3, "max_range_refs": 1}"#)
        .expect("limits");

    let bytes = grid_bytes(2, 2, 4);
    assert_eq!(
        Grid::root(&bytes).expect("root").validate_with(&limits),
        Err(ValidationError::Overflow { count: 4, max: 3 })
    );

    let bytes = range_bytes(2);
    assert_eq!(
        Range::root(&bytes).expect("root").validate_with(&limits),
        Err(ValidationError::TooManyRefs { count: 2, max: 1 })
    );
}

#[test]
fn any_validates_the_grid_it_carries() {
    let mut b = Builder::new();
    let data = b.create_vector(&[1.0f64]);
    let grid = NumGrid::create(&mut b, 1, 2, Some(data));
    let root = Any::create(&mut b, AnyKind::NumGrid, Some(grid));
    let bytes = b.finish(root);
    assert!(matches!(
        Any::root(&bytes).expect("root").validate(),
        Err(ValidationError::InvalidDimensions { .. })
    ));

    let mut b = Builder::new();
    let num = Num::create(&mut b, 1.0);
    let root = Any::create(&mut b, AnyKind::Num, Some(num));
    let bytes = b.finish(root);
    assert_eq!(Any::root(&bytes).expect("root").validate(), Ok(()));
}
