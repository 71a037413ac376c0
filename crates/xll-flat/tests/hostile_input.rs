// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Readers must survive arbitrary and corrupted buffers.
#![allow(clippy::expect_used)]

use proptest::prelude::*;
use xll_flat::{Builder, Table};

fn poke_everything(bytes: &[u8]) {
    let Ok(table) = Table::root(bytes) else {
        return;
    };
    for slot in 0..8u16 {
        let _ = table.get(slot, 0u64);
        let _ = table.get(slot, 0f64);
        let _ = table.get(slot, false);
        let _ = table.get_bytes(slot);
        let _ = table.get_str(slot);
        if let Some(nested) = table.get_table(slot) {
            let _ = nested.get(0, 0u32);
            let _ = nested.get_vector(0);
        }
        if let Some(vector) = table.get_vector(slot) {
            let _ = vector.fits(4);
            let _ = vector.raw(1);
            for i in [0usize, 1, 7, usize::MAX] {
                let _ = vector.get::<f64>(i);
                let _ = vector.table(i);
                let _ = vector.bytes(i);
                let _ = vector.slice(i, 16);
            }
        }
    }
}

fn sample_buffer() -> Vec<u8> {
    let mut b = Builder::new();
    let name = b.create_string(b"Sheet1");
    let nums = b.create_vector(&[1.0f64, 2.0, 3.0]);
    b.start_table();
    b.add_field(0, 3u32);
    b.add_offset_field(1, name);
    b.add_offset_field(2, nums);
    let root = b.end_table();
    b.finish(root)
}

proptest! {
    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        poke_everything(&bytes);
    }

    #[test]
    fn single_byte_corruption_never_panics(index in 0usize..256, value in any::<u8>()) {
        let mut bytes = sample_buffer();
        let index = index % bytes.len();
        bytes[index] = value;
        poke_everything(&bytes);
    }

    #[test]
    fn truncation_never_panics(cut in 0usize..256) {
        let bytes = sample_buffer();
        let cut = cut % (bytes.len() + 1);
        poke_everything(&bytes[..cut]);
    }
}

#[test]
fn overclaimed_vector_length_is_visible_but_unreadable() {
    let mut bytes = sample_buffer();
    let table = Table::root(&bytes).expect("root");
    let vector = table.get_vector(2).expect("vector");
    assert_eq!(vector.len(), 3);

    // The length prefix sits right before the first element.
    let prefix = bytes
        .windows(4)
        .rposition(|w| w == 3u32.to_le_bytes())
        .expect("length prefix");
    bytes[prefix..prefix + 4].copy_from_slice(&(u32::MAX - 1).to_le_bytes());

    let table = Table::root(&bytes).expect("root");
    let vector = table.get_vector(2).expect("vector");
    assert_eq!(vector.len(), u32::MAX - 1);
    assert!(!vector.fits(8));
    assert_eq!(vector.get::<f64>(1_000_000), None);
}
