// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Size ceilings shared by the copy engine, the validator and the value model, and
//! the output budget that bounds a single copy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard ceiling on any vector length or grid cell count: the largest signed 32-bit
/// count.
pub const MAX_VECTOR_LEN: u32 = i32::MAX.unsigned_abs();

/// Hard ceiling on the number of rects in a `Range` (the spreadsheet stores the
/// count in 16 bits).
pub const MAX_RANGE_REFS: u32 = 65_535;

/// Hard ceiling on the bytes one copy or materialization may produce: the largest
/// buffer a 32-bit signed offset can address.
pub const MAX_OUTPUT_BYTES: u64 = 2_147_483_647;

/// Hard ceiling on output size as a multiple of the source buffer's size.
///
/// Tables may be referenced from many places in one buffer, so a small message can
/// describe a very large copy. Honest messages stay within a few times their size.
pub const MAX_OUTPUT_RATIO: u32 = 16;

/// Configurable ceilings.
///
/// Loaded from JSON; missing keys take the defaults. A configured value can only
/// tighten a hard ceiling, never relax it: see [`Limits::effective`].
///
/// ```
/// use xll_protocol::Limits;
///
/// let limits = Limits::from_json(br#"{ "max_range_refs": 16 }"#).unwrap();
/// assert_eq!(limits.max_range_refs, 16);
/// assert_eq!(limits.max_vector_len, xll_protocol::MAX_VECTOR_LEN);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Longest vector the copy engine will walk, and the largest `rows * cols` the
    /// validator accepts.
    pub max_vector_len: u32,
    /// Most rects a `Range` may carry.
    pub max_range_refs: u32,
    /// Most payload bytes a single copy or materialization may produce.
    pub max_output_bytes: u64,
    /// Most payload bytes per byte of source buffer.
    pub max_output_ratio: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_vector_len: MAX_VECTOR_LEN,
            max_range_refs: MAX_RANGE_REFS,
            max_output_bytes: MAX_OUTPUT_BYTES,
            max_output_ratio: MAX_OUTPUT_RATIO,
        }
    }
}

/// Error type for loading limits.
#[derive(Debug, Error)]
pub enum LimitsError {
    /// Malformed JSON or unknown keys.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl Limits {
    /// Parse limits from a JSON object and clamp them to the hard ceilings.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LimitsError> {
        let limits: Self = serde_json::from_slice(bytes)?;
        Ok(limits.effective())
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String, LimitsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// These limits with every value clamped to its hard ceiling.
    pub fn effective(self) -> Self {
        Self {
            max_vector_len: self.max_vector_len.min(MAX_VECTOR_LEN),
            max_range_refs: self.max_range_refs.min(MAX_RANGE_REFS),
            max_output_bytes: self.max_output_bytes.min(MAX_OUTPUT_BYTES),
            max_output_ratio: self.max_output_ratio.min(MAX_OUTPUT_RATIO),
        }
    }

    /// Output allowance for one pass over a `source_len`-byte buffer: the smaller of
    /// `max_output_bytes` and `max_output_ratio * source_len`.
    pub fn output_budget(&self, source_len: usize) -> OutputBudget {
        let limits = self.effective();
        let relative = u64::try_from(source_len)
            .unwrap_or(u64::MAX)
            .saturating_mul(u64::from(limits.max_output_ratio));
        OutputBudget::new(relative.min(limits.max_output_bytes))
    }
}

/// Payload bytes a copy or materialization may still produce.
///
/// Vectors and strings are charged before they are written. A charge that does not
/// fit leaves the budget untouched and the caller drops the value instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBudget {
    remaining: u64,
}

impl OutputBudget {
    /// Budget of `bytes`.
    pub const fn new(bytes: u64) -> Self {
        Self { remaining: bytes }
    }

    /// Bytes left.
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Take `bytes` out of the budget; `false` when they do not fit.
    pub fn spend(&mut self, bytes: usize) -> bool {
        let Some(rest) = u64::try_from(bytes)
            .ok()
            .and_then(|bytes| self.remaining.checked_sub(bytes))
        else {
            return false;
        };
        self.remaining = rest;
        true
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_hard_ceilings() {
        let limits = Limits::default();
        assert_eq!(limits.max_vector_len, 2_147_483_647);
        assert_eq!(limits.max_range_refs, 65_535);
        assert_eq!(limits.max_output_bytes, 2_147_483_647);
        assert_eq!(limits.max_output_ratio, 16);
        assert_eq!(Limits::from_json(b"{}").expect("empty object"), limits);
    }

    #[test]
    fn config_cannot_relax_ceilings() {
        let limits = Limits::from_json(
            br#"{"max_vector_len": 4294967295, "max_range_refs": 100000, "max_output_ratio": 1000}"#,
        )
        .expect("parse");
        assert_eq!(limits, Limits::default());
    }

    #[test]
    fn config_can_tighten_ceilings() {
        let limits = Limits::from_json(br#"{"max_vector_len": 1024}"#).expect("parse");
        assert_eq!(limits.max_vector_len, 1024);
        assert_eq!(limits.max_range_refs, MAX_RANGE_REFS);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Limits::from_json(br#"{"max_refs": 1}"#).expect_err("unknown key");
        assert!(matches!(err, LimitsError::Serde(_)));
    }

    #[test]
    fn json_round_trips() {
        let limits = Limits {
            max_vector_len: 10,
            max_range_refs: 2,
            max_output_bytes: 4096,
            max_output_ratio: 3,
        };
        let json = limits.to_json().expect("serialize");
        assert_eq!(Limits::from_json(json.as_bytes()).expect("parse"), limits);
    }

    #[test]
    fn budget_is_the_tighter_of_absolute_and_relative() {
        assert_eq!(Limits::default().output_budget(100).remaining(), 1_600);
        let limits = Limits {
            max_output_bytes: 500,
            ..Limits::default()
        };
        assert_eq!(limits.output_budget(100).remaining(), 500);
        assert_eq!(
            Limits::default().output_budget(usize::MAX).remaining(),
            MAX_OUTPUT_BYTES
        );
    }

    #[test]
    fn overdraft_leaves_the_budget_untouched() {
        let mut budget = OutputBudget::new(10);
        assert!(budget.spend(6));
        assert!(!budget.spend(5));
        assert_eq!(budget.remaining(), 4);
        assert!(budget.spend(4));
        assert!(!budget.spend(1));
    }
}
