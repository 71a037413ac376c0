// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Real-time-data envelopes: topic subscription and pushed updates.

use xll_flat::{Builder, Offset, Vector};

use crate::Any;

const TOPIC_ID: u16 = 0;
const STRINGS: u16 = 1;
const NEW_VALUES: u16 = 2;

const UPDATE_VAL: u16 = 1;

const UPDATES: u16 = 0;

table_view! {
    /// Subscription request for one RTD topic.
    RtdConnectRequest
}

impl<'a> RtdConnectRequest<'a> {
    /// Topic id assigned by the spreadsheet.
    pub fn topic_id(&self) -> i32 {
        self.0.get(TOPIC_ID, 0)
    }

    /// Topic parameters as a `[string]` vector.
    pub fn strings(&self) -> Option<Vector<'a>> {
        self.0.get_vector(STRINGS)
    }

    /// Parameter `index` as raw bytes.
    pub fn string(&self, index: usize) -> Option<&'a [u8]> {
        self.strings()?.bytes(index)
    }

    /// Whether the caller wants fresh values rather than cached ones.
    pub fn new_values(&self) -> bool {
        self.0.get(NEW_VALUES, false)
    }
}

impl RtdConnectRequest<'_> {
    /// Write an `RtdConnectRequest` table.
    pub fn create(
        b: &mut Builder,
        topic_id: i32,
        strings: Option<Offset>,
        new_values: bool,
    ) -> Offset {
        b.start_table();
        b.add_field(TOPIC_ID, topic_id);
        if let Some(strings) = strings {
            b.add_offset_field(STRINGS, strings);
        }
        b.add_field(NEW_VALUES, new_values);
        b.end_table()
    }
}

table_view! {
    /// New value for one RTD topic.
    RtdUpdate
}

impl<'a> RtdUpdate<'a> {
    /// Topic the value belongs to.
    pub fn topic_id(&self) -> i32 {
        self.0.get(TOPIC_ID, 0)
    }

    /// Pushed value.
    pub fn val(&self) -> Option<Any<'a>> {
        self.0.get_as(UPDATE_VAL)
    }
}

impl RtdUpdate<'_> {
    /// Write an `RtdUpdate` table.
    pub fn create(b: &mut Builder, topic_id: i32, val: Option<Offset>) -> Offset {
        b.start_table();
        b.add_field(TOPIC_ID, topic_id);
        if let Some(val) = val {
            b.add_offset_field(UPDATE_VAL, val);
        }
        b.end_table()
    }
}

table_view! {
    /// Several [`RtdUpdate`]s delivered together, in order.
    BatchRtdUpdate
}

impl<'a> BatchRtdUpdate<'a> {
    /// Update vector. Its length is the claimed length.
    pub fn updates(&self) -> Option<Vector<'a>> {
        self.0.get_vector(UPDATES)
    }

    /// Update `index`.
    pub fn update(&self, index: usize) -> Option<RtdUpdate<'a>> {
        self.updates()?.get_as(index)
    }
}

impl BatchRtdUpdate<'_> {
    /// Write a `BatchRtdUpdate` table around a vector of `RtdUpdate` offsets.
    pub fn create(b: &mut Builder, updates: Option<Offset>) -> Offset {
        b.start_table();
        if let Some(updates) = updates {
            b.add_offset_field(UPDATES, updates);
        }
        b.end_table()
    }
}
