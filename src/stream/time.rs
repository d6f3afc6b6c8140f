//! Time ids for event ordering and duplicate detection.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Per-source counter handing out strictly increasing time ids.
#[derive(Debug)]
pub struct SourceTime {
    current: Cell<i64>,
}

impl SourceTime {
    pub fn new() -> Self {
        Self {
            current: Cell::new(0),
        }
    }

    /// Next time id. The first call returns 1.
    pub fn new_event(&self) -> i64 {
        let next = self.current.get() + 1;
        self.current.set(next);
        next
    }

    /// Last id handed out, 0 if none yet.
    pub fn current(&self) -> i64 {
        self.current.get()
    }
}

impl Default for SourceTime {
    fn default() -> Self {
        Self::new()
    }
}

/// Watermark of the last time id seen from each source.
///
/// Used by sinks that are also sources to recognise echoes of events they
/// already handled.
#[derive(Debug, Default)]
pub struct SinkTime {
    last: RefCell<HashMap<String, i64>>,
}

impl SinkTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `time_id` is newer than anything seen from `source_id`.
    /// A new event is recorded as the watermark.
    pub fn is_new_event(&self, source_id: &str, time_id: i64) -> bool {
        let mut last = self.last.borrow_mut();
        match last.get_mut(source_id) {
            Some(seen) if time_id <= *seen => false,
            Some(seen) => {
                *seen = time_id;
                true
            }
            None => {
                last.insert(source_id.to_string(), time_id);
                true
            }
        }
    }

    /// Raise the watermark for `source_id` without checking.
    pub fn record(&self, source_id: &str, time_id: i64) {
        let mut last = self.last.borrow_mut();
        let seen = last.entry(source_id.to_string()).or_insert(time_id);
        if time_id > *seen {
            *seen = time_id;
        }
    }

    pub fn last_seen(&self, source_id: &str) -> Option<i64> {
        self.last.borrow().get(source_id).copied()
    }
}
