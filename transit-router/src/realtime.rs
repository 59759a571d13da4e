//! Realtime delay lookup boundary.
//!
//! Feed ingestion lives outside this crate; the engine only consults a
//! lookup capability while exploring scheduled edges. Absence of an
//! entry means "use the schedule as-is".

use std::collections::HashMap;

use chrono::Duration;

/// Lookup of realtime delays, keyed by trip and stop sequence number.
pub trait DelayLookup {
    /// The current delay of `trip_id` at the stop with `stop_sequence`,
    /// or `None` when no realtime data is known for that stop event.
    fn delay(&self, trip_id: &str, stop_sequence: u32) -> Option<Duration>;
}

/// A lookup that never reports a delay: the schedule is authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelays;

impl DelayLookup for NoDelays {
    fn delay(&self, _trip_id: &str, _stop_sequence: u32) -> Option<Duration> {
        None
    }
}

/// A fixed in-memory delay table.
///
/// Mainly useful for tests and for snapshots taken from a realtime
/// collaborator at query time.
#[derive(Debug, Clone, Default)]
pub struct StaticDelays {
    delays: HashMap<String, HashMap<u32, Duration>>,
}

impl StaticDelays {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `delay` for `trip_id` at `stop_sequence`, replacing any
    /// earlier entry for that stop event.
    pub fn insert(&mut self, trip_id: impl Into<String>, stop_sequence: u32, delay: Duration) {
        self.delays
            .entry(trip_id.into())
            .or_default()
            .insert(stop_sequence, delay);
    }

    /// Number of stop events with a recorded delay.
    pub fn len(&self) -> usize {
        self.delays.values().map(HashMap::len).sum()
    }

    /// Returns true if no delays are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DelayLookup for StaticDelays {
    fn delay(&self, trip_id: &str, stop_sequence: u32) -> Option<Duration> {
        self.delays.get(trip_id)?.get(&stop_sequence).copied()
    }
}
