//! Live delay overlay applied on top of static scheduled times.
//!
//! The overlay is fed by an external realtime client on its own cadence and
//! read by concurrent queries. Refreshes swap an immutable snapshot
//! wholesale; a query clones the `Arc` once and sees a consistent table for
//! its whole lifetime, never blocking on the writer.

use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use hashbrown::HashMap;
use log::debug;

/// Delays below this threshold are corrupt feed artifacts and are ignored.
const CORRUPT_DELAY_FLOOR: i32 = -600;

/// Per-stop (arrival, departure) delays of one trip on one date, ordered by
/// stop index.
#[derive(Debug, Clone, Default)]
pub struct TripStopDelays {
    entries: Vec<(i32, i32)>,
}

impl TripStopDelays {
    pub fn push(&mut self, arrival_delay: i32, departure_delay: i32) {
        self.entries.push((arrival_delay, departure_delay));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delay pair at `stop_index`. Feeds commonly omit trailing stops, so an
    /// index past the recorded count returns the last known pair. Corrupt
    /// values are reported as absent.
    pub fn stop_delay(&self, stop_index: usize) -> Option<(i32, i32)> {
        let &(arrival, departure) = self.entries.get(stop_index).or_else(|| self.entries.last())?;
        if arrival < CORRUPT_DELAY_FLOOR || departure < CORRUPT_DELAY_FLOOR {
            return None;
        }
        Some((arrival, departure))
    }
}

/// One immutable snapshot of all known delays, keyed by trip start date and
/// trip id.
#[derive(Debug, Clone, Default)]
pub struct DelayTable {
    delays: HashMap<NaiveDate, HashMap<String, TripStopDelays>>,
}

impl DelayTable {
    /// Appends the delay pair of the next stop of `trip_id` on `trip_date`.
    pub fn add_delay(
        &mut self,
        trip_date: NaiveDate,
        trip_id: &str,
        arrival_delay: i32,
        departure_delay: i32,
    ) {
        self.delays
            .entry(trip_date)
            .or_default()
            .entry_ref(trip_id)
            .or_default()
            .push(arrival_delay, departure_delay);
    }

    pub fn trip_delays(&self, trip_date: NaiveDate, trip_id: &str) -> Option<&TripStopDelays> {
        self.delays.get(&trip_date)?.get(trip_id)
    }

    /// Delay pair of `trip_id` on `trip_date` at `stop_index`. Absence means
    /// "assume on schedule", not "assume cancelled".
    pub fn stop_delay(
        &self,
        trip_date: NaiveDate,
        trip_id: &str,
        stop_index: usize,
    ) -> Option<(i32, i32)> {
        self.trip_delays(trip_date, trip_id)?.stop_delay(stop_index)
    }
}

/// Shared handle on the current delay snapshot.
#[derive(Debug, Default)]
pub struct DelayOverlay {
    current: RwLock<Arc<DelayTable>>,
}

impl DelayOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot to use for one whole query.
    pub fn snapshot(&self) -> Arc<DelayTable> {
        self.current.read().expect("delay overlay poisoned").clone()
    }

    /// Swaps in a freshly built table. Called by the realtime feed client.
    pub fn replace(&self, table: DelayTable) {
        let trips: usize = table.delays.values().map(HashMap::len).sum();
        debug!("delay overlay refreshed with {trips} delayed trips");
        *self.current.write().expect("delay overlay poisoned") = Arc::new(table);
    }
}
