//! Per-query user settings and the cost model derived from them.
//!
//! All multipliers and minimums are table-driven constants keyed by the
//! preference enums; downstream components must use these tables rather
//! than recomputing, so that identical settings always price identical
//! journeys.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How aggressive transfers may be. Drives both the moving-transfer
/// multiplier and the minimum same-stop interchange time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransferBuffer {
    UltraShort,
    Short,
    #[default]
    Normal,
    Long,
}

/// Trade-off between journey time and transfer count, expressed as a
/// per-transfer penalty applied during result comparison only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum ComfortBalance {
    ShortestTimeAbsolute,
    ShortestTime,
    #[default]
    Balanced,
    LeastTransfers,
}

/// How much walking the user tolerates; caps the length of moving transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WalkingPreference {
    High,
    #[default]
    Normal,
    Low,
}

/// Safety buffer applied to computed cycling times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BikeTripBuffer {
    None,
    Short,
    #[default]
    Medium,
    Long,
}

/// Immutable per-query search settings. Validated once before the search
/// begins; invalid values abort the query, they are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Walking pace in minutes per kilometer.
    pub walking_pace: u32,
    /// Cycling pace in minutes per kilometer.
    pub cycling_pace: u32,
    /// Time to unlock a shared bike, in seconds.
    pub bike_unlock_time: u32,
    /// Time to lock a shared bike, in seconds.
    pub bike_lock_time: u32,
    /// Whether shared bikes may be used at all.
    pub use_shared_bikes: bool,
    /// Whether a single bike leg is capped at 15 minutes of riding.
    pub bike_max_15_minutes: bool,
    pub transfer_buffer: TransferBuffer,
    pub comfort_balance: ComfortBalance,
    pub walking_preference: WalkingPreference,
    pub bike_trip_buffer: BikeTripBuffer,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            walking_pace: 12,
            cycling_pace: 5,
            bike_unlock_time: 30,
            bike_lock_time: 15,
            use_shared_bikes: false,
            bike_max_15_minutes: true,
            transfer_buffer: TransferBuffer::default(),
            comfort_balance: ComfortBalance::default(),
            walking_preference: WalkingPreference::default(),
            bike_trip_buffer: BikeTripBuffer::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if !(2..=30).contains(&self.walking_pace) {
            return Err(Error::Configuration(format!(
                "walking pace {} min/km is outside 2..=30",
                self.walking_pace
            )));
        }
        if !(1..=20).contains(&self.cycling_pace) {
            return Err(Error::Configuration(format!(
                "cycling pace {} min/km is outside 1..=20",
                self.cycling_pace
            )));
        }
        if self.bike_unlock_time > 600 || self.bike_lock_time > 600 {
            return Err(Error::Configuration(
                "bike lock/unlock time exceeds 600 s".to_string(),
            ));
        }
        Ok(())
    }

    /// Multiplier applied to computed moving-transfer times.
    pub fn moving_transfer_multiplier(&self) -> f64 {
        match self.transfer_buffer {
            TransferBuffer::UltraShort | TransferBuffer::Short => 1.0,
            TransferBuffer::Normal => 1.25,
            TransferBuffer::Long => 1.5,
        }
    }

    /// Minimum time between arrival and departure at the exact same stop.
    /// Long intentionally equals Normal; the table is the contract.
    pub fn stationary_transfer_minimum(&self) -> u32 {
        match self.transfer_buffer {
            TransferBuffer::UltraShort => 0,
            TransferBuffer::Short => 30,
            TransferBuffer::Normal | TransferBuffer::Long => 60,
        }
    }

    /// Seconds added per transfer when comparing finished journeys. Never
    /// applied during reachability.
    pub fn transfer_penalty(&self) -> u32 {
        match self.comfort_balance {
            ComfortBalance::ShortestTimeAbsolute => 0,
            ComfortBalance::ShortestTime => 2 * 60,
            ComfortBalance::Balanced => 4 * 60,
            ComfortBalance::LeastTransfers => 10 * 60,
        }
    }

    /// Maximum length of a moving transfer in meters. Does NOT apply to
    /// transfers within a node (stops sharing a name), which are always
    /// permitted.
    pub fn max_transfer_distance(&self) -> u32 {
        match self.walking_preference {
            WalkingPreference::High => 750,
            WalkingPreference::Normal => 400,
            WalkingPreference::Low => 250,
        }
    }

    /// Plain walking time over `distance` meters, without any buffer.
    pub fn walking_transfer_time(&self, distance: u32) -> u32 {
        (f64::from(distance) / 1000.0 * f64::from(self.walking_pace) * 60.0) as u32
    }

    /// Walking time over `distance` meters with the transfer buffer applied.
    pub fn adjusted_walking_transfer_time(&self, distance: u32) -> u32 {
        (f64::from(self.walking_transfer_time(distance)) * self.moving_transfer_multiplier()) as u32
    }

    /// Plain riding time over `distance` meters, without any buffer.
    pub fn cycling_time(&self, distance: u32) -> u32 {
        (f64::from(distance) / 1000.0 * f64::from(self.cycling_pace) * 60.0) as u32
    }

    /// Riding time over `distance` meters with the bike-trip buffer applied.
    pub fn buffered_cycling_time(&self, distance: u32) -> u32 {
        let multiplier = match self.bike_trip_buffer {
            BikeTripBuffer::None => 1.0,
            BikeTripBuffer::Short => 1.1,
            BikeTripBuffer::Medium => 1.25,
            BikeTripBuffer::Long => 1.5,
        };
        (f64::from(self.cycling_time(distance)) * multiplier) as u32
    }

    /// Billed time of a whole bike leg: buffered ride plus locking.
    pub fn bike_trip_time(&self, distance: u32) -> u32 {
        self.buffered_cycling_time(distance) + self.bike_lock_time
    }

    /// Full time of a whole bike leg including unlocking at the start.
    pub fn full_bike_trip_time(&self, distance: u32) -> u32 {
        self.bike_trip_time(distance) + self.bike_unlock_time
    }

    /// Seconds a transfer of `distance` meters takes under these settings.
    /// Zero distance means a stationary same-stop interchange; transfers
    /// onto a bike station skip the stationary minimum since the bike waits.
    pub fn transfer_duration(&self, distance: u32, to_bike_station: bool) -> u32 {
        let stationary = self.stationary_transfer_minimum();
        if distance == 0 {
            stationary
        } else if to_bike_station {
            self.adjusted_walking_transfer_time(distance)
        } else {
            self.adjusted_walking_transfer_time(distance).max(stationary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_tables_match_contract() {
        let mut s = Settings::default();
        let expected = [
            (TransferBuffer::UltraShort, 1.0, 0),
            (TransferBuffer::Short, 1.0, 30),
            (TransferBuffer::Normal, 1.25, 60),
            (TransferBuffer::Long, 1.5, 60),
        ];
        for (buffer, multiplier, minimum) in expected {
            s.transfer_buffer = buffer;
            assert_eq!(s.moving_transfer_multiplier(), multiplier);
            assert_eq!(s.stationary_transfer_minimum(), minimum);
        }
    }

    #[test]
    fn penalty_and_distance_tables_match_contract() {
        let mut s = Settings::default();
        for (balance, penalty) in [
            (ComfortBalance::ShortestTimeAbsolute, 0),
            (ComfortBalance::ShortestTime, 120),
            (ComfortBalance::Balanced, 240),
            (ComfortBalance::LeastTransfers, 600),
        ] {
            s.comfort_balance = balance;
            assert_eq!(s.transfer_penalty(), penalty);
        }
        for (preference, distance) in [
            (WalkingPreference::High, 750),
            (WalkingPreference::Normal, 400),
            (WalkingPreference::Low, 250),
        ] {
            s.walking_preference = preference;
            assert_eq!(s.max_transfer_distance(), distance);
        }
    }

    #[test]
    fn walking_time_uses_pace_and_buffer() {
        let s = Settings::default();
        // 500 m at 12 min/km is 360 s, Normal buffer adds 25 %
        assert_eq!(s.walking_transfer_time(500), 360);
        assert_eq!(s.adjusted_walking_transfer_time(500), 450);
    }

    #[test]
    fn bike_times_include_lock_and_unlock() {
        let s = Settings::default();
        // 2 km at 5 min/km is 600 s, Medium buffer makes it 750 s
        assert_eq!(s.buffered_cycling_time(2000), 750);
        assert_eq!(s.bike_trip_time(2000), 765);
        assert_eq!(s.full_bike_trip_time(2000), 795);
    }

    #[test]
    fn stationary_minimum_floors_short_walks_between_distinct_stops() {
        let s = Settings::default();
        assert_eq!(s.transfer_duration(0, false), 60);
        assert_eq!(s.transfer_duration(50, false), 60);
        assert_eq!(s.transfer_duration(50, true), 45);
        assert_eq!(s.transfer_duration(500, false), 450);
    }

    #[test]
    fn out_of_range_paces_are_configuration_errors() {
        let mut s = Settings {
            walking_pace: 1,
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(Error::Configuration(_))));
        s.walking_pace = 12;
        s.cycling_pace = 50;
        assert!(matches!(s.validate(), Err(Error::Configuration(_))));
        s.cycling_pace = 5;
        assert!(s.validate().is_ok());
    }
}
