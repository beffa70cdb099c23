//! Direction abstraction of the search.
//!
//! A forward search minimizes arrival times; a backward search maximizes
//! departure times. Every "earlier/later" and "before/after on the route"
//! decision goes through this comparator, so both directions run the exact
//! same algorithm.

use chrono::{NaiveDateTime, TimeDelta};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeComparator {
    forward: bool,
}

impl TimeComparator {
    pub fn new(forward: bool) -> Self {
        TimeComparator { forward }
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Whether `a` is a better reach time than `b`.
    pub fn improves(&self, a: NaiveDateTime, b: NaiveDateTime) -> bool {
        if self.forward { a < b } else { a > b }
    }

    pub fn improves_or_equals(&self, a: NaiveDateTime, b: NaiveDateTime) -> bool {
        a == b || self.improves(a, b)
    }

    /// The reach time every point starts with.
    pub fn worst(&self) -> NaiveDateTime {
        if self.forward {
            NaiveDateTime::MAX
        } else {
            NaiveDateTime::MIN
        }
    }

    /// Moves `time` by `seconds` away from the search origin: later in a
    /// forward search, earlier in a backward one.
    pub fn offset(&self, time: NaiveDateTime, seconds: i64) -> NaiveDateTime {
        let delta = TimeDelta::seconds(if self.forward { seconds } else { -seconds });
        time + delta
    }

    /// Whether pattern index `a` comes before `b` in scan order.
    pub fn index_improves(&self, a: usize, b: usize) -> bool {
        if self.forward { a < b } else { a > b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn backward_comparator_mirrors_forward() {
        let fwd = TimeComparator::new(true);
        let bwd = TimeComparator::new(false);
        assert!(fwd.improves(at(8), at(9)));
        assert!(bwd.improves(at(9), at(8)));
        assert_eq!(fwd.offset(at(8), 600), at(8) + TimeDelta::seconds(600));
        assert_eq!(bwd.offset(at(8), 600), at(8) - TimeDelta::seconds(600));
        assert!(fwd.index_improves(1, 3));
        assert!(bwd.index_improves(3, 1));
    }
}
