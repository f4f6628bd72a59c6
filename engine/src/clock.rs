//! Calendar clock collaborator
//!
//! "Today" is always taken from an injected clock so streak calculations
//! and toggles are deterministic under test.

use std::sync::Mutex;

use chrono::{Local, NaiveDate};

/// Supplies the current calendar day in the user's local calendar.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Fixed, settable clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    day: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        *self.day.lock().unwrap() = day;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.day.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_is_settable() {
        let start = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.today(), start);

        let next = start.succ_opt().unwrap();
        clock.set(next);
        assert_eq!(clock.today(), next);
    }
}
