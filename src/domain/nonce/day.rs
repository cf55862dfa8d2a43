//! Calendar-day keys used to bucket daily counts

use std::sync::Mutex;

use chrono::{Local, NaiveDate};

/// Source of the current day key (`YYYY-MM-DD`)
pub trait DayClock: Send + Sync + 'static {
    fn today(&self) -> String;
}

/// Day key from the local calendar date at call time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDayClock;

impl DayClock for LocalDayClock {
    fn today(&self) -> String {
        day_key(Local::now().date_naive())
    }
}

/// A clock pinned to a settable date
#[derive(Debug)]
pub struct FixedDayClock {
    date: Mutex<NaiveDate>,
}

impl FixedDayClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        if let Ok(mut guard) = self.date.lock() {
            *guard = date;
        }
    }
}

impl DayClock for FixedDayClock {
    fn today(&self) -> String {
        match self.date.lock() {
            Ok(guard) => day_key(*guard),
            Err(poisoned) => day_key(*poisoned.into_inner()),
        }
    }
}

/// Format a date as a zero-padded day key
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(day_key(date), "2024-03-07");
    }

    #[test]
    fn test_fixed_clock_moves() {
        let clock = FixedDayClock::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(clock.today(), "2024-12-31");
        clock.set(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(clock.today(), "2025-01-01");
    }

    #[test]
    fn test_local_clock_shape() {
        let today = LocalDayClock.today();
        assert_eq!(today.len(), 10);
        assert!(NaiveDate::parse_from_str(&today, "%Y-%m-%d").is_ok());
    }
}
