use std::collections::VecDeque;

use crate::reading::Reading;

/// Most recent polled readings, oldest first, plus the last poll failure.
#[derive(Debug)]
pub struct History {
    readings: VecDeque<Reading>,
    capacity: usize,
    last_error: Option<String>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            last_error: None,
        }
    }

    pub fn record(&mut self, reading: Reading) {
        if self.capacity == 0 {
            return;
        }
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        self.last_error = None;
    }

    pub fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::compensation::CompensatedReading;

    fn reading(second: u32, temperature: f64) -> Reading {
        Reading::new(
            Local.ymd(2024, 7, 1).and_hms(12, 0, second),
            CompensatedReading {
                temperature,
                pressure: Some(1013.25),
                humidity: Some(50.0),
            },
        )
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.record(reading(i, 20.0 + f64::from(i)));
        }

        let temperatures: Vec<f64> = history.snapshot().iter().map(|r| r.temperature).collect();
        assert_eq!(temperatures, vec![22.0, 23.0, 24.0]);
        assert_eq!(history.latest().map(|r| r.temperature), Some(24.0));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn success_clears_last_error() {
        let mut history = History::new(2);
        history.record_error("bus error".to_string());
        assert_eq!(history.last_error(), Some("bus error"));
        assert!(history.latest().is_none());

        history.record(reading(0, 21.0));
        assert_eq!(history.last_error(), None);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = History::new(0);
        history.record(reading(0, 21.0));

        assert!(history.snapshot().is_empty());
    }
}
