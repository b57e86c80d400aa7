//! Business-period helpers
//!
//! Sync jobs walk one business day at a time; these helpers provide
//! inclusive day ranges and the ISO week number report tables group by.

use chrono::{Datelike, Days, NaiveDate};

use crate::error::{BopsError, Result};

/// Inclusive range of business days, iterated oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl PeriodRange {
    /// Create a range; `start` must not be after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(BopsError::InvalidPeriod(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range (inclusive)
    pub fn len(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl IntoIterator for PeriodRange {
    type Item = NaiveDate;
    type IntoIter = PeriodIter;

    fn into_iter(self) -> PeriodIter {
        PeriodIter {
            next: Some(self.start),
            end: self.end,
        }
    }
}

/// Iterator over the days of a [`PeriodRange`]
#[derive(Debug, Clone)]
pub struct PeriodIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for PeriodIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = if current < self.end {
            current.checked_add_days(Days::new(1))
        } else {
            None
        };
        Some(current)
    }
}

/// ISO week number of a business date (1..=53)
pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}
