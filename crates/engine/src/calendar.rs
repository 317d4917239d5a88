//! Month identity and day arithmetic.
//!
//! The editable day range of a month is always computed from the calendar,
//! never inferred from which days happen to carry data.

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};

use crate::error::EngineError;

/// A (year, month) pair. `month` is 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// Create a month key, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::Validation(format!("month {month} is not in 1..=12")));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(EngineError::Validation(format!("year {year} is out of range")));
        }
        Ok(Self { year, month })
    }

    /// Number of days in this month.
    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    /// `1..=days()`.
    pub fn day_range(&self) -> RangeInclusive<u32> {
        1..=self.days()
    }

    #[inline]
    pub fn contains_day(&self, day: u32) -> bool {
        day >= 1 && day <= self.days()
    }

    /// The month after this one.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Days in `month` of `year`, from the distance between the first of this
/// month and the first of the next.
///
/// Returns 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
        Some(next) => next.signed_duration_since(first).num_days() as u32,
        // Last representable month: count forward instead.
        None => {
            let mut day = first;
            let mut count = 1;
            while let Some(d) = day.succ_opt() {
                if d.month() != month {
                    break;
                }
                day = d;
                count += 1;
            }
            count
        }
    }
}
