use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::stats::DailyGroups;

/// One month of the trading calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarMonth {
    first_day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub trade_count: usize,
    pub total_pnl: f64,
}

impl CalendarDay {
    pub fn has_trades(&self) -> bool {
        self.trade_count > 0
    }
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| {
                LedgerError::validation("month", format!("{}-{:02} is not a valid month", year, month))
            })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn previous(&self) -> Option<Self> {
        self.first_day
            .checked_sub_months(Months::new(1))
            .map(|first_day| Self { first_day })
    }

    pub fn next(&self) -> Option<Self> {
        self.first_day
            .checked_add_months(Months::new(1))
            .map(|first_day| Self { first_day })
    }

    /// Blank cells before the 1st in a Sunday-first week grid.
    pub fn first_weekday_offset(&self) -> u32 {
        self.first_day.weekday().num_days_from_sunday()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let month = self.month();
        self.first_day.iter_days().take_while(move |d| d.month() == month)
    }

    pub fn days_in_month(&self) -> usize {
        self.dates().count()
    }

    /// One entry per day of the month, filled from the daily groups.
    pub fn days(&self, groups: &DailyGroups) -> Vec<CalendarDay> {
        self.dates()
            .map(|date| match groups.get(&date) {
                Some(group) => CalendarDay {
                    date,
                    trade_count: group.trade_count(),
                    total_pnl: group.total_pnl,
                },
                None => CalendarDay {
                    date,
                    trade_count: 0,
                    total_pnl: 0.0,
                },
            })
            .collect()
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year(), self.month())
    }
}

impl FromStr for CalendarMonth {
    type Err = LedgerError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::validation("month", format!("'{}' is not a YYYY-MM month", s));

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}
