//! Period windows.
//!
//! Window `k` of a budget is `[start_k, start_{k+1})` where `start_k` is the
//! anchor advanced by `k` periods. Every window is computed from the anchor,
//! never from the previous window, so a Jan 31 monthly budget yields
//! Jan 31, Feb 28 (29), Mar 31, Apr 30, ... without drifting.

use std::fmt;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
}

/// Half-open date range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for PeriodWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl BudgetPeriod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Start of window `k`. Month arithmetic clamps to the last valid day.
    pub fn nth_start(self, anchor: NaiveDate, k: u32) -> ResultEngine<NaiveDate> {
        let start = match self {
            Self::Weekly => anchor.checked_add_days(Days::new(u64::from(k) * 7)),
            Self::Monthly => anchor.checked_add_months(Months::new(k)),
            Self::Yearly => k
                .checked_mul(12)
                .and_then(|months| anchor.checked_add_months(Months::new(months))),
        };
        start.ok_or_else(|| EngineError::Validation(format!("date out of range: {anchor} + {k}")))
    }

    /// Window of the period containing `date` (`date >= anchor`).
    pub fn window_at(self, anchor: NaiveDate, date: NaiveDate) -> ResultEngine<PeriodWindow> {
        if date < anchor {
            return Err(EngineError::Validation(format!(
                "{date} is before the period anchor {anchor}"
            )));
        }
        let mut k = self.estimate_index(anchor, date);
        // The estimate can overshoot by one when the day-of-month clamps.
        while k > 0 && self.nth_start(anchor, k)? > date {
            k -= 1;
        }
        while self.nth_start(anchor, k + 1)? <= date {
            k += 1;
        }
        Ok(PeriodWindow {
            start: self.nth_start(anchor, k)?,
            end: self.nth_start(anchor, k + 1)?,
        })
    }

    fn estimate_index(self, anchor: NaiveDate, date: NaiveDate) -> u32 {
        use chrono::Datelike;

        let months = (date.year() - anchor.year()) * 12 + date.month() as i32
            - anchor.month() as i32;
        let estimate = match self {
            Self::Weekly => (date - anchor).num_days() / 7,
            Self::Monthly => i64::from(months),
            Self::Yearly => i64::from(months / 12),
        };
        u32::try_from(estimate.max(0)).unwrap_or(u32::MAX / 12)
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BudgetPeriod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::Validation(format!(
                "invalid budget period: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BudgetPeriod::try_from(s)
    }
}
