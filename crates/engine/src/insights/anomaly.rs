//! Spending anomaly detection.
//!
//! The trailing window is cut into `periods` equal buckets of `period_days`
//! days; the last bucket is the current period, the others are history. For
//! every (category, currency) with expenses in the window:
//!
//! ```text
//! μ  = mean(history), σ = population stddev(history)
//! σ' = max(σ, μ · min_relative_deviation, 1 minor unit)
//! z  = (current − μ) / σ'
//! ```
//!
//! The category is flagged when `z > z_threshold`, with confidence
//! `z / (z + z_threshold)`. Sums use [`Money`]; only the statistics are
//! floating point.

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    Category, Currency, EngineError, Money, ResultEngine, TransactionType,
    budgets::{LedgerView, PeriodWindow},
};

use super::{Impact, InsightType, SpendingInsight};

/// A category needs spending in at least this many prior periods to be judged.
const MIN_ACTIVE_HISTORY: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalySettings {
    /// Total periods in the window, current one included.
    pub window_periods: u32,
    pub period_days: u32,
    pub z_threshold: f64,
    pub min_relative_deviation: f64,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            window_periods: 9,
            period_days: 7,
            z_threshold: 2.0,
            min_relative_deviation: 0.10,
        }
    }
}

impl AnomalySettings {
    pub fn validate(&self) -> ResultEngine<()> {
        if self.window_periods < 2 {
            return Err(EngineError::Validation(
                "anomaly window needs at least 2 periods".to_string(),
            ));
        }
        if self.period_days == 0 {
            return Err(EngineError::Validation(
                "anomaly period must be at least one day".to_string(),
            ));
        }
        if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
            return Err(EngineError::Validation(
                "z_threshold must be a positive number".to_string(),
            ));
        }
        if !(self.min_relative_deviation.is_finite() && self.min_relative_deviation >= 0.0) {
            return Err(EngineError::Validation(
                "min_relative_deviation must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// The trailing window of a scan: `periods` buckets ending (exclusive) at `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyWindow {
    pub end: NaiveDate,
    pub periods: u32,
    pub period_days: u32,
}

impl AnomalyWindow {
    /// Window whose current period ends with (and includes) `today`.
    pub fn ending_on(today: NaiveDate, settings: &AnomalySettings) -> ResultEngine<Self> {
        let end = today
            .succ_opt()
            .ok_or_else(|| EngineError::Validation(format!("date out of range: {today}")))?;
        Ok(Self {
            end,
            periods: settings.window_periods,
            period_days: settings.period_days,
        })
    }

    fn span(&self) -> ResultEngine<PeriodWindow> {
        let days = u64::from(self.periods) * u64::from(self.period_days);
        let start = self
            .end
            .checked_sub_days(Days::new(days))
            .ok_or_else(|| EngineError::Validation("anomaly window out of range".to_string()))?;
        Ok(PeriodWindow {
            start,
            end: self.end,
        })
    }

    fn bucket(&self, start: NaiveDate, date: NaiveDate) -> Option<usize> {
        let offset = (date - start).num_days();
        if offset < 0 {
            return None;
        }
        let index = usize::try_from(offset / i64::from(self.period_days)).ok()?;
        (index < self.periods as usize).then_some(index)
    }
}

/// Shared cancellation flag for long scans.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lazy, finite sequence of anomaly insights, one per flagged category.
///
/// The scan only reads the borrowed [`LedgerView`]; building a new scan over
/// the same view yields the same findings.
#[derive(Debug)]
pub struct AnomalyScan<'a> {
    ledger: &'a LedgerView,
    user_id: Uuid,
    window: AnomalyWindow,
    span: PeriodWindow,
    settings: AnomalySettings,
    now: DateTime<Utc>,
    keys: std::vec::IntoIter<(Category, Currency)>,
    cancel: Option<CancelFlag>,
    finished: bool,
}

impl<'a> AnomalyScan<'a> {
    pub fn new(
        user_id: Uuid,
        ledger: &'a LedgerView,
        window: AnomalyWindow,
        settings: AnomalySettings,
        now: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        settings.validate()?;
        let check = AnomalySettings {
            window_periods: window.periods,
            period_days: window.period_days,
            ..settings
        };
        check.validate()?;
        let span = window.span()?;
        let keys: BTreeSet<(Category, Currency)> = ledger
            .transactions()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.transaction_type == TransactionType::Expense
                    && span.contains(tx.occurred_at.date_naive())
            })
            .map(|tx| (tx.category, tx.currency))
            .collect();
        Ok(Self {
            ledger,
            user_id,
            window,
            span,
            settings,
            now,
            keys: keys.into_iter().collect::<Vec<_>>().into_iter(),
            cancel: None,
            finished: false,
        })
    }

    /// Stop with [`EngineError::Cancelled`] once `flag` is raised. The flag is
    /// checked before each category.
    #[must_use]
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn buckets(&self, category: Category, currency: Currency) -> ResultEngine<Vec<Money>> {
        let mut buckets = vec![Money::ZERO; self.window.periods as usize];
        for tx in self.ledger.expenses_in(category, currency, self.span) {
            if tx.user_id != self.user_id {
                continue;
            }
            if let Some(index) = self
                .window
                .bucket(self.span.start, tx.occurred_at.date_naive())
            {
                buckets[index] = buckets[index].checked_add(tx.amount)?;
            }
        }
        Ok(buckets)
    }

    fn judge(&self, category: Category, currency: Currency) -> ResultEngine<Option<SpendingInsight>> {
        let buckets = self.buckets(category, currency)?;
        let Some((current, history)) = buckets.split_last() else {
            return Ok(None);
        };
        if history.iter().filter(|m| !m.is_zero()).count() < MIN_ACTIVE_HISTORY {
            return Ok(None);
        }

        let stats = Stats::of(history);
        let sigma = stats
            .stddev
            .max(stats.mean * self.settings.min_relative_deviation)
            .max(1.0);
        let z = (current.minor() as f64 - stats.mean) / sigma;
        if z <= self.settings.z_threshold {
            return Ok(None);
        }

        let current_start = self
            .window
            .end
            .checked_sub_days(Days::new(u64::from(self.window.period_days)))
            .unwrap_or(self.span.start);
        let typical = Money::new(stats.mean.round() as i64)?;
        let confidence = (z / (z + self.settings.z_threshold)).clamp(0.0, 1.0);

        Ok(Some(SpendingInsight {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            insight_type: InsightType::Anomaly,
            title: format!("Unusual {category} spending"),
            description: format!(
                "{} spent on {category} since {current_start}, against a typical {} per period",
                current.format(currency),
                typical.format(currency),
            ),
            category: Some(category),
            impact: Impact::Negative,
            confidence,
            data: json!({
                "currency": currency.code(),
                "period_start": current_start.to_string(),
                "period_end": self.window.end.to_string(),
                "period_days": self.window.period_days,
                "current_minor": current.minor(),
                "history_minor": history.iter().map(|m| m.minor()).collect::<Vec<_>>(),
                "mean_minor": stats.mean,
                "stddev_minor": stats.stddev,
                "z_score": z,
            }),
            created_at: self.now,
        }))
    }
}

impl Iterator for AnomalyScan<'_> {
    type Item = ResultEngine<SpendingInsight>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                self.finished = true;
                return Some(Err(EngineError::Cancelled(
                    "anomaly scan cancelled".to_string(),
                )));
            }
            let Some((category, currency)) = self.keys.next() else {
                self.finished = true;
                break;
            };
            match self.judge(category, currency) {
                Ok(Some(insight)) => return Some(Ok(insight)),
                Ok(None) => {}
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

struct Stats {
    mean: f64,
    stddev: f64,
}

impl Stats {
    fn of(values: &[Money]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                stddev: 0.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().map(|m| m.minor() as f64).sum::<f64>() / n;
        let variance = values
            .iter()
            .map(|m| (m.minor() as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            mean,
            stddev: variance.sqrt(),
        }
    }
}
