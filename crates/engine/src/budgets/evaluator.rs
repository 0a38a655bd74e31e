//! Budget evaluation.
//!
//! [`evaluate`] is a pure function of a budget, a ledger snapshot and the
//! current time. It sums the matching expenses of the current window, places
//! the result in a [`BudgetState`] band and emits one [`BudgetAlert`] per band
//! newly entered since the last evaluation of the same window.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Category, Currency, Money, ResultEngine, Transaction, TransactionType};

use super::{AlertState, Budget, BudgetState, PeriodWindow};

/// Point-in-time read view over a user's ledger.
///
/// Voided transactions are dropped on construction; nothing downstream has
/// to remember to filter them.
#[derive(Clone, Debug, Default)]
pub struct LedgerView {
    transactions: Vec<Transaction>,
}

impl LedgerView {
    #[must_use]
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: transactions
                .into_iter()
                .filter(|tx| tx.deleted_at.is_none())
                .collect(),
        }
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Expenses in `category` and `currency` whose date lies in `window`.
    pub fn expenses_in(
        &self,
        category: Category,
        currency: Currency,
        window: PeriodWindow,
    ) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |tx| {
            tx.transaction_type == TransactionType::Expense
                && tx.category == category
                && tx.currency == currency
                && window.contains(tx.occurred_at.date_naive())
        })
    }

    pub fn spent(
        &self,
        category: Category,
        currency: Currency,
        window: PeriodWindow,
    ) -> ResultEngine<Money> {
        Money::sum(
            self.expenses_in(category, currency, window)
                .map(|tx| tx.amount),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetAlert {
    pub budget_id: Uuid,
    pub user_id: Uuid,
    pub category: Category,
    /// Band that was entered.
    pub kind: BudgetState,
    pub window: PeriodWindow,
    pub spent: Money,
    pub limit: Money,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetStatus {
    pub budget_id: Uuid,
    pub window: PeriodWindow,
    pub limit: Money,
    pub spent: Money,
    /// `limit - spent`, negative once exceeded.
    pub remaining: Money,
    pub ratio_bps: i64,
    pub state: BudgetState,
    /// Alerts emitted by this evaluation.
    pub alerts: Vec<BudgetAlert>,
}

/// Status plus the alert state to persist for the next evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetEvaluation {
    pub status: BudgetStatus,
    pub alert_state: AlertState,
}

impl BudgetEvaluation {
    /// `true` when the stored alert state must be written back.
    #[must_use]
    pub fn changes(&self, budget: &Budget) -> bool {
        budget.alert_state != Some(self.alert_state)
    }
}

/// Band of `spent` against `limit`. `Exceeded` means strictly over the limit.
pub fn band(spent: Money, limit: Money) -> ResultEngine<BudgetState> {
    if spent > limit {
        return Ok(BudgetState::Exceeded);
    }
    for state in [
        BudgetState::Threshold90,
        BudgetState::Threshold75,
        BudgetState::Threshold50,
    ] {
        if let Some(percent) = state.percent()
            && spent >= limit.mul_ratio(percent, 100)?
        {
            return Ok(state);
        }
    }
    Ok(BudgetState::Active)
}

pub fn evaluate(
    budget: &Budget,
    ledger: &LedgerView,
    now: DateTime<Utc>,
) -> ResultEngine<BudgetEvaluation> {
    let today: NaiveDate = now.date_naive();
    let window = budget.window_at(today)?;
    let spent = ledger.spent(budget.category, budget.currency, window)?;
    let state = band(spent, budget.limit)?;

    // A new window starts with nothing alerted.
    let already = match budget.alert_state {
        Some(s) if s.window_start == window.start => s.highest,
        _ => BudgetState::Active,
    };

    let alerts: Vec<BudgetAlert> = BudgetState::ALL
        .into_iter()
        .filter(|s| *s > already && *s <= state && budget.alerts.fires(*s))
        .map(|kind| BudgetAlert {
            budget_id: budget.id,
            user_id: budget.user_id,
            category: budget.category,
            kind,
            window,
            spent,
            limit: budget.limit,
            at: now,
        })
        .collect();

    Ok(BudgetEvaluation {
        status: BudgetStatus {
            budget_id: budget.id,
            window,
            limit: budget.limit,
            spent,
            remaining: budget.limit.checked_sub(spent)?,
            ratio_bps: spent.ratio_bps(budget.limit).unwrap_or(0),
            state,
            alerts,
        },
        alert_state: AlertState {
            window_start: window.start,
            highest: already.max(state),
        },
    })
}
