//! Command structs for engine operations.
//!
//! These types group parameters for write operations (post/amend/transfer),
//! keeping call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{AlertSettings, Category, Money, Recurrence, TransactionType};

/// Post a single income or expense.
#[derive(Clone, Debug)]
pub struct PostCmd {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    /// Positive magnitude.
    pub amount: Money,
    /// `None` lets the categorizer decide.
    pub category: Option<Category>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub tags: Vec<String>,
}

impl PostCmd {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        account_id: Uuid,
        transaction_type: TransactionType,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            account_id,
            transaction_type,
            amount,
            category: None,
            description: None,
            occurred_at,
            recurrence: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn income(user_id: Uuid, account_id: Uuid, amount: Money, occurred_at: DateTime<Utc>) -> Self {
        Self::new(user_id, account_id, TransactionType::Income, amount, occurred_at)
    }

    #[must_use]
    pub fn expense(user_id: Uuid, account_id: Uuid, amount: Money, occurred_at: DateTime<Utc>) -> Self {
        Self::new(user_id, account_id, TransactionType::Expense, amount, occurred_at)
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Fields to change on `amend`. `None` keeps the current value; the account
/// can not be changed.
#[derive(Clone, Debug, Default)]
pub struct TransactionPatch {
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<Money>,
    pub category: Option<Category>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub recurrence: Option<Option<Recurrence>>,
    pub tags: Option<Vec<String>>,
}

impl TransactionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transaction_type(mut self, kind: TransactionType) -> Self {
        self.transaction_type = Some(kind);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn recurrence(mut self, recurrence: Option<Recurrence>) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transaction_type.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.occurred_at.is_none()
            && self.recurrence.is_none()
            && self.tags.is_none()
    }
}

/// Move money between two accounts of the same user.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub user_id: Uuid,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            from_account_id,
            to_account_id,
            amount,
            occurred_at,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Fields of a budget that can change after creation. Category, period and
/// anchor are fixed; create a new budget to change them.
#[derive(Clone, Debug, Default)]
pub struct BudgetPatch {
    pub name: Option<String>,
    pub limit: Option<Money>,
    pub alerts: Option<AlertSettings>,
}

impl BudgetPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Money) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn alerts(mut self, alerts: AlertSettings) -> Self {
        self.alerts = Some(alerts);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.limit.is_none() && self.alerts.is_none()
    }
}
