//! Budgets: a period-scoped spending ceiling for one expense category.
//!
//! A budget stores configuration plus the alert state of its current window.
//! Spent amounts are never stored; see [`evaluator`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    BudgetPatch, Category, Currency, EngineError, Money, ResultEngine,
    util::{ensure_positive, model_currency, model_money, normalize_required_name, parse_uuid},
};

pub mod evaluator;
pub mod period;

pub use evaluator::{BudgetAlert, BudgetEvaluation, BudgetStatus, LedgerView, evaluate};
pub use period::{BudgetPeriod, PeriodWindow};

/// Where spending stands relative to the limit, ordered from lowest to highest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    #[default]
    Active,
    Threshold50,
    Threshold75,
    Threshold90,
    Exceeded,
}

impl BudgetState {
    pub const ALL: [BudgetState; 5] = [
        BudgetState::Active,
        BudgetState::Threshold50,
        BudgetState::Threshold75,
        BudgetState::Threshold90,
        BudgetState::Exceeded,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Threshold50 => "threshold_50",
            Self::Threshold75 => "threshold_75",
            Self::Threshold90 => "threshold_90",
            Self::Exceeded => "exceeded",
        }
    }

    /// Percentage of the limit at which the band starts, for threshold bands.
    #[must_use]
    pub const fn percent(self) -> Option<i64> {
        match self {
            Self::Threshold50 => Some(50),
            Self::Threshold75 => Some(75),
            Self::Threshold90 => Some(90),
            Self::Active | Self::Exceeded => None,
        }
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for BudgetState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        BudgetState::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| EngineError::Storage(format!("invalid budget state: {value}")))
    }
}

/// Which threshold crossings produce an alert. `Exceeded` always does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub at_50: bool,
    pub at_75: bool,
    pub at_90: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            at_50: true,
            at_75: true,
            at_90: true,
        }
    }
}

impl AlertSettings {
    #[must_use]
    pub const fn fires(&self, state: BudgetState) -> bool {
        match state {
            BudgetState::Active => false,
            BudgetState::Threshold50 => self.at_50,
            BudgetState::Threshold75 => self.at_75,
            BudgetState::Threshold90 => self.at_90,
            BudgetState::Exceeded => true,
        }
    }
}

/// Highest band already alerted inside the window starting at `window_start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub window_start: NaiveDate,
    pub highest: BudgetState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: Category,
    pub limit: Money,
    pub currency: Currency,
    pub period: BudgetPeriod,
    /// Anchor of every window.
    pub start_date: NaiveDate,
    /// Exclusive end of the last window, if the budget is bounded.
    pub end_date: Option<NaiveDate>,
    pub alerts: AlertSettings,
    pub active: bool,
    pub alert_state: Option<AlertState>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Budget {
    #[must_use]
    pub fn is_evaluable(&self) -> bool {
        self.active && self.deleted_at.is_none()
    }

    /// Applies `patch` in place. Nothing changes when validation fails.
    pub fn apply(&mut self, patch: BudgetPatch) -> ResultEngine<()> {
        if patch.is_empty() {
            return Err(EngineError::Validation("empty budget patch".to_string()));
        }
        let name = patch
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "budget name"))
            .transpose()?;
        if let Some(limit) = patch.limit {
            ensure_positive(limit, "budget limit")?;
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
        if let Some(alerts) = patch.alerts {
            self.alerts = alerts;
        }
        Ok(())
    }

    /// Window the budget is evaluated against on `date`.
    ///
    /// Dates before the anchor map to the first window, dates at or after an
    /// explicit end map to the last one.
    pub fn window_at(&self, date: NaiveDate) -> ResultEngine<PeriodWindow> {
        let mut date = date.max(self.start_date);
        if let Some(end) = self.end_date
            && date >= end
        {
            date = end.pred_opt().unwrap_or(end);
        }
        let window = self.period.window_at(self.start_date, date)?;
        Ok(match self.end_date {
            Some(end) if window.end > end => PeriodWindow {
                start: window.start,
                end,
            },
            _ => window,
        })
    }
}

/// Parameters of `Engine::create_budget`.
#[derive(Clone, Debug)]
pub struct NewBudget {
    pub user_id: Uuid,
    pub name: String,
    pub category: Category,
    pub limit: Money,
    pub currency: Currency,
    pub period: BudgetPeriod,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub alerts: AlertSettings,
}

impl NewBudget {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        category: Category,
        limit: Money,
        period: BudgetPeriod,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            name: name.into(),
            category,
            limit,
            currency: Currency::default(),
            period,
            start_date,
            end_date: None,
            alerts: AlertSettings::default(),
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub fn end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn alerts(mut self, alerts: AlertSettings) -> Self {
        self.alerts = alerts;
        self
    }

    pub(crate) fn into_budget(self, created_at: DateTime<Utc>) -> ResultEngine<Budget> {
        if !self.category.is_expense() {
            return Err(EngineError::InvalidCategory(format!(
                "budgets track expense categories, got {}",
                self.category
            )));
        }
        ensure_positive(self.limit, "budget limit")?;
        if let Some(end) = self.end_date
            && end <= self.start_date
        {
            return Err(EngineError::Validation(
                "budget end date must be after its start date".to_string(),
            ));
        }
        Ok(Budget {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            name: normalize_required_name(&self.name, "budget name")?,
            category: self.category,
            limit: self.limit,
            currency: self.currency,
            period: self.period,
            start_date: self.start_date,
            end_date: self.end_date,
            alerts: self.alerts,
            active: true,
            alert_state: None,
            created_at,
            deleted_at: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub limit_minor: i64,
    pub currency: String,
    pub period: String,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub alert_50: bool,
    pub alert_75: bool,
    pub alert_90: bool,
    pub active: bool,
    pub alert_window_start: Option<Date>,
    pub alerted_state: Option<String>,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(budget: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(budget.id.to_string()),
            user_id: ActiveValue::Set(budget.user_id.to_string()),
            name: ActiveValue::Set(budget.name.clone()),
            category: ActiveValue::Set(budget.category.as_str().to_string()),
            limit_minor: ActiveValue::Set(budget.limit.minor()),
            currency: ActiveValue::Set(budget.currency.code().to_string()),
            period: ActiveValue::Set(budget.period.as_str().to_string()),
            start_date: ActiveValue::Set(budget.start_date),
            end_date: ActiveValue::Set(budget.end_date),
            alert_50: ActiveValue::Set(budget.alerts.at_50),
            alert_75: ActiveValue::Set(budget.alerts.at_75),
            alert_90: ActiveValue::Set(budget.alerts.at_90),
            active: ActiveValue::Set(budget.active),
            alert_window_start: ActiveValue::Set(budget.alert_state.map(|s| s.window_start)),
            alerted_state: ActiveValue::Set(
                budget.alert_state.map(|s| s.highest.as_str().to_string()),
            ),
            created_at: ActiveValue::Set(budget.created_at),
            deleted_at: ActiveValue::Set(budget.deleted_at),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let alert_state = match (model.alert_window_start, model.alerted_state.as_deref()) {
            (Some(window_start), Some(state)) => Some(AlertState {
                window_start,
                highest: BudgetState::try_from(state)?,
            }),
            _ => None,
        };
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            name: model.name,
            category: Category::try_from(model.category.as_str())?,
            limit: model_money(model.limit_minor, "budget limit")?,
            currency: model_currency(&model.currency)?,
            period: BudgetPeriod::try_from(model.period.as_str())?,
            start_date: model.start_date,
            end_date: model.end_date,
            alerts: AlertSettings {
                at_50: model.alert_50,
                at_75: model.alert_75,
                at_90: model.alert_90,
            },
            active: model.active,
            alert_state,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
