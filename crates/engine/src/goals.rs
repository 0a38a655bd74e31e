//! Financial goals: a savings target with a deadline.
//!
//! Completion is never stored; it is derived from `current` and `target`.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine,
    util::{
        ensure_positive, model_currency, model_money, normalize_optional_text,
        normalize_required_name, parse_uuid,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalCategory {
    EmergencyFund,
    Vacation,
    Purchase,
    DebtPayoff,
    Investment,
    Other,
}

impl GoalCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmergencyFund => "emergency_fund",
            Self::Vacation => "vacation",
            Self::Purchase => "purchase",
            Self::DebtPayoff => "debt_payoff",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for GoalCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "emergency_fund" => Ok(Self::EmergencyFund),
            "vacation" => Ok(Self::Vacation),
            "purchase" => Ok(Self::Purchase),
            "debt_payoff" => Ok(Self::DebtPayoff),
            "investment" => Ok(Self::Investment),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid goal category: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for GoalCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoalCategory::try_from(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target: Money,
    pub current: Money,
    pub currency: Currency,
    pub target_date: NaiveDate,
    pub category: GoalCategory,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Parameters of `Engine::create_goal`.
#[derive(Clone, Debug)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target: Money,
    /// Falls back to the engine's default currency.
    pub currency: Option<Currency>,
    pub target_date: NaiveDate,
    pub category: GoalCategory,
}

impl NewGoal {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        title: impl Into<String>,
        target: Money,
        target_date: NaiveDate,
        category: GoalCategory,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            description: None,
            target,
            currency: None,
            target_date,
            category,
        }
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn into_goal(
        self,
        default_currency: Currency,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Goal> {
        ensure_positive(self.target, "goal target")?;
        Ok(Goal {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            title: normalize_required_name(&self.title, "goal title")?,
            description: normalize_optional_text(self.description.as_deref()),
            target: self.target,
            current: Money::ZERO,
            currency: self.currency.unwrap_or(default_currency),
            target_date: self.target_date,
            category: self.category,
            created_at,
            deleted_at: None,
        })
    }
}

impl Goal {
    /// Adds `amount` (> 0) to the saved amount.
    pub fn contribute(&mut self, amount: Money) -> ResultEngine<()> {
        ensure_positive(amount, "contribution")?;
        self.current = self.current.checked_add(amount)?;
        Ok(())
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.current >= self.target
    }

    /// Progress toward the target in basis points, capped at 10000.
    #[must_use]
    pub fn progress_bps(&self) -> i64 {
        self.current
            .ratio_bps(self.target)
            .unwrap_or(0)
            .clamp(0, 10_000)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_minor: i64,
    pub current_minor: i64,
    pub currency: String,
    pub target_date: Date,
    pub category: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Goal> for ActiveModel {
    fn from(goal: &Goal) -> Self {
        Self {
            id: ActiveValue::Set(goal.id.to_string()),
            user_id: ActiveValue::Set(goal.user_id.to_string()),
            title: ActiveValue::Set(goal.title.clone()),
            description: ActiveValue::Set(goal.description.clone()),
            target_minor: ActiveValue::Set(goal.target.minor()),
            current_minor: ActiveValue::Set(goal.current.minor()),
            currency: ActiveValue::Set(goal.currency.code().to_string()),
            target_date: ActiveValue::Set(goal.target_date),
            category: ActiveValue::Set(goal.category.as_str().to_string()),
            created_at: ActiveValue::Set(goal.created_at),
            deleted_at: ActiveValue::Set(goal.deleted_at),
        }
    }
}

impl TryFrom<Model> for Goal {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "goal")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            title: model.title,
            description: model.description,
            target: model_money(model.target_minor, "goal target")?,
            current: model_money(model.current_minor, "goal current")?,
            currency: model_currency(&model.currency)?,
            target_date: model.target_date,
            category: GoalCategory::try_from(model.category.as_str())?,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
