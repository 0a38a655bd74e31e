//! Advisory insights derived from the ledger.
//!
//! Insights are produced only by the insight engine, are immutable once
//! written, and never feed back into balances or budgets.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Category, EngineError,
    util::{from_json_text, parse_uuid, to_json_text},
};

pub mod anomaly;
pub mod categorize;

pub use anomaly::{AnomalyScan, AnomalySettings, AnomalyWindow, CancelFlag};
pub use categorize::{Categorization, CategoryRule, Categorizer, RuleTier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Trend,
    Anomaly,
    Prediction,
    Recommendation,
}

impl InsightType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trend => "trend",
            Self::Anomaly => "anomaly",
            Self::Prediction => "prediction",
            Self::Recommendation => "recommendation",
        }
    }
}

impl TryFrom<&str> for InsightType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "trend" => Ok(Self::Trend),
            "anomaly" => Ok(Self::Anomaly),
            "prediction" => Ok(Self::Prediction),
            "recommendation" => Ok(Self::Recommendation),
            other => Err(EngineError::Storage(format!("invalid insight type: {other}"))),
        }
    }
}

/// Whether the insight is good or bad news for the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

impl Impact {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl TryFrom<&str> for Impact {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            other => Err(EngineError::Storage(format!("invalid impact: {other}"))),
        }
    }
}

impl fmt::Display for InsightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpendingInsight {
    pub id: Uuid,
    pub user_id: Uuid,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub category: Option<Category>,
    pub impact: Impact,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Opaque structured payload, shape depends on `insight_type`.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "insights")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub insight_type: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub impact: String,
    pub confidence: f64,
    pub data: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&SpendingInsight> for ActiveModel {
    type Error = EngineError;

    fn try_from(insight: &SpendingInsight) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActiveValue::Set(insight.id.to_string()),
            user_id: ActiveValue::Set(insight.user_id.to_string()),
            insight_type: ActiveValue::Set(insight.insight_type.as_str().to_string()),
            title: ActiveValue::Set(insight.title.clone()),
            description: ActiveValue::Set(insight.description.clone()),
            category: ActiveValue::Set(insight.category.map(|c| c.as_str().to_string())),
            impact: ActiveValue::Set(insight.impact.as_str().to_string()),
            confidence: ActiveValue::Set(insight.confidence),
            data: ActiveValue::Set(to_json_text(&insight.data)?),
            created_at: ActiveValue::Set(insight.created_at),
        })
    }
}

impl TryFrom<Model> for SpendingInsight {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "insight")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            insight_type: InsightType::try_from(model.insight_type.as_str())?,
            title: model.title,
            description: model.description,
            category: model
                .category
                .as_deref()
                .map(Category::try_from)
                .transpose()?,
            impact: Impact::try_from(model.impact.as_str())?,
            confidence: model.confidence,
            data: from_json_text(&model.data, "insight data")?,
            created_at: model.created_at,
        })
    }
}
