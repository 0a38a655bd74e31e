//! Transaction primitives.
//!
//! A `Transaction` is an immutable-once-posted event on one account. Its
//! `amount` is always a positive magnitude; the sign applied to the account
//! balance comes from the type (and, for transfers, the direction).

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Category, Currency, EngineError, Money,
    util::{from_json_text, model_currency, model_money, parse_uuid, to_json_text},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::Validation(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::try_from(s)
    }
}

/// Which side of a transfer a leg represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    In,
    Out,
}

impl TransferDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl TryFrom<&str> for TransferDirection {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(EngineError::Storage(format!(
                "invalid transfer direction: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl TryFrom<&str> for Recurrence {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::Validation(format!(
                "invalid recurrence: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recurrence::try_from(s)
    }
}

/// Snapshot of the amendable fields of a transaction before an `amend`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRevision {
    pub revision: u32,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub category: Category,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub tags: Vec<String>,
    /// When this revision was superseded.
    pub replaced_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    /// Set exactly when `transaction_type` is `Transfer`.
    pub transfer_direction: Option<TransferDirection>,
    /// Positive magnitude.
    pub amount: Money,
    pub currency: Currency,
    pub category: Category,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub tags: Vec<String>,
    /// Store-wide posting order, breaks ties between equal `occurred_at`.
    pub sequence: i64,
    pub revision: u32,
    pub history: Vec<TransactionRevision>,
    /// Shared by both legs of a transfer.
    pub transfer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Effect of this transaction on its account balance.
    #[must_use]
    pub fn signed_amount(&self) -> Money {
        match (self.transaction_type, self.transfer_direction) {
            (TransactionType::Income, _) | (TransactionType::Transfer, Some(TransferDirection::In)) => {
                self.amount
            }
            _ => -self.amount,
        }
    }

    #[must_use]
    pub fn is_voided(&self) -> bool {
        self.deleted_at.is_some()
    }

    #[must_use]
    pub fn is_transfer_leg(&self) -> bool {
        self.transfer_id.is_some()
    }

    pub(crate) fn snapshot(&self, replaced_at: DateTime<Utc>) -> TransactionRevision {
        TransactionRevision {
            revision: self.revision,
            transaction_type: self.transaction_type,
            amount: self.amount,
            category: self.category,
            description: self.description.clone(),
            occurred_at: self.occurred_at,
            recurrence: self.recurrence,
            tags: self.tags.clone(),
            replaced_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub transaction_type: String,
    pub transfer_direction: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub category: String,
    pub description: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub recurrence: Option<String>,
    /// JSON array of strings.
    pub tags: String,
    pub sequence: i64,
    pub revision: i32,
    /// JSON array of `TransactionRevision`.
    pub history: String,
    pub transfer_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Account,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Transaction> for ActiveModel {
    type Error = EngineError;

    fn try_from(tx: &Transaction) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ActiveValue::Set(tx.id.to_string()),
            user_id: ActiveValue::Set(tx.user_id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            transaction_type: ActiveValue::Set(tx.transaction_type.as_str().to_string()),
            transfer_direction: ActiveValue::Set(
                tx.transfer_direction.map(|d| d.as_str().to_string()),
            ),
            amount_minor: ActiveValue::Set(tx.amount.minor()),
            currency: ActiveValue::Set(tx.currency.code().to_string()),
            category: ActiveValue::Set(tx.category.as_str().to_string()),
            description: ActiveValue::Set(tx.description.clone()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            recurrence: ActiveValue::Set(tx.recurrence.map(|r| r.as_str().to_string())),
            tags: ActiveValue::Set(to_json_text(&tx.tags)?),
            sequence: ActiveValue::Set(tx.sequence),
            revision: ActiveValue::Set(i32::try_from(tx.revision).map_err(|_| {
                EngineError::Storage(format!("revision out of range: {}", tx.revision))
            })?),
            history: ActiveValue::Set(to_json_text(&tx.history)?),
            transfer_id: ActiveValue::Set(tx.transfer_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(tx.created_at),
            deleted_at: ActiveValue::Set(tx.deleted_at),
        })
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            account_id: parse_uuid(&model.account_id, "account")?,
            transaction_type: TransactionType::try_from(model.transaction_type.as_str())?,
            transfer_direction: model
                .transfer_direction
                .as_deref()
                .map(TransferDirection::try_from)
                .transpose()?,
            amount: model_money(model.amount_minor, "transaction amount")?,
            currency: model_currency(&model.currency)?,
            category: Category::try_from(model.category.as_str())?,
            description: model.description,
            occurred_at: model.occurred_at,
            recurrence: model
                .recurrence
                .as_deref()
                .map(Recurrence::try_from)
                .transpose()?,
            tags: from_json_text(&model.tags, "tags")?,
            sequence: model.sequence,
            revision: u32::try_from(model.revision)
                .map_err(|_| EngineError::Storage(format!("invalid revision: {}", model.revision)))?,
            history: from_json_text(&model.history, "history")?,
            transfer_id: model
                .transfer_id
                .as_deref()
                .map(|id| parse_uuid(id, "transfer"))
                .transpose()?,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
