//! The module contains the `Account` struct and its storage mapping.

use std::fmt;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Money, ResultEngine,
    util::{model_currency, model_money, normalize_required_name, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Cash,
    Investment,
}

impl AccountType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Cash => "cash",
            Self::Investment => "investment",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AccountType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "cash" => Ok(Self::Cash),
            "investment" => Ok(Self::Investment),
            other => Err(EngineError::Validation(format!(
                "invalid account type: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::try_from(s)
    }
}

/// A balance-bearing container owned by exactly one user.
///
/// `balance` is a cached view of the ledger: it always equals the signed sum
/// of the account's non-voided transactions, and is only written together with
/// the transactions that change it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    /// Closed accounts keep their history but accept no new postings.
    pub active: bool,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        user_id: Uuid,
        name: &str,
        account_type: AccountType,
        currency: Currency,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            name: normalize_required_name(name, "account name")?,
            account_type,
            currency,
            active: true,
            balance: Money::ZERO,
            created_at,
            deleted_at: None,
        })
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn rename(&mut self, name: &str) -> ResultEngine<()> {
        self.name = normalize_required_name(name, "account name")?;
        Ok(())
    }

    /// Fails unless the account belongs to `user_id` and can take postings.
    pub(crate) fn ensure_postable(&self, user_id: Uuid) -> ResultEngine<()> {
        if self.user_id != user_id || self.is_deleted() {
            return Err(EngineError::NotFound(format!("account {}", self.id)));
        }
        if !self.active {
            return Err(EngineError::AccountInactive(format!("account {}", self.id)));
        }
        Ok(())
    }
}

/// Result of comparing the cached balance with the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub account_id: Uuid,
    pub stored: Money,
    pub derived: Money,
    /// `true` when the stored balance was wrong and has been overwritten.
    pub repaired: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub account_type: String,
    pub currency: String,
    pub active: bool,
    pub balance_minor: i64,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            user_id: ActiveValue::Set(account.user_id.to_string()),
            name: ActiveValue::Set(account.name.clone()),
            account_type: ActiveValue::Set(account.account_type.as_str().to_string()),
            currency: ActiveValue::Set(account.currency.code().to_string()),
            active: ActiveValue::Set(account.active),
            balance_minor: ActiveValue::Set(account.balance.minor()),
            created_at: ActiveValue::Set(account.created_at),
            deleted_at: ActiveValue::Set(account.deleted_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            user_id: parse_uuid(&model.user_id, "user")?,
            name: model.name,
            account_type: AccountType::try_from(model.account_type.as_str())?,
            currency: model_currency(&model.currency)?,
            active: model.active,
            balance: model_money(model.balance_minor, "account balance")?,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
