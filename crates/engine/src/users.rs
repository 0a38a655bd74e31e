//! Users: the identity anchor that owns accounts, transactions and budgets.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{normalize_email, normalize_required_name, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Lower-cased, unique among users that are not deleted.
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: &str, name: &str, created_at: DateTime<Utc>) -> ResultEngine<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            email: normalize_email(email)?,
            name: normalize_required_name(name, "user name")?,
            created_at,
            deleted_at: None,
        })
    }

    pub fn rename(&mut self, name: &str) -> ResultEngine<()> {
        self.name = normalize_required_name(name, "user name")?;
        Ok(())
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&User> for ActiveModel {
    fn from(user: &User) -> Self {
        Self {
            id: ActiveValue::Set(user.id.to_string()),
            email: ActiveValue::Set(user.email.clone()),
            name: ActiveValue::Set(user.name.clone()),
            created_at: ActiveValue::Set(user.created_at),
            deleted_at: ActiveValue::Set(user.deleted_at),
        }
    }
}

impl TryFrom<Model> for User {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "user")?,
            email: model.email,
            name: model.name,
            created_at: model.created_at,
            deleted_at: model.deleted_at,
        })
    }
}
