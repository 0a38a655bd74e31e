//! Relational store on sea-orm.
//!
//! Rows are written with `INSERT .. ON CONFLICT(id) DO UPDATE`, and every
//! multi-row write runs inside one database transaction.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Iterable, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    Account, Budget, Goal, ResultEngine, SpendingInsight, Transaction, User, accounts, budgets,
    goals, insights, transactions, users,
};

use super::{ChangeSet, LedgerStore};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// Insert-or-replace one row by primary key.
macro_rules! upsert {
    ($entity:ident, $model:expr, $db:expr) => {{
        let columns = $entity::Column::iter().filter(|c| !matches!(c, $entity::Column::Id));
        $entity::Entity::insert($model)
            .on_conflict(
                OnConflict::column($entity::Column::Id)
                    .update_columns(columns)
                    .to_owned(),
            )
            .exec_without_returning($db)
            .await
            .map(|_| ())
    }};
}

#[derive(Debug, Clone)]
pub struct SqlStore {
    database: DatabaseConnection,
}

impl SqlStore {
    /// Wraps a connection whose schema is already migrated.
    #[must_use]
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }
}

fn convert<M, T>(models: Vec<M>) -> ResultEngine<Vec<T>>
where
    T: TryFrom<M, Error = crate::EngineError>,
{
    models.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl LedgerStore for SqlStore {
    async fn load_user(&self, id: Uuid) -> ResultEngine<Option<User>> {
        users::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> ResultEngine<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn save_user(&self, user: &User) -> ResultEngine<()> {
        upsert!(users, users::ActiveModel::from(user), &self.database)?;
        Ok(())
    }

    async fn load_account(&self, id: Uuid) -> ResultEngine<Option<Account>> {
        accounts::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn save_account(&self, account: &Account) -> ResultEngine<()> {
        upsert!(accounts, accounts::ActiveModel::from(account), &self.database)?;
        Ok(())
    }

    async fn list_accounts(&self, user_id: Uuid) -> ResultEngine<Vec<Account>> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?;
        convert(models)
    }

    async fn load_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }

    async fn load_transactions(&self, account_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.to_string()))
            .order_by_asc(transactions::Column::OccurredAt)
            .order_by_asc(transactions::Column::Sequence)
            .all(&self.database)
            .await?;
        convert(models)
    }

    async fn user_transactions(&self, user_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        let models = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(transactions::Column::OccurredAt)
            .order_by_asc(transactions::Column::Sequence)
            .all(&self.database)
            .await?;
        convert(models)
    }

    async fn save_transaction(&self, tx: &Transaction) -> ResultEngine<()> {
        upsert!(
            transactions,
            transactions::ActiveModel::try_from(tx)?,
            &self.database
        )?;
        Ok(())
    }

    async fn max_sequence(&self) -> ResultEngine<i64> {
        Ok(transactions::Entity::find()
            .order_by_desc(transactions::Column::Sequence)
            .one(&self.database)
            .await?
            .map_or(0, |model| model.sequence))
    }

    async fn commit(&self, changes: &ChangeSet) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            for tx in &changes.transactions {
                let model = transactions::ActiveModel::try_from(tx)?;
                upsert!(transactions, model, &db_tx)?;
            }
            for account in &changes.accounts {
                upsert!(accounts, accounts::ActiveModel::from(account), &db_tx)?;
            }
            Ok(())
        })
    }

    async fn load_budget(&self, id: Uuid) -> ResultEngine<Option<Budget>> {
        budgets::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(Budget::try_from)
            .transpose()
    }

    async fn load_budgets(&self, user_id: Uuid) -> ResultEngine<Vec<Budget>> {
        let models = budgets::Entity::find()
            .filter(budgets::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(budgets::Column::CreatedAt)
            .order_by_asc(budgets::Column::Id)
            .all(&self.database)
            .await?;
        convert(models)
    }

    async fn save_budget(&self, budget: &Budget) -> ResultEngine<()> {
        upsert!(budgets, budgets::ActiveModel::from(budget), &self.database)?;
        Ok(())
    }

    async fn load_goal(&self, id: Uuid) -> ResultEngine<Option<Goal>> {
        goals::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .map(Goal::try_from)
            .transpose()
    }

    async fn load_goals(&self, user_id: Uuid) -> ResultEngine<Vec<Goal>> {
        let models = goals::Entity::find()
            .filter(goals::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(goals::Column::CreatedAt)
            .order_by_asc(goals::Column::Id)
            .all(&self.database)
            .await?;
        convert(models)
    }

    async fn save_goal(&self, goal: &Goal) -> ResultEngine<()> {
        upsert!(goals, goals::ActiveModel::from(goal), &self.database)?;
        Ok(())
    }

    async fn save_insights(&self, batch: &[SpendingInsight]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            for insight in batch {
                let model = insights::ActiveModel::try_from(insight)?;
                upsert!(insights, model, &db_tx)?;
            }
            Ok(())
        })
    }

    async fn load_insights(&self, user_id: Uuid) -> ResultEngine<Vec<SpendingInsight>> {
        let models = insights::Entity::find()
            .filter(insights::Column::UserId.eq(user_id.to_string()))
            .order_by_asc(insights::Column::CreatedAt)
            .order_by_asc(insights::Column::Id)
            .all(&self.database)
            .await?;
        convert(models)
    }
}
