//! Storage contract.
//!
//! The engine only talks to persistence through [`LedgerStore`]. Stores hand
//! back tombstoned rows as well; filtering on `deleted_at` is the engine's job
//! and is always done explicitly.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Account, Budget, Goal, ResultEngine, SpendingInsight, Transaction, User};

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

/// Rows written together by one ledger mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transaction(mut self, tx: Transaction) -> Self {
        self.transactions.push(tx);
        self
    }

    #[must_use]
    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    async fn load_user(&self, id: Uuid) -> ResultEngine<Option<User>>;
    /// Non-deleted user with this (normalized) e-mail.
    async fn find_user_by_email(&self, email: &str) -> ResultEngine<Option<User>>;
    async fn save_user(&self, user: &User) -> ResultEngine<()>;

    async fn load_account(&self, id: Uuid) -> ResultEngine<Option<Account>>;
    async fn save_account(&self, account: &Account) -> ResultEngine<()>;
    async fn list_accounts(&self, user_id: Uuid) -> ResultEngine<Vec<Account>>;

    async fn load_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>>;
    /// Every transaction of the account, ordered by `(occurred_at, sequence)`.
    async fn load_transactions(&self, account_id: Uuid) -> ResultEngine<Vec<Transaction>>;
    /// Every transaction of the user, ordered by `(occurred_at, sequence)`.
    async fn user_transactions(&self, user_id: Uuid) -> ResultEngine<Vec<Transaction>>;
    async fn save_transaction(&self, tx: &Transaction) -> ResultEngine<()>;
    /// Highest sequence number handed out so far, 0 for an empty store.
    async fn max_sequence(&self) -> ResultEngine<i64>;

    /// Persists every row of `changes` or none of them.
    async fn commit(&self, changes: &ChangeSet) -> ResultEngine<()>;

    async fn load_budget(&self, id: Uuid) -> ResultEngine<Option<Budget>>;
    async fn load_budgets(&self, user_id: Uuid) -> ResultEngine<Vec<Budget>>;
    async fn save_budget(&self, budget: &Budget) -> ResultEngine<()>;

    async fn load_goal(&self, id: Uuid) -> ResultEngine<Option<Goal>>;
    async fn load_goals(&self, user_id: Uuid) -> ResultEngine<Vec<Goal>>;
    async fn save_goal(&self, goal: &Goal) -> ResultEngine<()>;

    /// Persists all insights or none of them.
    async fn save_insights(&self, insights: &[SpendingInsight]) -> ResultEngine<()>;
    async fn load_insights(&self, user_id: Uuid) -> ResultEngine<Vec<SpendingInsight>>;
}

pub(crate) fn sort_ledger(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then(a.sequence.cmp(&b.sequence))
    });
}
