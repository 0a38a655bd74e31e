//! In-process store, used by tests and the `memory` database setting.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Account, Budget, Goal, ResultEngine, SpendingInsight, Transaction, User};

use super::{ChangeSet, LedgerStore, sort_ledger};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, Transaction>,
    budgets: HashMap<Uuid, Budget>,
    goals: HashMap<Uuid, Goal>,
    insights: Vec<SpendingInsight>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_user(&self, id: Uuid) -> ResultEngine<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> ResultEngine<Option<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
            .cloned())
    }

    async fn save_user(&self, user: &User) -> ResultEngine<()> {
        self.tables.write().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_account(&self, id: Uuid) -> ResultEngine<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn save_account(&self, account: &Account) -> ResultEngine<()> {
        self.tables
            .write()
            .await
            .accounts
            .insert(account.id, account.clone());
        Ok(())
    }

    async fn list_accounts(&self, user_id: Uuid) -> ResultEngine<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .tables
            .read()
            .await
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn load_transaction(&self, id: Uuid) -> ResultEngine<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn load_transactions(&self, account_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .tables
            .read()
            .await
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .cloned()
            .collect();
        sort_ledger(&mut txs);
        Ok(txs)
    }

    async fn user_transactions(&self, user_id: Uuid) -> ResultEngine<Vec<Transaction>> {
        let mut txs: Vec<Transaction> = self
            .tables
            .read()
            .await
            .transactions
            .values()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        sort_ledger(&mut txs);
        Ok(txs)
    }

    async fn save_transaction(&self, tx: &Transaction) -> ResultEngine<()> {
        self.tables
            .write()
            .await
            .transactions
            .insert(tx.id, tx.clone());
        Ok(())
    }

    async fn max_sequence(&self) -> ResultEngine<i64> {
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .values()
            .map(|tx| tx.sequence)
            .max()
            .unwrap_or(0))
    }

    async fn commit(&self, changes: &ChangeSet) -> ResultEngine<()> {
        // One write guard for the whole set: readers see all of it or none.
        let mut tables = self.tables.write().await;
        for tx in &changes.transactions {
            tables.transactions.insert(tx.id, tx.clone());
        }
        for account in &changes.accounts {
            tables.accounts.insert(account.id, account.clone());
        }
        Ok(())
    }

    async fn load_budget(&self, id: Uuid) -> ResultEngine<Option<Budget>> {
        Ok(self.tables.read().await.budgets.get(&id).cloned())
    }

    async fn load_budgets(&self, user_id: Uuid) -> ResultEngine<Vec<Budget>> {
        let mut budgets: Vec<Budget> = self
            .tables
            .read()
            .await
            .budgets
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        budgets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(budgets)
    }

    async fn save_budget(&self, budget: &Budget) -> ResultEngine<()> {
        self.tables
            .write()
            .await
            .budgets
            .insert(budget.id, budget.clone());
        Ok(())
    }

    async fn load_goal(&self, id: Uuid) -> ResultEngine<Option<Goal>> {
        Ok(self.tables.read().await.goals.get(&id).cloned())
    }

    async fn load_goals(&self, user_id: Uuid) -> ResultEngine<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .tables
            .read()
            .await
            .goals
            .values()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }

    async fn save_goal(&self, goal: &Goal) -> ResultEngine<()> {
        self.tables.write().await.goals.insert(goal.id, goal.clone());
        Ok(())
    }

    async fn save_insights(&self, insights: &[SpendingInsight]) -> ResultEngine<()> {
        self.tables
            .write()
            .await
            .insights
            .extend(insights.iter().cloned());
        Ok(())
    }

    async fn load_insights(&self, user_id: Uuid) -> ResultEngine<Vec<SpendingInsight>> {
        Ok(self
            .tables
            .read()
            .await
            .insights
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }
}
