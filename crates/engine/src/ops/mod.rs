use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    Account, AnomalySettings, Budget, BudgetAlert, BudgetStatus, Categorizer, CategoryRule, Clock,
    Currency, EngineError, LedgerStore, LedgerView, MemoryStore, ResultEngine, SystemClock,
    Transaction, User, locks::EntityLocks,
};

mod accounts;
mod budgets;
mod goals;
mod insights;
mod ledger;
mod users;

/// Startup parameters of the engine. Loaded by the binary, never read from
/// files or the environment by the engine itself.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Per-entity lock wait before `ConcurrencyConflict`.
    pub lock_timeout: Duration,
    /// Currency of accounts, budgets and goals opened without one.
    pub default_currency: Currency,
    pub anomaly: AnomalySettings,
    /// Extra categorization rules on top of the built-in set.
    pub rules: Vec<CategoryRule>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2_000),
            default_currency: Currency::default(),
            anomaly: AnomalySettings::default(),
            rules: Vec::new(),
        }
    }
}

/// What a ledger mutation wrote, plus the budget alerts it triggered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub alerts: Vec<BudgetAlert>,
}

impl MutationOutcome {
    /// The primary transaction (the outflow leg for transfers).
    #[must_use]
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    #[must_use]
    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }
}

/// A changed budget and, when it is active, its evaluation under the new
/// settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetUpdate {
    pub budget: Budget,
    pub status: Option<BudgetStatus>,
}

#[derive(Debug)]
pub struct Engine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    categorizer: Categorizer,
    account_locks: EntityLocks,
    budget_locks: EntityLocks,
    goal_locks: EntityLocks,
    registration: Mutex<()>,
    sequence: AtomicI64,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn ensure_not_future(&self, occurred_at: DateTime<Utc>) -> ResultEngine<()> {
        let now = self.now();
        if occurred_at > now {
            return Err(EngineError::Validation(format!(
                "transaction date {occurred_at} is in the future (now {now})"
            )));
        }
        Ok(())
    }

    async fn require_user(&self, user_id: Uuid) -> ResultEngine<User> {
        self.store
            .load_user(user_id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))
    }

    /// Snapshot of the user's transactions on accounts that are not deleted.
    async fn ledger_view(&self, user_id: Uuid) -> ResultEngine<LedgerView> {
        let deleted: Vec<Uuid> = self
            .store
            .list_accounts(user_id)
            .await?
            .into_iter()
            .filter(Account::is_deleted)
            .map(|a| a.id)
            .collect();
        let transactions = self.store.user_transactions(user_id).await?;
        Ok(LedgerView::new(
            transactions
                .into_iter()
                .filter(|tx| !deleted.contains(&tx.account_id))
                .collect(),
        ))
    }

    /// Non-deleted account owned by `user_id` (closed accounts included).
    async fn require_account(&self, user_id: Uuid, account_id: Uuid) -> ResultEngine<Account> {
        self.store
            .load_account(account_id)
            .await?
            .filter(|a| a.user_id == user_id && !a.is_deleted())
            .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
        }
    }
}

impl EngineBuilder {
    /// Pass the storage backend (in-memory by default).
    pub fn store(mut self, store: Arc<dyn LedgerStore>) -> EngineBuilder {
        self.store = store;
        self
    }

    /// Pass the time source (system clock by default).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> EngineBuilder {
        self.clock = clock;
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        self.settings.anomaly.validate()?;
        if self.settings.lock_timeout.is_zero() {
            return Err(EngineError::Validation(
                "lock timeout must be greater than zero".to_string(),
            ));
        }
        let categorizer = Categorizer::builtin().with_rules(self.settings.rules.clone())?;
        let sequence = self.store.max_sequence().await?;
        let timeout = self.settings.lock_timeout;
        Ok(Engine {
            store: self.store,
            clock: self.clock,
            settings: self.settings,
            categorizer,
            account_locks: EntityLocks::new("account", timeout),
            budget_locks: EntityLocks::new("budget", timeout),
            goal_locks: EntityLocks::new("goal", timeout),
            registration: Mutex::new(()),
            sequence: AtomicI64::new(sequence),
        })
    }
}
