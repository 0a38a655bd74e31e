//! Personal-finance ledger engine.
//!
//! Owns the ledger of users' accounts, keeps cached balances consistent with
//! it, evaluates category budgets with edge-triggered alerts and derives
//! advisory insights. Everything goes through [`Engine`]; persistence is
//! behind [`LedgerStore`].

pub use accounts::{Account, AccountType, Reconciliation};
pub use budgets::{
    AlertSettings, AlertState, Budget, BudgetAlert, BudgetPeriod, BudgetState, BudgetStatus,
    LedgerView, NewBudget, PeriodWindow,
};
pub use categories::{Category, TAXONOMY_VERSION};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{BudgetPatch, PostCmd, TransactionPatch, TransferCmd};
pub use currency::Currency;
pub use error::EngineError;
pub use goals::{Goal, GoalCategory, NewGoal};
pub use insights::{
    AnomalyScan, AnomalySettings, AnomalyWindow, CancelFlag, Categorization, Categorizer,
    CategoryRule, Impact, InsightType, RuleTier, SpendingInsight,
};
pub use money::Money;
pub use ops::{BudgetUpdate, Engine, EngineBuilder, EngineSettings, MutationOutcome};
pub use store::{ChangeSet, LedgerStore, MemoryStore, SqlStore};
pub use transactions::{
    Recurrence, Transaction, TransactionRevision, TransactionType, TransferDirection,
};
pub use users::User;

mod accounts;
pub mod budgets;
pub mod categories;
mod clock;
mod commands;
mod currency;
mod error;
mod goals;
pub mod insights;
mod locks;
mod money;
mod ops;
mod store;
mod transactions;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
