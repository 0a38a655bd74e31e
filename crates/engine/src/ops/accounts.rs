use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Account, AccountType, Category, Currency, Money, Reconciliation, ResultEngine};

use super::Engine;

impl Engine {
    pub async fn open_account(
        &self,
        user_id: Uuid,
        name: &str,
        account_type: AccountType,
        currency: Option<Currency>,
    ) -> ResultEngine<Account> {
        self.require_user(user_id).await?;
        let account = Account::new(
            user_id,
            name,
            account_type,
            currency.unwrap_or(self.settings.default_currency),
            self.now(),
        )?;
        self.store.save_account(&account).await?;
        tracing::info!(account_id = %account.id, %user_id, kind = %account.account_type, "account opened");
        Ok(account)
    }

    pub async fn account(&self, user_id: Uuid, account_id: Uuid) -> ResultEngine<Account> {
        self.require_account(user_id, account_id).await
    }

    /// Accounts of the user that are not deleted, oldest first.
    pub async fn accounts(&self, user_id: Uuid) -> ResultEngine<Vec<Account>> {
        Ok(self
            .store
            .list_accounts(user_id)
            .await?
            .into_iter()
            .filter(|a| !a.is_deleted())
            .collect())
    }

    pub async fn rename_account(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        name: &str,
    ) -> ResultEngine<Account> {
        let _guard = self.account_locks.acquire(account_id).await?;
        let mut account = self.require_account(user_id, account_id).await?;
        account.rename(name)?;
        self.store.save_account(&account).await?;
        tracing::info!(%account_id, name = %account.name, "account renamed");
        Ok(account)
    }

    /// Stops further postings. History and balance are kept.
    pub async fn close_account(&self, user_id: Uuid, account_id: Uuid) -> ResultEngine<Account> {
        let _guard = self.account_locks.acquire(account_id).await?;
        let mut account = self.require_account(user_id, account_id).await?;
        if account.active {
            account.active = false;
            self.store.save_account(&account).await?;
            tracing::info!(%account_id, "account closed");
        }
        Ok(account)
    }

    /// Tombstones the account. Its transactions stay in the store but no
    /// longer count toward budgets or anomaly scans.
    pub async fn delete_account(&self, user_id: Uuid, account_id: Uuid) -> ResultEngine<Account> {
        let guard = self.account_locks.acquire(account_id).await?;
        let mut account = self.require_account(user_id, account_id).await?;
        account.active = false;
        account.deleted_at = Some(self.now());
        self.store.save_account(&account).await?;
        let categories: Vec<Category> = self
            .store
            .load_transactions(account_id)
            .await?
            .iter()
            .filter(|tx| tx.deleted_at.is_none())
            .map(|tx| tx.category)
            .collect();
        drop(guard);
        tracing::info!(%account_id, "account deleted");

        self.reevaluate_budgets(user_id, &categories).await;
        Ok(account)
    }

    /// Folds every non-voided transaction dated at or before `at`.
    pub async fn balance_as_of(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> ResultEngine<Money> {
        self.require_account(user_id, account_id).await?;
        let transactions = self.store.load_transactions(account_id).await?;
        Money::sum(
            transactions
                .iter()
                .filter(|tx| tx.deleted_at.is_none() && tx.occurred_at <= at)
                .map(|tx| tx.signed_amount()),
        )
    }

    /// Re-derives the balance from the ledger and repairs the cached value.
    pub async fn reconcile(&self, user_id: Uuid, account_id: Uuid) -> ResultEngine<Reconciliation> {
        let _guard = self.account_locks.acquire(account_id).await?;
        let mut account = self.require_account(user_id, account_id).await?;
        let transactions = self.store.load_transactions(account_id).await?;
        let derived = Money::sum(
            transactions
                .iter()
                .filter(|tx| tx.deleted_at.is_none())
                .map(|tx| tx.signed_amount()),
        )?;

        let stored = account.balance;
        let repaired = stored != derived;
        if repaired {
            account.balance = derived;
            self.store.save_account(&account).await?;
            tracing::warn!(
                %account_id,
                stored = %stored.format(account.currency),
                derived = %derived.format(account.currency),
                "account balance repaired"
            );
        }
        Ok(Reconciliation {
            account_id,
            stored,
            derived,
            repaired,
        })
    }
}
