//! Ledger mutations.
//!
//! Every mutation runs under the lock of each account it touches, writes the
//! transactions and the new cached balances through one `commit`, and only
//! then re-evaluates the affected budgets. A failed call leaves the ledger and
//! balances untouched.

use uuid::Uuid;

use crate::{
    Account, Category, ChangeSet, EngineError, Money, PostCmd, ResultEngine, Transaction,
    TransactionPatch, TransactionType, TransferCmd, TransferDirection,
    categories::{self, ensure_valid},
    util::{ensure_positive, normalize_optional_text, normalize_tags},
};

use super::{Engine, MutationOutcome};

impl Engine {
    fn resolve_category(
        &self,
        kind: TransactionType,
        category: Option<Category>,
        description: Option<&str>,
        amount: Money,
    ) -> ResultEngine<Category> {
        match category {
            Some(category) => {
                ensure_valid(kind, category)?;
                Ok(category)
            }
            None => Ok(self
                .categorizer
                .categorize_as(kind, description.unwrap_or_default(), amount)
                .category),
        }
    }

    /// Appends an income or expense and moves the account balance by its
    /// signed amount.
    pub async fn post(&self, cmd: PostCmd) -> ResultEngine<MutationOutcome> {
        if cmd.transaction_type == TransactionType::Transfer {
            return Err(EngineError::Validation(
                "transfers are posted with `transfer`".to_string(),
            ));
        }
        ensure_positive(cmd.amount, "amount")?;
        self.ensure_not_future(cmd.occurred_at)?;
        let description = normalize_optional_text(cmd.description.as_deref());
        let category = self.resolve_category(
            cmd.transaction_type,
            cmd.category,
            description.as_deref(),
            cmd.amount,
        )?;
        self.require_user(cmd.user_id).await?;

        let guard = self.account_locks.acquire(cmd.account_id).await?;
        let mut account = self.require_account(cmd.user_id, cmd.account_id).await?;
        account.ensure_postable(cmd.user_id)?;

        let now = self.now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: cmd.user_id,
            account_id: account.id,
            transaction_type: cmd.transaction_type,
            transfer_direction: None,
            amount: cmd.amount,
            currency: account.currency,
            category,
            description,
            occurred_at: cmd.occurred_at,
            recurrence: cmd.recurrence,
            tags: normalize_tags(&cmd.tags),
            sequence: self.next_sequence(),
            revision: 0,
            history: Vec::new(),
            transfer_id: None,
            created_at: now,
            deleted_at: None,
        };
        account.balance = account.balance.checked_add(tx.signed_amount())?;

        self.store
            .commit(&ChangeSet::new().transaction(tx.clone()).account(account.clone()))
            .await?;
        drop(guard);
        tracing::info!(
            transaction_id = %tx.id,
            account_id = %account.id,
            amount = %tx.signed_amount().format(tx.currency),
            balance = %account.balance.format(account.currency),
            category = %tx.category,
            "transaction posted"
        );

        let alerts = self.reevaluate_budgets(cmd.user_id, &[tx.category]).await;
        Ok(MutationOutcome {
            transactions: vec![tx],
            accounts: vec![account],
            alerts,
        })
    }

    /// Posts both legs of a transfer atomically.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<MutationOutcome> {
        if cmd.from_account_id == cmd.to_account_id {
            return Err(EngineError::Validation(
                "cannot transfer to the same account".to_string(),
            ));
        }
        ensure_positive(cmd.amount, "amount")?;
        self.ensure_not_future(cmd.occurred_at)?;
        self.require_user(cmd.user_id).await?;

        let _guards = self
            .account_locks
            .acquire_many(&[cmd.from_account_id, cmd.to_account_id])
            .await?;
        let mut from = self.require_account(cmd.user_id, cmd.from_account_id).await?;
        let mut to = self.require_account(cmd.user_id, cmd.to_account_id).await?;
        from.ensure_postable(cmd.user_id)?;
        to.ensure_postable(cmd.user_id)?;
        if from.currency != to.currency {
            return Err(EngineError::Validation(format!(
                "currency mismatch: {} -> {}",
                from.currency, to.currency
            )));
        }

        let now = self.now();
        let transfer_id = Uuid::new_v4();
        let description = normalize_optional_text(cmd.description.as_deref());
        let leg = |account: &Account, direction: TransferDirection, sequence: i64| Transaction {
            id: Uuid::new_v4(),
            user_id: cmd.user_id,
            account_id: account.id,
            transaction_type: TransactionType::Transfer,
            transfer_direction: Some(direction),
            amount: cmd.amount,
            currency: account.currency,
            category: Category::Transfer,
            description: description.clone(),
            occurred_at: cmd.occurred_at,
            recurrence: None,
            tags: Vec::new(),
            sequence,
            revision: 0,
            history: Vec::new(),
            transfer_id: Some(transfer_id),
            created_at: now,
            deleted_at: None,
        };
        let out_leg = leg(&from, TransferDirection::Out, self.next_sequence());
        let in_leg = leg(&to, TransferDirection::In, self.next_sequence());
        from.balance = from.balance.checked_add(out_leg.signed_amount())?;
        to.balance = to.balance.checked_add(in_leg.signed_amount())?;

        self.store
            .commit(
                &ChangeSet::new()
                    .transaction(out_leg.clone())
                    .transaction(in_leg.clone())
                    .account(from.clone())
                    .account(to.clone()),
            )
            .await?;
        tracing::info!(
            %transfer_id,
            from = %from.id,
            to = %to.id,
            amount = %cmd.amount.format(from.currency),
            "transfer posted"
        );

        Ok(MutationOutcome {
            transactions: vec![out_leg, in_leg],
            accounts: vec![from, to],
            alerts: Vec::new(),
        })
    }

    async fn require_live_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        self.store
            .load_transaction(transaction_id)
            .await?
            .filter(|tx| tx.user_id == user_id && !tx.is_voided())
            .ok_or_else(|| EngineError::NotFound(format!("transaction {transaction_id}")))
    }

    /// Tombstones a transaction and reverses its effect on the balance.
    /// Voiding either leg of a transfer voids both.
    pub async fn void(&self, user_id: Uuid, transaction_id: Uuid) -> ResultEngine<MutationOutcome> {
        let tx = self.require_live_transaction(user_id, transaction_id).await?;
        let leg_ids: Vec<(Uuid, Uuid)> = match tx.transfer_id {
            Some(transfer_id) => self
                .store
                .user_transactions(user_id)
                .await?
                .into_iter()
                .filter(|t| t.transfer_id == Some(transfer_id))
                .map(|t| (t.id, t.account_id))
                .collect(),
            None => vec![(tx.id, tx.account_id)],
        };
        let account_ids: Vec<Uuid> = leg_ids.iter().map(|(_, account)| *account).collect();
        let _guards = self.account_locks.acquire_many(&account_ids).await?;

        let now = self.now();
        let mut accounts: Vec<Account> = Vec::new();
        let mut voided: Vec<Transaction> = Vec::new();
        for (leg_id, account_id) in leg_ids {
            // Re-read under the lock: a concurrent void may have won.
            let mut leg = self.require_live_transaction(user_id, leg_id).await?;
            let position = match accounts.iter().position(|a| a.id == account_id) {
                Some(position) => position,
                None => {
                    accounts.push(self.require_account(user_id, account_id).await?);
                    accounts.len() - 1
                }
            };
            let account = &mut accounts[position];
            account.balance = account.balance.checked_sub(leg.signed_amount())?;
            leg.deleted_at = Some(now);
            voided.push(leg);
        }

        let mut changes = ChangeSet::new();
        changes.transactions = voided.clone();
        changes.accounts = accounts.clone();
        self.store.commit(&changes).await?;
        for leg in &voided {
            tracing::info!(
                transaction_id = %leg.id,
                account_id = %leg.account_id,
                amount = %leg.signed_amount().format(leg.currency),
                "transaction voided"
            );
        }

        let categories: Vec<Category> = voided.iter().map(|t| t.category).collect();
        let alerts = self.reevaluate_budgets(user_id, &categories).await;
        Ok(MutationOutcome {
            transactions: voided,
            accounts,
            alerts,
        })
    }

    /// Replaces the amendable fields of a transaction in one step, keeping
    /// its id. The previous fields are appended to `history`.
    pub async fn amend(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<MutationOutcome> {
        if patch.is_empty() {
            return Err(EngineError::Validation("nothing to amend".to_string()));
        }
        if patch.transaction_type == Some(TransactionType::Transfer) {
            return Err(EngineError::Validation(
                "a transaction cannot be amended into a transfer".to_string(),
            ));
        }
        if let Some(amount) = patch.amount {
            ensure_positive(amount, "amount")?;
        }
        if let Some(occurred_at) = patch.occurred_at {
            self.ensure_not_future(occurred_at)?;
        }

        let current = self.require_live_transaction(user_id, transaction_id).await?;
        let _guard = self.account_locks.acquire(current.account_id).await?;
        let current = self.require_live_transaction(user_id, transaction_id).await?;
        if current.is_transfer_leg() {
            return Err(EngineError::Validation(
                "transfer legs cannot be amended; void and transfer again".to_string(),
            ));
        }
        let mut account = self.require_account(user_id, current.account_id).await?;
        account.ensure_postable(user_id)?;

        let now = self.now();
        let mut next = current.clone();
        next.history.push(current.snapshot(now));
        next.revision += 1;
        if let Some(kind) = patch.transaction_type {
            next.transaction_type = kind;
        }
        if let Some(amount) = patch.amount {
            next.amount = amount;
        }
        if let Some(description) = patch.description {
            next.description = normalize_optional_text(description.as_deref());
        }
        if let Some(occurred_at) = patch.occurred_at {
            next.occurred_at = occurred_at;
        }
        if let Some(recurrence) = patch.recurrence {
            next.recurrence = recurrence;
        }
        if let Some(tags) = patch.tags {
            next.tags = normalize_tags(&tags);
        }
        next.category = match patch.category {
            Some(category) => {
                ensure_valid(next.transaction_type, category)?;
                category
            }
            // A type change can invalidate the old category.
            None if !categories::validate(next.transaction_type, next.category) => self
                .resolve_category(
                    next.transaction_type,
                    None,
                    next.description.as_deref(),
                    next.amount,
                )?,
            None => next.category,
        };

        account.balance = account
            .balance
            .checked_sub(current.signed_amount())?
            .checked_add(next.signed_amount())?;

        self.store
            .commit(&ChangeSet::new().transaction(next.clone()).account(account.clone()))
            .await?;
        tracing::info!(
            transaction_id = %next.id,
            account_id = %account.id,
            revision = next.revision,
            amount = %next.signed_amount().format(next.currency),
            balance = %account.balance.format(account.currency),
            "transaction amended"
        );

        let alerts = self
            .reevaluate_budgets(user_id, &[current.category, next.category])
            .await;
        Ok(MutationOutcome {
            transactions: vec![next],
            accounts: vec![account],
            alerts,
        })
    }

    pub async fn transaction(&self, user_id: Uuid, transaction_id: Uuid) -> ResultEngine<Transaction> {
        self.store
            .load_transaction(transaction_id)
            .await?
            .filter(|tx| tx.user_id == user_id)
            .ok_or_else(|| EngineError::NotFound(format!("transaction {transaction_id}")))
    }

    /// Ledger of one account in posting order. Voided entries are included
    /// only when `include_voided` is set.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        include_voided: bool,
    ) -> ResultEngine<Vec<Transaction>> {
        self.require_account(user_id, account_id).await?;
        Ok(self
            .store
            .load_transactions(account_id)
            .await?
            .into_iter()
            .filter(|tx| include_voided || !tx.is_voided())
            .collect())
    }
}
