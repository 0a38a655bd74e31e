use std::collections::BTreeSet;

use uuid::Uuid;

use crate::{
    Budget, BudgetAlert, BudgetPatch, BudgetStatus, Category, EngineError, NewBudget,
    ResultEngine, budgets::evaluate,
};

use super::{BudgetUpdate, Engine};

impl Engine {
    pub async fn create_budget(&self, new: NewBudget) -> ResultEngine<Budget> {
        self.require_user(new.user_id).await?;
        let budget = new.into_budget(self.now())?;
        self.store.save_budget(&budget).await?;
        tracing::info!(
            budget_id = %budget.id,
            user_id = %budget.user_id,
            category = %budget.category,
            limit = %budget.limit.format(budget.currency),
            period = %budget.period,
            "budget created"
        );
        Ok(budget)
    }

    async fn require_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        self.store
            .load_budget(budget_id)
            .await?
            .filter(|b| b.user_id == user_id && b.deleted_at.is_none())
            .ok_or_else(|| EngineError::NotFound(format!("budget {budget_id}")))
    }

    pub async fn budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        self.require_budget(user_id, budget_id).await
    }

    pub async fn budgets(&self, user_id: Uuid) -> ResultEngine<Vec<Budget>> {
        Ok(self
            .store
            .load_budgets(user_id)
            .await?
            .into_iter()
            .filter(|b| b.deleted_at.is_none())
            .collect())
    }

    /// Changes name, limit or alert switches. An active budget is evaluated
    /// right away under the new settings; the bands already alerted in the
    /// current window stay alerted.
    pub async fn update_budget(
        &self,
        user_id: Uuid,
        budget_id: Uuid,
        patch: BudgetPatch,
    ) -> ResultEngine<BudgetUpdate> {
        let _guard = self.budget_locks.acquire(budget_id).await?;
        let mut budget = self.require_budget(user_id, budget_id).await?;
        budget.apply(patch)?;
        self.store.save_budget(&budget).await?;
        tracing::info!(
            %budget_id,
            name = %budget.name,
            limit = %budget.limit.format(budget.currency),
            "budget updated"
        );

        let status = if budget.active {
            Some(self.evaluate_locked(&mut budget).await?)
        } else {
            None
        };
        Ok(BudgetUpdate { budget, status })
    }

    /// Resumes evaluation of a deactivated budget.
    pub async fn activate_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        let _guard = self.budget_locks.acquire(budget_id).await?;
        let mut budget = self.require_budget(user_id, budget_id).await?;
        if !budget.active {
            budget.active = true;
            self.store.save_budget(&budget).await?;
            tracing::info!(%budget_id, "budget activated");
        }
        Ok(budget)
    }

    /// Stops evaluation; the budget stays listed.
    pub async fn deactivate_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        let _guard = self.budget_locks.acquire(budget_id).await?;
        let mut budget = self.require_budget(user_id, budget_id).await?;
        budget.active = false;
        self.store.save_budget(&budget).await?;
        tracing::info!(%budget_id, "budget deactivated");
        Ok(budget)
    }

    pub async fn delete_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<Budget> {
        let _guard = self.budget_locks.acquire(budget_id).await?;
        let mut budget = self.require_budget(user_id, budget_id).await?;
        budget.active = false;
        budget.deleted_at = Some(self.now());
        self.store.save_budget(&budget).await?;
        tracing::info!(%budget_id, "budget deleted");
        Ok(budget)
    }

    /// Evaluates the budget against the current window of the ledger and
    /// persists its alert state. Alerts in the returned status are the ones
    /// newly emitted by this call.
    pub async fn evaluate_budget(&self, user_id: Uuid, budget_id: Uuid) -> ResultEngine<BudgetStatus> {
        let _guard = self.budget_locks.acquire(budget_id).await?;
        let mut budget = self.require_budget(user_id, budget_id).await?;
        if !budget.active {
            return Err(EngineError::Validation(format!(
                "budget {budget_id} is inactive"
            )));
        }

        self.evaluate_locked(&mut budget).await
    }

    /// Evaluation of a budget whose lock the caller holds.
    async fn evaluate_locked(&self, budget: &mut Budget) -> ResultEngine<BudgetStatus> {
        let budget_id = budget.id;
        let ledger = self.ledger_view(budget.user_id).await?;
        let evaluation = evaluate(budget, &ledger, self.now())?;
        if evaluation.changes(budget) {
            budget.alert_state = Some(evaluation.alert_state);
            self.store.save_budget(budget).await?;
        }

        let status = evaluation.status;
        tracing::debug!(
            %budget_id,
            window = %status.window,
            spent = %status.spent.format(budget.currency),
            limit = %status.limit.format(budget.currency),
            state = %status.state,
            "budget evaluated"
        );
        for alert in &status.alerts {
            tracing::info!(
                %budget_id,
                user_id = %alert.user_id,
                category = %alert.category,
                kind = %alert.kind,
                spent = %alert.spent.format(budget.currency),
                limit = %alert.limit.format(budget.currency),
                "budget alert"
            );
        }
        Ok(status)
    }

    /// Re-evaluates the user's active budgets for `categories` after a ledger
    /// mutation. The mutation is already committed, so failures here are
    /// logged and the budget is picked up again by its next evaluation.
    pub(super) async fn reevaluate_budgets(
        &self,
        user_id: Uuid,
        categories: &[Category],
    ) -> Vec<BudgetAlert> {
        let touched: BTreeSet<Category> = categories
            .iter()
            .copied()
            .filter(|c| c.is_expense())
            .collect();
        if touched.is_empty() {
            return Vec::new();
        }

        let budgets = match self.store.load_budgets(user_id).await {
            Ok(budgets) => budgets,
            Err(err) => {
                tracing::warn!(%user_id, "budget re-evaluation skipped: {err}");
                return Vec::new();
            }
        };

        let mut alerts = Vec::new();
        for budget in budgets
            .iter()
            .filter(|b| b.is_evaluable() && touched.contains(&b.category))
        {
            match self.evaluate_budget(user_id, budget.id).await {
                Ok(status) => alerts.extend(status.alerts),
                Err(err) => tracing::warn!(budget_id = %budget.id, "budget re-evaluation failed: {err}"),
            }
        }
        alerts
    }
}
